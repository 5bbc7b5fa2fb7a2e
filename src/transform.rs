use chrono::{Datelike, Days, NaiveDate};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::models::*;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("track {track_id} has unparseable duration {value:?} (expected HH:MM:SS)")]
    BadDuration { track_id: i32, value: String },
}

/// Parses a "HH:MM:SS" duration into whole seconds.
pub fn parse_duration_secs(value: &str) -> Option<i64> {
    let mut parts = value.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    if hours < 0 || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// Elapsed subscription time implied by a payment: amount / price months,
/// converted at 30 days per month, truncated to whole days.
fn subscription_end_date(paid_on: NaiveDate, amount: f64, price: f64) -> Option<NaiveDate> {
    if price <= 0.0 || amount < 0.0 {
        return None;
    }
    let days = (amount / price * 30.0).floor() as u64;
    paid_on.checked_add_days(Days::new(days))
}

fn plan_prices(plans: &[SubscriptionPlan]) -> HashMap<i32, f64> {
    plans.iter().map(|p| (p.plan_id, p.price)).collect()
}

/// Builds the user dimension. Subscription start is the user's earliest
/// payment; the end date is derived from the latest payment and its plan's
/// price. A user is current iff `today` is on or before the end date, so a
/// user with no payments (or an unpriceable plan) is never current.
pub fn prepare_user_dimension(
    users: &[User],
    payments: &[Payment],
    plans: &[SubscriptionPlan],
    today: NaiveDate,
) -> Vec<DimUser> {
    tracing::info!("preparing dim_user from {} users", users.len());
    let prices = plan_prices(plans);

    let mut by_user: HashMap<i32, Vec<&Payment>> = HashMap::new();
    for payment in payments {
        by_user.entry(payment.user_id).or_default().push(payment);
    }

    users
        .iter()
        .map(|user| {
            let user_payments = by_user.get(&user.user_id);
            let start_date = user_payments
                .and_then(|ps| ps.iter().map(|p| p.date).min());
            let end_date = user_payments
                .and_then(|ps| ps.iter().max_by_key(|p| p.date))
                .and_then(|latest| {
                    let price = prices.get(&latest.plan_id)?;
                    subscription_end_date(latest.date, latest.amount, *price)
                });
            let is_current = end_date.is_some_and(|end| today <= end);

            DimUser {
                user_id: user.user_id,
                username: user.username.clone(),
                email: user.email.clone(),
                start_date,
                end_date,
                is_current,
            }
        })
        .collect()
}

pub fn prepare_artist_dimension(artists: &[Artist]) -> Vec<DimArtist> {
    tracing::info!("preparing dim_artist from {} artists", artists.len());
    artists
        .iter()
        .map(|a| DimArtist {
            artist_id: a.artist_id,
            name: a.name.clone(),
            genre: a.genre.clone(),
        })
        .collect()
}

pub fn prepare_album_dimension(albums: &[Album]) -> Vec<DimAlbum> {
    tracing::info!("preparing dim_album from {} albums", albums.len());
    albums
        .iter()
        .map(|a| DimAlbum {
            album_id: a.album_id,
            title: a.title.clone(),
            release_date: a.release_date,
        })
        .collect()
}

pub fn prepare_track_dimension(tracks: &[Track]) -> Vec<DimTrack> {
    tracing::info!("preparing dim_track from {} tracks", tracks.len());
    tracks
        .iter()
        .map(|t| DimTrack {
            track_id: t.track_id,
            title: t.title.clone(),
            play_count: t.play_count,
            duration: t.duration.clone(),
        })
        .collect()
}

/// One row per calendar day from `min_date` to `max_date` inclusive, with a
/// 1-based surrogate key assigned in date order.
pub fn prepare_time_dimension(min_date: NaiveDate, max_date: NaiveDate) -> Vec<DimTime> {
    tracing::info!("preparing dim_time from {} to {}", min_date, max_date);
    min_date
        .iter_days()
        .take_while(|date| *date <= max_date)
        .zip(1..)
        .map(|(date, date_id)| DimTime {
            date_id,
            date,
            month: date.month() as i32,
            quarter: (date.month0() / 3 + 1) as i32,
            year: date.year(),
            day: date.day() as i32,
        })
        .collect()
}

/// Per-track play metrics. Listening time is play count times the track
/// length in seconds; a duration that fails to parse aborts the derivation.
pub fn prepare_streaming_fact(
    tracks: &[Track],
    dim_time: &[DimTime],
    today: NaiveDate,
) -> Result<Vec<FactStreaming>, TransformError> {
    tracing::info!("preparing fact_streaming from {} tracks", tracks.len());
    let date_ids: HashMap<NaiveDate, i32> =
        dim_time.iter().map(|t| (t.date, t.date_id)).collect();

    tracks
        .iter()
        .map(|track| {
            let secs = parse_duration_secs(&track.duration).ok_or_else(|| {
                TransformError::BadDuration {
                    track_id: track.track_id,
                    value: track.duration.clone(),
                }
            })?;
            Ok(FactStreaming {
                snapshot_date: today,
                track_id: track.track_id,
                date_id: date_ids.get(&track.release_date).copied(),
                play_count: track.play_count,
                listening_time: track.play_count as f64 * secs as f64,
            })
        })
        .collect()
}

/// One subscription period per payment. Payments referencing an unknown plan
/// are dropped (no monthly fee can be attributed), and so are payments whose
/// user has no row in the prepared user dimension.
pub fn prepare_subscription_fact(
    payments: &[Payment],
    plans: &[SubscriptionPlan],
    dim_time: &[DimTime],
    dim_user: &[DimUser],
) -> Vec<FactSubscription> {
    tracing::info!("preparing fact_subscription from {} payments", payments.len());
    let prices = plan_prices(plans);
    let date_ids: HashMap<NaiveDate, i32> =
        dim_time.iter().map(|t| (t.date, t.date_id)).collect();
    let known_users: HashSet<i32> = dim_user.iter().map(|u| u.user_id).collect();

    payments
        .iter()
        .filter_map(|payment| {
            if !known_users.contains(&payment.user_id) {
                tracing::warn!(
                    "payment {} references user {} absent from dim_user, skipping",
                    payment.payment_id,
                    payment.user_id
                );
                return None;
            }
            let Some(price) = prices.get(&payment.plan_id) else {
                tracing::warn!(
                    "payment {} references unknown plan {}, skipping",
                    payment.payment_id,
                    payment.plan_id
                );
                return None;
            };
            Some(FactSubscription {
                user_id: payment.user_id,
                start_date: payment.date,
                end_date: subscription_end_date(payment.date, payment.amount, *price),
                date_id: date_ids.get(&payment.date).copied(),
                plan_id: payment.plan_id,
                monthly_fee: *price,
            })
        })
        .collect()
}
