use chrono::NaiveDate;
use sqlx::FromRow;

// Operational (OLTP) rows. Source columns use the legacy squashed-lowercase
// naming, so fields are renamed explicitly.

#[derive(Debug, Clone, FromRow)]
pub struct User {
    #[sqlx(rename = "userid")]
    pub user_id: i32,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Artist {
    #[sqlx(rename = "artistid")]
    pub artist_id: i32,
    pub name: String,
    pub genre: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Album {
    #[sqlx(rename = "albumid")]
    pub album_id: i32,
    pub title: String,
    #[sqlx(rename = "releasedate")]
    pub release_date: NaiveDate,
}

#[derive(Debug, Clone, FromRow)]
pub struct Track {
    #[sqlx(rename = "trackid")]
    pub track_id: i32,
    pub title: String,
    #[sqlx(rename = "playcount")]
    pub play_count: i64,
    /// Wall-clock track length as "HH:MM:SS" text.
    pub duration: String,
    #[sqlx(rename = "releasedate")]
    pub release_date: NaiveDate,
}

#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionPlan {
    #[sqlx(rename = "subscriptionplanid")]
    pub plan_id: i32,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    #[sqlx(rename = "paymentid")]
    pub payment_id: i32,
    pub user_id: i32,
    #[sqlx(rename = "subscriptionplanid")]
    pub plan_id: i32,
    pub amount: f64,
    pub date: NaiveDate,
}

// Warehouse (OLAP) rows.

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DimUser {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DimArtist {
    pub artist_id: i32,
    pub name: String,
    pub genre: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DimAlbum {
    pub album_id: i32,
    pub title: String,
    pub release_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DimTrack {
    pub track_id: i32,
    pub title: String,
    pub play_count: i64,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DimTime {
    /// Surrogate key, 1-based in date order.
    pub date_id: i32,
    pub date: NaiveDate,
    pub month: i32,
    pub quarter: i32,
    pub year: i32,
    pub day: i32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FactStreaming {
    pub snapshot_date: NaiveDate,
    pub track_id: i32,
    pub date_id: Option<i32>,
    pub play_count: i64,
    pub listening_time: f64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FactSubscription {
    pub user_id: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub date_id: Option<i32>,
    pub plan_id: i32,
    pub monthly_fee: f64,
}
