//! Batch ETL from an operational music-streaming database into an
//! analytical star schema: full source snapshots, pure in-memory
//! transforms, and a diff-before-append loader that keeps repeated runs
//! idempotent on each table's declared key columns.

pub mod config;
pub mod db;
pub mod extract;
pub mod load;
pub mod models;
pub mod pipeline;
pub mod transform;
