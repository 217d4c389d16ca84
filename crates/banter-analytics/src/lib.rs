//! Usage analytics: API calls, speech synthesis, errors, and their cost.
//!
//! The core only sees the [`AnalyticsSink`] trait. [`SqliteAnalytics`]
//! persists records to a local database; [`NullAnalytics`] discards them.

pub mod db;
pub mod migrations;
pub mod sink;

pub use db::SqliteAnalytics;
pub use sink::{
    AnalyticsSink, ApiCallRecord, CostRates, NullAnalytics, TtsRecord, UsageStats,
};
