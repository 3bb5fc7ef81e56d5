#![allow(dead_code)]

pub mod fake_es;
pub mod indexer_suite;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at microsecond precision, which every backend can store exactly.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
