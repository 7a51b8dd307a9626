//! Wall-clock helpers.
//!
//! Token expiry is expressed in epoch seconds, so every expiry check in the
//! workspace reads time through [`now_secs`]. Checks themselves take `now` as
//! a parameter so they stay pure and testable.

/// Current system time in seconds since Unix epoch.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
