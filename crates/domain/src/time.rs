//! Time and timestamp helpers.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp used for `createdAt`, `updatedAt` and measurement times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return a timestamp strictly after `previous`.
///
/// Uses the wall clock when it has moved past `previous`, otherwise bumps
/// `previous` by one microsecond so `updatedAt` never stalls or goes back.
#[must_use]
pub fn advance(previous: Timestamp) -> Timestamp {
    let current = now();
    if current > previous {
        current
    } else {
        previous + TimeDelta::microseconds(1)
    }
}
