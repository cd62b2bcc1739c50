//! Default document id generation.

use chrono::Local;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generates a fresh id for documents added without one.
///
/// The id is the local calendar date, the last eight digits of the
/// epoch-millisecond clock and five random alphanumeric characters,
/// joined by `~`, e.g. `20260826~73219480~k3Rqj`. Ids from one
/// generator sort roughly by creation time and stay readable inside
/// the log file.
#[must_use]
pub fn default_id() -> String {
    let now = Local::now();
    let clock = now.timestamp_millis().unsigned_abs() % 100_000_000;
    let salt: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(5)
        .map(char::from)
        .collect();
    format!("{}~{clock:08}~{salt}", now.format("%Y%m%d"))
}
