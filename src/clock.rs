//! Wall-clock abstraction used for every token validity check.

// self
use crate::_prelude::*;

/// Source of the current UTC instant.
///
/// Token validity is derived from the clock on every read, so tests inject a manual clock to
/// move tokens across their expiry without sleeping.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current UTC instant.
	fn now(&self) -> OffsetDateTime;

	/// Returns the current instant as milliseconds since the Unix epoch.
	fn now_ms(&self) -> i64 {
		unix_ms(self.now())
	}
}

/// Clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Converts an instant into epoch milliseconds, saturating at the `i64` range.
pub fn unix_ms(instant: OffsetDateTime) -> i64 {
	let millis = instant.unix_timestamp_nanos() / 1_000_000;

	i64::try_from(millis).unwrap_or(if millis.is_negative() { i64::MIN } else { i64::MAX })
}
