// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one refresh loop.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	retries: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of operation runs.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of runs that produced a token (including cache reuses).
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed runs.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of failed runs that were rescheduled with backoff.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Copies every counter at once.
	pub fn snapshot(&self) -> RefreshMetricsSnapshot {
		RefreshMetricsSnapshot {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
			retries: self.retries(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self, retried: bool) {
		self.failure.fetch_add(1, Ordering::Relaxed);

		if retried {
			self.retries.fetch_add(1, Ordering::Relaxed);
		}
	}
}

/// Point-in-time copy of [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshMetricsSnapshot {
	/// Operation runs.
	pub attempts: u64,
	/// Successful runs.
	pub successes: u64,
	/// Failed runs.
	pub failures: u64,
	/// Failed runs that were retried.
	pub retries: u64,
}
