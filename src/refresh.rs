//! Proactive refresh loop with jittered retry/backoff.
//!
//! A [`Refresher`] is an explicit state machine: [`RefreshPhase::Idle`] until
//! [`start`](Refresher::start), [`RefreshPhase::Scheduled`] while its timer is armed, and
//! [`RefreshPhase::Running`] while the operation executes. The loop is a single Tokio task; the
//! operation itself runs as a separate task the loop awaits, so [`stop`](Refresher::stop) aborts
//! the pending timer without cancelling an operation that already started. Each start bumps a
//! generation counter and the loop re-checks it before every transition, so an aborted or
//! superseded loop never touches the state again.

mod metrics;

pub use metrics::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use rand::Rng;
use tokio::{runtime::Handle, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	config::ManagerConfig,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Future returned by the refresh operation.
pub type RefreshFuture = Pin<Box<dyn Future<Output = Result<(), Arc<Error>>> + Send>>;

type Operation = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;
type WaitFn = Arc<dyn Fn() -> u64 + Send + Sync>;
type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Observable state of a [`Refresher`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RefreshPhase {
	/// Not running; `start` arms the timer.
	#[default]
	Idle,
	/// Timer armed for the next run.
	Scheduled,
	/// Operation in progress.
	Running,
}

/// Wait bounds and jitter applied by the refresh loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefreshPolicy {
	/// First retry wait and floor for every retry wait.
	pub lower_bound_ms: u64,
	/// Ceiling for every retry wait.
	pub upper_bound_ms: u64,
	/// Largest fraction of a wait that jitter may shave off.
	pub jitter_ratio: f64,
}
impl RefreshPolicy {
	/// Derives the policy from a validated configuration.
	pub fn from_config(config: &ManagerConfig) -> Self {
		Self {
			lower_bound_ms: config.retry_min_wait_ms,
			upper_bound_ms: config.retry_max_wait_ms,
			jitter_ratio: config.jitter_ratio,
		}
	}

	/// Shortens `wait_ms` by a random amount of at most `jitter_ratio * wait_ms`.
	pub fn jitter(&self, wait_ms: u64) -> u64 {
		let spread = (wait_ms as f64 * self.jitter_ratio.clamp(0.0, 1.0)) as u64;

		if spread == 0 {
			return wait_ms;
		}

		wait_ms - rand::rng().random_range(0..=spread)
	}

	/// Jitters a backoff wait and clamps it into the configured bounds.
	pub fn retry_wait(&self, backoff_ms: u64) -> u64 {
		self.jitter(backoff_ms).max(self.lower_bound_ms).min(self.upper_bound_ms)
	}
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self::from_config(&ManagerConfig::default())
	}
}

/// Exponential backoff between the policy bounds, doubling per consecutive failure.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
	policy: RefreshPolicy,
	next_ms: u64,
}
impl Backoff {
	/// Starts at the policy's lower bound.
	pub fn new(policy: RefreshPolicy) -> Self {
		Self { policy, next_ms: policy.lower_bound_ms }
	}

	/// Returns the wait before the next retry and doubles the following one.
	pub fn next_wait(&mut self) -> u64 {
		let current = self.next_ms;

		self.next_ms = current.saturating_mul(2).min(self.policy.upper_bound_ms);

		self.policy.retry_wait(current)
	}

	/// Resets to the lower bound after a success.
	pub fn reset(&mut self) {
		self.next_ms = self.policy.lower_bound_ms;
	}
}

/// Restartable, cancellable refresh loop.
///
/// Clones share the same loop.
#[derive(Clone)]
pub struct Refresher {
	inner: Arc<RefresherInner>,
}
impl Refresher {
	/// Creates an idle refresher.
	///
	/// - `operation` runs once per tick.
	/// - `wait` returns the milliseconds until the first tick and until the tick after a success.
	/// - `retry` decides whether a failed run is rescheduled with backoff or ends the loop.
	///
	/// Only retry waits are clamped into `[lower_bound_ms, upper_bound_ms]`. The first wait is
	/// jittered and used as is, so a token already inside its refresh window renews immediately.
	/// Waits after a success are jittered and floored at `lower_bound_ms` but never capped, so a
	/// long-lived token sleeps until its own refresh point rather than `upper_bound_ms`.
	pub fn new(
		label: impl Into<String>,
		handle: Handle,
		policy: RefreshPolicy,
		operation: impl 'static + Fn() -> RefreshFuture + Send + Sync,
		wait: impl 'static + Fn() -> u64 + Send + Sync,
		retry: impl 'static + Fn(&Error) -> bool + Send + Sync,
	) -> Self {
		Self {
			inner: Arc::new(RefresherInner {
				label: label.into(),
				handle,
				policy,
				operation: Arc::new(operation),
				wait: Arc::new(wait),
				retry: Arc::new(retry),
				control: Default::default(),
				metrics: Default::default(),
			}),
		}
	}

	/// Arms the loop; no-op unless idle.
	pub fn start(&self) {
		let mut control = self.inner.control.lock();

		if control.phase != RefreshPhase::Idle {
			return;
		}

		control.generation = control.generation.wrapping_add(1);
		control.phase = RefreshPhase::Scheduled;

		let generation = control.generation;
		let task = self.inner.handle.spawn(RefresherInner::run(self.inner.clone(), generation));

		control.task = Some(task);
	}

	/// Cancels the pending timer and returns to idle; idempotent.
	///
	/// An operation that already started keeps running to completion.
	pub fn stop(&self) {
		let task = {
			let mut control = self.inner.control.lock();

			control.generation = control.generation.wrapping_add(1);
			control.phase = RefreshPhase::Idle;

			control.task.take()
		};

		if let Some(task) = task {
			task.abort();
		}
	}

	/// Current phase.
	pub fn phase(&self) -> RefreshPhase {
		self.inner.control.lock().phase
	}

	/// Returns `true` unless idle.
	pub fn is_running(&self) -> bool {
		self.phase() != RefreshPhase::Idle
	}

	/// Counters for this loop.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.inner.metrics.clone()
	}
}
impl Debug for Refresher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Refresher")
			.field("label", &self.inner.label)
			.field("phase", &self.phase())
			.field("metrics", &self.inner.metrics.snapshot())
			.finish()
	}
}

#[derive(Default)]
struct Control {
	phase: RefreshPhase,
	generation: u64,
	task: Option<JoinHandle<()>>,
}

struct RefresherInner {
	label: String,
	handle: Handle,
	policy: RefreshPolicy,
	operation: Operation,
	wait: WaitFn,
	retry: RetryPredicate,
	control: Mutex<Control>,
	metrics: Arc<RefreshMetrics>,
}
impl RefresherInner {
	async fn run(self: Arc<Self>, generation: u64) {
		let mut backoff = Backoff::new(self.policy);
		let mut wait_ms = self.policy.jitter((self.wait)());

		loop {
			obs::debug_refresh("scheduled", wait_ms);
			tokio::time::sleep(StdDuration::from_millis(wait_ms)).await;

			if !self.enter(generation, RefreshPhase::Running) {
				return;
			}

			self.metrics.record_attempt();
			obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Attempt);

			let span = FlowSpan::new(FlowKind::Refresh, "run", &self.label);
			let joined = span.instrument(self.handle.spawn((self.operation)())).await;
			let next = match joined {
				Ok(Ok(())) => {
					self.metrics.record_success();
					obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Success);
					backoff.reset();

					// A token issued with less life than the refresh offset must not spin the loop.
					Some(self.policy.jitter((self.wait)()).max(self.policy.lower_bound_ms))
				},
				Ok(Err(e)) => {
					let retry = (self.retry)(e.as_ref());

					obs::warn_swallowed(FlowKind::Refresh, "run", &e);
					self.metrics.record_failure(retry);
					obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Failure);

					retry.then(|| backoff.next_wait())
				},
				Err(e) => {
					obs::warn_swallowed(FlowKind::Refresh, "join", &e);
					self.metrics.record_failure(true);
					obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Failure);

					Some(backoff.next_wait())
				},
			};

			match next {
				Some(next_ms) if self.enter(generation, RefreshPhase::Scheduled) =>
					wait_ms = next_ms,
				Some(_) => return,
				None => {
					self.finish(generation);

					return;
				},
			}
		}
	}

	fn enter(&self, generation: u64, phase: RefreshPhase) -> bool {
		let mut control = self.control.lock();

		if control.generation != generation {
			return false;
		}

		control.phase = phase;

		true
	}

	fn finish(&self, generation: u64) {
		let mut control = self.control.lock();

		if control.generation == generation {
			control.phase = RefreshPhase::Idle;
			control.task = None;
		}
	}
}
