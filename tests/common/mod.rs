//! Fakes shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicI64, AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
use time::OffsetDateTime;
// self
use app_attest::{
	app::{App, AppId, AppOptions, ProjectId},
	clock::Clock,
	config::ManagerConfig,
	error::{AttestationError, ExchangeError},
	http::{ExchangeClient, ExchangeFuture, ExchangeRequest, IssuedToken},
	manager::TokenManager,
	provider::{ChallengeWidget, CustomProvider, ProviderFuture, WidgetHandle},
	state::{Registry, TokenListener},
	store::MemoryStore,
	token::TokenResult,
};

/// One hour, in milliseconds.
pub const HOUR_MS: i64 = 3_600_000;
/// Initial manual clock reading.
pub const EPOCH_MS: i64 = 1_700_000_000_000;

pub fn app(id: &str) -> App {
	App::new(
		AppId::new(id).expect("App fixture should be valid."),
		AppOptions::new(
			ProjectId::new("project-1").expect("Project fixture should be valid."),
			"1:777777777777:web:d93b5ca1475efe57",
			"api-key",
		)
		.with_site_key("site-key"),
	)
}

/// Exchange client that replays scripted outcomes, then issues `T<n>` tokens.
#[derive(Clone)]
pub struct ScriptedExchange {
	ttl_ms: i64,
	delay: Option<StdDuration>,
	delays: Arc<Mutex<VecDeque<StdDuration>>>,
	script: Arc<Mutex<VecDeque<Result<IssuedToken, ExchangeError>>>>,
	requests: Arc<Mutex<Vec<ExchangeRequest>>>,
	calls: Arc<AtomicUsize>,
}
impl ScriptedExchange {
	pub fn issuing(ttl_ms: i64) -> Self {
		Self {
			ttl_ms,
			delay: None,
			delays: Default::default(),
			script: Default::default(),
			requests: Default::default(),
			calls: Default::default(),
		}
	}

	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = Some(delay);

		self
	}

	/// Per-call delays, consumed in call order before falling back to [`Self::with_delay`].
	pub fn with_delays(self, delays: impl IntoIterator<Item = StdDuration>) -> Self {
		self.delays.lock().extend(delays);

		self
	}

	pub fn push(&self, outcome: Result<IssuedToken, ExchangeError>) {
		self.script.lock().push_back(outcome);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn requests(&self) -> Vec<ExchangeRequest> {
		self.requests.lock().clone()
	}
}
impl ExchangeClient for ScriptedExchange {
	fn exchange(&self, request: ExchangeRequest) -> ExchangeFuture<'_> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

		self.requests.lock().push(request);

		let scripted = self.script.lock().pop_front();
		let outcome = scripted
			.unwrap_or_else(|| Ok(IssuedToken { token: format!("T{call}"), ttl_ms: self.ttl_ms }));
		let delay = self.delays.lock().pop_front().or(self.delay);

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			outcome
		})
	}
}

/// Custom provider that counts calls and can be told to fail.
#[derive(Clone, Default)]
pub struct CountingProvider {
	calls: Arc<AtomicUsize>,
	failing: bool,
}
impl CountingProvider {
	pub fn failing() -> Self {
		Self { failing: true, ..Default::default() }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl CustomProvider for CountingProvider {
	fn get_proof(&self) -> ProviderFuture<'_, String> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		let failing = self.failing;

		Box::pin(async move {
			if failing {
				return Err(AttestationError::provider("attestation backend rejected the device"));
			}

			Ok(format!("proof-{call}"))
		})
	}
}

/// Challenge widget that records every hook invocation.
#[derive(Default)]
pub struct FakeWidget {
	pub loads: AtomicUsize,
	pub renders: Mutex<Vec<String>>,
	pub executions: AtomicUsize,
}
impl ChallengeWidget for FakeWidget {
	fn load<'a>(&'a self, _site_key: &'a str) -> ProviderFuture<'a, ()> {
		Box::pin(async move {
			self.loads.fetch_add(1, Ordering::SeqCst);

			Ok(())
		})
	}

	fn render<'a>(
		&'a self,
		container_id: &'a str,
		site_key: &'a str,
	) -> ProviderFuture<'a, WidgetHandle> {
		Box::pin(async move {
			self.renders.lock().push(container_id.to_owned());

			Ok(WidgetHandle(format!("{container_id}#{site_key}")))
		})
	}

	fn execute<'a>(
		&'a self,
		_widget: &'a WidgetHandle,
		action: &'a str,
	) -> ProviderFuture<'a, String> {
		Box::pin(async move {
			let call = self.executions.fetch_add(1, Ordering::SeqCst) + 1;

			Ok(format!("widget-proof-{action}-{call}"))
		})
	}
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock(Arc<AtomicI64>);
impl ManualClock {
	pub fn new() -> Self {
		Self(Arc::new(AtomicI64::new(EPOCH_MS)))
	}

	pub fn advance_ms(&self, ms: i64) {
		self.0.fetch_add(ms, Ordering::SeqCst);
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.now_ms()) * 1_000_000)
			.expect("Manual clock should stay within the supported range.")
	}

	fn now_ms(&self) -> i64 {
		self.0.load(Ordering::SeqCst)
	}
}

/// Listener that records every result it receives.
pub fn recorder() -> (TokenListener, Arc<Mutex<Vec<TokenResult>>>) {
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();
	let listener = TokenListener::new(move |result| sink.lock().push(result.clone()));

	(listener, seen)
}

/// Manager wired to the fakes above, with jitter disabled.
pub struct Harness {
	pub manager: TokenManager,
	pub registry: Registry,
	pub exchange: ScriptedExchange,
	pub store: MemoryStore,
	pub clock: ManualClock,
	pub widget: Arc<FakeWidget>,
}
impl Harness {
	pub fn new() -> Self {
		Self::with_config(base_config().build().expect("Test configuration should validate."))
	}

	pub fn with_config(config: ManagerConfig) -> Self {
		Self::with_exchange(config, ScriptedExchange::issuing(HOUR_MS))
	}

	pub fn with_exchange(config: ManagerConfig, exchange: ScriptedExchange) -> Self {
		let registry = Registry::new();
		let store = MemoryStore::default();
		let clock = ManualClock::new();
		let widget = Arc::new(FakeWidget::default());
		let manager = TokenManager::builder(registry.clone(), exchange.clone())
			.config(config)
			.storage(store.clone())
			.clock(clock.clone())
			.challenge_widget(widget.clone())
			.build()
			.expect("Test manager should build inside a runtime.");

		Self { manager, registry, exchange, store, clock, widget }
	}
}

/// Base configuration used by the harness: no jitter and short retry bounds.
pub fn base_config() -> app_attest::config::ManagerConfigBuilder {
	ManagerConfig::builder().jitter_ratio(0.0).retry_bounds_ms(100, 400)
}
