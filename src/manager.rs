//! Token manager: activation gating, the memory/storage/exchange cascade, and listener fan-out.
//!
//! [`TokenManager`] is the single entry point consumers call. It is cheap to clone and every clone
//! drives the same [`Registry`]. Operational failures never escape [`TokenManager::get_token`];
//! they are folded into a sentinel [`TokenResult`] and broadcast like any other result. Only
//! [`UsageError`]s are returned.
//!
//! Overlapping `get_token` calls for one application are not serialized unless
//! [`ManagerConfig::dedupe_in_flight`] is set: two callers that both miss the cache both exchange,
//! and the last write to memory and storage wins.

mod listener;

// std
use std::sync::Weak;
// crates.io
use tokio::runtime::Handle;
// self
use crate::{
	_prelude::*,
	app::{App, AppId},
	clock::{Clock, SystemClock},
	config::ManagerConfig,
	error::{ConfigError, UsageError},
	http::{ExchangeClient, ExchangeRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{AttestationProvider, ChallengeWidget, InteractiveProvider},
	refresh::{RefreshFuture, RefreshPolicy, Refresher},
	state::Registry,
	store::{DurableCache, TokenStorage},
	token::{AttestationToken, TokenResult},
};

/// Issues, caches, refreshes, and fans out attestation tokens for any number of applications.
#[derive(Clone)]
pub struct TokenManager {
	inner: Arc<ManagerInner>,
}
impl TokenManager {
	/// Starts a builder around `registry` and the exchange transport.
	pub fn builder(
		registry: Registry,
		exchange: impl 'static + ExchangeClient,
	) -> TokenManagerBuilder {
		TokenManagerBuilder::new(registry, Arc::new(exchange))
	}

	/// Registry holding every application's state.
	pub fn registry(&self) -> &Registry {
		&self.inner.registry
	}

	/// Active configuration.
	pub fn config(&self) -> &ManagerConfig {
		&self.inner.config
	}

	/// Refresh loop for `app`, once a listener has been registered.
	pub fn refresher(&self, app: &AppId) -> Option<Refresher> {
		self.inner.registry.read(app, |state| state.refresher.clone())
	}

	/// Chooses the attestation provider for `app` ahead of activation.
	pub fn set_provider(&self, app: &App, provider: AttestationProvider) -> Result<(), UsageError> {
		self.inner.registry.update(&app.id, |state| {
			if state.activated {
				return Err(UsageError::ProviderSetAfterActivation { app: app.id.clone() });
			}
			if state.provider.is_some() {
				return Err(UsageError::ProviderAlreadySet { app: app.id.clone() });
			}

			state.provider = Some(provider);

			Ok(())
		})
	}

	/// Activates `app`, optionally supplying its provider.
	///
	/// Without a supplied or previously set provider, an interactive provider is built from the
	/// configured challenge widget and its initialization is spawned in the background. Returning
	/// from `activate` does not mean the widget is ready; the first proof request waits for it.
	pub fn activate(
		&self,
		app: &App,
		provider: Option<AttestationProvider>,
	) -> Result<(), UsageError> {
		let setup = self.inner.registry.update(&app.id, |state| {
			if state.activated {
				return Err(UsageError::AlreadyActivated { app: app.id.clone() });
			}

			let setup = match (provider, state.provider.is_some()) {
				(Some(_), true) =>
					return Err(UsageError::ProviderAlreadySet { app: app.id.clone() }),
				(Some(provider), false) => {
					state.provider = Some(provider);

					None
				},
				(None, true) => None,
				(None, false) => {
					let widget = self
						.inner
						.widget
						.clone()
						.ok_or_else(|| UsageError::NoProviderAvailable { app: app.id.clone() })?;
					let action = &self.inner.config.widget_action;
					let interactive = Arc::new(InteractiveProvider::new(widget, action));

					state.provider = Some(AttestationProvider::Interactive(interactive.clone()));

					Some(interactive)
				},
			};

			state.activated = true;

			Ok(setup)
		})?;

		if let Some(provider) = setup {
			let app = app.clone();

			self.inner.handle.spawn(async move {
				if let Err(e) = provider.initialize(&app).await {
					obs::warn_swallowed(FlowKind::GetToken, "provider_init", &e);
				}
			});
		}

		Ok(())
	}

	/// Returns a current token for `app`.
	///
	/// Serves a valid memory token without any I/O unless `force_refresh` is set. Otherwise falls
	/// back to the durable cache and then to a live exchange. Every result produced by a storage
	/// promotion or an exchange is broadcast to the registered listeners before it is returned.
	pub async fn get_token(
		&self,
		app: &App,
		force_refresh: bool,
	) -> Result<TokenResult, UsageError> {
		let span = FlowSpan::new(FlowKind::GetToken, "get_token", &app.id);

		span.instrument(self.get_token_inner(app, force_refresh)).await
	}

	async fn get_token_inner(
		&self,
		app: &App,
		force_refresh: bool,
	) -> Result<TokenResult, UsageError> {
		let inner = &self.inner;
		let (activated, has_token) =
			inner.registry.read(&app.id, |state| (state.activated, state.token.is_some()));

		if !activated {
			return Err(UsageError::UseBeforeActivation { app: app.id.clone() });
		}

		obs::record_flow_outcome(FlowKind::GetToken, FlowOutcome::Attempt);

		let stored = if has_token { None } else { inner.cache.read(app).await };

		if let Some(stored) = stored.filter(|token| token.is_valid_at(inner.clock.now_ms())) {
			let promoted = inner.registry.update(&app.id, |state| {
				if state.token.is_some() {
					return false;
				}

				state.token = Some(stored.clone());

				true
			});

			if promoted {
				self.broadcast(&app.id, &TokenResult::ok(&stored));
			}
		}

		let cached = if force_refresh { None } else { self.valid_token(&app.id) };

		if let Some(token) = cached {
			obs::record_flow_outcome(FlowKind::GetToken, FlowOutcome::Cached);

			return Ok(TokenResult::ok(&token));
		}

		let guard = inner.config.dedupe_in_flight.then(|| self.exchange_lock(&app.id));
		let _singleflight = match &guard {
			Some(guard) => Some(guard.lock().await),
			None => None,
		};
		let recheck = guard.is_some() && !force_refresh;
		let cached = if recheck { self.valid_token(&app.id) } else { None };

		if let Some(token) = cached {
			obs::record_flow_outcome(FlowKind::GetToken, FlowOutcome::Cached);

			return Ok(TokenResult::ok(&token));
		}

		let provider = inner.registry.read(&app.id, |state| state.provider.clone());
		let Some(provider) = provider else {
			return Err(UsageError::NoProviderAvailable { app: app.id.clone() });
		};
		let span = FlowSpan::new(FlowKind::Exchange, "exchange", &app.id);
		let result = match span.instrument(self.exchange(app, &provider)).await {
			Ok(token) => {
				inner.registry.update(&app.id, |state| state.token = Some(token.clone()));
				inner.cache.write(app, &token).await;
				obs::record_flow_outcome(FlowKind::GetToken, FlowOutcome::Success);

				TokenResult::ok(&token)
			},
			Err(e) => {
				obs::warn_swallowed(FlowKind::GetToken, "exchange", &e);
				obs::record_flow_outcome(FlowKind::GetToken, FlowOutcome::Failure);

				TokenResult::failed(e)
			},
		};

		self.broadcast(&app.id, &result);

		Ok(result)
	}

	async fn exchange(
		&self,
		app: &App,
		provider: &AttestationProvider,
	) -> Result<AttestationToken> {
		obs::record_flow_outcome(FlowKind::Exchange, FlowOutcome::Attempt);

		let proof = provider.get_proof(app).await?;
		let request = ExchangeRequest::build(
			&self.inner.config.base_endpoint,
			app,
			provider.exchange_kind(),
			proof,
		)?;
		let issued = self.inner.exchange.exchange(request).await?;

		obs::record_flow_outcome(FlowKind::Exchange, FlowOutcome::Success);

		Ok(AttestationToken::issued(issued.token, self.inner.clock.now_ms(), issued.ttl_ms))
	}

	fn valid_token(&self, app: &AppId) -> Option<AttestationToken> {
		let now_ms = self.inner.clock.now_ms();

		self.inner.registry.read(app, |state| state.valid_token(now_ms).cloned())
	}

	fn exchange_lock(&self, app: &AppId) -> Arc<AsyncMutex<()>> {
		self.inner.registry.read(app, |state| state.exchange_lock.clone())
	}

	fn new_refresher(&self, app: &App) -> Refresher {
		let weak = Arc::downgrade(&self.inner);
		let operation = {
			let weak = weak.clone();
			let app = app.clone();

			move || Box::pin(refresh_once(weak.clone(), app.clone())) as RefreshFuture
		};
		let wait = {
			let app = app.id.clone();

			move || weak.upgrade().map_or(0, |inner| inner.next_refresh_wait(&app))
		};

		Refresher::new(
			app.id.to_string(),
			self.inner.handle.clone(),
			self.inner.policy,
			operation,
			wait,
			Error::is_retryable,
		)
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("config", &self.inner.config)
			.field("cache", &self.inner.cache)
			.field("widget_configured", &self.inner.widget.is_some())
			.field("applications", &self.inner.registry.len())
			.finish()
	}
}

/// Builder for [`TokenManager`].
pub struct TokenManagerBuilder {
	registry: Registry,
	exchange: Arc<dyn ExchangeClient>,
	config: ManagerConfig,
	storage: Option<Arc<dyn TokenStorage>>,
	widget: Option<Arc<dyn ChallengeWidget>>,
	clock: Arc<dyn Clock>,
	handle: Option<Handle>,
}
impl TokenManagerBuilder {
	fn new(registry: Registry, exchange: Arc<dyn ExchangeClient>) -> Self {
		Self {
			registry,
			exchange,
			config: ManagerConfig::default(),
			storage: None,
			widget: None,
			clock: Arc::new(SystemClock),
			handle: None,
		}
	}

	/// Replaces the default configuration.
	pub fn config(mut self, config: ManagerConfig) -> Self {
		self.config = config;

		self
	}

	/// Enables the durable cache on top of `storage`.
	pub fn storage(mut self, storage: impl 'static + TokenStorage) -> Self {
		self.storage = Some(Arc::new(storage));

		self
	}

	/// Widget used to build interactive providers for applications activated without one.
	pub fn challenge_widget(mut self, widget: Arc<dyn ChallengeWidget>) -> Self {
		self.widget = Some(widget);

		self
	}

	/// Replaces the system clock.
	pub fn clock(mut self, clock: impl 'static + Clock) -> Self {
		self.clock = Arc::new(clock);

		self
	}

	/// Spawns background work on `handle` instead of the ambient runtime.
	pub fn runtime(mut self, handle: Handle) -> Self {
		self.handle = Some(handle);

		self
	}

	/// Validates the configuration and captures the runtime handle.
	pub fn build(self) -> Result<TokenManager, ConfigError> {
		self.config.validate()?;

		let handle = match self.handle {
			Some(handle) => handle,
			None => Handle::try_current().map_err(|_| ConfigError::RuntimeUnavailable)?,
		};
		let cache = self.storage.map(DurableCache::new).unwrap_or_default();
		let policy = RefreshPolicy::from_config(&self.config);

		Ok(TokenManager {
			inner: Arc::new(ManagerInner {
				registry: self.registry,
				exchange: self.exchange,
				cache,
				widget: self.widget,
				clock: self.clock,
				config: self.config,
				policy,
				handle,
			}),
		})
	}
}
impl Debug for TokenManagerBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManagerBuilder")
			.field("config", &self.config)
			.field("storage_configured", &self.storage.is_some())
			.field("widget_configured", &self.widget.is_some())
			.finish()
	}
}

struct ManagerInner {
	registry: Registry,
	exchange: Arc<dyn ExchangeClient>,
	cache: DurableCache,
	widget: Option<Arc<dyn ChallengeWidget>>,
	clock: Arc<dyn Clock>,
	config: ManagerConfig,
	policy: RefreshPolicy,
	handle: Handle,
}
impl ManagerInner {
	// Milliseconds until the cached token enters the refresh window; zero without a token.
	fn next_refresh_wait(&self, app: &AppId) -> u64 {
		let now_ms = self.clock.now_ms();
		let offset_ms = i64::try_from(self.config.refresh_offset_ms).unwrap_or(i64::MAX);

		self.registry.read(app, |state| {
			state.token.as_ref().map_or(0, |token| {
				u64::try_from(token.remaining_ms(now_ms).saturating_sub(offset_ms)).unwrap_or(0)
			})
		})
	}
}

async fn refresh_once(inner: Weak<ManagerInner>, app: App) -> Result<(), Arc<Error>> {
	let Some(inner) = inner.upgrade() else {
		return Err(Arc::new(ConfigError::ManagerDropped.into()));
	};
	let manager = TokenManager { inner };
	// A cached token may be about to go stale, so bypass it; without one the cascade is enough.
	let force_refresh = manager.inner.registry.read(&app.id, |state| state.token.is_some());
	let result =
		manager.get_token(&app, force_refresh).await.map_err(|e| Arc::new(Error::from(e)))?;

	match result.error {
		Some(e) => Err(e),
		None => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		app::{AppOptions, ProjectId},
		http::{ExchangeFuture, IssuedToken},
		provider::StaticProvider,
	};

	struct NeverCalled;
	impl ExchangeClient for NeverCalled {
		fn exchange(&self, _request: ExchangeRequest) -> ExchangeFuture<'_> {
			Box::pin(async { panic!("Exchange must not be called.") })
		}
	}

	struct Fixed;
	impl ExchangeClient for Fixed {
		fn exchange(&self, _request: ExchangeRequest) -> ExchangeFuture<'_> {
			Box::pin(async { Ok(IssuedToken { token: "T1".into(), ttl_ms: 600_000 }) })
		}
	}

	fn app() -> App {
		App::new(
			AppId::new("unit").expect("App fixture should be valid."),
			AppOptions::new(
				ProjectId::new("p").expect("Project fixture should be valid."),
				"a",
				"k",
			),
		)
	}

	#[test]
	fn build_requires_a_runtime() {
		let err = TokenManager::builder(Registry::new(), NeverCalled)
			.build()
			.expect_err("Building outside a runtime should fail.");

		assert!(matches!(err, ConfigError::RuntimeUnavailable));
	}

	#[tokio::test]
	async fn activation_without_provider_or_widget_is_rejected() {
		let manager = TokenManager::builder(Registry::new(), NeverCalled)
			.build()
			.expect("Manager should build inside a runtime.");
		let err = manager.activate(&app(), None).expect_err("Activation needs a provider.");

		assert!(matches!(err, UsageError::NoProviderAvailable { .. }));
		assert!(!manager.registry().state(&app().id).activated);
	}

	#[tokio::test]
	async fn refresh_wait_tracks_the_offset() {
		let registry = Registry::new();
		let config = ManagerConfig::builder()
			.refresh_offset_ms(60_000)
			.build()
			.expect("Configuration should validate.");
		let manager = TokenManager::builder(registry.clone(), Fixed)
			.config(config)
			.build()
			.expect("Manager should build inside a runtime.");
		let app = app();

		assert_eq!(manager.inner.next_refresh_wait(&app.id), 0);

		manager
			.activate(&app, Some(AttestationProvider::custom(StaticProvider("p".into()))))
			.expect("Activation should succeed.");
		manager.get_token(&app, false).await.expect("Activated apps never fail.");

		let wait = manager.inner.next_refresh_wait(&app.id);

		assert!(wait <= 540_000 && wait > 530_000, "Unexpected refresh wait {wait}.");

		registry.update(&app.id, |state| {
			state.token = Some(AttestationToken::issued("old", 0, 1));
		});

		assert_eq!(manager.inner.next_refresh_wait(&app.id), 0);
	}

	#[tokio::test]
	async fn clearing_the_registry_releases_exchange_locks() {
		let registry = Registry::new();
		let config = ManagerConfig::builder()
			.dedupe_in_flight(true)
			.build()
			.expect("Configuration should validate.");
		let manager = TokenManager::builder(registry.clone(), Fixed)
			.config(config)
			.build()
			.expect("Manager should build inside a runtime.");
		let app = app();

		manager
			.activate(&app, Some(AttestationProvider::custom(StaticProvider("p".into()))))
			.expect("Activation should succeed.");
		manager.get_token(&app, false).await.expect("Activated apps never fail.");

		let before = manager.exchange_lock(&app.id);
		// Held across the clear; a fresh entry must not wait on it.
		let _held = before.lock().await;

		registry.clear();

		assert!(registry.is_empty());
		assert_eq!(Arc::strong_count(&before), 1);

		let after = manager.exchange_lock(&app.id);

		assert!(!Arc::ptr_eq(&before, &after));

		manager
			.activate(&app, Some(AttestationProvider::custom(StaticProvider("p".into()))))
			.expect("Activation should succeed.");

		let result = manager.get_token(&app, false).await.expect("Activated apps never fail.");

		assert_eq!(result.token, "T1");
	}

	#[tokio::test]
	async fn dropped_manager_ends_refreshing() {
		let manager = TokenManager::builder(Registry::new(), NeverCalled)
			.build()
			.expect("Manager should build inside a runtime.");
		let weak = Arc::downgrade(&manager.inner);

		drop(manager);

		let err = refresh_once(weak, app()).await.expect_err("Dropped managers cannot refresh.");

		assert!(!err.is_retryable());
	}
}
