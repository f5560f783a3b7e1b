//! Per-application token state and the registry that owns it.
//!
//! The [`Registry`] is an explicit object passed to the
//! [`TokenManager`](crate::manager::TokenManager) at construction. Entries are created lazily on
//! first access and live until [`Registry::clear`] or until the registry is dropped. Every
//! mutation goes through [`Registry::update`], which runs a closure over the whole entry under one
//! lock so the cascade steps of `get_token` never lose each other's writes.

// self
use crate::{
	_prelude::*,
	app::AppId,
	provider::AttestationProvider,
	refresh::Refresher,
	token::{AttestationToken, TokenResult},
};

/// Callback invoked with every token result broadcast for an application.
///
/// Identity is the address of the shared closure: clones of one listener are the same listener,
/// while two listeners built from identical closures are distinct.
#[derive(Clone)]
pub struct TokenListener(Arc<dyn Fn(&TokenResult) + Send + Sync>);
impl TokenListener {
	/// Wraps `callback`.
	pub fn new(callback: impl 'static + Fn(&TokenResult) + Send + Sync) -> Self {
		Self(Arc::new(callback))
	}

	/// Invokes the callback.
	pub fn notify(&self, result: &TokenResult) {
		(self.0)(result)
	}

	/// Returns `true` when both handles point at the same callback.
	pub fn same_as(&self, other: &Self) -> bool {
		Arc::as_ptr(&self.0).cast::<()>() == Arc::as_ptr(&other.0).cast::<()>()
	}
}
impl Debug for TokenListener {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenListener").field(&Arc::as_ptr(&self.0).cast::<()>()).finish()
	}
}

/// Mutable record kept for one application.
#[derive(Clone, Debug, Default)]
pub struct TokenState {
	/// Flips to `true` once and never back.
	pub activated: bool,
	/// Attestation strategy; immutable once set.
	pub provider: Option<AttestationProvider>,
	/// Current cached token, if any.
	pub token: Option<AttestationToken>,
	/// Listeners in registration order; duplicates allowed.
	pub listeners: Vec<TokenListener>,
	/// Refresh loop, created with the first listener and kept afterwards.
	pub refresher: Option<Refresher>,
	/// Serializes live exchanges when in-flight deduplication is enabled.
	pub exchange_lock: Arc<AsyncMutex<()>>,
}
impl TokenState {
	/// Returns the cached token when it is still valid at `now_ms`.
	pub fn valid_token(&self, now_ms: i64) -> Option<&AttestationToken> {
		self.token.as_ref().filter(|token| token.is_valid_at(now_ms))
	}
}

/// Explicit registry of per-application [`TokenState`].
///
/// Clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct Registry {
	states: Arc<Mutex<HashMap<AppId, TokenState>>>,
}
impl Registry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a snapshot of the state for `app`, creating the entry if needed.
	pub fn state(&self, app: &AppId) -> TokenState {
		self.read(app, TokenState::clone)
	}

	/// Runs `f` over the state for `app` without mutating it.
	pub fn read<R>(&self, app: &AppId, f: impl FnOnce(&TokenState) -> R) -> R {
		let mut states = self.states.lock();

		f(states.entry(app.clone()).or_default())
	}

	/// Runs `f` over the state for `app` as one read-modify-write step.
	///
	/// `f` runs under the registry lock and must not call back into the registry.
	pub fn update<R>(&self, app: &AppId, f: impl FnOnce(&mut TokenState) -> R) -> R {
		let mut states = self.states.lock();

		f(states.entry(app.clone()).or_default())
	}

	/// Number of applications with an entry.
	pub fn len(&self) -> usize {
		self.states.lock().len()
	}

	/// Returns `true` when no application has an entry.
	pub fn is_empty(&self) -> bool {
		self.states.lock().is_empty()
	}

	/// Drops every entry, including its exchange lock, and stops their refresh loops.
	pub fn clear(&self) {
		let drained = std::mem::take(&mut *self.states.lock());

		for state in drained.into_values() {
			if let Some(refresher) = state.refresher {
				refresher.stop();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	fn app(id: &str) -> AppId {
		AppId::new(id).expect("App fixture should be valid.")
	}

	#[test]
	fn entries_are_created_lazily_and_isolated() {
		let registry = Registry::new();

		assert!(registry.is_empty());

		registry.update(&app("a"), |state| state.activated = true);

		assert!(registry.state(&app("a")).activated);
		assert!(!registry.state(&app("b")).activated);
		assert_eq!(registry.len(), 2);
	}

	#[test]
	fn clones_share_entries_and_clear_resets() {
		let registry = Registry::new();
		let other = registry.clone();

		registry.update(&app("a"), |state| {
			state.token = Some(AttestationToken::issued("T", 0, 10));
		});

		assert!(other.read(&app("a"), |state| state.valid_token(5).is_some()));
		assert!(other.read(&app("a"), |state| state.valid_token(10).is_none()));

		other.clear();

		assert!(registry.is_empty());
	}

	#[test]
	fn listener_identity_follows_the_shared_callback() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counted = calls.clone();
		let a = TokenListener::new(move |_| {
			counted.fetch_add(1, Ordering::SeqCst);
		});
		let b = TokenListener::new(|_| {});

		assert!(a.same_as(&a.clone()));
		assert!(!a.same_as(&b));

		a.notify(&TokenResult::ok(&AttestationToken::issued("T", 0, 10)));

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
