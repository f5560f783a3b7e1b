//! Thread-safe in-memory [`TokenStorage`] implementation for local development and tests.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, StoreKey, TokenStorage},
	token::AttestationToken,
};

type StoreMap = Arc<RwLock<HashMap<StoreKey, AttestationToken>>>;

/// Storage backend that keeps tokens in-process.
///
/// Clones share the same map, so a test can keep one handle for inspection while the manager
/// owns another.
#[derive(Clone, Debug)]
pub struct MemoryStore {
	map: StoreMap,
	available: Arc<AtomicBool>,
}
impl MemoryStore {
	/// Toggles the availability check, simulating a disabled storage mechanism.
	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	/// Returns the token stored under `key` without going through the async contract.
	pub fn get(&self, key: &StoreKey) -> Option<AttestationToken> {
		self.map.read().get(key).cloned()
	}

	/// Inserts `token` under `key` without going through the async contract.
	pub fn insert(&self, key: StoreKey, token: AttestationToken) {
		self.map.write().insert(key, token);
	}

	/// Number of stored tokens.
	pub fn len(&self) -> usize {
		self.map.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.map.read().is_empty()
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self { map: Default::default(), available: Arc::new(AtomicBool::new(true)) }
	}
}
impl TokenStorage for MemoryStore {
	fn is_available(&self) -> bool {
		self.available.load(Ordering::SeqCst)
	}

	fn read<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<AttestationToken>> {
		Box::pin(async move {
			if !self.is_available() {
				return Err(StoreError::Unavailable);
			}

			Ok(self.get(key))
		})
	}

	fn write(&self, key: StoreKey, token: AttestationToken) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			if !self.is_available() {
				return Err(StoreError::Unavailable);
			}

			self.insert(key, token);

			Ok(())
		})
	}
}
