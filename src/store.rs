//! Storage contracts, built-in backends, and the best-effort durable token cache.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	app::{App, AppId},
	obs::{self, FlowKind},
	token::AttestationToken,
};

/// Boxed future returned by [`TokenStorage`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the last known token of each application.
pub trait TokenStorage
where
	Self: Send + Sync,
{
	/// Checks whether the underlying storage mechanism can be used right now.
	fn is_available(&self) -> bool {
		true
	}

	/// Fetches the token stored under `key`, if present.
	fn read<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<AttestationToken>>;

	/// Persists or replaces the token stored under `key`.
	fn write(&self, key: StoreKey, token: AttestationToken) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`TokenStorage`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The storage mechanism is not usable in this environment.
	#[error("Storage is unavailable.")]
	Unavailable,
}

/// Unique key identifying a stored token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
	/// Local application identity.
	pub app: AppId,
	/// Fingerprint of the backend coordinates the token was issued for.
	pub fingerprint: String,
}
impl StoreKey {
	/// Builds the key for `app`.
	///
	/// The fingerprint is a base64 (no padding) SHA-256 digest of the project and backend app ids,
	/// so a token never leaks across applications that reuse a local id with new options.
	pub fn new(app: &App) -> Self {
		let mut hasher = Sha256::new();

		hasher.update(app.options.project_id.as_bytes());
		hasher.update([0]);
		hasher.update(app.options.app_id.as_bytes());

		Self { app: app.id.clone(), fingerprint: STANDARD_NO_PAD.encode(hasher.finalize()) }
	}
}

/// Best-effort durable cache in front of an optional [`TokenStorage`] backend.
///
/// Both operations always resolve: reads yield `None` and writes do nothing when no backend is
/// configured, when the backend reports itself unavailable, or when it fails. Failures are logged
/// and never returned.
#[derive(Clone, Default)]
pub struct DurableCache {
	backend: Option<Arc<dyn TokenStorage>>,
}
impl DurableCache {
	/// Wraps `backend`.
	pub fn new(backend: Arc<dyn TokenStorage>) -> Self {
		Self { backend: Some(backend) }
	}

	/// Cache with no backend; every read misses.
	pub fn disabled() -> Self {
		Self::default()
	}

	/// Returns `true` when a backend is configured.
	pub fn is_enabled(&self) -> bool {
		self.backend.is_some()
	}

	/// Reads the stored token for `app`.
	pub async fn read(&self, app: &App) -> Option<AttestationToken> {
		let backend = self.usable()?;
		let key = StoreKey::new(app);

		match backend.read(&key).await {
			Ok(token) => token,
			Err(e) => {
				obs::warn_swallowed(FlowKind::GetToken, "storage_read", &e);

				None
			},
		}
	}

	/// Writes `token` for `app`.
	pub async fn write(&self, app: &App, token: &AttestationToken) {
		let Some(backend) = self.usable() else {
			return;
		};

		if let Err(e) = backend.write(StoreKey::new(app), token.clone()).await {
			obs::warn_swallowed(FlowKind::GetToken, "storage_write", &e);
		}
	}

	fn usable(&self) -> Option<&Arc<dyn TokenStorage>> {
		self.backend.as_ref().filter(|backend| backend.is_available())
	}
}
impl Debug for DurableCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DurableCache").field("enabled", &self.is_enabled()).finish()
	}
}
