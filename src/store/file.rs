//! Simple file-backed [`TokenStorage`] for native clients that outlive a single process.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
	process,
};
// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, StoreKey, TokenStorage},
	token::AttestationToken,
};

/// Persists tokens to a JSON file after each write.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<StoreKey, AttestationToken>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<StoreKey, AttestationToken>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(HashMap::new());
		}

		let entries: Vec<(StoreKey, AttestationToken)> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn tmp_path(&self) -> PathBuf {
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		tmp_path
	}

	fn writable_check_path(&self) -> PathBuf {
		let mut check_path = self.path.clone();

		check_path.set_extension(format!("writable.{}", process::id()));

		check_path
	}

	fn persist_locked(
		&self,
		contents: &HashMap<StoreKey, AttestationToken>,
	) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.iter().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let tmp_path = self.tmp_path();

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStorage for FileStore {
	fn is_available(&self) -> bool {
		if Self::ensure_parent_exists(&self.path).is_err() {
			return false;
		}

		// Writers hold the write lock while the snapshot temp file exists.
		let _guard = self.inner.read();
		let check_path = self.writable_check_path();
		let writable = OpenOptions::new().create(true).append(true).open(&check_path).is_ok();

		if writable {
			let _ = fs::remove_file(&check_path);
		}

		writable
	}

	fn read<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<AttestationToken>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn write(&self, key: StoreKey, token: AttestationToken) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(key, token);
			self.persist_locked(&guard)?;

			Ok(())
		})
	}
}
