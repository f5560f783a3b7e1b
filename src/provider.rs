//! Attestation providers: the strategies that produce attestation proofs.
//!
//! A provider is chosen once per application and modeled as the tagged
//! [`AttestationProvider`] variant. [`custom`] wraps an opaque caller-supplied proof source;
//! [`interactive`] drives a challenge widget that needs one-time initialization before each
//! proof can be executed.

pub mod custom;
pub mod interactive;

pub use custom::*;
pub use interactive::*;

// self
use crate::{_prelude::*, app::App, error::AttestationError, http::ExchangeKind};

/// Boxed future returned by provider and widget hooks.
pub type ProviderFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, AttestationError>> + 'a + Send>>;

/// The attestation strategy selected for an application.
#[derive(Clone)]
pub enum AttestationProvider {
	/// Opaque caller-supplied proof source.
	Custom(Arc<dyn CustomProvider>),
	/// Challenge widget driven by the manager.
	Interactive(Arc<InteractiveProvider>),
}
impl AttestationProvider {
	/// Wraps a custom provider.
	pub fn custom(provider: impl 'static + CustomProvider) -> Self {
		Self::Custom(Arc::new(provider))
	}

	/// Exchange endpoint family matching this provider.
	pub fn exchange_kind(&self) -> ExchangeKind {
		match self {
			Self::Custom(_) => ExchangeKind::Custom,
			Self::Interactive(_) => ExchangeKind::Interactive,
		}
	}

	/// Produces an attestation proof for `app`.
	///
	/// For interactive providers this awaits widget readiness first, so a proof request issued
	/// right after activation waits for the fire-and-forget initialization to finish.
	pub async fn get_proof(&self, app: &App) -> Result<String, AttestationError> {
		match self {
			Self::Custom(provider) => provider.get_proof().await,
			Self::Interactive(provider) => provider.get_proof(app).await,
		}
	}
}
impl Debug for AttestationProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Custom(_) => f.write_str("AttestationProvider::Custom(..)"),
			Self::Interactive(provider) =>
				f.debug_tuple("AttestationProvider::Interactive").field(provider).finish(),
		}
	}
}
