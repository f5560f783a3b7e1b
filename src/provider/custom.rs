//! Opaque custom proof providers.

// self
use crate::provider::ProviderFuture;

/// Caller-supplied proof source; the proof string has no shape constraints.
pub trait CustomProvider
where
	Self: Send + Sync,
{
	/// Produces a fresh attestation proof.
	fn get_proof(&self) -> ProviderFuture<'_, String>;
}

/// Provider returning the same proof every time, handy for debug builds and tests.
#[derive(Clone, Debug)]
pub struct StaticProvider(pub String);
impl CustomProvider for StaticProvider {
	fn get_proof(&self) -> ProviderFuture<'_, String> {
		let proof = self.0.clone();

		Box::pin(async move { Ok(proof) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn static_provider_returns_its_proof() {
		let provider = StaticProvider("fixed".into());

		assert_eq!(provider.get_proof().await.expect("Static proof should resolve."), "fixed");
	}
}
