//! Cached attestation token record.

// self
use crate::{_prelude::*, token::TokenSecret};

/// Attestation token held in memory and in the durable cache.
///
/// Validity is never stored; it is re-derived from [`expires_at_ms`](Self::expires_at_ms) and the
/// caller's clock on every read.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationToken {
	/// Signed token value; callers must avoid logging it.
	pub token: TokenSecret,
	/// Issue instant in epoch milliseconds.
	pub issued_at_ms: i64,
	/// Expiry instant in epoch milliseconds.
	pub expires_at_ms: i64,
}
impl AttestationToken {
	/// Creates a record issued at `issued_at_ms` that lives for `ttl_ms`.
	pub fn issued(token: impl Into<String>, issued_at_ms: i64, ttl_ms: i64) -> Self {
		Self {
			token: TokenSecret::new(token),
			issued_at_ms,
			expires_at_ms: issued_at_ms.saturating_add(ttl_ms),
		}
	}

	/// Milliseconds left before expiry; zero or negative once expired.
	pub fn remaining_ms(&self, now_ms: i64) -> i64 {
		self.expires_at_ms.saturating_sub(now_ms)
	}

	/// Returns `true` while the token has not yet expired at `now_ms`.
	pub fn is_valid_at(&self, now_ms: i64) -> bool {
		self.remaining_ms(now_ms) > 0
	}
}
impl Debug for AttestationToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AttestationToken")
			.field("token", &"<redacted>")
			.field("issued_at_ms", &self.issued_at_ms)
			.field("expires_at_ms", &self.expires_at_ms)
			.finish()
	}
}
