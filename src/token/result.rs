//! Result values handed to `get_token` callers and listeners.

// std
use std::sync::OnceLock;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{_prelude::*, token::AttestationToken};

const SENTINEL_PAYLOAD: &str = r#"{"error":"UNKNOWN_ERROR"}"#;

static SENTINEL: OnceLock<String> = OnceLock::new();

/// Placeholder token returned in place of a real token when issuance fails.
///
/// The value is the base64 encoding of `{"error":"UNKNOWN_ERROR"}`, so a backend receiving it
/// can recognize a degraded client instead of a forged one.
pub fn sentinel_token() -> &'static str {
	SENTINEL.get_or_init(|| STANDARD.encode(SENTINEL_PAYLOAD))
}

/// Outcome of a token request: either a real token or the sentinel plus the causing error.
#[derive(Clone)]
pub struct TokenResult {
	/// Token value; equals [`sentinel_token`] when `error` is set.
	pub token: String,
	/// Failure that prevented issuance, shared by every listener of the same broadcast.
	pub error: Option<Arc<Error>>,
}
impl TokenResult {
	/// Wraps a valid token.
	pub fn ok(token: &AttestationToken) -> Self {
		Self { token: token.token.expose().to_owned(), error: None }
	}

	/// Builds the sentinel result for `error`.
	pub fn failed(error: Error) -> Self {
		Self { token: sentinel_token().to_owned(), error: Some(Arc::new(error)) }
	}

	/// Returns `true` when issuance failed.
	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}
}
impl PartialEq for TokenResult {
	fn eq(&self, other: &Self) -> bool {
		self.token == other.token
			&& match (&self.error, &other.error) {
				(None, None) => true,
				(Some(a), Some(b)) => Arc::ptr_eq(a, b),
				_ => false,
			}
	}
}
impl Debug for TokenResult {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let token = if self.is_error() { "<sentinel>" } else { "<redacted>" };

		f.debug_struct("TokenResult").field("token", &token).field("error", &self.error).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::ExchangeError;

	#[test]
	fn sentinel_encodes_unknown_error_payload() {
		assert_eq!(sentinel_token(), "eyJlcnJvciI6IlVOS05PV05fRVJST1IifQ==");
	}

	#[test]
	fn failed_results_carry_sentinel_and_error() {
		let result = TokenResult::failed(ExchangeError::Status { status: 500 }.into());

		assert!(result.is_error());
		assert_eq!(result.token, sentinel_token());
		assert_eq!(result.clone(), result);
	}

	#[test]
	fn results_with_distinct_errors_differ() {
		let a = TokenResult::failed(ExchangeError::Status { status: 500 }.into());
		let b = TokenResult::failed(ExchangeError::Status { status: 500 }.into());

		assert_ne!(a, b);
	}

	#[test]
	fn ok_results_expose_token() {
		let result = TokenResult::ok(&AttestationToken::issued("T1", 0, 10));

		assert_eq!(result.token, "T1");
		assert!(!result.is_error());
	}
}
