//! Crate-level error types shared by the token manager, providers, exchange clients, and stores.
//!
//! Errors fall into two groups. Usage errors ([`UsageError`]) describe programmer mistakes such as
//! calling `get_token` before activation; they surface immediately and are never retried.
//! Operational errors ([`ExchangeError`], [`AttestationError`]) are expected to occur in the field;
//! the token manager folds them into a sentinel [`TokenResult`](crate::token::TokenResult) instead
//! of returning them.

// self
use crate::{_prelude::*, app::AppId};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The caller used the API incorrectly.
	#[error(transparent)]
	Usage(#[from] UsageError),
	/// The backend exchange failed.
	#[error(transparent)]
	Exchange(#[from] ExchangeError),
	/// The attestation provider could not produce a proof.
	#[error(transparent)]
	Attestation(#[from] AttestationError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
}
impl Error {
	/// Returns `true` for programmer-usage errors.
	pub fn is_usage(&self) -> bool {
		matches!(self, Self::Usage(_))
	}

	/// Returns `true` when repeating the operation later may succeed without caller action.
	///
	/// Exchange, attestation, and storage failures are transient. Registering a listener before
	/// activation is allowed, so [`UsageError::UseBeforeActivation`] is retryable as well: the
	/// application may still be activated. Configuration errors are terminal.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Exchange(_) | Self::Attestation(_) | Self::Storage(_) => true,
			Self::Usage(err) => matches!(err, UsageError::UseBeforeActivation { .. }),
			Self::Config(_) => false,
		}
	}
}

/// Synchronous API misuse.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum UsageError {
	/// `activate` was called twice.
	#[error(
		"Application `{app}` is already activated; attestation can only be activated once."
	)]
	AlreadyActivated {
		/// Application identity.
		app: AppId,
	},
	/// `set_provider` was called twice.
	#[error("Application `{app}` already has a provider; a provider can only be set once.")]
	ProviderAlreadySet {
		/// Application identity.
		app: AppId,
	},
	/// `set_provider` was called after activation.
	#[error(
		"Application `{app}` is already activated; a provider cannot be set on an activated application."
	)]
	ProviderSetAfterActivation {
		/// Application identity.
		app: AppId,
	},
	/// A token operation ran before `activate`.
	#[error("Application `{app}` is used before activate() was called.")]
	UseBeforeActivation {
		/// Application identity.
		app: AppId,
	},
	/// Activation had neither a custom provider nor a configured challenge widget.
	#[error(
		"Application `{app}` has no custom provider and the manager has no challenge widget configured."
	)]
	NoProviderAvailable {
		/// Application identity.
		app: AppId,
	},
}

/// Failures raised while exchanging an attestation proof for a token.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// The request never produced an HTTP response.
	#[error("Network error occurred while calling the exchange endpoint.")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The endpoint answered with a non-200 status.
	#[error("Exchange endpoint returned HTTP status {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// The response body or one of its fields could not be parsed.
	#[error("Exchange response could not be parsed: {message}.")]
	Parse {
		/// Description of the parsing failure.
		message: String,
	},
}
impl ExchangeError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ExchangeError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures raised by attestation providers.
#[derive(Debug, ThisError)]
pub enum AttestationError {
	/// A custom provider or the widget failed to produce a proof.
	#[error("Attestation provider failed to produce a proof.")]
	Provider {
		/// Provider-specific failure.
		#[source]
		source: BoxError,
	},
	/// The challenge widget could not be loaded or rendered.
	#[error("Challenge widget failed to initialize.")]
	WidgetLoad {
		/// Widget-specific failure.
		#[source]
		source: BoxError,
	},
	/// The application has no site key, so the widget cannot be rendered.
	#[error("Challenge widget is not available without a site key.")]
	WidgetUnavailable,
}
impl AttestationError {
	/// Wraps an arbitrary provider failure.
	pub fn provider(src: impl Into<BoxError>) -> Self {
		Self::Provider { source: src.into() }
	}

	/// Wraps an arbitrary widget initialization failure.
	pub fn widget_load(src: impl Into<BoxError>) -> Self {
		Self::WidgetLoad { source: src.into() }
	}
}

/// Configuration and environment failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// An exchange endpoint could not be assembled into a valid URL.
	#[error("Exchange endpoint `{endpoint}` is invalid.")]
	InvalidEndpoint {
		/// The offending endpoint string.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The endpoint parsed but has no path that segments can be appended to.
	#[error("Exchange endpoint `{endpoint}` cannot carry a path.")]
	EndpointNotHierarchical {
		/// The offending endpoint string.
		endpoint: String,
	},
	/// Retry bounds are zero or inverted.
	#[error("Retry bounds are invalid: lower {lower_ms}ms, upper {upper_ms}ms.")]
	InvalidRetryBounds {
		/// Lower bound in milliseconds.
		lower_ms: u64,
		/// Upper bound in milliseconds.
		upper_ms: u64,
	},
	/// Jitter ratio is outside `[0, 1)`.
	#[error("Jitter ratio {ratio} must be within [0, 1).")]
	InvalidJitter {
		/// The offending ratio.
		ratio: f64,
	},
	/// A JSON configuration document failed to parse.
	#[error("Configuration could not be parsed.")]
	Parse {
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The manager was built outside a Tokio runtime.
	#[error("A Tokio runtime is required to build the token manager.")]
	RuntimeUnavailable,
	/// A background task outlived its token manager.
	#[error("The token manager has been dropped.")]
	ManagerDropped,
}
