//! Token manager configuration with validation and JSON loading.

// self
use crate::{_prelude::*, error::ConfigError};

/// Default exchange base endpoint.
pub const DEFAULT_BASE_ENDPOINT: &str = "https://content-firebaseappcheck.googleapis.com/v1alpha";

const DEFAULT_REFRESH_OFFSET_MS: u64 = 5 * 60 * 1_000;
const DEFAULT_RETRY_MIN_WAIT_MS: u64 = 30 * 1_000;
const DEFAULT_RETRY_MAX_WAIT_MS: u64 = 16 * 60 * 1_000;
const DEFAULT_JITTER_RATIO: f64 = 0.1;
const DEFAULT_WIDGET_ACTION: &str = "attest-token";

/// Settings shared by every application a [`TokenManager`](crate::manager::TokenManager) serves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagerConfig {
	/// Base URL the exchange endpoints are derived from.
	pub base_endpoint: String,
	/// How long before expiry the refresh loop renews a token.
	pub refresh_offset_ms: u64,
	/// First (and minimum) wait after a failed refresh.
	pub retry_min_wait_ms: u64,
	/// Maximum wait after repeated refresh failures.
	pub retry_max_wait_ms: u64,
	/// Fraction of each wait that may be shaved off at random to de-synchronize instances.
	pub jitter_ratio: f64,
	/// Collapses overlapping live exchanges for one application into a single request.
	pub dedupe_in_flight: bool,
	/// Action label passed to the interactive widget.
	pub widget_action: String,
}
impl ManagerConfig {
	/// Returns a builder seeded with defaults.
	pub fn builder() -> ManagerConfigBuilder {
		ManagerConfigBuilder::default()
	}

	/// Parses and validates a JSON document; missing fields fall back to defaults.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(json);
		let config: Self =
			serde_path_to_error::deserialize(de).map_err(|source| ConfigError::Parse { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Checks the endpoint, retry bounds, and jitter ratio.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let endpoint = Url::parse(&self.base_endpoint).map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: self.base_endpoint.clone(), source }
		})?;

		if endpoint.cannot_be_a_base() {
			return Err(ConfigError::EndpointNotHierarchical {
				endpoint: self.base_endpoint.clone(),
			});
		}

		if self.retry_min_wait_ms == 0 || self.retry_min_wait_ms > self.retry_max_wait_ms {
			return Err(ConfigError::InvalidRetryBounds {
				lower_ms: self.retry_min_wait_ms,
				upper_ms: self.retry_max_wait_ms,
			});
		}
		if !(0.0..1.0).contains(&self.jitter_ratio) {
			return Err(ConfigError::InvalidJitter { ratio: self.jitter_ratio });
		}

		Ok(())
	}
}
impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			base_endpoint: DEFAULT_BASE_ENDPOINT.into(),
			refresh_offset_ms: DEFAULT_REFRESH_OFFSET_MS,
			retry_min_wait_ms: DEFAULT_RETRY_MIN_WAIT_MS,
			retry_max_wait_ms: DEFAULT_RETRY_MAX_WAIT_MS,
			jitter_ratio: DEFAULT_JITTER_RATIO,
			dedupe_in_flight: false,
			widget_action: DEFAULT_WIDGET_ACTION.into(),
		}
	}
}

/// Builder for [`ManagerConfig`].
#[derive(Clone, Debug, Default)]
pub struct ManagerConfigBuilder {
	config: ManagerConfig,
}
impl ManagerConfigBuilder {
	/// Overrides the exchange base endpoint.
	pub fn base_endpoint(mut self, url: impl Into<String>) -> Self {
		self.config.base_endpoint = url.into();

		self
	}

	/// Overrides how long before expiry tokens are refreshed.
	pub fn refresh_offset_ms(mut self, offset: u64) -> Self {
		self.config.refresh_offset_ms = offset;

		self
	}

	/// Overrides the retry backoff bounds.
	pub fn retry_bounds_ms(mut self, lower: u64, upper: u64) -> Self {
		self.config.retry_min_wait_ms = lower;
		self.config.retry_max_wait_ms = upper;

		self
	}

	/// Overrides the jitter ratio.
	pub fn jitter_ratio(mut self, ratio: f64) -> Self {
		self.config.jitter_ratio = ratio;

		self
	}

	/// Enables or disables single-flight exchanges per application.
	pub fn dedupe_in_flight(mut self, enabled: bool) -> Self {
		self.config.dedupe_in_flight = enabled;

		self
	}

	/// Overrides the widget action label.
	pub fn widget_action(mut self, action: impl Into<String>) -> Self {
		self.config.widget_action = action.into();

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<ManagerConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}
