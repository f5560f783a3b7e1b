//! Exchange transport: turns an attestation proof into a signed token.
//!
//! The module exposes [`ExchangeClient`] so downstream crates can plug in any HTTP stack, plus the
//! request builder and response parser every client shares. [`ReqwestExchangeClient`] is the
//! default implementation behind the `reqwest` feature.
//!
//! Failure classification is fixed regardless of transport: a missing response is
//! [`ExchangeError::Network`], any status other than 200 is [`ExchangeError::Status`], and a body
//! that is not JSON or carries a non-numeric `timeToLive` is [`ExchangeError::Parse`].

// std
use std::collections::BTreeMap;
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	app::App,
	error::{ConfigError, ExchangeError},
};

/// Boxed future returned by [`ExchangeClient::exchange`].
pub type ExchangeFuture<'a> =
	Pin<Box<dyn Future<Output = Result<IssuedToken, ExchangeError>> + 'a + Send>>;

/// Exchange endpoint family, selected by the provider variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
	/// Proof produced by a custom provider.
	Custom,
	/// Proof produced by the interactive widget.
	Interactive,
}
impl ExchangeKind {
	/// Endpoint method suffix appended after the application path.
	pub const fn method(self) -> &'static str {
		match self {
			ExchangeKind::Custom => "exchangeCustomToken",
			ExchangeKind::Interactive => "exchangeRecaptchaToken",
		}
	}

	/// Body field carrying the proof.
	pub const fn body_field(self) -> &'static str {
		match self {
			ExchangeKind::Custom => "custom_token",
			ExchangeKind::Interactive => "recaptcha_token",
		}
	}
}

/// Single backend exchange request.
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
	/// Fully qualified endpoint including the API key query parameter.
	pub url: Url,
	/// JSON object body.
	pub body: BTreeMap<String, String>,
}
impl ExchangeRequest {
	/// Builds the request for `app` carrying `proof` under the field matching `kind`.
	pub fn build(
		base_endpoint: &str,
		app: &App,
		kind: ExchangeKind,
		proof: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let mut url = Url::parse(base_endpoint).map_err(|source| ConfigError::InvalidEndpoint {
			endpoint: base_endpoint.to_owned(),
			source,
		})?;

		url.path_segments_mut()
			.map_err(|()| ConfigError::EndpointNotHierarchical {
				endpoint: base_endpoint.to_owned(),
			})?
			.pop_if_empty()
			.push("projects")
			.push(&app.options.project_id)
			.push("apps")
			.push(&format!("{}:{}", app.options.app_id, kind.method()));
		url.query_pairs_mut().append_pair("key", &app.options.api_key);

		let body = BTreeMap::from([(kind.body_field().to_owned(), proof.into())]);

		Ok(Self { url, body })
	}
}
impl Debug for ExchangeRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut url = self.url.clone();

		url.set_query(None);

		f.debug_struct("ExchangeRequest")
			.field("url", &url.as_str())
			.field("body_fields", &self.body.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Successful exchange result.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
	/// Signed token value.
	pub token: String,
	/// Time-to-live in milliseconds, counted from receipt.
	pub ttl_ms: i64,
}
impl Debug for IssuedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedToken")
			.field("token", &"<redacted>")
			.field("ttl_ms", &self.ttl_ms)
			.finish()
	}
}

/// Transport capable of executing exchange requests.
///
/// Implementations must be `Send + Sync + 'static` so the manager can share them across every
/// application and background refresh task.
pub trait ExchangeClient
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and returns the issued token.
	fn exchange(&self, request: ExchangeRequest) -> ExchangeFuture<'_>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
	attestation_token: String,
	#[serde(default)]
	time_to_live: Option<Value>,
}

/// Parses a 200 response body into an [`IssuedToken`].
pub fn parse_exchange_response(body: &[u8]) -> Result<IssuedToken, ExchangeError> {
	let de = &mut serde_json::Deserializer::from_slice(body);
	let response: ExchangeResponse = serde_path_to_error::deserialize(de)
		.map_err(|e| ExchangeError::Parse { message: e.to_string() })?;
	let ttl_ms = parse_ttl(response.time_to_live.as_ref())?;

	Ok(IssuedToken { token: response.attestation_token, ttl_ms })
}

fn parse_ttl(raw: Option<&Value>) -> Result<i64, ExchangeError> {
	let parsed = match raw {
		Some(Value::Number(n)) => n.as_f64(),
		Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
		_ => None,
	};

	match parsed {
		Some(ttl) if ttl.is_finite() => Ok(ttl.round() as i64),
		_ => {
			let shown = raw.map_or_else(|| "undefined".to_owned(), Value::to_string);

			Err(ExchangeError::Parse { message: format!("timeToLive is not a number, {shown}") })
		},
	}
}

/// Thin wrapper around [`ReqwestClient`] that speaks the JSON exchange protocol.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestExchangeClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestExchangeClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestExchangeClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestExchangeClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ExchangeClient for ReqwestExchangeClient {
	fn exchange(&self, request: ExchangeRequest) -> ExchangeFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let payload = serde_json::to_vec(&request.body)
				.map_err(|e| ExchangeError::Parse { message: e.to_string() })?;
			let response = client
				.post(request.url)
				.header(CONTENT_TYPE, "application/json")
				.body(payload)
				.send()
				.await?;
			let status = response.status().as_u16();

			if status != 200 {
				return Err(ExchangeError::Status { status });
			}

			let bytes = response.bytes().await?;

			parse_exchange_response(&bytes)
		})
	}
}
