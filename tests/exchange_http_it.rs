#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use app_attest::{
	app::App,
	config::ManagerConfig,
	error::{Error, ExchangeError},
	http::ReqwestExchangeClient,
	manager::TokenManager,
	provider::{AttestationProvider, StaticProvider},
	state::Registry,
	token::{TokenResult, sentinel_token},
};
use common::*;

const EXCHANGE_PATH: &str =
	"/v1/projects/project-1/apps/1:777777777777:web:d93b5ca1475efe57:exchangeCustomToken";

fn manager(base_endpoint: impl Into<String>) -> TokenManager {
	let config = ManagerConfig::builder()
		.base_endpoint(base_endpoint)
		.build()
		.expect("Test configuration should validate.");

	TokenManager::builder(Registry::new(), ReqwestExchangeClient::default())
		.config(config)
		.build()
		.expect("Manager should build inside a runtime.")
}

async fn issue(manager: &TokenManager, app: &App) -> TokenResult {
	manager
		.activate(app, Some(AttestationProvider::custom(StaticProvider("device-proof".into()))))
		.expect("Activation should succeed.");

	manager.get_token(app, false).await.expect("Activated apps never fail.")
}

#[tokio::test]
async fn exchange_posts_the_proof_and_caches_the_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(EXCHANGE_PATH)
				.query_param("key", "api-key")
				.header("content-type", "application/json")
				.json_body(json!({ "custom_token": "device-proof" }));
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "attestationToken": "signed-token", "timeToLive": "3600000" }));
		})
		.await;
	let manager = manager(server.url("/v1"));
	let app = app("http-success");
	let first = issue(&manager, &app).await;
	let second = manager.get_token(&app, false).await.expect("Activated apps never fail.");

	assert_eq!(first.token, "signed-token");
	assert_eq!(second, first);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn non_200_status_yields_the_sentinel() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(EXCHANGE_PATH);
			then.status(403).body("{\"error\":{\"code\":403}}");
		})
		.await;
	let manager = manager(server.url("/v1"));
	let app = app("http-status");
	let result = issue(&manager, &app).await;

	assert_eq!(result.token, sentinel_token());
	assert!(matches!(
		result.error.as_deref(),
		Some(Error::Exchange(ExchangeError::Status { status: 403 }))
	));
	assert!(manager.registry().state(&app.id).token.is_none());

	mock.assert_async().await;
}

#[tokio::test]
async fn non_numeric_ttl_is_a_parse_failure() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(EXCHANGE_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "attestationToken": "signed-token", "timeToLive": "soon" }));
		})
		.await;
	let manager = manager(server.url("/v1"));
	let app = app("http-ttl");
	let result = issue(&manager, &app).await;
	let error = result.error.expect("Malformed TTL should surface as an error.");

	assert!(matches!(error.as_ref(), Error::Exchange(ExchangeError::Parse { .. })));
	assert!(error.to_string().contains("timeToLive is not a number, \"soon\""));

	mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_failure() {
	let manager = manager("http://127.0.0.1:1/v1");
	let app = app("http-network");
	let result = issue(&manager, &app).await;

	assert_eq!(result.token, sentinel_token());
	assert!(matches!(
		result.error.as_deref(),
		Some(Error::Exchange(ExchangeError::Network { .. }))
	));
}
