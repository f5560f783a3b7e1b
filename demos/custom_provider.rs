//! Demonstrates activating an application with a custom proof provider, caching its token in a
//! file store, and keeping it fresh for a listener.
//!
//! The exchange backend is a local mock, so the demo runs offline.

// std
use std::{env, fs, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use app_attest::{
	app::{App, AppId, AppOptions, ProjectId},
	config::ManagerConfig,
	http::ReqwestExchangeClient,
	manager::TokenManager,
	provider::{AttestationProvider, StaticProvider},
	state::{Registry, TokenListener},
	store::FileStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let exchange_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/projects/demo-project/apps/1:123456789:web:abcdef:exchangeCustomToken")
				.query_param("key", "demo-key");
			then.status(200).header("content-type", "application/json").body(
				"{\"attestationToken\":\"demo-attestation\",\"timeToLive\":\"3600000\"}",
			);
		})
		.await;
	let app = App::new(
		AppId::new("demo-web")?,
		AppOptions::new(ProjectId::new("demo-project")?, "1:123456789:web:abcdef", "demo-key"),
	);
	let path = env::temp_dir().join("app_attest_demo.json");

	// Start from an empty snapshot so the first request reaches the mock backend.
	let _ = fs::remove_file(&path);

	let store = FileStore::open(&path)?;
	let config = ManagerConfig::builder().base_endpoint(server.url("/v1")).build()?;
	let manager = TokenManager::builder(Registry::new(), ReqwestExchangeClient::default())
		.config(config)
		.storage(store.clone())
		.build()?;
	let listener = TokenListener::new(|result| {
		println!("listener received a token (error: {:?})", result.error);
	});
	let provider = AttestationProvider::custom(StaticProvider("device-proof".into()));

	manager.activate(&app, Some(provider))?;

	let result = manager.get_token(&app, false).await?;

	println!("token = {}, cached at {}", result.token, store.path().display());

	// The listener catches up with the cached token; the refresh loop sleeps until near expiry.
	manager.add_token_listener(&app, listener.clone());
	tokio::time::sleep(Duration::from_millis(50)).await;
	manager.remove_token_listener(&app, &listener);
	exchange_mock.assert_async().await;

	Ok(())
}
