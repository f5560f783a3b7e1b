//! Client attestation token manager - activation gating, memory + durable token caching,
//! listener fan-out, and jittered proactive refresh in one crate.
//!
//! The entry point is [`manager::TokenManager`]. Each application is activated once, exchanges an
//! attestation proof for a short-lived token through an [`http::ExchangeClient`], caches the token
//! in memory and (optionally) in a [`store::TokenStorage`] backend, and keeps it fresh for every
//! registered listener via the [`refresh::Refresher`] loop.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod obs;
pub mod provider;
pub mod refresh;
pub mod state;
pub mod store;
pub mod token;

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
