//! Listener registration and broadcast.

// std
use std::panic::{self, AssertUnwindSafe};
// self
use crate::{
	_prelude::*,
	app::{App, AppId},
	manager::TokenManager,
	obs::{self, FlowKind},
	state::TokenListener,
	token::TokenResult,
};

impl TokenManager {
	/// Registers `listener` for every result broadcast for `app`.
	///
	/// The first listener creates and starts the refresh loop. When a valid token is already in
	/// memory, the new listener alone receives it from a spawned task, never from inside this call.
	/// Activation is not required; the refresh loop retries until the application is activated.
	pub fn add_token_listener(&self, app: &App, listener: TokenListener) {
		let now_ms = self.inner.clock.now_ms();
		let current = self.inner.registry.update(&app.id, |state| {
			state.listeners.push(listener.clone());

			state.refresher.get_or_insert_with(|| self.new_refresher(app)).start();

			state.valid_token(now_ms).map(TokenResult::ok)
		});

		if let Some(result) = current {
			self.inner.handle.spawn(async move { notify_isolated(&listener, &result) });
		}
	}

	/// Removes every registration of `listener` for `app`.
	///
	/// Removing the last listener stops the refresh loop; an exchange it already started still
	/// completes.
	pub fn remove_token_listener(&self, app: &App, listener: &TokenListener) {
		self.inner.registry.update(&app.id, |state| {
			state.listeners.retain(|registered| !registered.same_as(listener));

			if !state.listeners.is_empty() {
				return;
			}
			if let Some(refresher) = &state.refresher {
				refresher.stop();
			}
		});
	}

	pub(super) fn broadcast(&self, app: &AppId, result: &TokenResult) {
		let listeners = self.inner.registry.read(app, |state| state.listeners.clone());

		for listener in &listeners {
			notify_isolated(listener, result);
		}
	}
}

fn notify_isolated(listener: &TokenListener, result: &TokenResult) {
	if panic::catch_unwind(AssertUnwindSafe(|| listener.notify(result))).is_err() {
		obs::warn_swallowed(FlowKind::GetToken, "listener", &"listener panicked");
	}
}
