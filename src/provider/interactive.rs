//! Interactive challenge-widget provider.
//!
//! The widget needs page-level setup exactly once: load the widget script, wait for its load
//! signal, and render an invisible instance into the application's container. The resulting
//! widget handle is cached in an async [`OnceCell`] that both the fire-and-forget activation task
//! and every later [`InteractiveProvider::get_proof`] call share. A failed initialization leaves
//! the cell empty, so the next proof request retries it.

// crates.io
use async_lock::OnceCell;
// self
use crate::{_prelude::*, app::App, error::AttestationError, provider::ProviderFuture};

/// Opaque handle returned by [`ChallengeWidget::render`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WidgetHandle(pub String);

/// Host integration for the challenge widget.
pub trait ChallengeWidget
where
	Self: Send + Sync,
{
	/// Injects the widget resource for `site_key` and resolves once it signals readiness.
	fn load<'a>(&'a self, site_key: &'a str) -> ProviderFuture<'a, ()>;

	/// Renders an invisible widget into `container_id`, returning its handle.
	fn render<'a>(&'a self, container_id: &'a str, site_key: &'a str)
	-> ProviderFuture<'a, WidgetHandle>;

	/// Runs the challenge on a rendered widget and returns the proof.
	fn execute<'a>(&'a self, widget: &'a WidgetHandle, action: &'a str)
	-> ProviderFuture<'a, String>;
}

/// Provider that obtains proofs from a [`ChallengeWidget`].
pub struct InteractiveProvider {
	widget: Arc<dyn ChallengeWidget>,
	action: String,
	handle: OnceCell<WidgetHandle>,
}
impl InteractiveProvider {
	/// Creates a provider whose proofs are executed with `action`.
	pub fn new(widget: Arc<dyn ChallengeWidget>, action: impl Into<String>) -> Self {
		Self { widget, action: action.into(), handle: OnceCell::new() }
	}

	/// Returns `true` once the widget handle is cached.
	pub fn is_ready(&self) -> bool {
		self.handle.is_initialized()
	}

	/// Performs (or joins) the one-time widget setup for `app`.
	pub async fn initialize(&self, app: &App) -> Result<WidgetHandle, AttestationError> {
		self.handle
			.get_or_try_init(|| async {
				let site_key =
					app.options.site_key.as_deref().ok_or(AttestationError::WidgetUnavailable)?;
				let container = app.widget_container_id();

				self.widget.load(site_key).await?;

				self.widget.render(&container, site_key).await
			})
			.await
			.cloned()
	}

	/// Waits for initialization, then executes the widget.
	pub async fn get_proof(&self, app: &App) -> Result<String, AttestationError> {
		let handle = self.initialize(app).await?;

		self.widget.execute(&handle, &self.action).await
	}
}
impl Debug for InteractiveProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InteractiveProvider")
			.field("action", &self.action)
			.field("ready", &self.is_ready())
			.finish()
	}
}
