//! Application identity and per-application options.

pub mod id;
pub mod options;

pub use id::*;
pub use options::*;

// self
use crate::_prelude::*;

/// Handle describing one logical application instance.
///
/// All token state is partitioned by [`App::id`]; the options feed the exchange request and the
/// interactive widget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct App {
	/// Identity used as the registry key.
	pub id: AppId,
	/// Backend coordinates for this application.
	pub options: Arc<AppOptions>,
}
impl App {
	/// Pairs an identity with its options.
	pub fn new(id: AppId, options: AppOptions) -> Self {
		Self { id, options: Arc::new(options) }
	}

	/// DOM-style container id the interactive widget renders into.
	pub fn widget_container_id(&self) -> String {
		format!("attest_widget_{}", self.id)
	}
}
