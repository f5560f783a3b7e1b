//! Backend coordinates attached to an application.

// self
use crate::{_prelude::*, app::ProjectId};

/// Options describing where and how an application exchanges attestation proofs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppOptions {
	/// Backend project identifier.
	pub project_id: ProjectId,
	/// Backend application identifier (distinct from the local [`AppId`](crate::app::AppId)).
	pub app_id: String,
	/// API key appended to exchange requests.
	pub api_key: String,
	/// Site key used by the interactive challenge widget.
	pub site_key: Option<String>,
}
impl AppOptions {
	/// Creates options without a widget site key.
	pub fn new(
		project_id: ProjectId,
		app_id: impl Into<String>,
		api_key: impl Into<String>,
	) -> Self {
		Self { project_id, app_id: app_id.into(), api_key: api_key.into(), site_key: None }
	}

	/// Attaches the site key consumed by the interactive widget.
	pub fn with_site_key(mut self, site_key: impl Into<String>) -> Self {
		self.site_key = Some(site_key.into());

		self
	}
}
impl Debug for AppOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppOptions")
			.field("project_id", &self.project_id)
			.field("app_id", &self.app_id)
			.field("api_key", &"<redacted>")
			.field("site_key", &self.site_key)
			.finish()
	}
}
