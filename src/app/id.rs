//! Validated identifiers for local application instances and the backend projects behind them.
//!
//! [`AppId`] is a registry key and only has to be printable. [`ProjectId`] is spliced into the
//! exchange path, so it additionally refuses characters that would change which URL is hit.

// std
use std::{borrow::Borrow, ops::Deref, str::FromStr};
// self
use crate::_prelude::*;

/// Characters that split or terminate a URL path segment.
const PATH_DELIMITERS: &[char] = &['/', '?', '#', '%'];

/// Character rules applied to one identifier family.
#[derive(Clone, Copy, Debug)]
struct IdRules {
	label: &'static str,
	max_len: usize,
	forbidden: &'static [char],
}
impl IdRules {
	fn check(self, raw: &str) -> Result<(), IdentifierError> {
		let label = self.label;

		if raw.is_empty() {
			return Err(IdentifierError::Empty { label });
		}
		if let Some(found) =
			raw.chars().find(|c| c.is_whitespace() || c.is_control() || self.forbidden.contains(c))
		{
			return Err(IdentifierError::Forbidden { label, found });
		}
		if raw.chars().count() > self.max_len {
			return Err(IdentifierError::TooLong { label, max: self.max_len });
		}

		Ok(())
	}
}

const APP_RULES: IdRules = IdRules { label: "App", max_len: 128, forbidden: &[] };
const PROJECT_RULES: IdRules =
	IdRules { label: "Project", max_len: 64, forbidden: PATH_DELIMITERS };

/// Error returned when an identifier is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Nothing was supplied.
	#[error("{label} id is empty.")]
	Empty {
		/// Identifier family.
		label: &'static str,
	},
	/// A whitespace, control, or path-delimiting character was found.
	#[error("{label} id contains forbidden character {found:?}.")]
	Forbidden {
		/// Identifier family.
		label: &'static str,
		/// First offending character.
		found: char,
	},
	/// More characters than the family allows.
	#[error("{label} id is longer than {max} characters.")]
	TooLong {
		/// Identifier family.
		label: &'static str,
		/// Maximum character count.
		max: usize,
	},
}

macro_rules! def_id {
	($(#[$meta:meta])* $name:ident => $rules:expr) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `raw` and wraps it.
			pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
				Self::try_from(raw.into())
			}

			/// Borrowed string form.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(raw: String) -> Result<Self, Self::Error> {
				$rules.check(&raw).map(|()| Self(raw))
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(raw: &str) -> Result<Self, Self::Err> {
				Self::new(raw)
			}
		}
		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $rules.label, self.0)
			}
		}
	};
}

def_id! {
	/// Opaque key naming one application instance in a [`Registry`](crate::state::Registry).
	AppId => APP_RULES
}
def_id! {
	/// Backend project that owns an application; forms one segment of the exchange path.
	ProjectId => PROJECT_RULES
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn app_ids_accept_any_printable_key() {
		let id = AppId::new("[DEFAULT]/web:1").expect("Printable app keys should be accepted.");

		assert_eq!(id.as_str(), "[DEFAULT]/web:1");
		assert_eq!(format!("{id:?}"), "App([DEFAULT]/web:1)");
		assert_eq!(AppId::new(""), Err(IdentifierError::Empty { label: "App" }));
		assert_eq!(
			AppId::new("two words"),
			Err(IdentifierError::Forbidden { label: "App", found: ' ' })
		);
		assert!(AppId::new("tab\tkey").is_err());
	}

	#[test]
	fn project_ids_refuse_path_delimiters() {
		ProjectId::new("demo-project-42").expect("Plain project ids should be accepted.");

		for raw in ["a/b", "a?b", "a#b", "a%2Fb"] {
			let err = ProjectId::new(raw).expect_err("Path delimiters must be rejected.");

			assert!(matches!(err, IdentifierError::Forbidden { label: "Project", .. }), "{raw}");
		}
	}

	#[test]
	fn length_is_counted_in_characters() {
		AppId::new("é".repeat(128)).expect("128 two-byte characters are within the limit.");

		assert_eq!(
			ProjectId::new("p".repeat(65)),
			Err(IdentifierError::TooLong { label: "Project", max: 64 })
		);
	}

	#[test]
	fn deserialization_runs_the_same_checks() {
		let project: ProjectId =
			serde_json::from_str("\"project-1\"").expect("Valid project ids should deserialize.");

		assert_eq!(
			serde_json::to_string(&project).expect("Project ids should serialize."),
			"\"project-1\""
		);
		assert!(serde_json::from_str::<ProjectId>("\"project/1\"").is_err());

		let keyed: HashMap<AppId, u8> =
			HashMap::from_iter([(AppId::new("web").expect("App fixture should be valid."), 1)]);

		assert_eq!(keyed.get("web"), Some(&1));
	}
}
