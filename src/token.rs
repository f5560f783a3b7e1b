//! Attestation token models: cached records, redacted secrets, and manager results.

pub mod record;
pub mod result;
pub mod secret;

pub use record::*;
pub use result::*;
pub use secret::*;
