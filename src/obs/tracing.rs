// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by token flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind, stage, and application.
	pub fn new(kind: FlowKind, stage: &'static str, app: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("app_attest.flow", flow = kind.as_str(), stage, app);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage, app);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a `warn` event for a failure that is swallowed instead of returned.
pub fn warn_swallowed(kind: FlowKind, stage: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(flow = kind.as_str(), stage, %error, "swallowed failure");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, stage, error);
	}
}

/// Emits a `debug` event describing a refresh-loop transition.
pub fn debug_refresh(stage: &'static str, wait_ms: u64) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(flow = FlowKind::Refresh.as_str(), stage, wait_ms, "refresh scheduled");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, wait_ms);
	}
}
