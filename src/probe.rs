use derive_more::Display;

/// The tracing target used for probe events.
pub const TARGET: &str = "gateway_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the Lifecycle of the gateway changes, like starting or shutting down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// A query issued toward the upstream data hub.
    #[display(fmt = "query")]
    Query,
    /// A signed governance action submitted to the sequencer.
    #[display(fmt = "action")]
    Action,
}
