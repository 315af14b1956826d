/// What a dispatcher does with listener failures once every listener has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Return the collected failures to whoever set the value
    #[default]
    Propagate,
    /// Log each failure at error level and report success
    Log,
}

/// Settings shared by every dispatcher attached to a [`DispatchState`](crate::DispatchState).
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    pub listener_failures: FailurePolicy,
    /// Wrap every dispatch in a `tracing` span
    pub trace_dispatch: bool,
}

impl DispatchConfig {
    pub fn new() -> Self { Self::default() }

    pub fn with_listener_failures(mut self, policy: FailurePolicy) -> Self {
        self.listener_failures = policy;
        self
    }

    pub fn with_trace_dispatch(mut self, enabled: bool) -> Self {
        self.trace_dispatch = enabled;
        self
    }
}
