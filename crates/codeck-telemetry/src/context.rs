//! Request/operation correlation context.
//!
//! A [`RequestContext`] attaches `component`, `operation`, and optional
//! `session_id`/`agent_id`/`execution_id` fields to a `tracing` span so a
//! PTY session's or a scheduled run's log lines can be correlated without
//! threading extra parameters through every function that might log.

use tracing::Span;
use uuid::Uuid;

/// Correlates a group of log lines with the component and operation that
/// produced them.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    component: String,
    operation: Option<String>,
    session_id: Option<String>,
    agent_id: Option<String>,
    execution_id: Option<String>,
}

impl RequestContext {
    /// Start a context for `component` (e.g. `"codeck_pty"`).
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            component: component.into(),
            operation: None,
            session_id: None,
            agent_id: None,
            execution_id: None,
        }
    }

    /// Attach the operation name (e.g. `"create_session"`).
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Attach a PTY session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach an agent id.
    #[must_use]
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Attach an execution id.
    #[must_use]
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    /// The correlation id for this context.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Build the `tracing::Span` carrying every attached field.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or(""),
            session_id = self.session_id.as_deref().unwrap_or(""),
            agent_id = self.agent_id.as_deref().unwrap_or(""),
            execution_id = self.execution_id.as_deref().unwrap_or(""),
        )
    }

    /// Enter the span, returning a guard that exits it on drop.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard {
            _span: self.span(),
        }
    }
}

/// RAII guard holding an entered [`RequestContext`] span.
pub struct RequestGuard {
    _span: Span,
}
