use serde::{Deserialize, Serialize};

/// A single tool invocation crossing the front-door boundary.
///
/// The session subsystem never inspects `args`; it only routes the pair
/// to a handler and attaches session bookkeeping around the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Namespaced verb, e.g. `"calculator.divide"`.
    pub verb: String,
    /// Handler-specific arguments (opaque to the session layer).
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Error kind reported back across the tool boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidArgs,
    UnknownVerb,
    NotConfigured,
    Upstream,
    Denied,
}

/// Typed failure from a tool handler.  Handlers are pure request/response
/// functions; this is the only error shape they may produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArgs, message)
    }

    pub fn unknown_verb(verb: &str) -> Self {
        Self::new(ToolErrorKind::UnknownVerb, format!("unknown tool verb: {verb}"))
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotConfigured, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Upstream, message)
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Denied, message)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

pub type ToolResult = std::result::Result<serde_json::Value, ToolError>;
