/// Classified failures raised by operations, the transport, and the trigger.
///
/// Handlers return `anyhow::Result` and attach context freely; the node
/// runner downcasts to this type to decide whether an item failure may be
/// captured as an error record or must abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Missing or malformed parameter, raised before any network call.
    Configuration(String),
    /// Client-side format check failed (phone number, email, ...).
    Validation(String),
    /// Non-success HTTP response or transport failure.
    Api {
        status: Option<u16>,
        message: String,
    },
    /// A polling loop ran out of attempts.
    Timeout(String),
}

impl NodeError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        NodeError::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        NodeError::Validation(msg.into())
    }

    /// Whether "continue on failure" may turn this error into an error record.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NodeError::Api { .. } | NodeError::Timeout(_))
    }

    /// HTTP status of an API error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            NodeError::Api { status, .. } => *status,
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            NodeError::Validation(msg) => write!(f, "Validation error: {}", msg),
            NodeError::Api {
                status: Some(status),
                message,
            } => write!(f, "Chatwoot API error ({}): {}", status, message),
            NodeError::Api {
                status: None,
                message,
            } => write!(f, "Chatwoot API request failed: {}", message),
            NodeError::Timeout(msg) => write!(f, "Timed out: {}", msg),
        }
    }
}

impl std::error::Error for NodeError {}

/// Finds the classified error anywhere in an `anyhow` chain.
pub fn classify(err: &anyhow::Error) -> Option<&NodeError> {
    err.chain().find_map(|cause| cause.downcast_ref::<NodeError>())
}
