/// Failures talking to the Canvas REST API. A 403 is not represented here,
/// those responses are read as an empty result.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CanvasError {
    #[error("Canvas request failed: {0}")]
    Network(String),

    #[error("Not authorized against Canvas: {0}")]
    Auth(String),

    #[error("Unexpected response from Canvas: {0}")]
    Decode(String),
}

impl CanvasError {
    pub fn is_retryable(&self) -> bool {
        return matches!(self, CanvasError::Network(_));
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Unsupported role '{0}', expected student or observer")]
    InvalidRole(String),

    #[error("Failed to create language model session: {reason}")]
    Creation { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("A summary is already being generated, wait for it to finish")]
    ChannelBusy,

    #[error("No relay listens on channel '{0}'")]
    UnknownChannel(String),

    #[error("Channel is closed")]
    Closed,

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}
