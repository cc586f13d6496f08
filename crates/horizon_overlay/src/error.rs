/// Problems found while validating an [`OverlayDefinition`](crate::OverlayDefinition).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("Overlay id must not be empty")]
    EmptyId,
    #[error("Overlay {id} has a refresh interval of zero ticks")]
    InvalidRefreshInterval { id: String },
    #[error("Overlay {id} declares tag '{tag}' more than once")]
    DuplicateTag { id: String, tag: String },
    #[error("Overlay {id} uses unknown tag '{tag}'")]
    UnknownTag { id: String, tag: String },
}
