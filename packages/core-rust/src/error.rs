/// Raised by a strict `add` instead of recording the message.
///
/// Carries the fully formatted message (attribute label plus text), so it can
/// be surfaced as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StrictValidationFailed {
    /// Attribute key the message was added on.
    pub attribute: String,
    /// Full message, e.g. `"Name can't be blank"`.
    pub message: String,
}
