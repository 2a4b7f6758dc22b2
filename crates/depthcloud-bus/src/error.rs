/// An error type for the bus module.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BusError {
    /// No message arrived on the topic before the deadline.
    #[error("Timed out waiting for a message on '{0}'")]
    Timeout(String),

    /// The context was shut down while waiting.
    #[error("The context was shut down")]
    Shutdown,

    /// The topic already carries a different message type.
    #[error("Topic '{topic}' carries '{existing}', requested '{requested}'")]
    TypeMismatch {
        /// The topic name.
        topic: String,
        /// The type registered first.
        existing: &'static str,
        /// The type of the failed request.
        requested: &'static str,
    },
}
