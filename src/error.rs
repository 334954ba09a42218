use crate::message::MessageId;

pub type MailboxResult<T> = Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport failure: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("no message delivered within {0} seconds")]
    Timeout(u64),

    #[error("failed to encode body: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("failed to decode body: {0}")]
    Decoding(#[source] serde_json::Error),

    #[error("malformed created timestamp: {0}")]
    Format(#[from] chrono::ParseError),

    #[error("message {0} was popped but its record is missing")]
    Hydration(MessageId),

    #[error("mailbox is closed")]
    Closed,

    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}
