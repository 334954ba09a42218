use crate::{error::MailboxResult, message::Message};
use async_trait::async_trait;
use std::fmt::Display;

pub mod memory;
pub mod redis;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct MailboxName(String);

impl MailboxName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MailboxName {
    fn from(value: &str) -> Self {
        MailboxName(value.to_owned())
    }
}

impl From<String> for MailboxName {
    fn from(value: String) -> Self {
        MailboxName(value)
    }
}

impl Display for MailboxName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Place to send and receive messages.
///
/// A message lives in the store as a record plus exactly one entry in
/// the pending queue until [`wait`](Mailbox::wait) pops it; from then
/// on only the record remains, until it is destroyed. Any number of
/// callers may wait concurrently on one mailbox; each queued id is
/// delivered to exactly one of them, in FIFO order.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Name of the mailbox.
    fn name(&self) -> &MailboxName;

    /// Create a new message addressed to this mailbox.
    fn new_message(&self) -> MailboxResult<Message> {
        Message::new(self.name())
    }

    /// Atomically persist the message record and enqueue its id for
    /// delivery. Both effects apply together or not at all.
    ///
    /// Resending a message overwrites its record but enqueues a second
    /// entry, so a retry after an unconfirmed success can deliver the
    /// same id twice.
    async fn send(&self, message: &Message) -> MailboxResult<()>;

    /// Block until a message is delivered, honoring the mailbox wait
    /// timeout (zero blocks forever).
    async fn wait(&self) -> MailboxResult<Message>;

    /// Delete the message record after n seconds. Zero or negative
    /// deletes it now. Idempotent; the pending queue is untouched.
    async fn destroy_after(&self, message: &Message, seconds: i64) -> MailboxResult<()>;

    /// Delete the message record now.
    async fn destroy(&self, message: &Message) -> MailboxResult<()> {
        self.destroy_after(message, 0).await
    }

    /// Number of messages pending in the mailbox.
    async fn len(&self) -> MailboxResult<u64>;

    /// Close the mailbox. Later operations fail with a closed error;
    /// callers should drain in-flight operations first.
    async fn close(&self) -> MailboxResult<()>;
}
