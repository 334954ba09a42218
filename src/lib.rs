//! Durable message mailboxes on top of Redis.
//!
//! A producer creates a [`Message`] from a mailbox, marshals a value
//! into its body and [`Mailbox::send`]s it; the message record and its
//! queue entry are written in one atomic step. Consumers call
//! [`Mailbox::wait`], which blocks on the mailbox queue, hydrates the
//! delivered message and hands it back; after processing they schedule
//! cleanup with [`Mailbox::destroy_after`].

pub mod error;
pub mod mailbox;
pub mod message;
pub mod pool;
pub mod stats;

pub use error::{Error, MailboxResult};
pub use mailbox::{memory::MemoryMailbox, redis::RedisMailbox, Mailbox, MailboxName};
pub use message::{Message, MessageId};
pub use pool::{Pool, RedisConfig};
pub use stats::MessageCounter;
