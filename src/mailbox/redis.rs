use super::{Mailbox, MailboxName};
use crate::{
    error::{Error, MailboxResult},
    message::{Message, MessageId},
    pool::{Pool, RedisConfig},
    stats::MessageCounter,
};
use async_trait::async_trait;
use log::error;
use redis::AsyncCommands;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tap::TapFallible;

/// Mailbox over a Redis queue.
///
/// The pending queue lives at `mailbox:<name>`; each message record is
/// a hash at `messages:<id>` with `mailbox`, `created` and `body`
/// fields. Sending stages the record write and the queue push in one
/// MULTI/EXEC transaction, so no queue entry is ever visible without
/// its record.
pub struct RedisMailbox {
    name: MailboxName,
    wait_timeout: u64,
    pool: Pool,
    sent: MessageCounter,
    closed: AtomicBool,
}

impl RedisMailbox {
    /// Open the mailbox over its own connection pool.
    pub async fn connect(
        name: impl Into<MailboxName>,
        config: &RedisConfig,
    ) -> MailboxResult<Self> {
        Ok(Self::with_pool(name, Pool::connect(config).await?))
    }

    /// Open the mailbox over a pool shared with other mailboxes.
    pub fn with_pool(name: impl Into<MailboxName>, pool: Pool) -> Self {
        RedisMailbox {
            name: name.into(),
            wait_timeout: 0, // block forever
            pool,
            sent: MessageCounter::default(),
            closed: AtomicBool::new(false),
        }
    }

    /// Seconds a [`wait`](Mailbox::wait) call blocks before giving up.
    /// Zero blocks forever.
    pub fn with_default_wait_timeout(mut self, seconds: u64) -> Self {
        self.wait_timeout = seconds;
        self
    }

    /// Count sent messages through the given handle. Pass a clone of
    /// another mailbox's counter to aggregate across mailboxes.
    pub fn with_counter(mut self, counter: MessageCounter) -> Self {
        self.sent = counter;
        self
    }

    pub fn counter(&self) -> &MessageCounter {
        &self.sent
    }

    fn ensure_open(&self) -> MailboxResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

fn queue_key(name: &MailboxName) -> String {
    format!("mailbox:{name}")
}

fn record_key(id: &MessageId) -> String {
    format!("messages:{id}")
}

fn field_string(fields: &mut HashMap<String, Vec<u8>>, name: &str) -> String {
    fields
        .remove(name)
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl Mailbox for RedisMailbox {
    fn name(&self) -> &MailboxName {
        &self.name
    }

    async fn send(&self, message: &Message) -> MailboxResult<()> {
        self.ensure_open()?;

        let mut conn = self.pool.shared();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(
                record_key(message.id()),
                &[
                    ("mailbox", message.mailbox().as_bytes()),
                    ("created", message.created().as_bytes()),
                    ("body", message.body()),
                ],
            )
            .rpush(queue_key(&self.name), message.id().as_str());

        pipe.query_async::<_, ()>(&mut conn)
            .await
            .tap_err(|e| error!("failed to publish {}: {e}", message.id()))?;

        self.sent.incr();
        Ok(())
    }

    async fn wait(&self) -> MailboxResult<Message> {
        self.ensure_open()?;

        // A dedicated connection, so the blocking pop cannot stall
        // commands multiplexed over the shared one.
        let mut conn = self.pool.dedicated().await?;

        let reply: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(queue_key(&self.name))
            .arg(self.wait_timeout)
            .query_async(&mut conn)
            .await?;

        let (_, id) = reply.ok_or(Error::Timeout(self.wait_timeout))?;
        let id = MessageId::from_raw(id);

        let mut fields: HashMap<String, Vec<u8>> =
            conn.hgetall(record_key(&id)).await?;
        if fields.is_empty() {
            // The queue entry is already consumed and cannot be
            // replayed, so a missing record must be surfaced.
            return Err(Error::Hydration(id));
        }

        let created = field_string(&mut fields, "created");
        let mailbox = field_string(&mut fields, "mailbox");
        let body = fields.remove("body").unwrap_or_default();

        Ok(Message::hydrate(id, created, mailbox, body))
    }

    async fn destroy_after(&self, message: &Message, seconds: i64) -> MailboxResult<()> {
        self.ensure_open()?;

        let mut conn = self.pool.shared();
        if seconds <= 0 {
            let _: () = conn.del(record_key(message.id())).await?;
        } else {
            let _: () = conn.expire(record_key(message.id()), seconds).await?;
        }
        Ok(())
    }

    async fn len(&self) -> MailboxResult<u64> {
        self.ensure_open()?;

        let mut conn = self.pool.shared();
        Ok(conn.llen(queue_key(&self.name)).await?)
    }

    async fn close(&self) -> MailboxResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
