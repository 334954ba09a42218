use super::{Mailbox, MailboxName};
use crate::{
    error::{Error, MailboxResult},
    message::{Message, MessageId},
    stats::MessageCounter,
};
use async_trait::async_trait;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex, Notify},
    time::{sleep, timeout_at, Instant},
};

#[derive(Default)]
struct State {
    queue: VecDeque<MessageId>,
    records: HashMap<MessageId, Message>,
}

/// In-memory mailbox with the same contract as the Redis one. Useful
/// for local development and for substituting the store in tests.
pub struct MemoryMailbox {
    name: MailboxName,
    wait_timeout: u64,
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
    sent: MessageCounter,
    closed: Arc<AtomicBool>,
}

impl MemoryMailbox {
    pub fn new(name: impl Into<MailboxName>) -> Self {
        MemoryMailbox {
            name: name.into(),
            wait_timeout: 0,
            state: Default::default(),
            notify: Arc::new(Notify::new()),
            sent: MessageCounter::default(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seconds a [`wait`](Mailbox::wait) call blocks before giving up.
    /// Zero blocks forever.
    pub fn with_default_wait_timeout(mut self, seconds: u64) -> Self {
        self.wait_timeout = seconds;
        self
    }

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

#[async_trait]
impl Mailbox for MemoryMailbox {
    fn name(&self) -> &MailboxName {
        &self.name
    }

    async fn send(&self, message: &Message) -> MailboxResult<()> {
        self.ensure_open()?;

        {
            let mut state = self.state.lock().await;
            state
                .records
                .insert(message.id().clone(), message.clone());
            state.queue.push_back(message.id().clone());
        }
        self.notify.notify_one();

        self.sent.incr();
        Ok(())
    }

    async fn wait(&self) -> MailboxResult<Message> {
        let deadline = (self.wait_timeout > 0)
            .then(|| Instant::now() + Duration::from_secs(self.wait_timeout));

        loop {
            self.ensure_open()?;

            {
                let mut state = self.state.lock().await;
                if let Some(id) = state.queue.pop_front() {
                    return match state.records.get(&id) {
                        Some(message) => Ok(message.clone()),
                        // Entry consumed, record already destroyed.
                        None => Err(Error::Hydration(id)),
                    };
                }
            }

            let notified = self.notify.notified();
            match deadline {
                Some(deadline) => timeout_at(deadline, notified)
                    .await
                    .map_err(|_| Error::Timeout(self.wait_timeout))?,
                None => notified.await,
            }
        }
    }

    async fn destroy_after(&self, message: &Message, seconds: i64) -> MailboxResult<()> {
        self.ensure_open()?;

        if seconds <= 0 {
            self.state.lock().await.records.remove(message.id());
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let id = message.id().clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(seconds as u64)).await;
            state.lock().await.records.remove(&id);
        });
        Ok(())
    }

    async fn len(&self) -> MailboxResult<u64> {
        self.ensure_open()?;
        Ok(self.state.lock().await.queue.len() as u64)
    }

    async fn close(&self) -> MailboxResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashSet;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestBody {
        name: String,
        age: u32,
    }

    #[tokio::test]
    async fn send_then_wait_returns_the_same_message() {
        let mbox = MemoryMailbox::new("test");

        let body = TestBody {
            name: "koye".to_owned(),
            age: 3,
        };
        let mut m = mbox.new_message().unwrap();
        m.marshal(&body).unwrap();
        mbox.send(&m).await.unwrap();

        let delivered = mbox.wait().await.unwrap();
        assert_eq!(delivered.id(), m.id());
        assert_eq!(delivered.created(), m.created());
        assert_eq!(delivered.unmarshal::<TestBody>().unwrap(), body);
    }

    #[tokio::test]
    async fn delivery_is_fifo() {
        let mbox = MemoryMailbox::new("test");

        let mut sent = Vec::new();
        for _ in 0..3 {
            let m = mbox.new_message().unwrap();
            mbox.send(&m).await.unwrap();
            sent.push(m.id().clone());
        }

        for id in sent {
            assert_eq!(*mbox.wait().await.unwrap().id(), id);
        }
    }

    #[tokio::test]
    async fn wait_times_out_on_an_empty_mailbox() {
        let mbox = MemoryMailbox::new("test").with_default_wait_timeout(1);

        match mbox.wait().await {
            Err(Error::Timeout(1)) => {}
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn destroyed_record_surfaces_as_a_hydration_failure() {
        let mbox = MemoryMailbox::new("test");

        let m = mbox.new_message().unwrap();
        mbox.send(&m).await.unwrap();
        mbox.destroy(&m).await.unwrap();

        match mbox.wait().await {
            Err(Error::Hydration(id)) => assert_eq!(id, *m.id()),
            other => panic!("expected a hydration failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn destroy_after_expires_the_record_later() {
        let mbox = MemoryMailbox::new("test");

        let m = mbox.new_message().unwrap();
        mbox.send(&m).await.unwrap();
        mbox.destroy_after(&m, 1).await.unwrap();

        sleep(Duration::from_secs(2)).await;

        match mbox.wait().await {
            Err(Error::Hydration(id)) => assert_eq!(id, *m.id()),
            other => panic!("expected a hydration failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn len_tracks_the_pending_queue() {
        let mbox = MemoryMailbox::new("test");
        assert_eq!(mbox.len().await.unwrap(), 0);

        let m = mbox.new_message().unwrap();
        mbox.send(&m).await.unwrap();
        assert_eq!(mbox.len().await.unwrap(), 1);

        mbox.wait().await.unwrap();
        assert_eq!(mbox.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn closed_mailbox_rejects_operations() {
        let mbox = MemoryMailbox::new("test");
        let m = mbox.new_message().unwrap();
        mbox.close().await.unwrap();

        assert!(matches!(mbox.send(&m).await, Err(Error::Closed)));
        assert!(matches!(mbox.wait().await, Err(Error::Closed)));
        assert!(matches!(mbox.destroy(&m).await, Err(Error::Closed)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_waiters_each_receive_a_message_once() {
        const CONSUMERS: usize = 4;
        const MESSAGES: usize = 20;

        let mbox = Arc::new(MemoryMailbox::new("fanout"));
        let (tx, mut rx) = tokio::sync::mpsc::channel(MESSAGES);

        for _ in 0..CONSUMERS {
            let mbox = Arc::clone(&mbox);
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Ok(m) = mbox.wait().await {
                    if tx.send(m.id().clone()).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut sent = HashSet::new();
        for _ in 0..MESSAGES {
            let m = mbox.new_message().unwrap();
            mbox.send(&m).await.unwrap();
            sent.insert(m.id().clone());
        }

        let mut delivered = HashSet::new();
        for _ in 0..MESSAGES {
            let id = rx.recv().await.unwrap();
            assert!(delivered.insert(id), "a message was delivered twice");
        }
        assert_eq!(delivered, sent);

        mbox.close().await.unwrap();
    }
}
