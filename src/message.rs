use crate::{
    error::{Error, MailboxResult},
    mailbox::MailboxName,
};
use chrono::{DateTime, FixedOffset, Utc};
use rand::{rngs::OsRng, TryRngCore};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Display;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct MessageId(String);

impl MessageId {
    pub(crate) fn from_raw(id: impl Into<String>) -> Self {
        MessageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message to a recipient. The id is fixed at creation; the body is an
/// opaque byte sequence the mailbox never interprets.
#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    created: String,
    mailbox: String,
    body: Vec<u8>,
}

impl Message {
    /// Create a message addressed to the given mailbox. The id is the
    /// hex digest of 32 random bytes and the creation timestamp, so
    /// concurrent creations do not collide.
    pub fn new(mailbox: &MailboxName) -> MailboxResult<Self> {
        let created = Utc::now().to_rfc2822();

        let mut buff = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut buff)
            .map_err(|e| Error::Entropy(e.to_string()))?;

        let mut hash = Sha256::new();
        hash.update(buff);
        hash.update(created.as_bytes());

        Ok(Message {
            id: MessageId(hex::encode(hash.finalize())),
            created,
            mailbox: mailbox.to_string(),
            body: Vec::new(),
        })
    }

    pub(crate) fn hydrate(
        id: MessageId,
        created: String,
        mailbox: String,
        body: Vec<u8>,
    ) -> Self {
        Message {
            id,
            created,
            mailbox,
            body,
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn created(&self) -> &str {
        &self.created
    }

    /// Name of the mailbox the message was created for. Informational;
    /// delivery is keyed on the id alone.
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serialize a value as the body of the message.
    pub fn marshal<T: Serialize>(&mut self, value: &T) -> MailboxResult<()> {
        self.body = serde_json::to_vec(value).map_err(Error::Encoding)?;
        Ok(())
    }

    /// Deserialize the body of the message into a type.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> MailboxResult<T> {
        serde_json::from_slice(&self.body).map_err(Error::Decoding)
    }

    /// Parse the created timestamp back into a point in time.
    pub fn time(&self) -> MailboxResult<DateTime<FixedOffset>> {
        Ok(DateTime::parse_from_rfc2822(&self.created)?)
    }
}
