use crate::error::MailboxResult;
use redis::{
    aio::{ConnectionManager, MultiplexedConnection},
    Client,
};
use std::env;

const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// Connection settings for the backing Redis store.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub addr: String,
    pub password: Option<String>,
}

impl RedisConfig {
    /// Read the connection settings from the environment, falling back
    /// to a local unauthenticated instance.
    pub fn from_env() -> Self {
        RedisConfig {
            addr: default_env("REDIS_ADDR", DEFAULT_ADDR),
            password: env::var("REDIS_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
        }
    }

    fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}", password, self.addr),
            None => format!("redis://{}", self.addr),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            addr: DEFAULT_ADDR.to_owned(),
            password: None,
        }
    }
}

/// Pooled access to the store. The multiplexed manager serves the
/// single-round-trip commands; blocking pops get a connection of their
/// own so they cannot stall anyone else. Connections are released when
/// the last clone is dropped.
#[derive(Clone)]
pub struct Pool {
    client: Client,
    manager: ConnectionManager,
}

impl Pool {
    pub async fn connect(config: &RedisConfig) -> MailboxResult<Self> {
        let client = Client::open(config.url())?;
        let manager = ConnectionManager::new(client.clone()).await?;
        Ok(Pool { client, manager })
    }

    pub(crate) fn shared(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub(crate) async fn dedicated(&self) -> MailboxResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

// Get a value from the environment or use the default.
fn default_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
