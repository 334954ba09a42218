use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use postbox::{Mailbox, Message, RedisConfig, RedisMailbox};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

const WORKERS: usize = 10;
const MESSAGES: usize = 1000;

#[derive(Debug, Serialize, Deserialize)]
struct Feed {
    url: String,
    author: String,
}

async fn worker(rx: Arc<Mutex<mpsc::Receiver<Message>>>, mbox: Arc<RedisMailbox>) {
    loop {
        let message = {
            let mut rx = rx.lock().await;
            match rx.recv().await {
                Some(m) => m,
                None => return,
            }
        };

        match message.unmarshal::<Feed>() {
            Ok(feed) => info!("{}: {:?}", message.id(), feed),
            Err(e) => error!("failed to decode {}: {e}", message.id()),
        }

        if let Err(e) = mbox.destroy_after(&message, 300).await {
            error!("failed to destroy {}: {e}", message.id());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = RedisConfig::from_env();
    let mbox = Arc::new(RedisMailbox::connect("feeds", &config).await?);

    let (tx, rx) = mpsc::channel(WORKERS);
    let rx = Arc::new(Mutex::new(rx));

    let mut workers = Vec::with_capacity(WORKERS);
    for _ in 0..WORKERS {
        workers.push(tokio::spawn(worker(Arc::clone(&rx), Arc::clone(&mbox))));
    }

    let receiver = {
        let mbox = Arc::clone(&mbox);
        tokio::spawn(async move {
            for _ in 0..MESSAGES {
                match mbox.wait().await {
                    Ok(m) => {
                        if tx.send(m).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        error!("wait failed: {e}");
                        return;
                    }
                }
            }
        })
    };

    let feed = Feed {
        url: "https://blog.example.com/feeds/all.atom.xml".to_owned(),
        author: "morgan".to_owned(),
    };

    for _ in 0..MESSAGES {
        let mut m = mbox.new_message()?;
        m.marshal(&feed)?;
        mbox.send(&m).await?;
    }

    receiver.await?;
    for worker in workers {
        worker.await?;
    }

    info!("sent and processed {} messages", mbox.counter().count());
    Ok(())
}
