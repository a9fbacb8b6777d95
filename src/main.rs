use anyhow::Result;
use async_trait::async_trait;
use log::info;
use rand::Rng;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use poll_store::{visibility_channel, DataSource, PollingStore};

// Simulated chain-tip source: each fetch returns the next block height after
// a randomized network delay
struct ChainTipSource {
    height: AtomicU64,
}

#[async_trait]
impl DataSource for ChainTipSource {
    type Args = String;
    type Output = u64;

    async fn fetch(&self, network: &String) -> Result<u64> {
        let latency = rand::thread_rng().gen_range(10..40);
        tokio::time::sleep(Duration::from_millis(latency)).await;

        let height = self.height.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("fetched tip {} from {}", height, network);
        Ok(height)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let (visibility, signal) = visibility_channel(false);
    let store = PollingStore::new(
        ChainTipSource {
            height: AtomicU64::new(0),
        },
        Duration::from_millis(250),
        signal,
    );

    // Log every state the store broadcasts
    let mut updates = store.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(state) = updates.recv().await {
            match serde_json::to_string(&state) {
                Ok(json) => info!("state: {}", json),
                Err(err) => info!("state: <unserializable: {}>", err),
            }
        }
    });

    info!("polling chain tip every {:?}", store.fetch_interval());
    store.start("mainnet".to_string());
    tokio::time::sleep(Duration::from_secs(1)).await;

    info!("page hidden, polling should go quiet");
    visibility.set_hidden(true);
    tokio::time::sleep(Duration::from_secs(1)).await;

    info!("page visible again, polling should pick up where it left off");
    visibility.set_hidden(false);
    tokio::time::sleep(Duration::from_secs(1)).await;

    store.stop();
    printer.abort();
    info!("done");

    Ok(())
}
