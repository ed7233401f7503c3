use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::client::DaemonClient;
use crate::models::{Config, OutputFormat, StoreDriver};
use crate::services::{EmbeddingClient, create_backend};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let client = DaemonClient::new(&config);
    let daemon_running = client.is_running();

    let (daemon_status, idle_secs, metrics) = if daemon_running {
        match client.status().await {
            Ok(status) => (true, Some(status.idle_secs), status.metrics),
            Err(_) => (false, None, None),
        }
    } else {
        (false, None, None)
    };

    let embedding_healthy = match EmbeddingClient::new(&config.embedding) {
        Ok(client) => client.health_check().await.is_ok(),
        Err(_) => false,
    };

    let (store_connected, record_count) = if let Ok(store) =
        create_backend(&config.store, config.embedding.dimension as usize).await
    {
        let connected = store.health_check().await.unwrap_or(false);
        let records = if connected {
            store
                .info()
                .await
                .ok()
                .flatten()
                .map_or(0, |info| info.record_count)
        } else {
            0
        };
        (connected, records)
    } else {
        (false, 0)
    };

    let status = StatusInfo {
        daemon_running: daemon_status,
        daemon_idle_secs: idle_secs,
        embedding_url: config.embedding.url.clone(),
        embedding_healthy,
        store_driver: config.store.driver.to_string(),
        store_url: config.store.url.clone(),
        store_connected,
        record_count,
        collection: config.store.collection.clone(),
        metrics,
    };

    print!("{}", formatter.format_status(&status));

    if !daemon_status || !store_connected || !embedding_healthy {
        eprintln!();
        if !daemon_status {
            eprintln!("Hint: daemon not running. It will start automatically on first request.");
            eprintln!("      Or start manually with: semstore serve");
        }
        if !embedding_healthy {
            eprintln!(
                "Warning: embedding server not reachable at {}",
                config.embedding.url
            );
        }
        if !store_connected {
            match config.store.driver {
                StoreDriver::Qdrant => {
                    eprintln!("Warning: Qdrant not reachable. Check that it is running.");
                }
                StoreDriver::Postgres => {
                    eprintln!("Warning: PostgreSQL not accessible. Check connection settings.");
                }
                StoreDriver::Memory => {}
            }
        }
    }

    Ok(())
}
