//! Binary entry point: wires configuration, observability, storage, and the
//! session engine together over stdio, the transport this server supports
//! (spec §9 Open Question: stdio-only).

use std::sync::Arc;

use clap::Parser;
use library_mcp::config::Config;
use library_mcp::observability::recorder_for;
use library_mcp::outbound::OutboundQueue;
use library_mcp::server::Server;
use library_mcp::store::Store;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let store = Store::connect(&config.database_path).await?;
    let recorder: Arc<dyn library_mcp::observability::Recorder> = Arc::from(recorder_for(config.observability_enabled));

    let (outbound, writer) = OutboundQueue::spawn(tokio::io::stdout());
    let server = Arc::new(Server::new(store, Arc::new(config), outbound, recorder));

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    // Each frame is dispatched on its own task so a long-running tool call
    // (bulk_import_books, catalog_maintenance) never blocks the read loop
    // from observing a subsequent `$/cancelRequest` notification.
    let mut in_flight = tokio::task::JoinSet::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let srv = server.clone();
        in_flight.spawn(async move { srv.handle_line(&line).await });
        if server.is_stopped() {
            break;
        }
        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
    drop(server);
    let _ = writer.await;
    Ok(())
}
