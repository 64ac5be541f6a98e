use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use courier_agents::client::AgentClient;
use courier_agents::{CozeClient, DifyClient};
use courier_core::config::CourierConfig;
use courier_message::queue::MessageQueue;
use courier_pipeline::Pipeline;

/// Message broker between chat platforms and LLM-agent backends.
#[derive(Parser)]
#[command(name = "courier", version)]
struct Args {
    /// Path to the config file (default: ./courier.toml).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = CourierConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CourierConfig::default()
    });

    // Dify is the primary backend, Coze the one-shot fallback, matching
    // the selection order the agents were configured for.
    let primary: Option<Arc<dyn AgentClient>> = config
        .agents
        .dify
        .as_ref()
        .filter(|c| c.enabled)
        .map(|c| Arc::new(DifyClient::new(c.clone())) as Arc<dyn AgentClient>);
    let secondary: Option<Arc<dyn AgentClient>> = config
        .agents
        .coze
        .as_ref()
        .filter(|c| c.enabled)
        .map(|c| Arc::new(CozeClient::new(c.clone())) as Arc<dyn AgentClient>);

    if primary.is_none() && secondary.is_none() {
        warn!("no agent backend enabled, replies will carry error text only");
    }

    let queue = MessageQueue::new(config.pipeline.queue_capacity);
    // Platform adapters attach here: they push inbound messages through
    // this handle and register their senders on the pipeline.
    let _ingress = queue.handle();

    let pipeline = Arc::new(Pipeline::new(primary, secondary, &config.pipeline));

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(Arc::clone(&pipeline).run(queue, cancel.clone()));

    info!("courier running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    cancel.cancel();
    worker.await?;

    Ok(())
}
