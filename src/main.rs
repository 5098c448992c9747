use eyre::Result;
use pnl_stream_monitor::{
    MonitorConfig, Reporter, ShutdownCoordinator, StreamConsumer, SubstreamsCliFeed, Termination, init_telemetry,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_telemetry();

    let config = MonitorConfig::load().await?;
    info!(
        "Monitoring {} / {} from block {}",
        config.package, config.module, config.start_block
    );

    let coordinator = Arc::new(ShutdownCoordinator::new(CancellationToken::new()));
    let cancel = coordinator.token();
    let shutdown_task = Arc::clone(&coordinator).spawn();

    let feed = SubstreamsCliFeed::from_config(&config);
    let reporter = Reporter::new(std::io::stdout(), config.package.clone());
    let consumer = StreamConsumer::new(reporter, cancel);

    let result = consumer.run(&feed, &config.subscription()).await;
    shutdown_task.abort();
    let outcome = result?;

    let reason = match outcome.termination {
        Termination::StreamEnded => "stream ended",
        Termination::Cancelled => "cancelled",
    };
    info!(
        "Monitor finished ({}): {} blocks, {} opportunities, {} users",
        reason, outcome.state.blocks_processed, outcome.state.total_opportunities, outcome.state.total_users
    );

    Ok(())
}
