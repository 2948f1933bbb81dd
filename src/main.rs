use anyhow::Result;
use clap::Parser;
use driftwire::{
    cli::Args, config::Config, manager::ConnectionManager, monitoring::setup_metrics,
    tracing_setup::setup_tracing, types::Topic, ui::StatusPrinter,
};
use tracing::{info, warn};

fn parse_topics(raw: &[String]) -> Vec<Topic> {
    raw.iter()
        .filter_map(|name| match name.as_str() {
            "all" => Some(Topic::All),
            "drifts" => Some(Topic::Drifts),
            "events" => Some(Topic::Events),
            "state" => Some(Topic::State),
            "stats" => Some(Topic::Stats),
            other => {
                warn!("ignoring unknown topic '{}'", other);
                None
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_tracing(&args.log_level, args.json_logs)?;
    info!("starting driftwire v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_args(&args)?;

    if config.metrics.enabled {
        setup_metrics(config.metrics.port).await?;
        info!("metrics server started on port {}", config.metrics.port);
    }

    let manager = ConnectionManager::start(config);
    manager.subscribe_topics(parse_topics(&args.topics));

    let mut printer = StatusPrinter::new(manager.subscribe(), args.quiet);

    info!("channels started; press Ctrl+C to shut down");
    tokio::select! {
        _ = printer.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutdown requested");
        }
    }

    manager.shutdown();
    Ok(())
}
