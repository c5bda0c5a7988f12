mod app;
mod config;
mod logging;
mod terminal;

use anyhow::Context;
use research_logging::research_info;

fn main() -> anyhow::Result<()> {
    let (config, origin) = config::AppConfig::load().context("loading configuration")?;
    logging::initialize(config.log_destination, config.level_filter()?);
    research_info!("research_chat {} starting", env!("CARGO_PKG_VERSION"));
    research_info!("Using {}", origin);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(app::run(config))
}
