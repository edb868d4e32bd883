use clap::Parser;
use mimalloc::MiMalloc;
use turn_server::config::{Cli, Config};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    simple_logger::init_with_level(config.log.level.as_level())?;

    turn_server::startup(config).await
}
