use std::sync::Arc;

use clap::Parser;
use log::info;

use notesync::{App, Cli, Config, NoteStore, Result};

pub fn initialize_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_logger();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let store = Arc::new(NoteStore::open(config.clone())?);
    let app = App::new(store, config, cli.verbose);
    app.run(cli.command).await
}
