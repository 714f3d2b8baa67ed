#![cfg(not(tarpaulin_include))]

use csrd_archive::{Config, app};
use std::env;

/// Main entry point for the web application
///
/// Reads the configuration from the environment, fetches the report sheet and
/// serves the archive page.
///
/// # Arguments
/// * Optional first argument: address to bind, overriding `CSRD_BIND`
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = Config::from_env()?;
    if let Some(bind) = env::args().nth(1) {
        config.bind = bind;
    }

    app::run(config).await
}
