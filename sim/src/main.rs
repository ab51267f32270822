use std::error::Error;

use sim::{serve, SimConfig};
use tokio::net::TcpListener;

/// `sim [PORT | CONFIG.json]`
fn load_config() -> Result<SimConfig, Box<dyn Error + Send + Sync>> {
    let Some(arg) = std::env::args().nth(1) else {
        return Ok(SimConfig::default());
    };
    if let Ok(port) = arg.parse::<u16>() {
        return Ok(SimConfig {
            port,
            ..SimConfig::default()
        });
    }
    let json = std::fs::read_to_string(&arg)?;
    Ok(SimConfig::from_json_str(&json)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let config = load_config()?;
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("PreMaid simulator listening on {}", addr);
    if config.drop_every > 0 {
        tracing::info!("dropping every {} pose frames", config.drop_every);
    }
    serve(listener, config).await
}
