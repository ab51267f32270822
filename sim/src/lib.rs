// Simulated PreMaid AI serial bridge

pub mod robot_state;
pub mod sim_config;

pub use robot_state::SimRobot;
pub use sim_config::SimConfig;

use std::error::Error;
use std::sync::Arc;

use premaid_link::{FrameParser, ParserConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// Covers the longest frame a length byte can describe.
const INBOUND_BUFFER_CAP: usize = 256;

/// Serves one client until it disconnects. Commands from the client are
/// answered one reply per frame, each followed by the separator byte when
/// the config asks for it.
pub async fn handle_client(mut socket: TcpStream, robot: Arc<Mutex<SimRobot>>) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut parser = FrameParser::new(ParserConfig {
        max_buffered: INBOUND_BUFFER_CAP,
        skip_separator: false,
    });
    let mut buffer = vec![0; 1024];

    loop {
        let n = match socket.read(&mut buffer).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Failed to read from socket: {}", e);
                return Err(e.into());
            }
        };

        let mut out = Vec::new();
        {
            let mut robot = robot.lock().await;
            let separator = robot.config().separator;
            for frame in parser.push(&buffer[..n]) {
                tracing::trace!("received {}", frame.to_hex());
                if let Some(reply) = robot.handle(&frame)? {
                    out.extend_from_slice(&reply);
                    if separator {
                        out.push(0x00);
                    }
                }
            }
        }
        if !out.is_empty() {
            socket.write_all(&out).await?;
        }
    }
}

/// Accepts clients on `listener` forever. All clients drive the same robot.
pub async fn serve(listener: TcpListener, config: SimConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    config.validate()?;
    let robot = Arc::new(Mutex::new(SimRobot::new(config)?));

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
                continue;
            }
        };
        tracing::info!("client connected from {}", peer);
        let robot = Arc::clone(&robot);
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, robot).await {
                tracing::error!("Error handling client {}: {:?}", peer, e);
            }
            tracing::info!("client {} disconnected", peer);
        });
    }
}
