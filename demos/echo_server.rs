//! Echo Server - a minimal peer for the move client demo.
//!
//! Accepts connections and echoes every frame back unchanged, except that
//! heartbeat pings are answered with a pong.
//!
//! ```sh
//! RUST_LOG=debug cargo run --example echo_server -- 127.0.0.1:7777
//! ```

use tickwire::codec::{MsgPackCodec, PING_MESSAGE_ID, PONG_MESSAGE_ID};
use tickwire::protocol::{build_frame, FrameBuffer};
use tickwire::Pong;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7777".to_string());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "echo server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!(%peer, "client connected");

        tokio::spawn(async move {
            if let Err(e) = serve(stream).await {
                tracing::error!(%peer, "connection error: {}", e);
            }
            tracing::info!(%peer, "client disconnected");
        });
    }
}

async fn serve(mut stream: TcpStream) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pong = build_frame(PONG_MESSAGE_ID, &MsgPackCodec::encode(&Pong {})?)?;
    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; 16 * 1024];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        for frame in frames.push(&buf[..n])? {
            if frame.message_id() == PING_MESSAGE_ID {
                tracing::debug!("ping");
                stream.write_all(&pong).await?;
            } else {
                tracing::debug!(message_id = frame.message_id(), len = frame.body_len(), "echo");
                stream
                    .write_all(&build_frame(frame.message_id(), frame.body())?)
                    .await?;
            }
        }
    }
}
