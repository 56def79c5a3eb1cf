//! Move Client - a fixed-rate consumer loop driving a `Connector`.
//!
//! This example demonstrates:
//! - Registering message types and handlers with the builder
//! - Polling from a plain (non-async) loop, as a game would per frame
//! - Sending while connected and closing once the queue drains
//!
//! Start the echo server first:
//!
//! ```sh
//! cargo run --example echo_server
//! RUST_LOG=tickwire=debug cargo run --example move_client -- 127.0.0.1 7777
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tickwire::{ConnectStatus, ConnectionState, Connector};
use tracing_subscriber::EnvFilter;

/// Movement update, id 1.
#[derive(Serialize, Deserialize, Debug)]
struct Move {
    x: f32,
    y: f32,
}

/// Chat line, id 2.
#[derive(Serialize, Deserialize, Debug)]
struct Chat {
    text: String,
}

const FRAME_TIME: Duration = Duration::from_millis(16);
const FRAMES: u32 = 300;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.next().map(|p| p.parse()).transpose()?.unwrap_or(7777);

    let mut connector = Connector::builder()
        .register::<Move>(1)
        .register::<Chat>(2)
        .build()?;

    connector.on_status(ConnectStatus::Succeeded, |_| println!("connected"));
    connector.on_status(ConnectStatus::Failed, |e| println!("{}", e));
    connector.on_status(ConnectStatus::Closed, |_| println!("closed"));
    connector.on_message(|m: &Move| println!("echoed move: ({}, {})", m.x, m.y))?;
    connector.on_message(|c: &Chat| println!("echoed chat: {}", c.text))?;

    connector.connect(&host, port)?;

    let mut frame = 0u32;
    loop {
        connector.poll_once();

        match connector.state() {
            ConnectionState::Connected => {
                if frame % 30 == 0 {
                    let t = frame as f32 / 30.0;
                    connector.send(&Move { x: t.cos(), y: t.sin() })?;
                }
                if frame == FRAMES / 2 {
                    connector.send(&Chat {
                        text: "halfway there".to_string(),
                    })?;
                }
                if frame >= FRAMES {
                    connector.close()?;
                }
                frame += 1;
            }
            ConnectionState::Idle | ConnectionState::Closed => break,
            ConnectionState::Connecting | ConnectionState::Closing => {}
        }

        std::thread::sleep(FRAME_TIME);
    }

    Ok(())
}
