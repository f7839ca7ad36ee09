//! End-to-end walkthrough against an in-process loopback peer.
//!
//! The peer echoes every byte it receives. Run with:
//! `RUST_LOG=debug cargo run --example loopback_echo`

use anyhow::Result;
use futures_util::StreamExt;

use btserial::loopback::LoopbackAdapter;
use btserial::{Security, SessionManager};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let adapter = LoopbackAdapter::new();
    let mut peer = adapter.add_peer("00:11:22:33:44:55".parse()?);
    peer.set_name("echo-box");
    peer.set_rssi(-48);

    // the far end: echo the link byte for byte
    tokio::spawn(async move {
        while let Some(link) = peer.accept().await {
            let (mut rx, mut tx) = tokio::io::split(link);
            let _ = tokio::io::copy(&mut rx, &mut tx).await;
        }
    });

    let session = SessionManager::new(adapter.clone());
    println!("radio enabled: {}", session.is_enabled().await);

    let mut scan = session.start_discovery().await?;
    let found = scan.next().await.expect("loopback peer should advertise");
    println!("discovered: {}", serde_json::to_string(&found)?);
    session.stop_discovery().await?;

    session.connect(&found.address, Security::Secure).await?;
    println!("connected: {}", session.is_connected().await);
    println!("rssi: {} dBm", session.read_rssi().await?);

    let mut lines = session.subscribe(b"\n").await?;
    session.write(b"hello over serial\n").await?;
    session.write(b"goodbye\n").await?;

    for _ in 0..2 {
        let frame = lines.next().await.expect("stream is live")?;
        print!("echoed: {}", String::from_utf8_lossy(&frame));
    }

    session.unsubscribe().await?;
    session.disconnect().await?;
    println!("disconnected");
    Ok(())
}
