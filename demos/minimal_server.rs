//! Accepts connections and echoes every ASDU it receives back to the
//! originating session.

use std::sync::Arc;

use voltage_iec104::{Asdu, Iec104Server, Session, SessionConfig};

async fn handle(session: Arc<Session<tokio::net::TcpStream>>, asdu: Asdu) {
    println!("received: {:?}", asdu);
    if let Err(err) = session.send_asdu(asdu).await {
        println!("echo failed: {err}");
    }
}

#[tokio::main]
async fn main() -> voltage_iec104::Result<()> {
    let server = Iec104Server::bind("127.0.0.1:2404", SessionConfig::default()).await?;
    println!("listening on {}", server.local_addr()?);

    // Runs until the listener itself errors; there is no separate shutdown
    // signal here, matching the reference server's run-until-interrupted demo.
    server.run(handle).await
}
