//! TCP server front-end: accepts connections, applies the connection
//! policy, and runs one session per accepted peer.
//!
//! Grounded on the reference `IEC104Server`/`_on_client` accept loop: a
//! session is constructed for the *accepted* transport (server role, state
//! `IDLE`) before the handshake runs, and `session.start()` is awaited
//! separately to wait for the peer's STARTDT — mirroring that
//! `create_server_session` does not itself block on the handshake.

use std::future::Future;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::error::{Iec104Error, Result};
use crate::policy::{enforce, AllowAll, ConnectionPolicy};
use crate::session::{Session, SessionConfig};
use crate::types::Asdu;

/// A bound IEC 104 server, ready to accept connections.
pub struct Iec104Server<P: ConnectionPolicy = AllowAll> {
    listener: TcpListener,
    policy: P,
    config: SessionConfig,
}

impl Iec104Server<AllowAll> {
    /// Bind a server that admits every connection.
    pub async fn bind(addr: impl ToSocketAddrs, config: SessionConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(Iec104Error::Io)?;
        Ok(Self {
            listener,
            policy: AllowAll,
            config,
        })
    }
}

impl<P: ConnectionPolicy> Iec104Server<P> {
    /// Bind a server with an explicit [`ConnectionPolicy`].
    pub async fn bind_with_policy(
        addr: impl ToSocketAddrs,
        policy: P,
        config: SessionConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(Iec104Error::Io)?;
        Ok(Self {
            listener,
            policy,
            config,
        })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener.local_addr().map_err(Iec104Error::Io)
    }

    /// Accept connections forever, handing each inbound ASDU on each session
    /// to `handler`. Runs until the listener errors.
    ///
    /// `handler` is cloned once per accepted connection, so it should be
    /// cheap to clone (an `Arc`-wrapped closure or a unit struct implementing
    /// the bound work well).
    pub async fn run<H, Fut>(self, handler: H) -> Result<()>
    where
        H: Fn(Arc<Session<TcpStream>>, Asdu) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let policy = Arc::new(self.policy);
        loop {
            let (stream, peer) = self.listener.accept().await.map_err(Iec104Error::Io)?;

            if enforce(policy.as_ref(), peer).await.is_err() {
                #[cfg(feature = "tracing-support")]
                tracing::warn!(%peer, "connection rejected by policy");
                drop(stream);
                continue;
            }

            #[cfg(feature = "tracing-support")]
            tracing::info!(%peer, "client connected");

            let session = Arc::new(Session::server(stream, self.config));
            let handler = handler.clone();
            tokio::spawn(async move {
                if session.start().await.is_err() {
                    return;
                }
                loop {
                    match session.recv().await {
                        Ok(asdu) => handler(Arc::clone(&session), asdu).await,
                        Err(_) => break,
                    }
                }
                let _ = session.close().await;
                #[cfg(feature = "tracing-support")]
                tracing::info!(%peer, "session closed");
            });
        }
    }
}
