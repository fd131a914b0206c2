//! IEC 60870-5-104 client front-end.
//!
//! A thin wrapper around [`Session`] that owns the TCP dial and exposes the
//! handful of named operations clients actually need:
//! `connect`/`send_asdu`/`recv`/`close`/`general_interrogation`/
//! `single_command`. All sequence numbering, window gating, and timers live
//! in [`Session`]; this module has no bookkeeping of its own.

use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Iec104Error, Result};
use crate::session::{Session, SessionConfig, SessionState};
use crate::types::{Asdu, AsduHeader, Cot, InformationObject, Ioa, TypeId};

/// Default IEC 104 port.
pub const DEFAULT_PORT: u16 = 2404;

/// Client configuration: the TCP dial target plus the session parameters
/// used once connected.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (host:port).
    pub address: String,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Session parameters (window sizes, T0..T3, originator address).
    pub session: SessionConfig,
}

impl ClientConfig {
    /// Create a new configuration with the given address and default
    /// session parameters.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(10),
            session: SessionConfig::default(),
        }
    }

    /// Set the TCP connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the session window size (k).
    pub fn k(mut self, k: u16) -> Self {
        self.session = self.session.k(k);
        self
    }

    /// Set the session acknowledgement threshold (w).
    pub fn w(mut self, w: u16) -> Self {
        self.session = self.session.w(w);
        self
    }

    /// Set T0 (handshake timeout).
    pub fn t0_timeout(mut self, t0: Duration) -> Self {
        self.session = self.session.t0(t0);
        self
    }

    /// Set T1 (outbound acknowledgement timeout).
    pub fn t1_timeout(mut self, t1: Duration) -> Self {
        self.session = self.session.t1(t1);
        self
    }

    /// Set T2 (acknowledgement hold-off).
    pub fn t2_timeout(mut self, t2: Duration) -> Self {
        self.session = self.session.t2(t2);
        self
    }

    /// Set T3 (idle test timeout).
    pub fn t3_timeout(mut self, t3: Duration) -> Self {
        self.session = self.session.t3(t3);
        self
    }

    /// Enable the originator address octet on ASDU headers.
    pub fn with_originator_address(mut self) -> Self {
        self.session = self.session.with_originator_address();
        self
    }
}

/// An IEC 60870-5-104 client connection.
pub struct Iec104Client {
    config: ClientConfig,
    session: Option<Session<TcpStream>>,
}

impl Iec104Client {
    /// Create a new, unconnected client.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Current session state, or `Closed` if never connected.
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(Session::state)
            .unwrap_or(SessionState::Closed)
    }

    /// Dial the server and run the STARTDT handshake to completion.
    pub async fn connect(&mut self) -> Result<()> {
        let stream = timeout(
            self.config.connect_timeout,
            TcpStream::connect(&self.config.address),
        )
        .await
        .map_err(|_| Iec104Error::ConnectionTimeout)?
        .map_err(Iec104Error::Io)?;
        stream.set_nodelay(true).ok();

        let session = Session::connect_client(stream, self.config.session).await?;
        self.session = Some(session);
        Ok(())
    }

    /// Gracefully close the session, if connected.
    pub async fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    fn session(&self) -> Result<&Session<TcpStream>> {
        self.session.as_ref().ok_or(Iec104Error::NotConnected)
    }

    /// Send an ASDU as an I-frame.
    pub async fn send_asdu(&self, asdu: Asdu) -> Result<()> {
        self.session()?.send_asdu(asdu).await
    }

    /// Receive the next inbound ASDU.
    pub async fn recv(&self) -> Result<Asdu> {
        self.session()?.recv().await
    }

    /// Send a single command (C_SC_NA_1).
    pub async fn single_command(
        &self,
        common_address: u16,
        ioa: u32,
        value: bool,
        select: bool,
    ) -> Result<()> {
        let mut asdu = Asdu::new(AsduHeader::new(
            TypeId::SingleCommand,
            1,
            Cot::Activation,
            common_address,
        ));

        // SCO (Single Command Output): bit 0 = SCS (0=OFF, 1=ON),
        // bit 7 = S/E (0=execute, 1=select).
        let sco = if value { 0x01 } else { 0x00 } | if select { 0x80 } else { 0x00 };
        asdu.objects.push(InformationObject {
            ioa: Ioa::new(ioa),
            data: Bytes::copy_from_slice(&[sco]),
        });

        self.send_asdu(asdu).await
    }

    /// Run a full general interrogation: send C_IC_NA_1 activation, wait for
    /// its activation confirmation, collect every data ASDU the station
    /// reports, and return once C_IC_NA_1 carries the activation
    /// termination cause.
    ///
    /// Rejects (as a protocol error) a negative confirmation, a confirmation
    /// echoing the wrong qualifier, or any ASDU with an unexpected
    /// cause-of-transmission in between.
    pub async fn general_interrogation(
        &self,
        common_address: u16,
        qualifier: u8,
        response_timeout: Duration,
    ) -> Result<Vec<Asdu>> {
        let session = self.session()?;
        session
            .send_asdu(Asdu::interrogation_command(common_address, qualifier))
            .await?;

        timeout(
            response_timeout,
            Self::collect_interrogation(session, common_address, qualifier),
        )
        .await
        .map_err(|_| Iec104Error::T1Timeout)?
    }

    async fn collect_interrogation(
        session: &Session<TcpStream>,
        common_address: u16,
        qualifier: u8,
    ) -> Result<Vec<Asdu>> {
        loop {
            let asdu = session.recv().await?;
            if asdu.header.type_id != TypeId::InterrogationCommand
                || asdu.header.common_address != common_address
            {
                continue;
            }
            if asdu.header.negative {
                return Err(Iec104Error::protocol(format!(
                    "general interrogation rejected (negative confirmation, COT={})",
                    asdu.header.cot
                )));
            }
            if asdu.header.cot != Cot::ActivationConfirm {
                return Err(Iec104Error::protocol(format!(
                    "expected activation confirmation, got COT={}",
                    asdu.header.cot
                )));
            }
            // Inbound ASDUs carry their payload in `raw_data`, not
            // `objects` (only ASDUs this crate builds for sending populate
            // `objects`); the qualifier is the single byte of the
            // interrogation command's sole information object, after its
            // 3-byte IOA.
            let echoed_qualifier = asdu.raw_data.get(3).copied();
            if echoed_qualifier != Some(qualifier) {
                return Err(Iec104Error::protocol(format!(
                    "activation confirmation echoed QOI {:?}, expected {}",
                    echoed_qualifier, qualifier
                )));
            }
            break;
        }

        let mut collected = Vec::new();
        loop {
            let asdu = session.recv().await?;
            if asdu.header.common_address != common_address {
                continue;
            }

            if asdu.header.type_id == TypeId::InterrogationCommand {
                if asdu.header.negative {
                    return Err(Iec104Error::protocol_static(
                        "general interrogation ended with a negative confirmation",
                    ));
                }
                return match asdu.header.cot {
                    Cot::ActivationTermination => Ok(collected),
                    other => Err(Iec104Error::protocol(format!(
                        "unexpected interrogation-command COT={} mid-interrogation",
                        other
                    ))),
                };
            }

            if asdu.header.cot != Cot::InterrogatedByStation {
                return Err(Iec104Error::protocol(format!(
                    "unexpected COT={} for data ASDU during interrogation",
                    asdu.header.cot
                )));
            }
            collected.push(asdu);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config() {
        let config = ClientConfig::new("192.168.1.100:2404")
            .connect_timeout(Duration::from_secs(5))
            .t1_timeout(Duration::from_secs(10));

        assert_eq!(config.address, "192.168.1.100:2404");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.session.t1, Duration::from_secs(10));
        assert_eq!(config.session.t2, crate::session::DEFAULT_T2);
    }

    #[test]
    fn test_client_initial_state() {
        let config = ClientConfig::new("localhost:2404");
        let client = Iec104Client::new(config);

        assert_eq!(client.state(), SessionState::Closed);
    }
}
