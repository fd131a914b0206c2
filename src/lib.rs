//! # voltage_iec104
//!
//! IEC 60870-5-104 protocol implementation for Rust.
//!
//! This crate provides a complete implementation of the IEC 60870-5-104
//! telecontrol protocol, commonly used in power systems and SCADA applications.
//!
//! ## Features
//!
//! - **Event-driven**: Asynchronous data reception via channels
//! - **Full Protocol Support**: I-frames, S-frames, U-frames
//! - **Standard Timeouts**: T1, T2, T3, K, W parameters
//! - **Type Safe**: Strong typing for TypeID, COT, IOA
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use voltage_iec104::{Iec104Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> voltage_iec104::Result<()> {
//!     let config = ClientConfig::new("192.168.1.100:2404");
//!     let mut client = Iec104Client::new(config);
//!
//!     // Connect; STARTDT handshake runs to completion before this returns.
//!     client.connect().await?;
//!
//!     // Request general interrogation and collect the reported points.
//!     let points = client
//!         .general_interrogation(1, 20, Duration::from_secs(10))
//!         .await?;
//!     println!("{} points reported", points.len());
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol Overview
//!
//! IEC 60870-5-104 uses TCP/IP for communication (default port 2404).
//! The protocol defines three frame types:
//!
//! - **I-frame**: Information transfer (contains ASDU)
//! - **S-frame**: Supervisory (acknowledgment)
//! - **U-frame**: Unnumbered (control: STARTDT, STOPDT, TESTFR)
//!
//! ### APDU Structure
//!
//! ```text
//! APCI (6 bytes):
//! +--------+--------+--------+--------+--------+--------+
//! | 0x68   | Length | Control Field (4 bytes)           |
//! +--------+--------+--------+--------+--------+--------+
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod bitops;
mod buffer;

pub mod client;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod parser;
pub mod policy;
pub mod server;
pub mod session;
pub mod timer;
pub mod types;

// Re-export main types
pub use client::{ClientConfig, Iec104Client};
pub use codec::{Apdu, Iec104Codec};
pub use decoder::StreamingDecoder;
pub use error::{Iec104Error, Result};
pub use parser::parse_asdu;
pub use policy::{AllowAll, ConnectionPolicy, IpAllowlist};
pub use server::Iec104Server;
pub use session::{Session, SessionConfig, SessionState};
pub use types::*;
