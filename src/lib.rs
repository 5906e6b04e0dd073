// The Error enum carries OIDs inline for diagnostics.
#![allow(clippy::result_large_err)]

//! # syno-snmp
//!
//! SNMP v1/v2c/v3 client and metric collectors for Synology DiskStation
//! appliances.
//!
//! - BER codec and message model for v1, v2c and v3 (USM)
//! - Async [`Client`] with an explicit retry loop and a total deadline
//! - GETBULK / GETNEXT subtree walks
//! - [`blocking::Session`] for callers without a runtime
//! - [`collector`] families mapping DSM MIB objects to numeric samples
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use syno_snmp::{Client, oid};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), syno_snmp::Error> {
//!     let mut client = Client::v2c("diskstation.lan").community(b"public").connect().await?;
//!     let status = client.get(&[oid!(1, 3, 6, 1, 4, 1, 6574, 1, 1, 0)]).await?;
//!     println!("system status: {}", status[0].value);
//!     Ok(())
//! }
//! ```
//!
//! ## SNMPv3
//!
//! ```rust,no_run
//! use syno_snmp::{Client, oid, v3::{AuthProtocol, PrivProtocol}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), syno_snmp::Error> {
//!     let mut client = Client::v3("diskstation.lan", "monitor")
//!         .auth(AuthProtocol::Sha256, "authpass123")
//!         .privacy(PrivProtocol::Aes128, "privpass123")
//!         .connect()
//!         .await?;
//!
//!     let mut walk = client.walk(oid!(1, 3, 6, 1, 4, 1, 6574, 2, 1, 1, 6));
//!     while let Some(vb) = walk.next().await {
//!         println!("{}", vb?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod ber;
pub mod blocking;
pub mod client;
pub mod collector;
pub mod error;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod prelude;
pub mod transport;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use client::{
    Client, ClientConfig, CommunityClientBuilder, DEFAULT_PORT, V3AuthClientBuilder,
    V3AuthPrivClientBuilder, V3ClientBuilder, V3SecurityConfig, Walk,
};
pub use collector::Family;
pub use error::{
    AuthErrorKind, CryptoErrorKind, DecodeErrorKind, EncodeErrorKind, Error, ErrorStatus,
    OidErrorKind, Result,
};
pub use message::SecurityLevel;
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
pub use transport::{Transport, UdpTransport};
pub use v3::{AuthProtocol, ParseProtocolError, PrivProtocol};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;

/// Client over a dedicated UDP socket.
pub type UdpClient = Client<UdpTransport>;
