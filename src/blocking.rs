//! Synchronous façade.
//!
//! [`Session`] drives an async [`Client`] on a private current-thread
//! runtime owned by the session. Calls block the calling thread; no
//! background thread is spawned.
//!
//! ```rust,no_run
//! use syno_snmp::blocking::Session;
//! use syno_snmp::ClientConfig;
//!
//! # fn example() -> syno_snmp::Result<()> {
//! let mut session = Session::connect("diskstation.lan", ClientConfig::default())?;
//! let values = session.get(&[".1.3.6.1.4.1.6574.1.2.0"])?;
//! for entry in session.walk(".1.3.6.1.4.1.6574.2.1.1.6")? {
//!     let (oid, value) = entry?;
//!     println!("{oid} = {value}");
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;

use tokio::runtime::Runtime;

use crate::client::{Client, ClientConfig, DEFAULT_PORT, Walk};
use crate::collector::Family;
use crate::error::{Error, Result};
use crate::transport::UdpTransport;
use crate::util::resolve_target;
use crate::value::Value;

/// Blocking session to one agent.
pub struct Session {
    runtime: Runtime,
    client: Client<UdpTransport>,
}

impl Session {
    /// Resolve `target` (`host` or `host:port`, default port 161) and open
    /// a socket to it.
    pub fn connect(target: &str, config: ClientConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| Error::Io { target: None, source })?;
        let addr = resolve_target(target, DEFAULT_PORT).map_err(|source| Error::Io {
            target: None,
            source,
        })?;
        let transport = runtime.block_on(UdpTransport::connect(addr))?;
        Ok(Self {
            client: Client::new(transport, config),
            runtime,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.client.peer_addr()
    }

    pub fn config(&self) -> &ClientConfig {
        self.client.config()
    }

    /// GET the given dotted OIDs, keyed by the identifiers as passed.
    pub fn get(&mut self, identifiers: &[&str]) -> Result<BTreeMap<String, Value>> {
        self.runtime.block_on(self.client.get_map(identifiers))
    }

    /// Lazily walk the subtree under `root`.
    pub fn walk(&mut self, root: &str) -> Result<WalkIter<'_>> {
        let walk = self.client.walk_entries(root)?;
        Ok(WalkIter {
            runtime: &self.runtime,
            walk,
        })
    }

    /// Run one metric family.
    pub fn collect(&mut self, family: Family) -> Result<BTreeMap<String, f64>> {
        self.runtime.block_on(family.collect(&mut self.client))
    }
}

/// Iterator returned by [`Session::walk`].
///
/// Each call to `next()` may block for one request round trip.
pub struct WalkIter<'a> {
    runtime: &'a Runtime,
    walk: Walk<'a, UdpTransport>,
}

impl Iterator for WalkIter<'_> {
    type Item = Result<(String, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.walk.next_entry())
    }
}
