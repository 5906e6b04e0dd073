//! Typestate builders for [`Client`].
//!
//! - [`Client::v1()`] / [`Client::v2c()`]: community-based
//! - [`Client::v3()`]: USM, starting at noAuthNoPriv; `.auth()` then
//!   `.privacy()` raise the security level, and calling `.privacy()`
//!   without `.auth()` does not compile
//!
//! Targets are `host` or `host:port`; the port defaults to 161.
//!
//! ```rust,no_run
//! # use syno_snmp::Client;
//! # use syno_snmp::v3::{AuthProtocol, PrivProtocol};
//! # use std::time::Duration;
//! # async fn example() -> syno_snmp::Result<()> {
//! let v1 = Client::v1("diskstation.lan").connect().await?;
//!
//! let v3 = Client::v3("10.0.0.5:161", "monitor")
//!     .auth(AuthProtocol::Sha1, "authpass123")
//!     .privacy(PrivProtocol::Aes128, "privpass123")
//!     .timeout(Duration::from_secs(5))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::transport::{Transport, UdpTransport};
use crate::util::resolve_target;
use crate::v3::{AuthProtocol, PrivProtocol};
use crate::version::Version;

use super::{Client, ClientConfig, DEFAULT_PORT, V3SecurityConfig};

/// Settings shared by every builder.
struct BaseConfig {
    target: String,
    config: ClientConfig,
}

impl BaseConfig {
    fn new(target: impl Into<String>, version: Version) -> Self {
        Self {
            target: target.into(),
            config: ClientConfig {
                version,
                ..ClientConfig::default()
            },
        }
    }

    fn resolve(&self) -> Result<SocketAddr> {
        resolve_target(&self.target, DEFAULT_PORT).map_err(|source| Error::Io {
            target: None,
            source,
        })
    }

    async fn connect(&self) -> Result<UdpTransport> {
        let addr = self.resolve()?;
        UdpTransport::connect(addr).await
    }
}

macro_rules! impl_common_methods {
    ($builder:ty) => {
        impl $builder {
            /// Total time budget per request, across all attempts. Must be
            /// non-zero; requests on a client built with zero fail with
            /// [`Error::Config`](crate::Error::Config).
            pub fn timeout(mut self, timeout: Duration) -> Self {
                self.base.config.timeout = timeout;
                self
            }

            /// Attempts after the first.
            pub fn retries(mut self, retries: u32) -> Self {
                self.base.config.retries = retries;
                self
            }

            /// GETBULK max-repetitions used by walks.
            pub fn max_repetitions(mut self, max_repetitions: u8) -> Self {
                self.base.config.max_repetitions = max_repetitions.max(1);
                self
            }

            pub fn max_oids_per_request(mut self, max: usize) -> Self {
                self.base.config.max_oids_per_request = max.max(1);
                self
            }
        }
    };
}

/// Builder for v1 and v2c clients.
pub struct CommunityClientBuilder {
    base: BaseConfig,
}

impl CommunityClientBuilder {
    fn new(target: impl Into<String>, version: Version) -> Self {
        Self {
            base: BaseConfig::new(target, version),
        }
    }

    /// Community string; "public" unless set.
    pub fn community(mut self, community: &[u8]) -> Self {
        self.base.config.community = Bytes::copy_from_slice(community);
        self
    }

    /// Resolve the target and open a UDP socket to it.
    pub async fn connect(self) -> Result<Client<UdpTransport>> {
        let transport = self.base.connect().await?;
        Ok(self.build(transport))
    }

    /// Use a caller-supplied transport.
    pub fn build<T: Transport>(self, transport: T) -> Client<T> {
        Client::new(transport, self.base.config)
    }
}

impl_common_methods!(CommunityClientBuilder);

/// Builder for noAuthNoPriv v3 clients.
pub struct V3ClientBuilder {
    base: BaseConfig,
    security: V3SecurityConfig,
}

impl V3ClientBuilder {
    fn new(target: impl Into<String>, username: impl Into<Bytes>) -> Self {
        Self {
            base: BaseConfig::new(target, Version::V3),
            security: V3SecurityConfig::new(username),
        }
    }

    /// Authenticate messages (authNoPriv).
    pub fn auth(self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> V3AuthClientBuilder {
        V3AuthClientBuilder {
            base: self.base,
            security: self.security.auth(protocol, password),
        }
    }

    pub async fn connect(self) -> Result<Client<UdpTransport>> {
        let transport = self.base.connect().await?;
        Ok(self.build(transport))
    }

    pub fn build<T: Transport>(self, transport: T) -> Client<T> {
        build_v3(self.base, self.security, transport)
    }
}

impl_common_methods!(V3ClientBuilder);

/// Builder for authNoPriv v3 clients.
pub struct V3AuthClientBuilder {
    base: BaseConfig,
    security: V3SecurityConfig,
}

impl V3AuthClientBuilder {
    /// Encrypt the scoped PDU as well (authPriv).
    pub fn privacy(
        self,
        protocol: PrivProtocol,
        password: impl Into<Vec<u8>>,
    ) -> V3AuthPrivClientBuilder {
        V3AuthPrivClientBuilder {
            base: self.base,
            security: self.security.privacy(protocol, password),
        }
    }

    pub async fn connect(self) -> Result<Client<UdpTransport>> {
        let transport = self.base.connect().await?;
        Ok(self.build(transport))
    }

    pub fn build<T: Transport>(self, transport: T) -> Client<T> {
        build_v3(self.base, self.security, transport)
    }
}

impl_common_methods!(V3AuthClientBuilder);

/// Builder for authPriv v3 clients.
pub struct V3AuthPrivClientBuilder {
    base: BaseConfig,
    security: V3SecurityConfig,
}

impl V3AuthPrivClientBuilder {
    pub async fn connect(self) -> Result<Client<UdpTransport>> {
        let transport = self.base.connect().await?;
        Ok(self.build(transport))
    }

    pub fn build<T: Transport>(self, transport: T) -> Client<T> {
        build_v3(self.base, self.security, transport)
    }
}

impl_common_methods!(V3AuthPrivClientBuilder);

fn build_v3<T: Transport>(base: BaseConfig, security: V3SecurityConfig, transport: T) -> Client<T> {
    let config = ClientConfig {
        community: Bytes::new(),
        v3_security: Some(security),
        ..base.config
    };
    Client::new(transport, config)
}

impl Client<UdpTransport> {
    pub fn v1(target: impl Into<String>) -> CommunityClientBuilder {
        CommunityClientBuilder::new(target, Version::V1)
    }

    pub fn v2c(target: impl Into<String>) -> CommunityClientBuilder {
        CommunityClientBuilder::new(target, Version::V2c)
    }

    pub fn v3(target: impl Into<String>, username: impl Into<Bytes>) -> V3ClientBuilder {
        V3ClientBuilder::new(target, username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SecurityLevel;
    use crate::transport::MockTransport;

    fn mock() -> MockTransport {
        MockTransport::new("192.0.2.1:161".parse().unwrap())
    }

    #[test]
    fn defaults_match_the_exporter() {
        let client = Client::v1("192.0.2.1").build(mock());
        let config = client.config();
        assert_eq!(config.version, Version::V1);
        assert_eq!(&config.community[..], b"public");
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.retries, 3);
        assert_eq!(config.max_repetitions, 10);
        assert!(config.v3_security.is_none());
    }

    #[test]
    fn community_settings_carry_through() {
        let client = Client::v2c("192.0.2.1")
            .community(b"s3cret")
            .timeout(Duration::from_millis(500))
            .retries(0)
            .max_repetitions(0)
            .build(mock());
        let config = client.config();
        assert_eq!(config.version, Version::V2c);
        assert_eq!(&config.community[..], b"s3cret");
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.retries, 0);
        assert_eq!(config.max_repetitions, 1);
    }

    #[test]
    fn v3_levels_follow_builder_state() {
        let plain = Client::v3("192.0.2.1", "monitor").build(mock());
        let level = |c: &Client<MockTransport>| {
            c.config().v3_security.as_ref().map(|s| s.security_level())
        };
        assert_eq!(level(&plain), Some(SecurityLevel::NoAuthNoPriv));

        let auth = Client::v3("192.0.2.1", "monitor")
            .auth(AuthProtocol::Sha256, "authpass123")
            .build(mock());
        assert_eq!(level(&auth), Some(SecurityLevel::AuthNoPriv));

        let full = Client::v3("192.0.2.1", "monitor")
            .auth(AuthProtocol::Sha256, "authpass123")
            .privacy(PrivProtocol::Des, "privpass123")
            .retries(1)
            .build(mock());
        assert_eq!(level(&full), Some(SecurityLevel::AuthPriv));
        assert_eq!(full.config().version, Version::V3);
        assert_eq!(full.config().retries, 1);
    }

    #[tokio::test]
    async fn connect_uses_default_port() {
        let client = Client::v2c("127.0.0.1").connect().await.unwrap();
        assert_eq!(client.peer_addr(), "127.0.0.1:161".parse().unwrap());
    }
}
