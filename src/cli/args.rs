//! Argument structures shared by the `syno-*` tools.

use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::transport::UdpTransport;
use crate::v3::{AuthProtocol, PrivProtocol};
use crate::version::Version;

/// SNMP version as written on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SnmpVersion {
    /// SNMPv1 (default, as DSM ships it)
    #[default]
    #[value(name = "1")]
    V1,
    /// SNMPv2c
    #[value(name = "2c")]
    V2c,
    /// SNMPv3
    #[value(name = "3")]
    V3,
}

impl From<SnmpVersion> for Version {
    fn from(v: SnmpVersion) -> Self {
        match v {
            SnmpVersion::V1 => Version::V1,
            SnmpVersion::V2c => Version::V2c,
            SnmpVersion::V3 => Version::V3,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per result.
    #[default]
    Human,
    /// Pretty-printed JSON.
    Json,
}

/// Target and session settings.
#[derive(Debug, Parser)]
pub struct CommonArgs {
    /// DiskStation host or host:port (default port 161).
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// SNMP version: 1, 2c, or 3.
    #[arg(short = 'v', long = "snmp-version", default_value = "1")]
    pub snmp_version: SnmpVersion,

    /// Community string (v1/v2c).
    #[arg(short = 'c', long = "community", default_value = "public")]
    pub community: String,

    /// Total time budget per request, in seconds.
    #[arg(short = 't', long = "timeout", default_value = "2")]
    pub timeout: f64,

    /// Attempts after the first.
    #[arg(short = 'r', long = "retries", default_value = "3")]
    pub retries: u32,

    /// GETBULK max-repetitions for walks.
    #[arg(long = "max-repetitions", default_value = "10")]
    pub max_repetitions: u8,
}

impl CommonArgs {
    /// Timeout as a `Duration`; negative or non-finite input falls back to 2 s.
    pub fn timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::from_secs(2))
    }
}

/// SNMPv3 security arguments.
#[derive(Debug, Parser)]
pub struct V3Args {
    /// USM user name (implies -v 3).
    #[arg(short = 'u', long = "username")]
    pub username: Option<String>,

    /// Authentication protocol: MD5, SHA, SHA-256.
    #[arg(short = 'a', long = "auth-protocol")]
    pub auth_protocol: Option<AuthProtocol>,

    /// Authentication passphrase.
    #[arg(short = 'A', long = "auth-password")]
    pub auth_password: Option<String>,

    /// Privacy protocol: DES, AES.
    #[arg(short = 'x', long = "priv-protocol")]
    pub priv_protocol: Option<PrivProtocol>,

    /// Privacy passphrase.
    #[arg(short = 'X', long = "priv-password")]
    pub priv_password: Option<String>,
}

impl V3Args {
    pub fn is_v3(&self) -> bool {
        self.username.is_some()
    }

    /// Reject flag combinations that name no valid security level.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_none() {
            if self.auth_protocol.is_some() || self.priv_protocol.is_some() {
                return Err(Error::Config(
                    "--auth-protocol and --priv-protocol need --username".into(),
                ));
            }
            return Ok(());
        }
        if self.auth_protocol.is_some() && self.auth_password.is_none() {
            return Err(Error::Config("--auth-protocol needs --auth-password".into()));
        }
        if self.priv_protocol.is_some() {
            if self.auth_protocol.is_none() {
                return Err(Error::Config("privacy requires authentication".into()));
            }
            if self.priv_password.is_none() {
                return Err(Error::Config("--priv-protocol needs --priv-password".into()));
            }
        }
        Ok(())
    }
}

/// Output settings.
#[derive(Debug, Parser)]
pub struct OutputArgs {
    /// Output format: human or json.
    #[arg(short = 'O', long = "format", default_value = "human")]
    pub format: OutputFormat,

    /// Log protocol activity to stderr at debug level.
    #[arg(long = "verbose")]
    pub verbose: bool,

    /// Print elapsed time after the results.
    #[arg(long = "timing")]
    pub timing: bool,
}

impl OutputArgs {
    /// Install a stderr subscriber. `RUST_LOG` wins over `--verbose`.
    pub fn init_tracing(&self) {
        use tracing_subscriber::{EnvFilter, fmt};

        let default = if self.verbose {
            "syno_snmp=debug"
        } else {
            "syno_snmp=warn"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(self.verbose)
            .try_init();
    }
}

/// Effective version: `-u` forces v3.
pub fn effective_version(common: &CommonArgs, v3: &V3Args) -> Version {
    if v3.is_v3() {
        Version::V3
    } else {
        common.snmp_version.into()
    }
}

/// Build a connected client from validated arguments.
pub async fn connect(common: &CommonArgs, v3: &V3Args) -> Result<Client<UdpTransport>> {
    v3.validate()?;
    let timeout = common.timeout_duration();
    let target = common.target.as_str();

    let Some(username) = v3.username.as_deref() else {
        let builder = match common.snmp_version {
            SnmpVersion::V2c => Client::v2c(target),
            SnmpVersion::V1 => Client::v1(target),
            SnmpVersion::V3 => {
                return Err(Error::Config("SNMPv3 needs --username".into()));
            }
        };
        return builder
            .community(common.community.as_bytes())
            .timeout(timeout)
            .retries(common.retries)
            .max_repetitions(common.max_repetitions)
            .connect()
            .await;
    };

    let builder = Client::v3(target, username.to_owned())
        .timeout(timeout)
        .retries(common.retries)
        .max_repetitions(common.max_repetitions);

    match (v3.auth_protocol, v3.auth_password.as_deref()) {
        (None, _) => builder.connect().await,
        (Some(auth), Some(auth_pass)) => {
            let builder = builder.auth(auth, auth_pass);
            match (v3.priv_protocol, v3.priv_password.as_deref()) {
                (Some(privacy), Some(priv_pass)) => builder.privacy(privacy, priv_pass).connect().await,
                _ => builder.connect().await,
            }
        }
        (Some(_), None) => Err(Error::Config("--auth-protocol needs --auth-password".into())),
    }
}
