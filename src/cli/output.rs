//! Result formatting for the `syno-*` tools.

use crate::cli::args::OutputFormat;
use crate::{Error, Value, VarBind, Version};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::time::Duration;

/// GET or walk results, as serialized for `--format json`.
#[derive(Debug, Serialize)]
pub struct OperationResult {
    pub target: String,
    pub version: String,
    pub results: Vec<VarBindResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_ms: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct VarBindResult {
    pub oid: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

/// Collector output: family name to its samples.
#[derive(Debug, Serialize)]
pub struct CollectResult {
    pub target: String,
    pub families: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_ms: Option<f64>,
}

pub struct OutputContext {
    pub format: OutputFormat,
    pub show_timing: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            show_timing: false,
        }
    }

    /// Write varbinds to stdout.
    pub fn write_results(
        &self,
        target: SocketAddr,
        version: Version,
        varbinds: &[VarBind],
        elapsed: Option<Duration>,
    ) -> io::Result<()> {
        let result = OperationResult {
            target: target.to_string(),
            version: version.to_string(),
            results: varbinds.iter().map(format_varbind).collect(),
            timing_ms: elapsed.map(as_millis),
        };
        let mut stdout = io::stdout().lock();
        match self.format {
            OutputFormat::Human => self.write_human(&mut stdout, &result),
            OutputFormat::Json => write_json(&mut stdout, &result),
        }
    }

    /// Write collector samples to stdout as `key value` lines or JSON.
    pub fn write_samples(&self, result: &CollectResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        match self.format {
            OutputFormat::Human => self.write_samples_human(&mut stdout, result),
            OutputFormat::Json => write_json(&mut stdout, result),
        }
    }

    fn write_human<W: Write>(&self, w: &mut W, result: &OperationResult) -> io::Result<()> {
        for vb in &result.results {
            write!(w, "{} = {}: ", vb.oid, vb.value_type)?;
            if let Some(ref formatted) = vb.formatted {
                writeln!(w, "{formatted}")?;
            } else {
                match &vb.value {
                    serde_json::Value::String(s) => writeln!(w, "\"{s}\"")?,
                    serde_json::Value::Null => writeln!(w)?,
                    other => writeln!(w, "{other}")?,
                }
            }
        }
        self.write_timing(w, result.timing_ms)
    }

    fn write_samples_human<W: Write>(&self, w: &mut W, result: &CollectResult) -> io::Result<()> {
        for samples in result.families.values() {
            for (key, value) in samples {
                writeln!(w, "{key} {value}")?;
            }
        }
        self.write_timing(w, result.timing_ms)
    }

    fn write_timing<W: Write>(&self, w: &mut W, timing_ms: Option<f64>) -> io::Result<()> {
        if self.show_timing
            && let Some(ms) = timing_ms
        {
            writeln!(w, "\nTiming: {ms:.1}ms")?;
        }
        Ok(())
    }
}

fn write_json<W: Write, T: Serialize>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(w, "{json}")
}

fn as_millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_varbind(vb: &VarBind) -> VarBindResult {
    let (value_type, value, formatted) = format_value(&vb.value);
    VarBindResult {
        oid: vb.oid.to_string(),
        value_type,
        value,
        formatted,
    }
}

/// (type name, JSON value, display override)
fn format_value(value: &Value) -> (String, serde_json::Value, Option<String>) {
    let exception = |name: &str, text: &str| (name.to_string(), serde_json::Value::Null, Some(text.to_string()));
    match value {
        Value::Integer(v) => ("INTEGER".into(), (*v).into(), None),
        Value::OctetString(bytes) if is_printable(bytes) => (
            "STRING".into(),
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
            None,
        ),
        Value::OctetString(bytes) => (
            "Hex-STRING".into(),
            serde_json::Value::String(hex_string(bytes)),
            Some(spaced_hex(bytes)),
        ),
        Value::Null => ("NULL".into(), serde_json::Value::Null, None),
        Value::ObjectIdentifier(oid) => ("OID".into(), oid.to_string().into(), None),
        Value::IpAddress(octets) => (
            "IpAddress".into(),
            std::net::Ipv4Addr::from(*octets).to_string().into(),
            None,
        ),
        Value::Counter32(v) => ("Counter32".into(), (*v).into(), None),
        Value::Gauge32(v) => ("Gauge32".into(), (*v).into(), None),
        Value::TimeTicks(v) => (
            "TimeTicks".into(),
            (*v).into(),
            Some(format!("({v}) {}", format_timeticks(*v))),
        ),
        Value::Opaque(bytes) => (
            "Opaque".into(),
            serde_json::Value::String(hex_string(bytes)),
            Some(spaced_hex(bytes)),
        ),
        Value::Counter64(v) => ("Counter64".into(), (*v).into(), None),
        Value::NoSuchObject => exception("NoSuchObject", "No Such Object available"),
        Value::NoSuchInstance => exception("NoSuchInstance", "No Such Instance currently exists"),
        Value::EndOfMibView => exception("EndOfMibView", "No more variables left in this MIB View"),
        Value::Unknown { tag, data } => (
            format!("Unknown(0x{tag:02X})"),
            serde_json::Value::String(hex_string(data)),
            Some(spaced_hex(data)),
        ),
    }
}

fn is_printable(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok_and(|s| {
        s.chars()
            .all(|c| c.is_ascii_graphic() || c.is_ascii_whitespace())
    })
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn spaced_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hundredths of a second as `[Nd ]HH:MM:SS.cc`.
fn format_timeticks(centiseconds: u32) -> String {
    let total_seconds = centiseconds / 100;
    let cs = centiseconds % 100;
    let days = total_seconds / 86400;
    let hours = (total_seconds % 86400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}.{cs:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{cs:02}")
    }
}

/// One-line error on stderr.
pub fn write_error(err: &Error) {
    eprintln!("Error: {err}");
}
