//! DiskStation metric families.
//!
//! Each [`Family`] reads a fixed set of objects from the Synology and
//! UCD-SNMP MIBs and returns them as named `f64` samples, keyed the way
//! the exporter names them (`system-temperature`, `disk.disk-0.temperature`,
//! `load.shortterm`, ...).
//!
//! ```rust,no_run
//! # use syno_snmp::{Client, Family};
//! # async fn example() -> syno_snmp::Result<()> {
//! let mut client = Client::v1("diskstation.lan").connect().await?;
//! for family in Family::ALL {
//!     for (key, value) in family.collect(&mut client).await? {
//!         println!("{key} {value}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::varbind::VarBind;
use crate::version::Version;

/// Synology system MIB (`SYNOLOGY-SYSTEM-MIB::synoSystem`).
const SYNO_SYSTEM: &[u32] = &[1, 3, 6, 1, 4, 1, 6574, 1];
/// `SYNOLOGY-DISK-MIB::diskTemperature`.
const SYNO_DISK_TEMPERATURE: &[u32] = &[1, 3, 6, 1, 4, 1, 6574, 2, 1, 1, 6];
const UCD_MEMORY: &[u32] = &[1, 3, 6, 1, 4, 1, 2021, 4];
const UCD_LOAD: &[u32] = &[1, 3, 6, 1, 4, 1, 2021, 10, 1, 3];
const UCD_SYSTEM_STATS: &[u32] = &[1, 3, 6, 1, 4, 1, 2021, 11];
const IF_HC_IN_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6];
const IF_HC_OUT_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 10];
const IF_IN_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 10];
const IF_OUT_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 16];

/// Scalar objects read with one GET: (sample key, arcs below the base).
type ScalarTable = &'static [(&'static str, &'static [u32])];

const SYSTEM_SCALARS: ScalarTable = &[
    ("system-status", &[1, 0]),
    ("system-temperature", &[2, 0]),
    ("system-powerStatus", &[3, 0]),
    ("system-systemFanStatus", &[4, 1, 0]),
    ("system-cpuFanStatus", &[4, 2, 0]),
    ("system-upgradeAvailable", &[5, 4, 0]),
];

const MEMORY_SCALARS: ScalarTable = &[
    ("mem-total-swap", &[3, 0]),
    ("mem-avail-swap", &[4, 0]),
    ("mem-total-real", &[5, 0]),
    ("mem-avail-real", &[6, 0]),
    ("mem-total-free", &[11, 0]),
    ("mem-shared", &[13, 0]),
    ("mem-buffer", &[14, 0]),
    ("mem-cached", &[15, 0]),
];

// laLoad.{1,2,3}: 1, 5 and 15 minute averages as text.
const LOAD_SCALARS: ScalarTable = &[
    ("load.shortterm", &[1]),
    ("load.midterm", &[2]),
    ("load.longterm", &[3]),
];

// ssCpuRaw* counters.
const CPU_SCALARS: ScalarTable = &[
    ("cpu-0.cpu-user", &[50, 0]),
    ("cpu-0.cpu-nice", &[51, 0]),
    ("cpu-0.cpu-system", &[52, 0]),
    ("cpu-0.cpu-idle", &[53, 0]),
    ("cpu-0.cpu-wait", &[54, 0]),
    ("cpu-0.cpu-kernel", &[55, 0]),
    ("cpu-0.cpu-interrupt", &[56, 0]),
];

/// A group of related metrics fetched together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    Disk,
    Load,
    Cpu,
    Mem,
    Net,
    System,
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::Disk,
        Family::Load,
        Family::Cpu,
        Family::Mem,
        Family::Net,
        Family::System,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Family::Disk => "disk",
            Family::Load => "load",
            Family::Cpu => "cpu",
            Family::Mem => "mem",
            Family::Net => "net",
            Family::System => "system",
        }
    }

    /// Fetch this family's samples.
    ///
    /// Fails as a whole: a missing or non-numeric object is an
    /// [`Error::Collect`] naming the sample key.
    pub async fn collect<T: Transport>(
        self,
        client: &mut Client<T>,
    ) -> Result<BTreeMap<String, f64>> {
        tracing::debug!(target: "syno_snmp::collector", family = self.name(), "collecting");
        let result = match self {
            Family::System => scalars(client, SYNO_SYSTEM, SYSTEM_SCALARS).await,
            Family::Mem => scalars(client, UCD_MEMORY, MEMORY_SCALARS).await,
            Family::Load => scalars(client, UCD_LOAD, LOAD_SCALARS).await,
            Family::Cpu => scalars(client, UCD_SYSTEM_STATS, CPU_SCALARS).await,
            Family::Disk => disk_temperatures(client).await,
            Family::Net => network_totals(client).await,
        };
        match &result {
            Ok(samples) => tracing::debug!(
                target: "syno_snmp::collector",
                family = self.name(),
                samples = samples.len(),
                "collected"
            ),
            Err(e) => tracing::debug!(
                target: "syno_snmp::collector",
                family = self.name(),
                error = %e,
                "collection failed"
            ),
        }
        result
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Family::ALL
            .into_iter()
            .find(|family| family.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Config(format!("unknown metric family '{s}'")))
    }
}

fn numeric(key: &str, vb: &VarBind) -> Result<f64> {
    vb.value.as_f64().ok_or_else(|| {
        Error::collect(key, format!("{} is not numeric: {}", vb.oid, vb.value))
    })
}

async fn scalars<T: Transport>(
    client: &mut Client<T>,
    base: &[u32],
    table: ScalarTable,
) -> Result<BTreeMap<String, f64>> {
    let base = Oid::from_slice(base);
    let oids: Vec<Oid> = table
        .iter()
        .map(|(_, arcs)| Oid::new(base.arcs().iter().chain(arcs.iter()).copied()))
        .collect();
    let varbinds = client.get(&oids).await?;

    let mut samples = BTreeMap::new();
    for ((key, _), oid) in table.iter().zip(&oids) {
        let vb = varbinds
            .iter()
            .find(|vb| &vb.oid == oid)
            .ok_or_else(|| Error::collect(*key, format!("{oid} missing from response")))?;
        samples.insert((*key).to_string(), numeric(key, vb)?);
    }
    Ok(samples)
}

async fn disk_temperatures<T: Transport>(client: &mut Client<T>) -> Result<BTreeMap<String, f64>> {
    let root = Oid::from_slice(SYNO_DISK_TEMPERATURE);
    let mut walk = client.walk(root.clone());
    let mut samples = BTreeMap::new();
    while let Some(vb) = walk.next().await {
        let vb = vb?;
        let index = match vb.oid.suffix(&root) {
            Some([index]) => *index,
            _ => {
                tracing::debug!(target: "syno_snmp::collector", oid = %vb.oid, "skipping non-row OID");
                continue;
            }
        };
        let key = format!("disk.disk-{index}.temperature");
        let value = numeric(&key, &vb)?;
        samples.insert(key, value);
    }
    Ok(samples)
}

/// Sums the octet counters over every interface row.
///
/// v1 cannot carry Counter64, so v1 sessions read the 32-bit ifTable columns
/// instead of the ifXTable ones. A column with no rows is an error rather
/// than a zero reading.
async fn network_totals<T: Transport>(client: &mut Client<T>) -> Result<BTreeMap<String, f64>> {
    let columns = match client.version() {
        Version::V1 => [("net-in", IF_IN_OCTETS), ("net-out", IF_OUT_OCTETS)],
        _ => [("net-in", IF_HC_IN_OCTETS), ("net-out", IF_HC_OUT_OCTETS)],
    };
    let mut samples = BTreeMap::new();
    for (key, column) in columns {
        let root = Oid::from_slice(column);
        let rows = client.walk(root.clone()).collect().await?;
        if rows.is_empty() {
            return Err(Error::collect(key, format!("no rows under {root}")));
        }
        let mut total = 0.0;
        for vb in &rows {
            total += numeric(key, vb)?;
        }
        samples.insert(key.to_string(), total);
    }
    Ok(samples)
}
