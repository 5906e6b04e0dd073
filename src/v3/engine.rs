//! Authoritative engine state and Report PDU classification.

use bytes::Bytes;
use tokio::time::Instant;

use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};

/// snmpEngineTime is 31 bits (RFC 3414 §2.2.1).
pub const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// usmStats subtree; Report varbinds are `usmStats.<n>.0`.
const USM_STATS: [u32; 9] = [1, 3, 6, 1, 6, 3, 15, 1, 1];

/// What the target engine told us during discovery or in a later Report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    /// Local clock reading when `engine_time` was learned.
    pub synced_at: Instant,
}

impl EngineState {
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
        }
    }

    /// Engine time now, extrapolated with the local monotonic clock.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = u32::try_from(self.synced_at.elapsed().as_secs()).unwrap_or(u32::MAX);
        self.engine_time
            .saturating_add(elapsed)
            .min(MAX_ENGINE_TIME)
    }

    /// Adopt newer boots/time from an authenticated message or a
    /// notInTimeWindow Report. Stale values are ignored.
    pub fn resync(&mut self, engine_boots: u32, engine_time: u32) -> bool {
        let newer = engine_boots > self.engine_boots
            || (engine_boots == self.engine_boots && engine_time > self.estimated_time());
        if newer {
            self.engine_boots = engine_boots;
            self.engine_time = engine_time;
            self.synced_at = Instant::now();
        }
        newer
    }

    /// Take boots/time as given, even if older than the current estimate.
    /// Used for notInTimeWindow Reports, where the agent's clock wins.
    pub fn reset_time(&mut self, engine_boots: u32, engine_time: u32) {
        self.engine_boots = engine_boots;
        self.engine_time = engine_time;
        self.synced_at = Instant::now();
    }
}

/// Meaning of a Report PDU, taken from its first usmStats varbind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    UnsupportedSecLevel,
    NotInTimeWindow,
    UnknownUserName,
    UnknownEngineId,
    WrongDigest,
    DecryptionError,
    /// Some other counter (e.g. snmpUnknownPDUHandlers).
    Other(Option<Oid>),
}

pub fn classify_report(pdu: &Pdu) -> Option<ReportKind> {
    if pdu.pdu_type != PduType::Report {
        return None;
    }
    let usm_stats = Oid::from_slice(&USM_STATS);
    let kind = pdu
        .varbinds
        .iter()
        .find_map(|vb| match vb.oid.suffix(&usm_stats)? {
            [1, 0] => Some(ReportKind::UnsupportedSecLevel),
            [2, 0] => Some(ReportKind::NotInTimeWindow),
            [3, 0] => Some(ReportKind::UnknownUserName),
            [4, 0] => Some(ReportKind::UnknownEngineId),
            [5, 0] => Some(ReportKind::WrongDigest),
            [6, 0] => Some(ReportKind::DecryptionError),
            _ => None,
        })
        .unwrap_or_else(|| ReportKind::Other(pdu.varbinds.first().map(|vb| vb.oid.clone())));
    Some(kind)
}
