//! # Parent Record & Link-Quality Classifier
//!
//! Per-candidate-parent state and the RSSI-driven zone transition with
//! hysteresis. Modeled the way a link lifecycle state machine tracks a
//! link's phase from consecutive good/bad observations — except zone
//! transitions here are driven by a single RSSI sample rather than a
//! run-length counter, and BLACK is only ever entered by the connectivity
//! manager, never by this classifier.
//!
//! ```text
//!           rssi >= T (+H if already >= GRAY)
//!   WHITE ─────────────────────────────────▶ WHITE
//!     │                                        ▲
//!     │ rssi < T                                │ rssi >= T + H
//!     ▼                                        │
//!   GRAY ───────────────────────────────────────┘
//!     │
//!     │ link_loss_count >= threshold, or lifetime expiry
//!     │ (connectivity manager only — never this classifier)
//!     ▼
//!   BLACK
//! ```

use quanta::Instant;
use std::net::Ipv6Addr;

use crate::config::Config;
use crate::ids::DagId;

/// Link quality classification, ordered WHITE < GRAY < BLACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Zone {
    White = 0,
    Gray = 1,
    Black = 2,
}

/// Outcome of a MAC-layer unicast transmission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Ok,
    NoAck,
}

/// `RPL_PARENT_FLAG_*` bitset, represented as plain fields rather than a
/// packed bitset crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParentFlags {
    pub link_metric_valid: bool,
    pub updated: bool,
}

/// Sentinel RSSI used before any sample has been observed.
pub const RSSI_SENTINEL: i16 = -100;

/// A candidate upstream neighbor.
#[derive(Debug, Clone)]
pub struct ParentRecord {
    /// Link-local address — immutable after creation.
    pub addr: Ipv6Addr,
    /// Owning DAG, by arena id (weak relation, not ownership).
    pub dag: DagId,
    pub rank: u16,
    pub rssi: i16,
    pub zone: Zone,
    pub flags: ParentFlags,
    pub link_loss_count: u8,
    pub lifetime: u16,
    /// Neighbor's self-declared mobility, carried in its DIO option: 0 or 1.
    pub mobility: u8,
    pub last_tx_time: Instant,
}

impl ParentRecord {
    pub fn new(addr: Ipv6Addr, dag: DagId, rank: u16, now: Instant) -> Self {
        Self {
            addr,
            dag,
            rank,
            rssi: RSSI_SENTINEL,
            zone: Zone::White,
            flags: ParentFlags::default(),
            link_loss_count: 0,
            lifetime: 0,
            mobility: 0,
            last_tx_time: now,
        }
    }

    /// Apply the hysteresis-aware zone transition from a fresh RSSI sample
    /// Never produces `Zone::Black` — that transition belongs to the
    /// connectivity manager.
    pub fn classify_zone(current: Zone, rssi: i16, config: &Config) -> Zone {
        let t = config.rssi_low_threshold;
        let h = config.rssi_difference_hysteresis;
        let threshold = if current >= Zone::Gray { t + h } else { t };
        if rssi >= threshold {
            Zone::White
        } else {
            Zone::Gray
        }
    }

    /// Apply a MAC TX outcome callback.
    ///
    /// Returns `false` without mutating anything if the caller's neighbor
    /// lookup found no entry — callers are expected to have already
    /// checked `Host::has_neighbor_entry` and to skip calling this at all
    /// in that case; this mirrors the reference's early return but is kept
    /// as a defensive no-op here too.
    pub fn on_mac_tx_outcome(
        &mut self,
        status: TxStatus,
        rssi: i16,
        config: &Config,
        manage_connectivity: bool,
    ) {
        let sampled_rssi = match status {
            TxStatus::NoAck => self.rssi,
            TxStatus::Ok => rssi,
        };
        self.rssi = sampled_rssi;
        self.zone = Self::classify_zone(self.zone, self.rssi, config);
        self.flags.link_metric_valid = true;

        if manage_connectivity {
            match status {
                TxStatus::Ok => self.link_loss_count = 0,
                TxStatus::NoAck => self.link_loss_count = self.link_loss_count.saturating_add(1),
            }
        }
    }

    /// Apply an incoming unicast reception: identical zone logic, but
    /// `link_loss_count` always resets to 0.
    pub fn on_unicast_rx(&mut self, rssi: i16, config: &Config) {
        self.rssi = rssi;
        self.zone = Self::classify_zone(self.zone, self.rssi, config);
        self.flags.link_metric_valid = true;
        self.link_loss_count = 0;
    }
}
