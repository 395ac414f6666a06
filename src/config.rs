//! Runtime configuration: the tunable-constants table plus the feature
//! gates, as ordinary fields instead of compile-time `#if`s.
//!
//! Follows an `XxxConfigInput { Option<T> } -> XxxConfig` merge pattern,
//! collapsed to a single level since the whole tunable set here is small
//! enough not to warrant a per-subsystem split.

use serde::{Deserialize, Serialize};

/// Fully-resolved runtime configuration for a `mobirpl-core` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // ─── Zone classifier ───────────────────────────────────────────────
    /// White/gray RSSI boundary, dBm.
    pub rssi_low_threshold: i16,
    /// Hysteresis band, dB.
    pub rssi_difference_hysteresis: i16,

    // ─── Connectivity management ────────────────────────────────────────
    /// Consecutive NOACKs before a parent is blackened.
    pub link_loss_threshold: u8,
    /// Divisor used to derive `probe_interval` from `timeout_period_current`.
    pub probing_denominator: u8,

    // ─── Mobility EWMA ───────────────────────────────────────────────────
    /// Fixed-point scale (`S`).
    pub mobility_scale: u32,
    /// EWMA weight (`alpha`), in the same fixed-point scale.
    pub mobility_alpha: u32,
    /// Metric threshold below which the node classifies itself MOBILE.
    pub stability_threshold: u32,

    // ─── Trickle DIO ─────────────────────────────────────────────────────
    pub dio_intmin: u8,
    pub dio_intdoubl: u8,
    pub dio_redundancy: u16,
    /// RPL_DIS_INTERVAL equivalent, in seconds.
    pub dis_interval_s: u16,

    // ─── DAO ─────────────────────────────────────────────────────────────
    /// `RPL_DAO_LATENCY` equivalent, in milliseconds.
    pub dao_latency_ms: u32,
    pub default_lifetime: u8,
    pub lifetime_unit_s: u16,
    /// Per-parent probing expiration window, in seconds (`RPL_WITH_PROBING`).
    pub probing_expiration_s: u32,

    // ─── Feature gates ───────────────────────────────────────────────────
    pub detect_mobility: bool,
    pub manage_connectivity: bool,
    pub unicast_probe: bool,
    pub proactive_discover: bool,
    /// Independent of `unicast_probe` — the generic per-parent prober from
    /// the original `RPL_WITH_PROBING` build option.
    pub generic_probing: bool,
    pub leaf_only: bool,
    pub collect_stats: bool,
    /// Downward-route mode; only `Storing` and `Feather` are modeled
    /// (non-storing mode downward routing is out of scope).
    pub routing_mode: RoutingMode,
}

/// `RPL_MODE_*` — recognized for config-parsing compatibility with the
/// original deployments' MOP setting. `StoringMulticast` is accepted but
/// behaves identically to `Storing` here: multicast-route iteration is an
/// explicit non-goal, so `node::NodeContext::handle_dao_timer` never
/// branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Storing,
    StoringMulticast,
    /// Passive mode: DAO scheduling is a no-op.
    Feather,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rssi_low_threshold: -83,
            rssi_difference_hysteresis: 4,

            link_loss_threshold: 2,
            probing_denominator: 3, // LINK_LOSS_THRESHOLD + 1

            mobility_scale: 100,
            mobility_alpha: 70,
            stability_threshold: 60 * 2 * 100,

            dio_intmin: 12,
            dio_intdoubl: 8,
            dio_redundancy: 10,
            dis_interval_s: 60,

            dao_latency_ms: 4000,
            default_lifetime: 30,
            lifetime_unit_s: 60,
            probing_expiration_s: 120,

            detect_mobility: true,
            manage_connectivity: true,
            unicast_probe: true,
            proactive_discover: true,
            generic_probing: false,
            leaf_only: false,
            collect_stats: false,
            routing_mode: RoutingMode::Storing,
        }
    }
}

impl Config {
    /// `MINIMUM_INTCURR` — lower bound of the per-parent lifetime exponent,
    /// reached immediately on a MOBILE classification.
    pub fn minimum_intcurr(&self) -> u8 {
        self.dio_intmin + 2
    }

    /// `MAXIMUM_INTCURR` — upper bound the exponent saturates at while
    /// STATIC.
    pub fn maximum_intcurr(&self) -> u8 {
        self.dio_intmin + self.dio_intdoubl
    }

    /// `INITIAL_INTCURR` — the value `reset_mobirpl` seeds on (re)join.
    pub fn initial_intcurr(&self) -> u8 {
        self.maximum_intcurr()
    }

    pub fn probe_interval_from(&self, timeout_period_current: u16) -> u16 {
        timeout_period_current / self.probing_denominator as u16
    }
}

/// Partially-specified configuration as loaded from TOML — every field
/// optional, merged onto [`Config::default()`] by [`ConfigInput::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigInput {
    pub rssi_low_threshold: Option<i16>,
    pub rssi_difference_hysteresis: Option<i16>,
    pub link_loss_threshold: Option<u8>,
    pub probing_denominator: Option<u8>,
    pub mobility_scale: Option<u32>,
    pub mobility_alpha: Option<u32>,
    pub stability_threshold: Option<u32>,
    pub dio_intmin: Option<u8>,
    pub dio_intdoubl: Option<u8>,
    pub dio_redundancy: Option<u16>,
    pub dis_interval_s: Option<u16>,
    pub dao_latency_ms: Option<u32>,
    pub default_lifetime: Option<u8>,
    pub lifetime_unit_s: Option<u16>,
    pub probing_expiration_s: Option<u32>,
    pub detect_mobility: Option<bool>,
    pub manage_connectivity: Option<bool>,
    pub unicast_probe: Option<bool>,
    pub proactive_discover: Option<bool>,
    pub generic_probing: Option<bool>,
    pub leaf_only: Option<bool>,
    pub collect_stats: Option<bool>,
    pub routing_mode: Option<RoutingMode>,
}

impl ConfigInput {
    /// Parse a TOML document into a [`Config`], falling back to defaults
    /// field by field.
    pub fn from_toml_str(s: &str) -> Result<Config, toml::de::Error> {
        let input: ConfigInput = toml::from_str(s)?;
        Ok(input.resolve())
    }

    pub fn resolve(self) -> Config {
        let d = Config::default();
        Config {
            rssi_low_threshold: self.rssi_low_threshold.unwrap_or(d.rssi_low_threshold),
            rssi_difference_hysteresis: self
                .rssi_difference_hysteresis
                .unwrap_or(d.rssi_difference_hysteresis),
            link_loss_threshold: self.link_loss_threshold.unwrap_or(d.link_loss_threshold),
            probing_denominator: self.probing_denominator.unwrap_or(d.probing_denominator),
            mobility_scale: self.mobility_scale.unwrap_or(d.mobility_scale),
            mobility_alpha: self.mobility_alpha.unwrap_or(d.mobility_alpha),
            stability_threshold: self.stability_threshold.unwrap_or(d.stability_threshold),
            dio_intmin: self.dio_intmin.unwrap_or(d.dio_intmin),
            dio_intdoubl: self.dio_intdoubl.unwrap_or(d.dio_intdoubl),
            dio_redundancy: self.dio_redundancy.unwrap_or(d.dio_redundancy),
            dis_interval_s: self.dis_interval_s.unwrap_or(d.dis_interval_s),
            dao_latency_ms: self.dao_latency_ms.unwrap_or(d.dao_latency_ms),
            default_lifetime: self.default_lifetime.unwrap_or(d.default_lifetime),
            lifetime_unit_s: self.lifetime_unit_s.unwrap_or(d.lifetime_unit_s),
            probing_expiration_s: self
                .probing_expiration_s
                .unwrap_or(d.probing_expiration_s),
            detect_mobility: self.detect_mobility.unwrap_or(d.detect_mobility),
            manage_connectivity: self
                .manage_connectivity
                .unwrap_or(d.manage_connectivity),
            unicast_probe: self.unicast_probe.unwrap_or(d.unicast_probe),
            proactive_discover: self.proactive_discover.unwrap_or(d.proactive_discover),
            generic_probing: self.generic_probing.unwrap_or(d.generic_probing),
            leaf_only: self.leaf_only.unwrap_or(d.leaf_only),
            collect_stats: self.collect_stats.unwrap_or(d.collect_stats),
            routing_mode: self.routing_mode.unwrap_or(d.routing_mode),
        }
    }
}
