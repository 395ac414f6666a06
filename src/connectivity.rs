//! # Connectivity Manager
//!
//! The per-second sweep that keeps parent lifetimes, link-loss counts, and
//! discovery cadence honest. Structured as four ordered passes over the
//! parent arena rather than one monolithic loop.
//!
//! Root nodes skip this entirely — the reference checks `node_id == ROOT_ID`
//! at the top of `mobirpl_manage_connectivity` and the discovery handlers.

use crate::config::Config;
use crate::ids::{DagId, ParentId};
use crate::mobility::Mobility;
use crate::parent::Zone;
use crate::topology::Topology;

/// Discovery/timeout bookkeeping that lives alongside, but outside, the
/// parent arena — mirrors the file-scope `static` counters in
/// `rpl-timers.c` (`mobirpl_timeout_period_current`, `next_reactive_discovery`,
/// ...), collected here as one struct.
#[derive(Debug, Clone)]
pub struct ConnectivityState {
    pub timeout_period_intcurr: u8,
    pub timeout_period_current: u16,
    pub probe_interval: u16,
    pub probe_num: u32,

    pub proactive_discovery_flag: bool,
    pub next_proactive_discovery: u16,
    pub proactive_discovery_num: u32,

    pub first_reactive_discovery: bool,
    pub next_reactive_discovery: u16,
    pub reactive_discovery_num: u32,
}

impl ConnectivityState {
    /// Seed the way `reset_mobirpl` does: `intcurr` starts at
    /// `initial_intcurr()` (== `maximum_intcurr()`), and the probe interval
    /// is derived from it immediately.
    pub fn new(config: &Config) -> Self {
        let intcurr = config.initial_intcurr();
        let timeout_period_current = ((1u32 << intcurr) / 1000) as u16;
        let probe_interval = config.probe_interval_from(timeout_period_current);
        Self {
            timeout_period_intcurr: intcurr,
            timeout_period_current,
            probe_interval,
            probe_num: 0,
            proactive_discovery_flag: false,
            next_proactive_discovery: 0,
            proactive_discovery_num: 0,
            first_reactive_discovery: true,
            next_reactive_discovery: 0,
            reactive_discovery_num: 0,
        }
    }

    /// Re-seed on `reset_mobirpl` without touching
    /// the discovery counters, which the reference leaves alone on reset.
    pub fn reset(&mut self, config: &Config) {
        let fresh = Self::new(config);
        self.timeout_period_intcurr = fresh.timeout_period_intcurr;
        self.timeout_period_current = fresh.timeout_period_current;
        self.probe_interval = fresh.probe_interval;
    }
}

/// Host action requested by a connectivity pass — the caller is responsible
/// for actually sending the frame — DIS/DIO emission lives outside the
/// core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryAction {
    /// Multicast DIS (proactive or reactive discovery).
    Multicast,
    /// Unicast DIS to the preferred parent (Pass 4 probing).
    Unicast(ParentId),
}

/// Runs the four ordered passes plus proactive/reactive discovery over one
/// DAG's parent set. One call per second, skipped entirely for
/// the root node.
pub struct ConnectivityManager;

impl ConnectivityManager {
    /// Pass 1 — blacken any parent with `link_loss_count >= threshold`.
    fn sweep_link_loss(topology: &mut Topology, dag: DagId, config: &Config) {
        let ids: Vec<ParentId> = topology.parent_ids_in_dag(dag).collect();
        for id in ids {
            let p = topology.parent_mut(id);
            if p.link_loss_count >= config.link_loss_threshold && p.zone < Zone::Black {
                tracing::debug!(parent = %id, "r:cl|{}", id);
                p.zone = Zone::Black;
                p.lifetime = 0;
                p.flags.link_metric_valid = false;
                p.flags.updated = true;
            }
        }
    }

    /// Pass 2 — decay every parent's lifetime by one, blackening at 0.
    fn sweep_lifetime(topology: &mut Topology, dag: DagId) {
        let ids: Vec<ParentId> = topology.parent_ids_in_dag(dag).collect();
        for id in ids {
            let p = topology.parent_mut(id);
            if p.lifetime >= 1 {
                p.lifetime -= 1;
                if p.lifetime == 0 {
                    tracing::debug!(parent = %id, "r:to|{}", id);
                    p.zone = Zone::Black;
                    p.flags.link_metric_valid = false;
                    p.flags.updated = true;
                }
            }
        }
    }

    /// Pass 3 — recompute `timeout_period_current`/`probe_interval` from
    /// the mobility classification, rescaling every parent's lifetime to
    /// match. Only runs when the mobility detector produced a fresh metric
    /// this tick (`mobility_update_flag`).
    fn recompute_timeout_period(
        state: &mut ConnectivityState,
        topology: &mut Topology,
        dag: DagId,
        mobility: Mobility,
        config: &Config,
    ) {
        let last_intcurr = state.timeout_period_intcurr;

        state.timeout_period_intcurr = match mobility {
            Mobility::Mobile => config.minimum_intcurr(),
            Mobility::Static => {
                if state.timeout_period_intcurr < config.maximum_intcurr() {
                    state.timeout_period_intcurr + 1
                } else {
                    state.timeout_period_intcurr
                }
            }
        };

        state.timeout_period_current = ((1u32 << state.timeout_period_intcurr) / 1000) as u16;
        state.probe_interval = config.probe_interval_from(state.timeout_period_current);

        tracing::debug!("r:l|{}|{}", last_intcurr, state.timeout_period_intcurr);

        let ids: Vec<ParentId> = topology.parent_ids_in_dag(dag).collect();
        match last_intcurr.cmp(&state.timeout_period_intcurr) {
            std::cmp::Ordering::Greater => {
                let difference = last_intcurr - state.timeout_period_intcurr;
                for id in ids {
                    let p = topology.parent_mut(id);
                    if p.lifetime != 0 {
                        p.lifetime = (p.lifetime >> difference) + 1;
                    }
                }
            }
            std::cmp::Ordering::Less => {
                let difference = state.timeout_period_intcurr - last_intcurr;
                for id in ids {
                    let p = topology.parent_mut(id);
                    if p.lifetime != 0 {
                        let shifted = p.lifetime << difference;
                        p.lifetime = shifted.min(state.timeout_period_current);
                    }
                }
            }
            std::cmp::Ordering::Equal => {}
        }
    }

    /// Pass 4 — probe the preferred parent over unicast once its lifetime
    /// has drifted `probe_interval` seconds below the full timeout period.
    fn unicast_probe(
        state: &mut ConnectivityState,
        topology: &Topology,
        dag: DagId,
    ) -> Option<DiscoveryAction> {
        let preferred = topology.dag(dag).preferred_parent?;
        let p = topology.get_parent(preferred)?;
        if state.probe_interval == 0 {
            return None;
        }
        if state.timeout_period_current > p.lifetime
            && p.lifetime > 0
            && (state.timeout_period_current - p.lifetime) % state.probe_interval == 0
        {
            state.probe_num += 1;
            tracing::debug!("r:p|{}", state.probe_num);
            return Some(DiscoveryAction::Unicast(preferred));
        }
        None
    }

    /// One full second's worth of connectivity management for one DAG.
    /// Returns any unicast probe the caller should send. No-op (returns
    /// `None`) for the root node.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        state: &mut ConnectivityState,
        topology: &mut Topology,
        dag: DagId,
        mobility: Mobility,
        mobility_update_flag: bool,
        config: &Config,
        is_root: bool,
    ) -> Option<DiscoveryAction> {
        if is_root || !config.manage_connectivity {
            return None;
        }

        Self::sweep_link_loss(topology, dag, config);
        Self::sweep_lifetime(topology, dag);

        if mobility_update_flag {
            Self::recompute_timeout_period(state, topology, dag, mobility, config);
        }

        if config.unicast_probe {
            Self::unicast_probe(state, topology, dag)
        } else {
            None
        }
    }

    /// Count of parents in `dag` whose zone is not BLACK —
    /// `mobirpl_non_black_parent_num`, used by the reactive-discovery latch.
    pub fn non_black_parent_num(topology: &Topology, dag: DagId) -> usize {
        topology
            .parent_ids_in_dag(dag)
            .filter(|&id| topology.parent(id).zone != Zone::Black)
            .count()
    }

    /// Proactive (multicast) discovery countdown.
    /// No-op for the root node or when disabled.
    pub fn proactive_discovery(
        state: &mut ConnectivityState,
        config: &Config,
        is_root: bool,
    ) -> Option<DiscoveryAction> {
        if is_root || !config.proactive_discover {
            return None;
        }

        if state.next_proactive_discovery > 0 {
            state.next_proactive_discovery -= 1;
            state.proactive_discovery_flag = false;
            return None;
        }

        if state.proactive_discovery_flag {
            state.proactive_discovery_num += 1;
            tracing::debug!(
                "r:dc|p|{}|{}",
                state.proactive_discovery_num,
                state.reactive_discovery_num
            );
            state.next_proactive_discovery = state.probe_interval;
            state.proactive_discovery_flag = false;
            return Some(DiscoveryAction::Multicast);
        }
        None
    }

    /// Reactive discovery latch: fires a multicast DIS the instant every
    /// parent goes BLACK, then escalates to a full `reset_mobirpl` if the
    /// node stays parentless past `probe_interval`/`RPL_DIS_INTERVAL` seconds
    /// Returns `(action, should_reset)`.
    pub fn reactive_discovery(
        state: &mut ConnectivityState,
        topology: &Topology,
        dag: DagId,
        config: &Config,
        is_root: bool,
    ) -> (Option<DiscoveryAction>, bool) {
        if is_root {
            return (None, false);
        }

        if Self::non_black_parent_num(topology, dag) == 0 {
            let mut action = None;
            if state.first_reactive_discovery {
                state.reactive_discovery_num += 1;
                tracing::debug!(
                    "r:dc|r|{}|{}",
                    state.proactive_discovery_num,
                    state.reactive_discovery_num
                );
                action = Some(DiscoveryAction::Multicast);
                state.first_reactive_discovery = false;
                state.next_reactive_discovery = 0;
            } else {
                state.next_reactive_discovery += 1;
            }

            if state.next_reactive_discovery >= state.probe_interval
                || state.next_reactive_discovery >= config.dis_interval_s
            {
                state.next_reactive_discovery = 0;
                state.reactive_discovery_num += 1;
                tracing::debug!(
                    "r:dc|r|{}|{}",
                    state.proactive_discovery_num,
                    state.reactive_discovery_num
                );
                return (Some(DiscoveryAction::Multicast), true);
            }
            (action, false)
        } else {
            state.first_reactive_discovery = true;
            state.next_reactive_discovery = 0;
            (None, false)
        }
    }
}
