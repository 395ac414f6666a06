//! # Node Context
//!
//! Threads every global scalar the reference keeps as file-static state
//! (`pp_change_flag`, `mobirpl_timeout_period_current`, ...) into fields of
//! one struct, and exposes the three externally-driven entry points a host
//! event loop calls into: `on_mac_tx_outcome`, `on_unicast_rx`, and
//! `on_second_tick`.

use std::net::Ipv6Addr;

use rand::Rng;

use crate::config::Config;
use crate::connectivity::{ConnectivityManager, ConnectivityState, DiscoveryAction};
use crate::dao::{DaoLatency, DaoScheduler, ProbingScheduler};
use crate::host::{FrameSink, NeighborTable};
use crate::ids::{DagId, InstanceId, ParentId};
use crate::mobility::{MobilityDetector, PpChangeFlag};
use crate::objective::{ObjectiveFunction, ParentContext, RhOf, StabilityOf};
use crate::parent::{ParentRecord, TxStatus};
use crate::topology::Topology;
use crate::trickle::DioScheduler;

/// A fully assembled `mobirpl-core` node: one current instance/DAG plus all
/// of the timer and detector state that drives it.
///
/// Non-storing downward routes and multi-instance DODAG Information
/// Objects are out of scope — one instance, one current DAG, matching the
/// common single-instance RPL deployment the reference targets.
pub struct NodeContext {
    pub config: Config,
    pub is_root: bool,
    pub topology: Topology,
    pub instance_id: InstanceId,
    pub dag_id: DagId,

    pub mobility: MobilityDetector,
    pub connectivity: ConnectivityState,
    pub dao: DaoScheduler,
    pub probing: ProbingScheduler,

    /// `preferred_parent_callback_num`/`non_preferred_parent_callback_num` —
    /// per-role link callback counters bumped by `neighbor_link_callback`/
    /// `mobirpl_rx_callback` and surfaced in the `r:a_cb`/`r:r_cb` trace
    /// lines, per §4.1.
    pub preferred_parent_callback_num: u32,
    pub non_preferred_parent_callback_num: u32,

    objective: Box<dyn ObjectiveFunction>,
}

impl NodeContext {
    /// Construct a node around an already-inserted instance/DAG pair.
    /// Selects `RhOf` when `Config.detect_mobility` is set, else
    /// `StabilityOf` — the reference's `MOBIRPL_MOBILITY_DETECTION` compile
    /// switch, modeled as a runtime choice.
    pub fn new(
        config: Config,
        is_root: bool,
        topology: Topology,
        instance_id: InstanceId,
        dag_id: DagId,
    ) -> Self {
        let mobility = MobilityDetector::new(&config, is_root);
        let objective: Box<dyn ObjectiveFunction> = if config.detect_mobility {
            Box::new(RhOf {
                local_mobile: mobility.mobility == crate::mobility::Mobility::Mobile,
            })
        } else {
            Box::new(StabilityOf)
        };
        Self {
            mobility,
            connectivity: ConnectivityState::new(&config),
            dao: DaoScheduler::default(),
            probing: ProbingScheduler::default(),
            preferred_parent_callback_num: 0,
            non_preferred_parent_callback_num: 0,
            config,
            is_root,
            topology,
            instance_id,
            dag_id,
            objective,
        }
    }

    /// `reset_mobirpl` — reinitializes the mobility EWMA triplet and the
    /// timeout-period/probe-interval pair. Callable both at startup and
    /// from the reactive-discovery escape hatch.
    pub fn reset_mobirpl(&mut self) {
        tracing::debug!("r:R");
        self.mobility = MobilityDetector::new(&self.config, self.is_root);
        self.connectivity.reset(&self.config);
    }

    /// Bump `preferred_parent_callback_num`/`non_preferred_parent_callback_num`
    /// according to whether `parent` is its DAG's current preferred parent —
    /// shared by both link callbacks, per §4.1.
    fn bump_role_callback_counter(&mut self, parent: ParentId) {
        let dag_id = self.topology.parent(parent).dag;
        let is_preferred = self.topology.dag(dag_id).preferred_parent == Some(parent);
        if is_preferred {
            self.preferred_parent_callback_num += 1;
        } else {
            self.non_preferred_parent_callback_num += 1;
        }
    }

    /// `neighbor_link_callback` entry point for a MAC TX outcome. Silently
    /// no-ops if `neighbors` reports no table entry for `addr` — recovery,
    /// not failure.
    pub fn on_mac_tx_outcome(
        &mut self,
        neighbors: &mut impl NeighborTable,
        parent: ParentId,
        addr: Ipv6Addr,
        status: TxStatus,
        rssi: i16,
    ) {
        if !neighbors.has_neighbor_entry(addr) {
            return;
        }
        self.bump_role_callback_counter(parent);
        let record = self.topology.parent_mut(parent);
        record.on_mac_tx_outcome(status, rssi, &self.config, self.config.manage_connectivity);
        neighbors.set_link_metric(addr, self.topology.instance(self.instance_id).min_hoprankinc);

        let local_mobile = self.mobility.mobility == crate::mobility::Mobility::Mobile;
        let record = self.topology.parent(parent);
        tracing::debug!(
            "r:a_cb|{}|{}|{}||{}|{}|{:?}|{}|{}|{}",
            parent,
            self.preferred_parent_callback_num,
            self.non_preferred_parent_callback_num,
            record.rssi,
            record.link_loss_count,
            record.zone,
            record.lifetime,
            record.mobility,
            crate::objective::calculate_flag(local_mobile, record) as u8,
        );
    }

    /// `mobirpl_rx_callback` entry point for an incoming unicast reception.
    pub fn on_unicast_rx(
        &mut self,
        neighbors: &mut impl NeighborTable,
        parent: ParentId,
        addr: Ipv6Addr,
        rssi: i16,
    ) {
        if !neighbors.has_neighbor_entry(addr) {
            return;
        }
        self.bump_role_callback_counter(parent);
        let record = self.topology.parent_mut(parent);
        record.on_unicast_rx(rssi, &self.config);
        neighbors.set_link_metric(addr, self.topology.instance(self.instance_id).min_hoprankinc);

        let local_mobile = self.mobility.mobility == crate::mobility::Mobility::Mobile;
        let record = self.topology.parent(parent);
        tracing::debug!(
            "r:r_cb|{}|{}|{}||{}|{}|{:?}|{}|{}|{}",
            parent,
            self.preferred_parent_callback_num,
            self.non_preferred_parent_callback_num,
            record.rssi,
            record.link_loss_count,
            record.zone,
            record.lifetime,
            record.mobility,
            crate::objective::calculate_flag(local_mobile, record) as u8,
        );
    }

    /// Fold the current DAG's candidate parents down to a single winner via
    /// the objective function, switching the preferred parent and flagging
    /// the mobility detector on a change.
    pub fn recompute_preferred_parent(&mut self) {
        let dag_id = self.dag_id;
        let instance_id = self.instance_id;
        let candidates: Vec<ParentId> = self.topology.parent_ids_in_dag(dag_id).collect();
        if candidates.is_empty() {
            return;
        }

        let current_preferred = self.topology.dag(dag_id).preferred_parent;
        let instance = self.topology.instance(instance_id).clone();
        let refuse_black = !self.config.detect_mobility;

        // `calculate_flag()` in the reference reads the live
        // `mobirpl_mobility` global, which the detector flips every tick —
        // re-sync RH-OF's view before folding rather than freezing it at
        // construction time.
        self.objective
            .sync_local_mobility(self.mobility.mobility == crate::mobility::Mobility::Mobile);

        let contexts: Vec<ParentContext> = candidates
            .iter()
            .map(|&id| {
                let record = self.topology.parent(id);
                ParentContext {
                    record,
                    has_neighbor_entry: true,
                    is_preferred: Some(id) == current_preferred,
                }
            })
            .collect();

        let winner_idx = crate::objective::reduce_best_parent(
            self.objective.as_ref(),
            &contexts,
            &instance,
            &self.config,
            refuse_black,
        );

        let new_preferred = winner_idx.map(|idx| candidates[idx]);
        if new_preferred != current_preferred {
            self.topology.dag_mut(dag_id).preferred_parent = new_preferred;
            self.mobility.pp_change_flag = if self.is_root {
                PpChangeFlag::Root
            } else {
                PpChangeFlag::Switch
            };
        }
    }

    /// One second's worth of mobility detection + connectivity management +
    /// discovery. Returns any discovery/probe action the host should
    /// actually transmit.
    pub fn on_second_tick(&mut self) -> Vec<DiscoveryAction> {
        let mut actions = Vec::new();

        if self.config.detect_mobility {
            self.mobility.tick(&self.config);
        }

        if let Some(action) = ConnectivityManager::tick(
            &mut self.connectivity,
            &mut self.topology,
            self.dag_id,
            self.mobility.mobility,
            self.mobility.update_flag,
            &self.config,
            self.is_root,
        ) {
            actions.push(action);
        }

        if let Some(action) =
            ConnectivityManager::proactive_discovery(&mut self.connectivity, &self.config, self.is_root)
        {
            actions.push(action);
        }

        let (action, should_reset) = ConnectivityManager::reactive_discovery(
            &mut self.connectivity,
            &self.topology,
            self.dag_id,
            &self.config,
            self.is_root,
        );
        if let Some(action) = action {
            actions.push(action);
        }
        if should_reset {
            self.reset_mobirpl();
        }

        actions
    }

    /// Drive the Trickle DIO timer once.
    pub fn handle_dio_timer(
        &mut self,
        link_local_ready: bool,
        rng: &mut impl Rng,
    ) -> Option<crate::trickle::DioTick> {
        let instance = self.topology.instance_mut(self.instance_id);
        DioScheduler::handle_dio_timer(instance, &self.config, link_local_ready, rng)
    }

    /// Drive the DAO timer once, emitting the preferred-parent unicast DAO
    /// via `sink`. A no-op under `RoutingMode::Feather`
    /// (`dao::DaoScheduler::handle_dao_timer` never arms in that mode).
    pub fn handle_dao_timer(&mut self, now: quanta::Instant, sink: &mut impl FrameSink, link_local_ready: bool) {
        let dag_id = self.dag_id;
        let target = {
            let dag = self.topology.dag(dag_id);
            self.dao.handle_dao_timer(now, dag, &self.config, link_local_ready)
        };
        let Some(parent_id) = target else { return };
        let Some(parent) = self.topology.get_parent(parent_id) else {
            return;
        };
        sink.dao_output(parent.addr, self.config.default_lifetime);
    }

    /// `handle_probing_timer` — drive the independent, generic per-parent
    /// probing mechanism (`RPL_WITH_PROBING`) once, sending a unicast probe
    /// (modeled as a unicast DIO, matching the reference's default
    /// `RPL_PROBING_SEND_FUNC`) to whatever `get_probing_target` selects,
    /// then re-arming the next cycle. A no-op when `Config.generic_probing`
    /// is disabled — this is a second, independent probe path from the
    /// connectivity manager's preferred-parent-only Pass 4 probe.
    pub fn handle_probing_timer(
        &mut self,
        now: quanta::Instant,
        sink: &mut impl FrameSink,
        rng: &mut impl Rng,
    ) {
        if !self.config.generic_probing {
            return;
        }

        let dag_id = self.dag_id;
        let instance_id = self.instance_id;
        let target = {
            let dag = self.topology.dag(dag_id);
            let instance = self.topology.instance(instance_id);
            ProbingScheduler::handle_probing_timer(
                &self.topology,
                dag_id,
                dag,
                instance,
                now,
                &self.config,
                rng,
            )
        };
        if let Some(parent_id) = target {
            if let Some(parent) = self.topology.get_parent(parent_id) {
                sink.dio_output(Some(parent.addr));
            }
        }

        self.probing.schedule(now, &self.config, rng);
    }

    /// `rpl_schedule_probing` — arm the first generic-probing cycle (e.g. on
    /// join). A no-op when `Config.generic_probing` is disabled.
    pub fn schedule_probing(&mut self, now: quanta::Instant, rng: &mut impl Rng) {
        if !self.config.generic_probing {
            return;
        }
        self.probing.schedule(now, &self.config, rng);
    }

    /// `rpl_schedule_dao`/`rpl_schedule_dao_immediately`.
    pub fn schedule_dao(
        &mut self,
        now: quanta::Instant,
        latency: DaoLatency,
        rng: &mut impl Rng,
    ) {
        self.dao.schedule_dao(now, &self.config, latency, rng);
    }

    /// `rpl_cancel_dao`.
    pub fn cancel_dao(&mut self) {
        self.dao.cancel();
    }

    /// Borrow the candidate parent currently preferred in the node's DAG.
    pub fn preferred_parent(&self) -> Option<&ParentRecord> {
        let id = self.topology.dag(self.dag_id).preferred_parent?;
        self.topology.get_parent(id)
    }
}
