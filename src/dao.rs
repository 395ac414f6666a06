//! # DAO Scheduler & Generic Probing
//!
//! Upward-route advertisement scheduling plus the independent
//! `RPL_WITH_PROBING` per-parent probing mechanism recovered from
//! `original_source/`. Both are one-shot timers driven by the host event
//! loop, in the same style as [`crate::trickle`].

use std::time::Duration;

use rand::Rng;

use crate::clock::Timer;
use crate::config::{Config, RoutingMode};
use crate::ids::{DagId, ParentId};
use crate::objective::{calculate_rank, INFINITE_RANK};
use crate::parent::ParentRecord;
use crate::topology::{Dag, Instance, Topology};

/// `rpl_schedule_dao`/`rpl_schedule_dao_immediately` latency selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaoLatency {
    /// `RPL_DAO_LATENCY` — randomized within `[latency/2, 3*latency/2)`.
    Default,
    /// Fire with no delay.
    Immediate,
}

/// DAO send + lifetime-refresh timer pair for one instance.
#[derive(Debug, Default)]
pub struct DaoScheduler {
    pub dao_timer: Timer,
    pub lifetime_timer: Timer,
}

impl DaoScheduler {
    /// `schedule_dao` — arms `dao_timer` unless it is already pending, and
    /// (re)arms the lifetime-refresh timer. A no-op in FEATHER mode.
    pub fn schedule_dao(
        &mut self,
        now: quanta::Instant,
        config: &Config,
        latency: DaoLatency,
        rng: &mut impl Rng,
    ) {
        if config.routing_mode == RoutingMode::Feather {
            return;
        }
        if self.dao_timer.is_armed() && !self.dao_timer.fired(now) {
            return;
        }

        let delay = match latency {
            DaoLatency::Immediate => Duration::ZERO,
            DaoLatency::Default => {
                let base = Duration::from_millis(config.dao_latency_ms as u64);
                base / 2 + Duration::from_secs_f64(base.as_secs_f64() * rng.random::<f64>())
            }
        };
        self.dao_timer.set(now, delay);
        self.set_dao_lifetime_timer(now, config);
    }

    /// `set_dao_lifetime_timer` — arm at half the route's default
    /// expiration. No-op in FEATHER mode.
    fn set_dao_lifetime_timer(&mut self, now: quanta::Instant, config: &Config) {
        if config.routing_mode == RoutingMode::Feather {
            return;
        }
        let expiration = Duration::from_secs(
            config.default_lifetime as u64 * config.lifetime_unit_s as u64 / 2,
        );
        self.lifetime_timer.set(now, expiration);
    }

    /// `handle_dao_timer` — fires on the scheduled deadline. `link_local_ready`
    /// mirrors the DIO scheduler's postponement when no link-local address is
    /// ready yet. Returns the preferred parent to send the DAO to, and
    /// re-arms the lifetime-refresh timer if it had already expired.
    pub fn handle_dao_timer(
        &mut self,
        now: quanta::Instant,
        dag: &Dag,
        config: &Config,
        link_local_ready: bool,
    ) -> Option<ParentId> {
        if !link_local_ready {
            self.dao_timer.set(now, Duration::from_secs(1));
            return None;
        }

        self.dao_timer.stop();

        if self.lifetime_timer.fired(now) {
            self.set_dao_lifetime_timer(now, config);
        }

        dag.preferred_parent
    }

    /// `rpl_cancel_dao` — disarm both timers.
    pub fn cancel(&mut self) {
        self.dao_timer.stop();
        self.lifetime_timer.stop();
    }
}

/// The generic per-parent probing mechanism (`RPL_WITH_PROBING`), a second
/// and independent probe path from the preferred-parent-only probe in
/// [`crate::connectivity::ConnectivityManager`].
#[derive(Debug, Default)]
pub struct ProbingScheduler {
    pub timer: Timer,
}

impl ProbingScheduler {
    /// `get_probing_target` — preferred parent if stale, else with 50%
    /// probability the best-ranked stale parent in the DAG, else the least
    /// recently transmitted-to parent.
    pub fn get_probing_target(
        topology: &Topology,
        dag_id: DagId,
        dag: &Dag,
        instance: &Instance,
        now: quanta::Instant,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Option<ParentId> {
        let expiration = Duration::from_secs(config.probing_expiration_s as u64);
        let is_stale = |p: &ParentRecord| now.saturating_duration_since(p.last_tx_time) >= expiration;

        if let Some(preferred) = dag.preferred_parent {
            if let Some(p) = topology.get_parent(preferred) {
                if is_stale(p) {
                    return Some(preferred);
                }
            }
        }

        if rng.random_range(0..2) == 0 {
            let mut best: Option<(ParentId, u16)> = None;
            for id in topology.parent_ids_in_dag(dag_id) {
                let p = topology.parent(id);
                if !is_stale(p) {
                    continue;
                }
                let rank = calculate_rank(Some((p, instance)), 0);
                if best.map(|(_, r)| rank < r).unwrap_or(true) {
                    best = Some((id, rank));
                }
            }
            if let Some((id, rank)) = best {
                if rank != INFINITE_RANK {
                    return Some(id);
                }
            }
        }

        topology
            .parent_ids_in_dag(dag_id)
            .min_by_key(|&id| topology.parent(id).last_tx_time)
    }

    /// `handle_probing_timer` — caller sends the unicast probe to the
    /// returned target, then must reschedule via `rpl_schedule_probing`.
    pub fn handle_probing_timer(
        topology: &Topology,
        dag_id: DagId,
        dag: &Dag,
        instance: &Instance,
        now: quanta::Instant,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Option<ParentId> {
        Self::get_probing_target(topology, dag_id, dag, instance, now, config, rng)
    }

    /// `rpl_schedule_probing` — arm the next probing cycle. The reference's
    /// `RPL_PROBING_DELAY_FUNC` jitters around `probing_expiration_s`; we use
    /// the same uniform-within-window scheme as the DIO/DAO timers.
    pub fn schedule(&mut self, now: quanta::Instant, config: &Config, rng: &mut impl Rng) {
        let window = Duration::from_secs(config.probing_expiration_s as u64);
        let delay = window / 2 + Duration::from_secs_f64(window.as_secs_f64() * rng.random::<f64>() / 2.0);
        self.timer.set(now, delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::InstanceId;
    use quanta::Clock as QuantaClock;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::net::Ipv6Addr;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn now() -> quanta::Instant {
        QuantaClock::new().now()
    }

    #[test]
    fn feather_mode_never_schedules() {
        let mut config = Config::default();
        config.routing_mode = RoutingMode::Feather;
        let mut sched = DaoScheduler::default();
        sched.schedule_dao(now(), &config, DaoLatency::Immediate, &mut rng());
        assert!(!sched.dao_timer.is_armed());
    }

    #[test]
    fn schedule_dao_arms_both_timers() {
        let config = Config::default();
        let mut sched = DaoScheduler::default();
        sched.schedule_dao(now(), &config, DaoLatency::Immediate, &mut rng());
        assert!(sched.dao_timer.is_armed());
        assert!(sched.lifetime_timer.is_armed());
    }

    #[test]
    fn handle_dao_timer_returns_preferred_parent() {
        let config = Config::default();
        let mut topo = Topology::new();
        let instance_id = topo.insert_instance(Instance::new(256, 12, 8, 10));
        let dag_id = topo.insert_dag(Dag::new(InstanceId(instance_id.0), 0, true));
        let parent_id =
            topo.insert_parent(ParentRecord::new(Ipv6Addr::LOCALHOST, dag_id, 256, now()));
        topo.dag_mut(dag_id).preferred_parent = Some(parent_id);

        let mut sched = DaoScheduler::default();
        let target = sched.handle_dao_timer(now(), topo.dag(dag_id), &config, true);
        assert_eq!(target, Some(parent_id));
    }

    #[test]
    fn handle_dao_timer_postpones_without_link_local() {
        let config = Config::default();
        let mut topo = Topology::new();
        let instance_id = topo.insert_instance(Instance::new(256, 12, 8, 10));
        let dag_id = topo.insert_dag(Dag::new(InstanceId(instance_id.0), 0, true));

        let mut sched = DaoScheduler::default();
        let target = sched.handle_dao_timer(now(), topo.dag(dag_id), &config, false);
        assert_eq!(target, None);
        assert!(sched.dao_timer.is_armed());
    }

    #[test]
    fn probing_target_prefers_stale_preferred_parent() {
        let config = Config::default();
        let mut topo = Topology::new();
        let instance_id = topo.insert_instance(Instance::new(256, 12, 8, 10));
        let dag_id = topo.insert_dag(Dag::new(InstanceId(instance_id.0), 0, true));
        let t0 = now();
        let mut stale = ParentRecord::new(Ipv6Addr::LOCALHOST, dag_id, 256, t0);
        stale.last_tx_time = t0;
        let preferred_id = topo.insert_parent(stale);
        topo.dag_mut(dag_id).preferred_parent = Some(preferred_id);

        let far_future = t0 + Duration::from_secs(config.probing_expiration_s as u64 + 1);
        let target = ProbingScheduler::get_probing_target(
            &topo,
            dag_id,
            topo.dag(dag_id),
            topo.instance(instance_id),
            far_future,
            &config,
            &mut rng(),
        );
        assert_eq!(target, Some(preferred_id));
    }

    #[test]
    fn probing_target_falls_back_to_least_recently_sent() {
        let config = Config::default();
        let mut topo = Topology::new();
        let instance_id = topo.insert_instance(Instance::new(256, 12, 8, 10));
        let dag_id = topo.insert_dag(Dag::new(InstanceId(instance_id.0), 0, true));
        let t0 = now();
        let older = topo.insert_parent(ParentRecord::new(Ipv6Addr::LOCALHOST, dag_id, 256, t0));
        let newer_rec = ParentRecord::new(
            Ipv6Addr::LOCALHOST,
            dag_id,
            256,
            t0 + Duration::from_secs(5),
        );
        topo.insert_parent(newer_rec);

        let target = ProbingScheduler::get_probing_target(
            &topo,
            dag_id,
            topo.dag(dag_id),
            topo.instance(instance_id),
            t0 + Duration::from_secs(1),
            &config,
            &mut rng(),
        );
        assert_eq!(target, Some(older));
    }
}
