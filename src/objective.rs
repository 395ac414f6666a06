//! # Objective Function
//!
//! The pluggable rank/parent/DAG-selection policy, mirroring the
//! reference's `rpl_of_t` record of six operations as a Rust trait with two
//! implementors — `RhOf` (mobility-aware) and `StabilityOf` — the way a
//! strategy enum gets expressed as a trait with several implementations
//! behind it.
//!
//! `best_parent` here is strictly the pairwise operator named in the
//! external interface; folding a whole candidate set down to one winner,
//! including the BLACK-refusal behavior for the stability variant, is the
//! caller's job (`connectivity`/`node`) via repeated pairwise folds.

use crate::config::Config;
use crate::parent::{ParentRecord, Zone};
use crate::topology::{Dag, Instance};

/// Sentinel meaning "unreachable" — returned by `calculate_rank` on overflow
/// and used to seed a fresh `Dag`'s rank before any parent is known.
pub const INFINITE_RANK: u16 = u16::MAX;

/// Rank increment used when no parent is available to derive one from.
pub const DEFAULT_RANK_INCREMENT: u16 = 256;

/// `MOBIRPL_FLAG_1..4` — lower is better; combines the local node's own
/// mobility classification with a candidate's zone and self-declared
/// mobility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ParentFlag {
    Flag1 = 1,
    Flag2 = 2,
    Flag3 = 3,
    Flag4 = 4,
}

/// `DAG_RANK(rank, instance)` — rank expressed in whole hop-distance units.
pub fn dag_rank(rank: u16, instance: &Instance) -> u16 {
    rank / instance.min_hoprankinc
}

/// `calculate_rank(parent, base_rank)`, generic over whether a parent is
/// actually present.
pub fn calculate_rank(parent: Option<(&ParentRecord, &Instance)>, base_rank: u16) -> u16 {
    let (base, increment) = if base_rank == 0 {
        match parent {
            None => return INFINITE_RANK,
            Some((p, instance)) => (p.rank, instance.min_hoprankinc),
        }
    } else {
        let increment = parent
            .map(|(_, instance)| instance.min_hoprankinc)
            .unwrap_or(DEFAULT_RANK_INCREMENT);
        (base_rank, increment)
    };

    let sum = base.wrapping_add(increment);
    if sum < base {
        INFINITE_RANK
    } else {
        sum
    }
}

/// `best_dag(d1, d2)` — grounded beats ungrounded, then higher preference,
/// then lower rank, else `d1`.
pub fn best_dag<'a>(d1: &'a Dag, d2: &'a Dag) -> &'a Dag {
    if d1.grounded && !d2.grounded {
        return d1;
    }
    if d2.grounded && !d1.grounded {
        return d2;
    }

    if d1.preference < d2.preference {
        return d2;
    }
    if d1.preference > d2.preference {
        return d1;
    }

    if d2.rank < d1.rank {
        d2
    } else {
        d1
    }
}

/// `calculate_flag(p)`, parameterized on this node's own mobility
/// classification.
pub fn calculate_flag(local_mobile: bool, p: &ParentRecord) -> ParentFlag {
    use ParentFlag::*;
    let low_zone = p.zone <= Zone::White;
    if local_mobile {
        match (low_zone, p.mobility) {
            (true, 0) => Flag1,
            (true, _) => Flag2,
            (false, 0) => Flag3,
            (false, _) => Flag4,
        }
    } else {
        match (p.mobility, low_zone) {
            (0, true) => Flag1,
            (0, false) => Flag2,
            (_, true) => Flag3,
            (_, false) => Flag4,
        }
    }
}

/// Inputs a caller must gather before calling either `best_parent`
/// implementation — standing in for the reference's neighbor-table lookup
/// and `p->dag`/`p->dag->instance` pointer chases.
pub struct ParentContext<'a> {
    pub record: &'a ParentRecord,
    pub has_neighbor_entry: bool,
    pub is_preferred: bool,
}

/// The pluggable six-operation objective function record.
pub trait ObjectiveFunction {
    /// `reset(dag)` — RH-OF's is a no-op beyond logging; kept as a trait
    /// method so a future variant can hook DAG (re)selection.
    fn reset(&self, dag: &Dag);

    /// Pairwise parent comparison. Returns `true` if `p1` wins, `false` if
    /// `p2` wins. Falls back to `fallback_preferred` when either side has no
    /// neighbor-table entry.
    fn best_parent(
        &self,
        p1: &ParentContext,
        p2: &ParentContext,
        instance: &Instance,
        config: &Config,
        fallback_preferred_is_p1: bool,
    ) -> bool;

    fn best_dag<'a>(&self, d1: &'a Dag, d2: &'a Dag) -> &'a Dag {
        best_dag(d1, d2)
    }

    fn calculate_rank(&self, parent: Option<(&ParentRecord, &Instance)>, base_rank: u16) -> u16 {
        calculate_rank(parent, base_rank)
    }

    fn update_metric_container(&self, instance: &mut Instance) {
        instance.mc = crate::topology::MetricContainerType::None;
    }

    /// Re-sync this operator's view of the local node's own mobility
    /// classification, read live off `mobirpl_mobility` in the reference's
    /// `calculate_flag()`. A no-op for variants that don't key off it.
    fn sync_local_mobility(&mut self, _mobile: bool) {}
}

/// Compares `r_i = DAG_RANK(rank) * min_hoprankinc`, then the RSSI-hysteresis
/// / preferred-stickiness / lifetime tiebreak shared by both variants.
/// `primary` decides the winner on inequality; ties fall through to rank,
/// then to the shared tail.
fn resolve_parent_pair(
    p1: &ParentContext,
    p2: &ParentContext,
    instance: &Instance,
    config: &Config,
    fallback_preferred_is_p1: bool,
    primary_p1_wins: Option<bool>,
) -> bool {
    if !p1.has_neighbor_entry || !p2.has_neighbor_entry {
        return fallback_preferred_is_p1;
    }

    if let Some(p1_wins) = primary_p1_wins {
        return p1_wins;
    }

    let r1 = dag_rank(p1.record.rank, instance) * instance.min_hoprankinc;
    let r2 = dag_rank(p2.record.rank, instance) * instance.min_hoprankinc;
    if r1 != r2 {
        return r1 < r2;
    }

    let h = config.rssi_difference_hysteresis;
    let within_hysteresis =
        p1.record.rssi < p2.record.rssi + h && p2.record.rssi < p1.record.rssi + h;

    if within_hysteresis {
        if p1.is_preferred || p2.is_preferred {
            return p1.is_preferred;
        }
        if config.manage_connectivity {
            p1.record.lifetime >= p2.record.lifetime
        } else {
            true
        }
    } else {
        p1.record.rssi > p2.record.rssi
    }
}

/// Mobility-aware RH-OF. Requires the evaluating node's own current
/// mobility classification to compute `calculate_flag`.
pub struct RhOf {
    pub local_mobile: bool,
}

impl ObjectiveFunction for RhOf {
    fn reset(&self, _dag: &Dag) {
        tracing::debug!("resetting RH-OF");
    }

    fn sync_local_mobility(&mut self, mobile: bool) {
        self.local_mobile = mobile;
    }

    fn best_parent(
        &self,
        p1: &ParentContext,
        p2: &ParentContext,
        instance: &Instance,
        config: &Config,
        fallback_preferred_is_p1: bool,
    ) -> bool {
        let primary = if p1.has_neighbor_entry && p2.has_neighbor_entry {
            let flag1 = calculate_flag(self.local_mobile, p1.record);
            let flag2 = calculate_flag(self.local_mobile, p2.record);
            if flag1 != flag2 {
                Some(flag1 < flag2)
            } else {
                None
            }
        } else {
            None
        };
        resolve_parent_pair(
            p1,
            p2,
            instance,
            config,
            fallback_preferred_is_p1,
            primary,
        )
    }
}

/// Stability variant (`MOBIRPL_MOBILITY_DETECTION` disabled): same shape as
/// [`RhOf`] but step 3 compares `zone` directly instead of `calculate_flag`.
pub struct StabilityOf;

impl ObjectiveFunction for StabilityOf {
    fn reset(&self, _dag: &Dag) {
        tracing::debug!("resetting stability OF");
    }

    fn best_parent(
        &self,
        p1: &ParentContext,
        p2: &ParentContext,
        instance: &Instance,
        config: &Config,
        fallback_preferred_is_p1: bool,
    ) -> bool {
        let primary = if p1.has_neighbor_entry && p2.has_neighbor_entry {
            if p1.record.zone != p2.record.zone {
                Some(p1.record.zone < p2.record.zone)
            } else {
                None
            }
        } else {
            None
        };
        resolve_parent_pair(
            p1,
            p2,
            instance,
            config,
            fallback_preferred_is_p1,
            primary,
        )
    }
}

/// Folds a candidate set down to a single winner via repeated pairwise
/// `best_parent` calls. BLACK refusal for the stability variant lives
/// here, one level above the pairwise operator, rather than inside
/// `StabilityOf::best_parent` itself.
pub fn reduce_best_parent<'a>(
    of: &dyn ObjectiveFunction,
    candidates: &[ParentContext<'a>],
    instance: &Instance,
    config: &Config,
    refuse_black: bool,
) -> Option<usize> {
    let eligible: Vec<usize> = if refuse_black {
        let non_black: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].record.zone != Zone::Black)
            .collect();
        if non_black.is_empty() {
            (0..candidates.len()).collect()
        } else {
            non_black
        }
    } else {
        (0..candidates.len()).collect()
    };

    let mut iter = eligible.into_iter();
    let mut winner = iter.next()?;
    for idx in iter {
        let p1_wins = of.best_parent(
            &candidates[winner],
            &candidates[idx],
            instance,
            config,
            true,
        );
        if !p1_wins {
            winner = idx;
        }
    }
    Some(winner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DagId;
    use quanta::Clock as QuantaClock;
    use std::net::Ipv6Addr;

    fn now() -> quanta::Instant {
        QuantaClock::new().now()
    }

    fn instance() -> Instance {
        Instance::new(256, 12, 8, 10)
    }

    fn dag(grounded: bool, preference: u8, rank: u16) -> Dag {
        let mut d = Dag::new(crate::ids::InstanceId(0), preference, grounded);
        d.rank = rank;
        d
    }

    fn parent(rssi: i16, rank: u16, zone: Zone, mobility: u8) -> ParentRecord {
        let mut p = ParentRecord::new(Ipv6Addr::LOCALHOST, DagId(0), rank, now());
        p.rssi = rssi;
        p.zone = zone;
        p.mobility = mobility;
        p
    }

    #[test]
    fn rank_zero_base_with_no_parent_is_infinite() {
        assert_eq!(calculate_rank(None, 0), INFINITE_RANK);
    }

    #[test]
    fn rank_monotonicity() {
        let instance = instance();
        let p = parent(-70, 512, Zone::White, 0);
        let r = calculate_rank(Some((&p, &instance)), 0);
        assert!(r > p.rank);
        assert_eq!(r, 512 + 256);
    }

    /// S3 — rank overflow: base=0xFF00, increment=0x0200 wraps past u16::MAX.
    #[test]
    fn s3_rank_overflow() {
        let mut instance = instance();
        instance.min_hoprankinc = 0x0200;
        let p = parent(-70, 0xFF00, Zone::White, 0);
        let r = calculate_rank(Some((&p, &instance)), 0xFF00);
        assert_eq!(r, INFINITE_RANK);
    }

    #[test]
    fn best_dag_prefers_grounded() {
        let d1 = dag(true, 0, 500);
        let d2 = dag(false, 7, 100);
        assert!(std::ptr::eq(best_dag(&d1, &d2), &d1));
    }

    #[test]
    fn best_dag_prefers_higher_preference_then_lower_rank() {
        let d1 = dag(true, 3, 500);
        let d2 = dag(true, 5, 100);
        assert!(std::ptr::eq(best_dag(&d1, &d2), &d2));

        let d3 = dag(true, 4, 300);
        let d4 = dag(true, 4, 100);
        assert!(std::ptr::eq(best_dag(&d3, &d4), &d4));
    }

    #[test]
    fn calculate_flag_matches_table() {
        let mobile_neighbor = parent(-70, 256, Zone::White, 1);
        let static_neighbor = parent(-70, 256, Zone::White, 0);
        assert_eq!(
            calculate_flag(true, &static_neighbor),
            ParentFlag::Flag1
        );
        assert_eq!(
            calculate_flag(true, &mobile_neighbor),
            ParentFlag::Flag2
        );

        let gray_static = parent(-70, 256, Zone::Gray, 0);
        let gray_mobile = parent(-70, 256, Zone::Gray, 1);
        assert_eq!(calculate_flag(false, &gray_static), ParentFlag::Flag2);
        assert_eq!(calculate_flag(false, &gray_mobile), ParentFlag::Flag4);
    }

    /// S5 — preferred-parent stickiness under RSSI tie: p1 preferred at
    /// rssi=-80, p2 at rssi=-81, same flag/rank, H=4 ⟹ p1 wins.
    #[test]
    fn s5_preferred_parent_stickiness() {
        let config = Config::default();
        let instance = instance();
        let p1 = parent(-80, 256, Zone::White, 0);
        let p2 = parent(-81, 256, Zone::White, 0);
        let ctx1 = ParentContext {
            record: &p1,
            has_neighbor_entry: true,
            is_preferred: true,
        };
        let ctx2 = ParentContext {
            record: &p2,
            has_neighbor_entry: true,
            is_preferred: false,
        };
        let of = RhOf { local_mobile: false };
        assert!(of.best_parent(&ctx1, &ctx2, &instance, &config, true));
    }

    #[test]
    fn missing_neighbor_entry_falls_back_to_preferred() {
        let config = Config::default();
        let instance = instance();
        let p1 = parent(-80, 256, Zone::White, 0);
        let p2 = parent(-60, 128, Zone::White, 0);
        let ctx1 = ParentContext {
            record: &p1,
            has_neighbor_entry: false,
            is_preferred: false,
        };
        let ctx2 = ParentContext {
            record: &p2,
            has_neighbor_entry: true,
            is_preferred: false,
        };
        let of = RhOf { local_mobile: false };
        assert!(of.best_parent(&ctx1, &ctx2, &instance, &config, true));
        assert!(!of.best_parent(&ctx1, &ctx2, &instance, &config, false));
    }

    #[test]
    fn lower_rank_wins_when_flags_equal() {
        let config = Config::default();
        let instance = instance();
        let p1 = parent(-70, 256, Zone::White, 0);
        let p2 = parent(-70, 512, Zone::White, 0);
        let ctx1 = ParentContext {
            record: &p1,
            has_neighbor_entry: true,
            is_preferred: false,
        };
        let ctx2 = ParentContext {
            record: &p2,
            has_neighbor_entry: true,
            is_preferred: false,
        };
        let of = RhOf { local_mobile: false };
        assert!(of.best_parent(&ctx1, &ctx2, &instance, &config, true));
    }

    #[test]
    fn stability_variant_compares_zone_not_flag() {
        let config = Config::default();
        let instance = instance();
        let p1 = parent(-70, 256, Zone::White, 1);
        let p2 = parent(-70, 256, Zone::Gray, 0);
        let ctx1 = ParentContext {
            record: &p1,
            has_neighbor_entry: true,
            is_preferred: false,
        };
        let ctx2 = ParentContext {
            record: &p2,
            has_neighbor_entry: true,
            is_preferred: false,
        };
        let of = StabilityOf;
        assert!(of.best_parent(&ctx1, &ctx2, &instance, &config, true));
    }

    #[test]
    fn reduce_refuses_black_when_non_black_candidate_exists() {
        let config = Config::default();
        let instance = instance();
        let black = parent(-60, 128, Zone::Black, 0);
        let white = parent(-90, 512, Zone::White, 0);
        let candidates = vec![
            ParentContext {
                record: &black,
                has_neighbor_entry: true,
                is_preferred: false,
            },
            ParentContext {
                record: &white,
                has_neighbor_entry: true,
                is_preferred: false,
            },
        ];
        let of = StabilityOf;
        let winner = reduce_best_parent(&of, &candidates, &instance, &config, true).unwrap();
        assert_eq!(winner, 1, "BLACK candidate must lose to any non-BLACK one");
    }

    /// `sync_local_mobility` must actually flip `RhOf`'s view, and that
    /// view must change which of two flag-ordering-sensitive candidates
    /// `calculate_flag` prefers.
    #[test]
    fn sync_local_mobility_changes_flag_ordering() {
        let config = Config::default();
        let instance = instance();
        let low_zone_mobile_neighbor = parent(-70, 256, Zone::White, 1);
        let high_zone_static_neighbor = parent(-70, 256, Zone::Gray, 0);
        let ctx1 = ParentContext {
            record: &low_zone_mobile_neighbor,
            has_neighbor_entry: true,
            is_preferred: false,
        };
        let ctx2 = ParentContext {
            record: &high_zone_static_neighbor,
            has_neighbor_entry: true,
            is_preferred: false,
        };

        let mut of = RhOf { local_mobile: true };
        assert!(
            of.best_parent(&ctx1, &ctx2, &instance, &config, true),
            "MOBILE: FLAG_2 (low zone, mobile neighbor) beats FLAG_3"
        );

        of.sync_local_mobility(false);
        assert!(
            !of.best_parent(&ctx1, &ctx2, &instance, &config, true),
            "STATIC: FLAG_3 (mobile neighbor, low zone) now loses to FLAG_2"
        );
    }
}
