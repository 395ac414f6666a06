//! # Trickle DIO Scheduler
//!
//! The Trickle algorithm driving DIO transmission cadence:
//! redundancy-suppressed sends, doubling interval on silence, and external
//! resets back to the minimum interval. Random phase placement within an
//! interval is delegated to `rand`, the same jittered-backoff crate used
//! elsewhere in this workspace.

use std::time::Duration;

use rand::Rng;

use crate::config::Config;
use crate::topology::Instance;

/// `RPL_CONF_STATS` counters, surfaced only when `Config.collect_stats` is
/// set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrickleStats {
    pub totint: u32,
    pub totsend: u32,
    pub totrecv: u32,
    pub resets: u32,
}

/// Outcome of a fired DIO timer: whether to actually transmit, and the
/// delay until the timer should fire again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DioTick {
    pub send: bool,
    pub next_delay: Duration,
}

/// Drives one `Instance`'s Trickle timer. Stateless beyond the `Instance`
/// fields it mutates — mirrors the reference's free functions operating on
/// `rpl_instance_t *instance`.
pub struct DioScheduler;

impl DioScheduler {
    /// `new_dio_interval` — picks this interval's random send point, a
    /// uniform draw from `[I/2, I)`. Arms `dio_send` and stashes the
    /// remainder (`I` minus the send point) in `instance.dio_next_delay` for
    /// the second `ctimer_set` `handle_dio_timer` issues after the send
    /// decision. Returns the delay the caller should arm its timer for
    /// *now* — the send point itself, not the remainder.
    pub fn new_dio_interval(instance: &mut Instance, config: &Config, rng: &mut impl Rng) -> Duration {
        let interval_ms = 1u64 << instance.dio_intcurrent;
        let full = Duration::from_millis(interval_ms);

        let half = full / 2;
        let jitter = Duration::from_secs_f64(half.as_secs_f64() * rng.random::<f64>());
        let send_point = half + jitter;
        instance.dio_next_delay = full.saturating_sub(send_point);
        instance.dio_send = true;

        if config.collect_stats {
            instance.dio_totint += 1;
            instance.dio_totrecv += instance.dio_counter as u32;
        }

        instance.dio_counter = 0;
        send_point
    }

    /// `handle_dio_timer` — fires on the scheduled deadline. `link_local_ready`
    /// stands in for the reference's `uip_ds6_get_link_local(ADDR_PREFERRED)`
    /// check: when false, the caller should reschedule one second out and
    /// call this again, without consuming the pending send/double decision.
    pub fn handle_dio_timer(
        instance: &mut Instance,
        config: &Config,
        link_local_ready: bool,
        rng: &mut impl Rng,
    ) -> Option<DioTick> {
        if !link_local_ready {
            return None;
        }

        if instance.dio_send {
            let send = instance.dio_redundancy != 0 && instance.dio_counter < instance.dio_redundancy;
            if send && config.collect_stats {
                instance.dio_totsend += 1;
            }
            instance.dio_send = false;
            Some(DioTick {
                send,
                next_delay: instance.dio_next_delay,
            })
        } else {
            if instance.dio_intcurrent < instance.dio_intmin + instance.dio_intdoubl {
                instance.dio_intcurrent += 1;
            }
            let next_delay = Self::new_dio_interval(instance, config, rng);
            Some(DioTick {
                send: false,
                next_delay,
            })
        }
    }

    /// `rpl_reset_dio_timer` — collapse back to the minimum interval. A
    /// no-op (returns `None`) when already at the minimum, or when the node
    /// is leaf-only (`Config.leaf_only` gates DIO scheduling entirely).
    /// Otherwise returns the delay the caller should re-arm its timer for.
    pub fn rpl_reset_dio_timer(
        instance: &mut Instance,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Option<Duration> {
        tracing::debug!("r:r_d_t");

        if config.leaf_only {
            return None;
        }
        if instance.dio_intcurrent > instance.dio_intmin {
            instance.dio_counter = 0;
            instance.dio_intcurrent = instance.dio_intmin;
            let delay = Self::new_dio_interval(instance, config, rng);
            if config.collect_stats {
                instance.dio_resets += 1;
            }
            Some(delay)
        } else {
            None
        }
    }

    pub fn stats(instance: &Instance) -> TrickleStats {
        TrickleStats {
            totint: instance.dio_totint,
            totsend: instance.dio_totsend,
            totrecv: instance.dio_totrecv,
            resets: instance.dio_resets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn instance() -> Instance {
        Instance::new(256, 12, 8, 10)
    }

    #[test]
    fn new_interval_arms_send_and_resets_counter() {
        let config = Config::default();
        let mut instance = instance();
        instance.dio_counter = 3;
        let send_point = DioScheduler::new_dio_interval(&mut instance, &config, &mut rng());
        let full = Duration::from_millis(1u64 << instance.dio_intcurrent);
        assert!(instance.dio_send);
        assert_eq!(instance.dio_counter, 0);
        assert!(send_point >= full / 2 && send_point <= full);
        assert_eq!(instance.dio_next_delay, full.saturating_sub(send_point));
    }

    #[test]
    fn redundancy_suppresses_send_past_threshold() {
        let config = Config::default();
        let mut instance = instance();
        instance.dio_send = true;
        instance.dio_counter = instance.dio_redundancy;

        let tick = DioScheduler::handle_dio_timer(&mut instance, &config, true, &mut rng()).unwrap();
        assert!(!tick.send);
        assert!(!instance.dio_send);
    }

    #[test]
    fn link_local_not_ready_postpones() {
        let config = Config::default();
        let mut instance = instance();
        instance.dio_send = true;
        let tick = DioScheduler::handle_dio_timer(&mut instance, &config, false, &mut rng());
        assert!(tick.is_none());
        assert!(instance.dio_send, "pending send must survive the postponement");
    }

    #[test]
    fn interval_doubles_when_not_sending() {
        let config = Config::default();
        let mut instance = instance();
        instance.dio_send = false;
        let before = instance.dio_intcurrent;
        DioScheduler::handle_dio_timer(&mut instance, &config, true, &mut rng());
        assert_eq!(instance.dio_intcurrent, before + 1);
    }

    #[test]
    fn doubling_saturates_at_max_interval() {
        let config = Config::default();
        let mut instance = instance();
        instance.dio_intcurrent = instance.dio_intmin + instance.dio_intdoubl;
        instance.dio_send = false;
        DioScheduler::handle_dio_timer(&mut instance, &config, true, &mut rng());
        assert_eq!(instance.dio_intcurrent, instance.dio_intmin + instance.dio_intdoubl);
    }

    #[test]
    fn reset_dio_timer_collapses_to_minimum() {
        let config = Config::default();
        let mut instance = instance();
        instance.dio_intcurrent = instance.dio_intmin + 3;
        DioScheduler::rpl_reset_dio_timer(&mut instance, &config, &mut rng());
        assert_eq!(instance.dio_intcurrent, instance.dio_intmin);
    }

    #[test]
    fn reset_dio_timer_is_noop_for_leaf_only() {
        let mut config = Config::default();
        config.leaf_only = true;
        let mut instance = instance();
        instance.dio_intcurrent = instance.dio_intmin + 3;
        DioScheduler::rpl_reset_dio_timer(&mut instance, &config, &mut rng());
        assert_eq!(instance.dio_intcurrent, instance.dio_intmin + 3);
    }
}
