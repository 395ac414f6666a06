//! Mobility-aware RPL routing-decision core.
//!
//! This crate is the objective function, connectivity/mobility manager, and
//! Trickle/DAO timer machinery for a mobility-aware variant of RPL (the
//! IPv6 Routing Protocol for Low-Power and Lossy Networks) — not the whole
//! protocol stack. Frame serialization, the neighbor table, and the
//! underlying IPv6/6LoWPAN/MAC layers are external collaborators the host
//! application supplies through the [`host`] trait seams.
//!
//! Key components:
//! - [`objective`] — pluggable rank/parent/DAG-selection policy (`RhOf`,
//!   `StabilityOf`)
//! - [`mobility`] — EWMA-based local mobility classification
//! - [`connectivity`] — per-second link-loss/lifetime/discovery sweep
//! - [`trickle`] — Trickle DIO scheduler
//! - [`dao`] — DAO scheduling and generic per-parent probing
//! - [`topology`] — the slab arena owning `Instance`/`Dag`/`ParentRecord`
//! - [`node`] — [`node::NodeContext`], wiring all of the above together
//! - [`config`] — TOML-based runtime configuration

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod dao;
pub mod host;
pub mod ids;
pub mod mobility;
pub mod node;
pub mod objective;
pub mod parent;
pub mod topology;
pub mod trickle;

pub use config::{Config, ConfigInput};
pub use node::NodeContext;

/// Initialize the crate's `tracing` subscriber.
///
/// Installs a default env-filter subscriber if none is already set. Safe to
/// call multiple times — later calls are no-ops. Controlled by `RUST_LOG`
/// (e.g. `RUST_LOG=mobirpl_core=debug`).
pub fn init() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if tracing::dispatcher::has_been_set() {
            tracing::info!("mobirpl-core: tracing subscriber already set");
            return;
        }
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_target(true)
            .compact()
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::info!("mobirpl-core initialized");
        }
    });
}
