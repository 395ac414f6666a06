//! # Host Collaborator Boundary
//!
//! Trait seams to the host platform this core is embedded in — neighbor
//! table, frame emission, link-local readiness. The core never touches a
//! socket or a radio directly; callers implement these traits against
//! whatever MAC/IP stack they run.

use std::net::Ipv6Addr;

/// Neighbor-table lookups the objective function needs before trusting a
/// parent comparison.
pub trait NeighborTable {
    /// Whether `addr` currently has a neighbor-table entry.
    fn has_neighbor_entry(&self, addr: Ipv6Addr) -> bool;

    /// Install the flattened link metric for `addr` — deliberately set to
    /// `min_hoprankinc`, not a function of RSSI.
    fn set_link_metric(&mut self, addr: Ipv6Addr, metric: u16);
}

/// Frame emission the core requests but never performs itself.
pub trait FrameSink {
    /// Multicast or unicast DIS. `target` is `None` for multicast.
    fn dis_output(&mut self, target: Option<Ipv6Addr>);

    /// DIO, either multicast (periodic) or unicast (a generic-probing
    /// target).
    fn dio_output(&mut self, target: Option<Ipv6Addr>);

    /// DAO toward `target` with the given route lifetime.
    fn dao_output(&mut self, target: Ipv6Addr, lifetime: u8);
}

/// Link-local readiness check, standing in for
/// `uip_ds6_get_link_local(ADDR_PREFERRED) != NULL` — both the DIO and DAO
/// schedulers postpone their first send until this is true.
pub trait LinkLocalReady {
    fn link_local_ready(&self) -> bool;
}
