//! # DAG & Instance Arena
//!
//! `Dag` and `Instance` records plus the `Topology` arena that owns all
//! parent/DAG/instance storage, following a slab-arena pattern: back-
//! references are small `Copy` ids rather than pointers, so the graph has
//! no cycles to reason about and nothing here needs `Rc`/`RefCell`.

use std::time::Duration;

use slab::Slab;

use crate::ids::{DagId, InstanceId, ParentId};
use crate::parent::ParentRecord;

/// `RPL_DAG_MC_*` — only `None` is meaningful for RH-OF
/// (`update_metric_container` always sets this).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricContainerType {
    #[default]
    None,
}

/// A routing instance: one Trickle timer, one set of member DAGs.
#[derive(Debug, Clone)]
pub struct Instance {
    pub min_hoprankinc: u16,

    // ─── Trickle state ──────────────────────────────────────────────────
    pub dio_intmin: u8,
    pub dio_intdoubl: u8,
    pub dio_intcurrent: u8,
    pub dio_counter: u16,
    pub dio_redundancy: u16,
    pub dio_next_delay: Duration,
    pub dio_send: bool,

    // ─── RPL_CONF_STATS counters ─────────────────────────────────────────
    pub dio_totint: u32,
    pub dio_totsend: u32,
    pub dio_totrecv: u32,
    pub dio_resets: u32,

    pub dags: Vec<DagId>,
    pub current_dag: Option<DagId>,
    pub mc: MetricContainerType,
}

impl Instance {
    pub fn new(min_hoprankinc: u16, dio_intmin: u8, dio_intdoubl: u8, dio_redundancy: u16) -> Self {
        Self {
            min_hoprankinc,
            dio_intmin,
            dio_intdoubl,
            dio_intcurrent: dio_intmin,
            dio_counter: 0,
            dio_redundancy,
            dio_next_delay: Duration::ZERO,
            dio_send: false,
            dio_totint: 0,
            dio_totsend: 0,
            dio_totrecv: 0,
            dio_resets: 0,
            dags: Vec::new(),
            current_dag: None,
            mc: MetricContainerType::None,
        }
    }
}

/// A destination-oriented DAG.
#[derive(Debug, Clone)]
pub struct Dag {
    pub grounded: bool,
    /// 3-bit administrative preference, 0..=7.
    pub preference: u8,
    /// This node's own rank within the DAG.
    pub rank: u16,
    pub preferred_parent: Option<ParentId>,
    pub instance: InstanceId,
}

impl Dag {
    pub fn new(instance: InstanceId, preference: u8, grounded: bool) -> Self {
        Self {
            grounded,
            preference,
            rank: crate::objective::INFINITE_RANK,
            preferred_parent: None,
            instance,
        }
    }
}

/// Owns every `Instance`, `Dag`, and `ParentRecord` for this node, indexed
/// by arena id. All access happens on the single event-loop thread — no
/// internal locking.
#[derive(Debug, Default)]
pub struct Topology {
    instances: Slab<Instance>,
    dags: Slab<Dag>,
    parents: Slab<ParentRecord>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_instance(&mut self, instance: Instance) -> InstanceId {
        InstanceId(self.instances.insert(instance))
    }

    pub fn insert_dag(&mut self, dag: Dag) -> DagId {
        let instance_id = dag.instance;
        let id = DagId(self.dags.insert(dag));
        self.instances[instance_id.0].dags.push(id);
        id
    }

    pub fn insert_parent(&mut self, parent: ParentRecord) -> ParentId {
        ParentId(self.parents.insert(parent))
    }

    pub fn remove_parent(&mut self, id: ParentId) -> Option<ParentRecord> {
        if self.parents.contains(id.0) {
            let removed = self.parents.remove(id.0);
            for dag in self.dags.iter_mut().map(|(_, d)| d) {
                if dag.preferred_parent == Some(id) {
                    dag.preferred_parent = None;
                }
            }
            Some(removed)
        } else {
            None
        }
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id.0]
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.instances[id.0]
    }

    pub fn dag(&self, id: DagId) -> &Dag {
        &self.dags[id.0]
    }

    pub fn dag_mut(&mut self, id: DagId) -> &mut Dag {
        &mut self.dags[id.0]
    }

    pub fn parent(&self, id: ParentId) -> &ParentRecord {
        &self.parents[id.0]
    }

    pub fn parent_mut(&mut self, id: ParentId) -> &mut ParentRecord {
        &mut self.parents[id.0]
    }

    pub fn get_parent(&self, id: ParentId) -> Option<&ParentRecord> {
        self.parents.get(id.0)
    }

    /// Stable-order iteration over every parent in the arena — iteration
    /// order over parents must be stable within one tick. `slab` yields
    /// entries in ascending key order, so this holds as long as the tick
    /// doesn't itself insert/remove parents mid-iteration.
    pub fn parent_ids(&self) -> impl Iterator<Item = ParentId> + '_ {
        self.parents.iter().map(|(k, _)| ParentId(k))
    }

    /// Parents belonging to a specific DAG, in stable arena order.
    pub fn parent_ids_in_dag(&self, dag: DagId) -> impl Iterator<Item = ParentId> + '_ {
        self.parents
            .iter()
            .filter(move |(_, p)| p.dag == dag)
            .map(|(k, _)| ParentId(k))
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }
}
