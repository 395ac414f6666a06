//! Small `Copy` handles into the [`crate::topology::Topology`] arenas.
//!
//! The reference implementation threads raw pointers (`rpl_parent_t *`,
//! `rpl_dag_t *`) between parent, DAG, and instance. A safe port places all
//! three in `slab::Slab` arenas and hands out these integer handles instead,
//! so a parent can name its owning DAG without holding a reference to it.

use std::fmt;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_id!(ParentId);
arena_id!(DagId);
arena_id!(InstanceId);
