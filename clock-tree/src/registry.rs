// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Registry construction and the public operation surface.
//!
//! A [`ClockTree`] owns the node arena (read-only after construction) and a
//! single mutex over everything that mutates at runtime: vote counts, gate
//! states, active parent indices, committed rate configurations and the
//! register-I/O handle. Every recursive walk holds the lock end-to-end, so
//! one logical operation has exclusive access to every node it touches.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use itertools::Itertools;

use crate::gate;
use crate::node::{ClockDescriptor, ClockNode, EnableState, FreqEntry, NodeKind, ResolvedParent};
use crate::rate;
use crate::regmap::{PollConfig, RegisterIo};
use crate::resolve;
use crate::topology;

/// Handle to a node inside one tree. Only meaningful for the tree that
/// issued it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClockId(pub(crate) usize);

/// Structural error raised while building a tree. Fatal: no partial
/// registry is ever returned.
#[derive(Debug, PartialEq, Eq)]
pub enum BuildError {
    DuplicateId {
        name: &'static str,
    },
    UnknownParentReference {
        node: &'static str,
        parent: &'static str,
    },
    /// A node whose kind requires a parent declares none.
    DanglingParent {
        node: &'static str,
    },
    CycleDetected {
        names: Vec<&'static str>,
    },
    /// Frequency table rates must be non-decreasing.
    TableNotSorted {
        node: &'static str,
    },
    /// A table row names a mux selector no declared parent carries.
    UnknownSelector {
        node: &'static str,
        selector: u8,
    },
    /// A fixed-factor node with a zero multiplier or divider.
    ZeroFixedFactor {
        node: &'static str,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::DuplicateId { name } => write!(f, "duplicate clock id {name:?}"),
            BuildError::UnknownParentReference { node, parent } => {
                write!(f, "clock {node:?} references unknown parent {parent:?}")
            }
            BuildError::DanglingParent { node } => {
                write!(f, "clock {node:?} requires a parent but declares none")
            }
            BuildError::CycleDetected { names } => {
                write!(f, "parent cycle through {}", names.iter().join(" -> "))
            }
            BuildError::TableNotSorted { node } => {
                write!(f, "frequency table of {node:?} is not sorted by rate")
            }
            BuildError::UnknownSelector { node, selector } => {
                write!(
                    f,
                    "frequency table of {node:?} uses selector {selector} with no matching parent"
                )
            }
            BuildError::ZeroFixedFactor { node } => {
                write!(f, "fixed factor of {node:?} has a zero term")
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Per-operation error. Node state is unchanged on failure, except for
/// `HaltTimeout` where the vote has already advanced (see [`gate`]).
#[derive(Debug, PartialEq, Eq)]
pub enum OpError {
    NotFound {
        name: String,
    },
    NoMatchingFrequency {
        node: &'static str,
        requested: u64,
    },
    InvalidDivider {
        node: &'static str,
    },
    /// The operation would need to retune or switch the parent mux and the
    /// node does not allow that.
    ParentRejected {
        node: &'static str,
    },
    InvalidParentIndex {
        node: &'static str,
        index: usize,
    },
    /// The halt/lock status never reflected the running state within the
    /// retry budget. The software vote is left incremented; the caller
    /// unwinds with an explicit `disable`.
    HaltTimeout {
        node: &'static str,
    },
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpError::NotFound { name } => write!(f, "no clock named {name:?}"),
            OpError::NoMatchingFrequency { node, requested } => {
                write!(f, "{node:?} cannot produce {requested} Hz")
            }
            OpError::InvalidDivider { node } => write!(f, "invalid divider on {node:?}"),
            OpError::ParentRejected { node } => {
                write!(f, "{node:?} does not allow retuning its parent")
            }
            OpError::InvalidParentIndex { node, index } => {
                write!(f, "{node:?} has no parent candidate {index}")
            }
            OpError::HaltTimeout { node } => {
                write!(f, "{node:?} did not ack within the poll budget")
            }
        }
    }
}

impl std::error::Error for OpError {}

/// Outcome of [`ClockTree::resolve`]: the rate the node would produce and
/// the table row (if any) that produces it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub achieved: u64,
    pub entry: Option<FreqEntry>,
}

/// Mutable per-node state, guarded by the tree mutex.
#[derive(Debug, Default)]
pub(crate) struct NodeState {
    pub votes: u32,
    pub enable_state: EnableState,
    pub parent_index: usize,
    /// Last table row committed by `set_rate`. `None` means the node still
    /// runs its bring-up configuration (bypass for an RCG, l/m/n for a PLL).
    pub config: Option<FreqEntry>,
}

pub(crate) struct TreeState {
    pub states: Vec<NodeState>,
    pub io: Box<dyn RegisterIo + Send>,
    pub poll: PollConfig,
}

pub struct ClockTree {
    nodes: Vec<ClockNode>,
    index: HashMap<&'static str, usize>,
    inner: Mutex<TreeState>,
}

// Hand-written because the register-I/O handle behind the mutex has no
// Debug; the topology is the interesting part anyway.
impl fmt::Debug for ClockTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockTree")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

impl ClockTree {
    /// Build a tree from descriptors. Resolves every parent reference,
    /// checks table preconditions and validates the topology before
    /// returning; any failure aborts the whole build.
    pub fn new(
        descriptors: Vec<ClockDescriptor>,
        io: Box<dyn RegisterIo + Send>,
        poll: PollConfig,
    ) -> Result<Self, BuildError> {
        let mut index = HashMap::with_capacity(descriptors.len());
        for (i, d) in descriptors.iter().enumerate() {
            if index.insert(d.name, i).is_some() {
                return Err(BuildError::DuplicateId { name: d.name });
            }
        }

        let mut nodes = Vec::with_capacity(descriptors.len());
        for d in &descriptors {
            nodes.push(Self::build_node(d, &index)?);
        }

        topology::validate(&nodes)?;

        let states = nodes.iter().map(|_| NodeState::default()).collect();
        Ok(Self {
            nodes,
            index,
            inner: Mutex::new(TreeState { states, io, poll }),
        })
    }

    fn build_node(
        d: &ClockDescriptor,
        index: &HashMap<&'static str, usize>,
    ) -> Result<ClockNode, BuildError> {
        if let NodeKind::FixedFactor { mult, div } = d.kind {
            if mult == 0 || div == 0 {
                return Err(BuildError::ZeroFixedFactor { node: d.name });
            }
        }

        let mut parents = Vec::with_capacity(d.parents.len());
        for p in &d.parents {
            let idx = *index
                .get(p.name)
                .ok_or(BuildError::UnknownParentReference {
                    node: d.name,
                    parent: p.name,
                })?;
            parents.push(ResolvedParent {
                idx,
                selector: p.selector,
            });
        }

        if d.freq_table
            .iter()
            .tuple_windows()
            .any(|(a, b)| b.rate < a.rate)
        {
            return Err(BuildError::TableNotSorted { node: d.name });
        }
        for row in &d.freq_table {
            if !parents.iter().any(|p| p.selector == row.parent_sel) {
                return Err(BuildError::UnknownSelector {
                    node: d.name,
                    selector: row.parent_sel,
                });
            }
        }

        Ok(ClockNode {
            name: d.name,
            kind: d.kind,
            parents,
            freq_table: d.freq_table.clone(),
            enable_reg: d.enable_reg,
            config_reg: d.config_reg,
            halt: d.halt,
            halt_check: d.halt_check,
            set_rate_parent: d.set_rate_parent,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TreeState> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn lookup(&self, name: &str) -> Result<ClockId, OpError> {
        self.index
            .get(name)
            .map(|&i| ClockId(i))
            .ok_or_else(|| OpError::NotFound {
                name: name.to_owned(),
            })
    }

    pub fn name(&self, id: ClockId) -> &'static str {
        self.nodes[id.0].name
    }

    /// Rate the node would settle on for `requested`, without touching
    /// hardware or node state.
    pub fn resolve(&self, id: ClockId, requested: u64) -> Result<Resolution, OpError> {
        let inner = self.lock();
        resolve::resolve(&self.nodes, &inner.states, id.0, requested)
    }

    /// Present output rate of the node, walking current parents and
    /// committed configurations down from the root.
    pub fn current_rate(&self, id: ClockId) -> Result<u64, OpError> {
        let inner = self.lock();
        resolve::current_rate(&self.nodes, &inner.states, id.0)
    }

    /// Retune the node (and, where allowed, its ancestors) to the smallest
    /// achievable rate at or above `requested`. All-or-nothing: on error no
    /// node state has changed and nothing was written.
    pub fn set_rate(&self, id: ClockId, requested: u64) -> Result<u64, OpError> {
        let mut inner = self.lock();
        rate::set_rate(&self.nodes, &mut inner, id.0, requested)
    }

    /// Vote the node (and its ancestor chain) on. Hardware is touched only
    /// on the 0 -> 1 vote edge of each node along the chain.
    pub fn enable(&self, id: ClockId) -> Result<(), OpError> {
        let mut inner = self.lock();
        gate::enable(&self.nodes, &mut inner, id.0)
    }

    /// Drop one vote. Unbalanced calls are logged and ignored.
    pub fn disable(&self, id: ClockId) {
        let mut inner = self.lock();
        gate::disable(&self.nodes, &mut inner, id.0);
    }

    /// Switch the active parent mux to candidate `parent_index`.
    pub fn reparent(&self, id: ClockId, parent_index: usize) -> Result<(), OpError> {
        let mut inner = self.lock();
        rate::reparent(&self.nodes, &mut inner, id.0, parent_index)
    }

    pub fn is_enabled(&self, id: ClockId) -> bool {
        let inner = self.lock();
        inner.states[id.0].enable_state == EnableState::Enabled
    }

    pub fn vote_count(&self, id: ClockId) -> u32 {
        let inner = self.lock();
        inner.states[id.0].votes
    }
}
