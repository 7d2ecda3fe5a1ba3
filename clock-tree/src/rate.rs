// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Rate propagation. `set_rate` first plans the whole chain leaf-to-root
//! without touching anything, then commits hardware writes and state
//! updates parent-first. A failure anywhere in the planning walk leaves
//! every node untouched; the one commit-side failure is a halt timeout
//! while migrating an enabled node's vote to a new parent chain, which
//! stops the commit with the same advanced-vote semantics as any other
//! enable-side timeout.

use log::debug;

use crate::gate;
use crate::node::{ClockNode, FreqEntry, NodeKind};
use crate::registry::{NodeState, OpError, TreeState};
use crate::resolve;

/// One planned reconfiguration, applied on commit.
struct Step {
    idx: usize,
    row: FreqEntry,
    /// Parent candidate active after commit.
    parent_index: usize,
}

pub(crate) fn set_rate(
    nodes: &[ClockNode],
    inner: &mut TreeState,
    idx: usize,
    requested: u64,
) -> Result<u64, OpError> {
    let mut steps = Vec::new();
    let achieved = plan(nodes, &inner.states, idx, requested, &mut steps)?;
    commit(nodes, inner, &steps)?;
    Ok(achieved)
}

fn plan(
    nodes: &[ClockNode],
    states: &[NodeState],
    idx: usize,
    requested: u64,
    steps: &mut Vec<Step>,
) -> Result<u64, OpError> {
    let node = &nodes[idx];
    let no_match = || OpError::NoMatchingFrequency {
        node: node.name,
        requested,
    };

    match node.kind {
        NodeKind::Oscillator { rate } => {
            if requested == rate {
                Ok(rate)
            } else {
                Err(no_match())
            }
        }
        NodeKind::FixedFactor { .. } | NodeKind::Branch => {
            let (mult, div) = match node.kind {
                NodeKind::FixedFactor { mult, div } => (mult as u128, div as u128),
                _ => (1, 1),
            };
            if node.set_rate_parent {
                let needed = resolve::mul_div_round(requested, div, mult);
                let parent = current_parent(nodes, states, idx);
                let parent_rate = plan(nodes, states, parent, needed, steps)?;
                Ok(resolve::mul_div_round(parent_rate, mult, div))
            } else {
                // No local divider to retune: the request must be exactly
                // what the chain already produces.
                let achieved = resolve::current_rate(nodes, states, idx)?;
                if achieved == requested {
                    Ok(achieved)
                } else {
                    Err(no_match())
                }
            }
        }
        NodeKind::Rcg => {
            let row = *resolve::ceiling_match(&node.freq_table, requested).ok_or_else(no_match)?;
            let candidate = resolve::candidate_for_selector(node, row.parent_sel)
                .ok_or(OpError::ParentRejected { node: node.name })?;
            if candidate != states[idx].parent_index && !node.set_rate_parent {
                return Err(OpError::ParentRejected { node: node.name });
            }
            let achieved = if node.set_rate_parent {
                let needed = resolve::required_parent_rate(node, &row)?;
                let parent = node.parents[candidate].idx;
                let parent_rate = plan(nodes, states, parent, needed, steps)?;
                resolve::rate_from_parent(node, parent_rate, &row)?
            } else {
                row.rate
            };
            steps.push(Step {
                idx,
                row,
                parent_index: candidate,
            });
            Ok(achieved)
        }
        NodeKind::Pll { l, m, n } => {
            if node.freq_table.is_empty() {
                // Bring-up configuration only; the PLL cannot retune.
                let reference = resolve::current_rate(
                    nodes,
                    states,
                    current_parent(nodes, states, idx),
                )?;
                let achieved = resolve::pll_rate(node, reference, l, m, n)?;
                if achieved == requested {
                    Ok(achieved)
                } else {
                    Err(no_match())
                }
            } else {
                // Table rows program L/M/N against the fixed reference;
                // no demand is placed on the parent.
                let row =
                    *resolve::ceiling_match(&node.freq_table, requested).ok_or_else(no_match)?;
                let candidate = resolve::candidate_for_selector(node, row.parent_sel)
                    .ok_or(OpError::ParentRejected { node: node.name })?;
                if candidate != states[idx].parent_index && !node.set_rate_parent {
                    return Err(OpError::ParentRejected { node: node.name });
                }
                steps.push(Step {
                    idx,
                    row,
                    parent_index: candidate,
                });
                Ok(row.rate)
            }
        }
    }
}

fn commit(nodes: &[ClockNode], inner: &mut TreeState, steps: &[Step]) -> Result<(), OpError> {
    for step in steps {
        let node = &nodes[step.idx];
        let old_index = inner.states[step.idx].parent_index;

        // An enabled node moving to another parent carries its vote over:
        // the new chain is brought up before the mux switch, the old one
        // released after. A halt timeout here surfaces like any other
        // enable-side timeout and stops the commit.
        let migrate = inner.states[step.idx].votes > 0 && step.parent_index != old_index;
        if migrate {
            gate::enable(nodes, inner, node.parents[step.parent_index].idx)?;
        }

        if let Some(cfg) = node.config_reg {
            inner
                .io
                .write(cfg.addr, cfg.mask, cfg_value(step.row.parent_sel, step.row.div_x2));
        }
        let state = &mut inner.states[step.idx];
        state.parent_index = step.parent_index;
        state.config = Some(step.row);
        debug!(
            "{}: committed {} Hz (selector {}, div_x2 {})",
            node.name, step.row.rate, step.row.parent_sel, step.row.div_x2
        );

        if migrate {
            gate::disable(nodes, inner, node.parents[old_index].idx);
        }
    }
    Ok(())
}

// CFG word: mux selector in bits [10:8], half-integer divider in [7:0].
fn cfg_value(sel: u8, div_x2: u32) -> u32 {
    ((sel as u32) << 8) | (div_x2 & 0xff)
}

fn current_parent(nodes: &[ClockNode], states: &[NodeState], idx: usize) -> usize {
    nodes[idx].parents[states[idx].parent_index].idx
}

/// Switch the active parent mux to candidate `parent_index`. While the
/// node is enabled this is allowed only with `set_rate_parent`; the new
/// parent chain is voted on before the switch and the old one released
/// after, so the node is never left running from a gated-off parent.
pub(crate) fn reparent(
    nodes: &[ClockNode],
    inner: &mut TreeState,
    idx: usize,
    parent_index: usize,
) -> Result<(), OpError> {
    let node = &nodes[idx];
    if parent_index >= node.parents.len() {
        return Err(OpError::InvalidParentIndex {
            node: node.name,
            index: parent_index,
        });
    }
    let old_index = inner.states[idx].parent_index;
    if parent_index == old_index {
        return Ok(());
    }

    let enabled = inner.states[idx].votes > 0;
    if enabled && !node.set_rate_parent {
        return Err(OpError::ParentRejected { node: node.name });
    }
    if enabled {
        gate::enable(nodes, inner, node.parents[parent_index].idx)?;
    }

    if let Some(cfg) = node.config_reg {
        let sel = node.parents[parent_index].selector;
        inner.io.write(cfg.addr, cfg.mask, (sel as u32) << 8);
    }
    inner.states[idx].parent_index = parent_index;
    debug!("{}: reparented to candidate {}", node.name, parent_index);

    if enabled {
        gate::disable(nodes, inner, node.parents[old_index].idx);
    }
    Ok(())
}
