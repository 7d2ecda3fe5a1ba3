// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Frequency resolution: table lookup and the exact-rational rate
//! arithmetic shared by the rate propagator.
//!
//! All rates are integer Hz in 64 bits; intermediates widen to 128 bits so
//! multi-GHz PLL products cannot overflow. Fractional stages are evaluated
//! as exact rationals and rounded to the nearest Hz once.

use crate::node::{ClockNode, FreqEntry, NodeKind};
use crate::registry::{NodeState, OpError, Resolution};

/// `value * num / den`, rounded to nearest.
pub(crate) fn mul_div_round(value: u64, num: u128, den: u128) -> u64 {
    let scaled = value as u128 * num + den / 2;
    u64::try_from(scaled / den).unwrap_or(u64::MAX)
}

/// First table row whose rate is at or above `requested` (ceiling match;
/// ties resolve to the lowest index).
pub(crate) fn ceiling_match(table: &[FreqEntry], requested: u64) -> Option<&FreqEntry> {
    table.iter().find(|row| row.rate >= requested)
}

/// Rate the parent must run at for `row` to produce `row.rate`.
pub(crate) fn required_parent_rate(node: &ClockNode, row: &FreqEntry) -> Result<u64, OpError> {
    if row.div_x2 == 0 || (row.m != 0 && row.n == 0) {
        return Err(OpError::InvalidDivider { node: node.name });
    }
    let (m, n) = fractional_terms(row);
    // out = parent * 2 / div_x2 * m / n
    Ok(mul_div_round(
        row.rate,
        row.div_x2 as u128 * n,
        2 * m,
    ))
}

/// Output rate of `row` given the actual parent rate.
pub(crate) fn rate_from_parent(
    node: &ClockNode,
    parent_rate: u64,
    row: &FreqEntry,
) -> Result<u64, OpError> {
    if row.div_x2 == 0 || (row.m != 0 && row.n == 0) {
        return Err(OpError::InvalidDivider { node: node.name });
    }
    let (m, n) = fractional_terms(row);
    Ok(mul_div_round(parent_rate, 2 * m, row.div_x2 as u128 * n))
}

fn fractional_terms(row: &FreqEntry) -> (u128, u128) {
    if row.m == 0 {
        (1, 1)
    } else {
        (row.m as u128, row.n as u128)
    }
}

/// PLL output for an explicit bring-up configuration:
/// `reference * (l + m / n)`.
pub(crate) fn pll_rate(
    node: &ClockNode,
    reference: u64,
    l: u32,
    m: u32,
    n: u32,
) -> Result<u64, OpError> {
    if m != 0 && n == 0 {
        return Err(OpError::InvalidDivider { node: node.name });
    }
    let integer = reference as u128 * l as u128;
    let frac = if m == 0 {
        0
    } else {
        (reference as u128 * m as u128 + n as u128 / 2) / n as u128
    };
    Ok(u64::try_from(integer + frac).unwrap_or(u64::MAX))
}

/// Index of the parent candidate carrying mux selector `sel`. Guaranteed
/// to exist for table rows by the build-time selector check.
pub(crate) fn candidate_for_selector(node: &ClockNode, sel: u8) -> Option<usize> {
    node.parents.iter().position(|p| p.selector == sel)
}

/// Present output rate, walking current parents and committed table rows
/// down from the root.
pub(crate) fn current_rate(
    nodes: &[ClockNode],
    states: &[NodeState],
    idx: usize,
) -> Result<u64, OpError> {
    let node = &nodes[idx];
    match node.kind {
        NodeKind::Oscillator { rate } => Ok(rate),
        NodeKind::FixedFactor { mult, div } => {
            let parent = parent_rate(nodes, states, idx)?;
            Ok(mul_div_round(parent, mult as u128, div as u128))
        }
        NodeKind::Branch => parent_rate(nodes, states, idx),
        NodeKind::Rcg => match states[idx].config {
            // The tabulated rate is what the committed row was chosen to
            // produce; recompute through the divider for exactness.
            Some(row) => {
                let parent = parent_rate(nodes, states, idx)?;
                rate_from_parent(node, parent, &row)
            }
            // Bring-up state: mux passthrough of candidate 0.
            None => parent_rate(nodes, states, idx),
        },
        NodeKind::Pll { l, m, n } => match states[idx].config {
            Some(row) => Ok(row.rate),
            None => {
                let reference = parent_rate(nodes, states, idx)?;
                pll_rate(node, reference, l, m, n)
            }
        },
    }
}

fn parent_rate(nodes: &[ClockNode], states: &[NodeState], idx: usize) -> Result<u64, OpError> {
    let pi = states[idx].parent_index;
    let parent = nodes[idx].parents[pi].idx;
    current_rate(nodes, states, parent)
}

/// Rate the node would settle on for `requested`, with the table row (if
/// any) that produces it. Pure: no hardware access, no state change.
pub(crate) fn resolve(
    nodes: &[ClockNode],
    states: &[NodeState],
    idx: usize,
    requested: u64,
) -> Result<Resolution, OpError> {
    let node = &nodes[idx];
    match node.kind {
        NodeKind::Oscillator { rate } => {
            if requested == rate {
                Ok(Resolution {
                    achieved: rate,
                    entry: None,
                })
            } else {
                Err(OpError::NoMatchingFrequency {
                    node: node.name,
                    requested,
                })
            }
        }
        NodeKind::FixedFactor { mult, div } => {
            let parent = parent_rate(nodes, states, idx)?;
            Ok(Resolution {
                achieved: mul_div_round(parent, mult as u128, div as u128),
                entry: None,
            })
        }
        NodeKind::Branch => Ok(Resolution {
            achieved: parent_rate(nodes, states, idx)?,
            entry: None,
        }),
        NodeKind::Rcg | NodeKind::Pll { .. } if !node.freq_table.is_empty() => {
            let row = ceiling_match(&node.freq_table, requested).ok_or(
                OpError::NoMatchingFrequency {
                    node: node.name,
                    requested,
                },
            )?;
            Ok(Resolution {
                achieved: row.rate,
                entry: Some(*row),
            })
        }
        NodeKind::Rcg => Err(OpError::NoMatchingFrequency {
            node: node.name,
            requested,
        }),
        NodeKind::Pll { l, m, n } => {
            let reference = parent_rate(nodes, states, idx)?;
            Ok(Resolution {
                achieved: pll_rate(node, reference, l, m, n)?,
                entry: None,
            })
        }
    }
}
