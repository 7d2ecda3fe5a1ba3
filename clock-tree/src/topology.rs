// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Build-time topology validation. Runs exactly once, before the tree is
//! handed to callers; the runtime walks rely on the graph being acyclic
//! and never re-check.

use crate::node::{ClockNode, NodeKind};
use crate::registry::BuildError;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Walk parent links from every node. A revisit of an in-progress node is
/// a cycle; a non-oscillator without any parent candidate is dangling.
pub(crate) fn validate(nodes: &[ClockNode]) -> Result<(), BuildError> {
    for node in nodes {
        let is_root = matches!(node.kind, NodeKind::Oscillator { .. });
        if !is_root && node.parents.is_empty() {
            return Err(BuildError::DanglingParent { node: node.name });
        }
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    for start in 0..nodes.len() {
        if marks[start] == Mark::Done {
            continue;
        }
        dfs(nodes, &mut marks, start)?;
    }
    Ok(())
}

fn dfs(nodes: &[ClockNode], marks: &mut [Mark], start: usize) -> Result<(), BuildError> {
    // (node, next parent candidate to visit)
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
    marks[start] = Mark::InProgress;

    while let Some(&(idx, candidate)) = stack.last() {
        match nodes[idx].parents.get(candidate) {
            None => {
                marks[idx] = Mark::Done;
                stack.pop();
            }
            Some(parent) => {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match marks[parent.idx] {
                    Mark::Done => {}
                    Mark::Unvisited => {
                        marks[parent.idx] = Mark::InProgress;
                        stack.push((parent.idx, 0));
                    }
                    Mark::InProgress => {
                        // The in-progress suffix of the stack is the cycle.
                        let names = stack
                            .iter()
                            .map(|&(i, _)| nodes[i].name)
                            .skip_while(|&n| n != nodes[parent.idx].name)
                            .chain([nodes[parent.idx].name])
                            .collect();
                        return Err(BuildError::CycleDetected { names });
                    }
                }
            }
        }
    }
    Ok(())
}
