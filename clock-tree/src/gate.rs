// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Enable-vote gating. Every node carries a vote count; only the 0 -> 1
//! and 1 -> 0 edges touch hardware. On the way up the parent is enabled
//! first so a branch is never ungated while its source is stopped; on the
//! way down the parent is released last.

use log::{debug, warn};

use crate::node::{ClockNode, EnableState, HaltCheck};
use crate::registry::{OpError, TreeState};

pub(crate) fn enable(
    nodes: &[ClockNode],
    inner: &mut TreeState,
    idx: usize,
) -> Result<(), OpError> {
    let node = &nodes[idx];

    if inner.states[idx].votes > 0 {
        inner.states[idx].votes += 1;
        return Ok(());
    }

    if let Some(parent) = current_parent(nodes, inner, idx) {
        enable(nodes, inner, parent)?;
    }

    // 0 -> 1 edge. The vote advances before the status poll: if the poll
    // times out the enable write is already out and cannot be un-sent, so
    // the software state keeps claiming the vote and the caller unwinds
    // with an explicit disable.
    let state = &mut inner.states[idx];
    state.enable_state = EnableState::Enabling;
    state.votes = 1;

    if let Some(en) = node.enable_reg {
        inner.io.write(en.addr, en.mask, en.mask);
    }

    if let Some(halt) = node.halt {
        let poll_on_enable = matches!(node.halt_check, HaltCheck::Wait | HaltCheck::Voted);
        if poll_on_enable {
            let poll = inner.poll;
            let ok = inner.io.poll_until(
                halt.addr,
                halt.mask,
                halt.running_value,
                poll.max_attempts,
                poll.delay,
            );
            if !ok {
                return Err(OpError::HaltTimeout { node: node.name });
            }
        }
    }

    inner.states[idx].enable_state = EnableState::Enabled;
    debug!("{}: enabled", node.name);
    Ok(())
}

pub(crate) fn disable(nodes: &[ClockNode], inner: &mut TreeState, idx: usize) {
    let node = &nodes[idx];

    match inner.states[idx].votes {
        0 => {
            warn!("{}: unbalanced disable ignored", node.name);
            return;
        }
        1 => {}
        _ => {
            inner.states[idx].votes -= 1;
            return;
        }
    }

    // 1 -> 0 edge.
    inner.states[idx].enable_state = EnableState::Disabling;
    inner.states[idx].votes = 0;

    if let Some(en) = node.enable_reg {
        inner.io.write(en.addr, en.mask, 0);
    }

    // Only `Wait` branches confirm the stop. A voted branch may legally
    // keep running as long as another voter holds it, and the clear cannot
    // be un-sent anyway, so a failed poll here is logged and not returned.
    if node.halt_check == HaltCheck::Wait {
        if let Some(halt) = node.halt {
            let poll = inner.poll;
            let ok = inner.io.poll_until(
                halt.addr,
                halt.mask,
                halt.halted_value(),
                poll.max_attempts,
                poll.delay,
            );
            if !ok {
                warn!("{}: still running after disable", node.name);
            }
        }
    }

    inner.states[idx].enable_state = EnableState::Disabled;
    debug!("{}: disabled", node.name);

    if let Some(parent) = current_parent(nodes, inner, idx) {
        disable(nodes, inner, parent);
    }
}

fn current_parent(nodes: &[ClockNode], inner: &TreeState, idx: usize) -> Option<usize> {
    let node = &nodes[idx];
    if node.parents.is_empty() {
        return None;
    }
    Some(node.parents[inner.states[idx].parent_index].idx)
}
