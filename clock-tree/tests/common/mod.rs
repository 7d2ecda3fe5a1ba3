// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use core::time::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use clock_tree::RegisterIo;

/// Recorded poll: address, mask, expected value, attempt budget passed in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PollRecord {
    pub addr: u32,
    pub mask: u32,
    pub expected: u32,
    pub max_attempts: u32,
}

#[derive(Default)]
struct MockState {
    regs: HashMap<u32, u32>,
    writes: Vec<(u32, u32, u32)>,
    polls: Vec<PollRecord>,
    failing_polls: HashSet<u32>,
}

/// Register-file test double. Clones share state, so a test can keep one
/// handle while the tree owns the other.
#[derive(Clone, Default)]
pub struct MockRegmap {
    state: Arc<Mutex<MockState>>,
}

impl MockRegmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every poll of `addr` report the unexpected value until the
    /// budget runs out.
    pub fn fail_polls_at(&self, addr: u32) {
        self.state.lock().unwrap().failing_polls.insert(addr);
    }

    pub fn reg(&self, addr: u32) -> u32 {
        *self.state.lock().unwrap().regs.get(&addr).unwrap_or(&0)
    }

    /// `(mask, value)` pairs written to `addr`, in order.
    pub fn writes_to(&self, addr: u32) -> Vec<(u32, u32)> {
        self.state
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|(a, _, _)| *a == addr)
            .map(|(_, m, v)| (*m, *v))
            .collect()
    }

    pub fn polls_of(&self, addr: u32) -> Vec<PollRecord> {
        self.state
            .lock()
            .unwrap()
            .polls
            .iter()
            .filter(|p| p.addr == addr)
            .copied()
            .collect()
    }
}

impl RegisterIo for MockRegmap {
    fn read(&mut self, addr: u32) -> u32 {
        *self.state.lock().unwrap().regs.get(&addr).unwrap_or(&0)
    }

    fn write(&mut self, addr: u32, mask: u32, value: u32) {
        let mut state = self.state.lock().unwrap();
        let old = *state.regs.get(&addr).unwrap_or(&0);
        state.regs.insert(addr, (old & !mask) | (value & mask));
        state.writes.push((addr, mask, value));
    }

    fn poll_until(
        &mut self,
        addr: u32,
        mask: u32,
        expected: u32,
        max_attempts: u32,
        _delay: Duration,
    ) -> bool {
        let mut state = self.state.lock().unwrap();
        state.polls.push(PollRecord {
            addr,
            mask,
            expected,
            max_attempts,
        });
        // Status registers follow the engine's own writes in this model;
        // unless a test forces a failure, the hardware acks immediately.
        !state.failing_polls.contains(&addr)
    }
}
