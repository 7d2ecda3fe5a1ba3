// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;

use clock_tree::{
    ClockDescriptor, ClockTree, HaltCheck, NodeKind, OpError, PollConfig, RegField, StatusField,
};
use test_strategy::proptest;

mod common;
use common::MockRegmap;

const GATE_ADDR: u32 = 0x1008;
const GATE_BIT: u32 = 1;
const HALT_ADDR: u32 = 0x100c;
const HALT_BIT: u32 = 1 << 31;
const PARENT_GATE_ADDR: u32 = 0x2000;

fn build(descriptors: Vec<ClockDescriptor>) -> (ClockTree, MockRegmap) {
    let io = MockRegmap::new();
    let poll = PollConfig {
        max_attempts: 5,
        delay: Duration::from_micros(1),
    };
    let tree = ClockTree::new(descriptors, Box::new(io.clone()), poll).unwrap();
    (tree, io)
}

/// XO feeding a gated parent branch feeding a gated leaf branch. The halt
/// bit is CBCR-style: set while the clock is stopped.
fn gated_chain(leaf_check: HaltCheck) -> Vec<ClockDescriptor> {
    vec![
        ClockDescriptor::new("xo", NodeKind::Oscillator { rate: 19_200_000 }),
        ClockDescriptor::new("parent", NodeKind::Branch)
            .parent("xo", 0)
            .enable_reg(RegField {
                addr: PARENT_GATE_ADDR,
                mask: GATE_BIT,
            }),
        ClockDescriptor::new("leaf", NodeKind::Branch)
            .parent("parent", 0)
            .enable_reg(RegField {
                addr: GATE_ADDR,
                mask: GATE_BIT,
            })
            .halt(
                StatusField {
                    addr: HALT_ADDR,
                    mask: HALT_BIT,
                    running_value: 0,
                },
                leaf_check,
            ),
    ]
}

#[test]
fn enable_votes_up_the_chain() {
    let (tree, io) = build(gated_chain(HaltCheck::Wait));
    let leaf = tree.lookup("leaf").unwrap();
    let parent = tree.lookup("parent").unwrap();

    tree.enable(leaf).unwrap();

    assert!(tree.is_enabled(leaf));
    assert!(tree.is_enabled(parent));
    assert_eq!(tree.vote_count(leaf), 1);
    assert_eq!(tree.vote_count(parent), 1);
    // Parent gate written before the leaf gate.
    assert_eq!(io.writes_to(PARENT_GATE_ADDR), vec![(GATE_BIT, GATE_BIT)]);
    assert_eq!(io.writes_to(GATE_ADDR), vec![(GATE_BIT, GATE_BIT)]);
}

#[test]
fn vote_edges_touch_hardware_exactly_once() {
    let (tree, io) = build(gated_chain(HaltCheck::Wait));
    let leaf = tree.lookup("leaf").unwrap();

    for _ in 0..4 {
        tree.enable(leaf).unwrap();
    }
    assert_eq!(tree.vote_count(leaf), 4);

    for _ in 0..4 {
        tree.disable(leaf);
    }
    assert_eq!(tree.vote_count(leaf), 0);
    assert!(!tree.is_enabled(leaf));

    // One set on the first enable, one clear on the last disable.
    assert_eq!(
        io.writes_to(GATE_ADDR),
        vec![(GATE_BIT, GATE_BIT), (GATE_BIT, 0)]
    );
}

#[test]
fn unbalanced_disable_is_ignored() {
    let (tree, io) = build(gated_chain(HaltCheck::Wait));
    let leaf = tree.lookup("leaf").unwrap();

    tree.disable(leaf);

    assert_eq!(tree.vote_count(leaf), 0);
    assert!(io.writes_to(GATE_ADDR).is_empty());
}

#[test]
fn halt_timeout_leaves_the_vote_advanced() {
    let (tree, io) = build(gated_chain(HaltCheck::Wait));
    let leaf = tree.lookup("leaf").unwrap();
    io.fail_polls_at(HALT_ADDR);

    assert_eq!(
        tree.enable(leaf),
        Err(OpError::HaltTimeout { node: "leaf" })
    );

    // Not rolled back; the caller unwinds explicitly.
    assert_eq!(tree.vote_count(leaf), 1);
    assert!(!tree.is_enabled(leaf));

    let polls = io.polls_of(HALT_ADDR);
    assert_eq!(polls.len(), 1);
    // The full configured budget was handed to the poll.
    assert_eq!(polls[0].max_attempts, 5);
    assert_eq!(polls[0].expected, 0);

    // Explicit unwind brings the vote back down and clears the gate.
    tree.disable(leaf);
    assert_eq!(tree.vote_count(leaf), 0);
    assert_eq!(
        io.writes_to(GATE_ADDR),
        vec![(GATE_BIT, GATE_BIT), (GATE_BIT, 0)]
    );
}

#[test]
fn wait_branch_polls_on_both_edges() {
    let (tree, io) = build(gated_chain(HaltCheck::Wait));
    let leaf = tree.lookup("leaf").unwrap();

    tree.enable(leaf).unwrap();
    tree.disable(leaf);

    let polls = io.polls_of(HALT_ADDR);
    assert_eq!(polls.len(), 2);
    assert_eq!(polls[0].expected, 0);
    assert_eq!(polls[1].expected, HALT_BIT);
}

#[test]
fn voted_branch_skips_the_disable_poll() {
    let (tree, io) = build(gated_chain(HaltCheck::Voted));
    let leaf = tree.lookup("leaf").unwrap();

    tree.enable(leaf).unwrap();
    tree.disable(leaf);

    let polls = io.polls_of(HALT_ADDR);
    assert_eq!(polls.len(), 1);
    assert_eq!(polls[0].expected, 0);
}

#[test]
fn skip_branch_never_polls() {
    let (tree, io) = build(gated_chain(HaltCheck::Skip));
    let leaf = tree.lookup("leaf").unwrap();

    tree.enable(leaf).unwrap();
    tree.disable(leaf);

    assert!(io.polls_of(HALT_ADDR).is_empty());
}

#[test]
fn set_rate_on_an_enabled_mux_migrates_the_vote() {
    use clock_tree::FreqEntry;

    let (tree, io) = build(vec![
        ClockDescriptor::new("xo", NodeKind::Oscillator { rate: 19_200_000 }),
        ClockDescriptor::new("pa", NodeKind::Branch)
            .parent("xo", 0)
            .enable_reg(RegField { addr: 0xa000, mask: 1 }),
        ClockDescriptor::new("pb", NodeKind::Branch)
            .parent("xo", 0)
            .enable_reg(RegField { addr: 0xb000, mask: 1 }),
        ClockDescriptor::new("mux", NodeKind::Rcg)
            .parent("pa", 0)
            .parent("pb", 1)
            .freq_table(vec![
                FreqEntry::new(9_600_000, 1, 4, 0, 0),
                FreqEntry::new(19_200_000, 0, 2, 0, 0),
            ])
            .set_rate_parent(),
    ]);
    let mux = tree.lookup("mux").unwrap();
    let pa = tree.lookup("pa").unwrap();
    let pb = tree.lookup("pb").unwrap();

    tree.enable(mux).unwrap();
    assert_eq!(tree.vote_count(pa), 1);

    // Moves from candidate 0 (pa) to candidate 1 (pb); the vote follows.
    assert_eq!(tree.set_rate(mux, 9_600_000).unwrap(), 9_600_000);
    assert_eq!(tree.vote_count(pa), 0);
    assert_eq!(tree.vote_count(pb), 1);

    tree.disable(mux);
    assert_eq!(tree.vote_count(pb), 0);
    assert_eq!(io.writes_to(0xa000), vec![(1, 1), (1, 0)]);
    assert_eq!(io.writes_to(0xb000), vec![(1, 1), (1, 0)]);
}

#[proptest]
fn n_enables_then_n_disables_always_balance(#[strategy(1usize..32)] n: usize) {
    let (tree, io) = build(gated_chain(HaltCheck::Wait));
    let leaf = tree.lookup("leaf").unwrap();
    let parent = tree.lookup("parent").unwrap();

    for _ in 0..n {
        tree.enable(leaf).unwrap();
    }
    for _ in 0..n {
        tree.disable(leaf);
    }

    assert_eq!(tree.vote_count(leaf), 0);
    assert_eq!(tree.vote_count(parent), 0);
    assert!(!tree.is_enabled(leaf));
    assert_eq!(io.writes_to(GATE_ADDR).len(), 2);
    assert_eq!(io.writes_to(PARENT_GATE_ADDR).len(), 2);
}
