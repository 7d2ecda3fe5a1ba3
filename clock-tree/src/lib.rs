// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! A model of a hardware clock-distribution network: typed nodes (fixed-ratio
//! dividers, PLLs, root clock generators with mux + divider + fractional M/N
//! divider, gated branches) arranged in an acyclic parent graph, with rate
//! resolution, rate propagation, and vote-based enable gating on top.
//!
//! Register access goes through the [`regmap::RegisterIo`] trait so the same
//! engine drives real hardware and test doubles.

pub mod node;
pub mod regmap;
pub mod registry;

mod gate;
mod rate;
mod resolve;
mod topology;

pub use crate::node::{
    ClockDescriptor, FreqEntry, HaltCheck, NodeKind, ParentRef, RegField, StatusField,
};
pub use crate::regmap::{PollConfig, RegisterIo};
pub use crate::registry::{BuildError, ClockId, ClockTree, OpError, Resolution};
