// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

//! Node descriptions. A clock tree is built from a flat list of
//! [`ClockDescriptor`] values; parents are referenced by name and resolved
//! to arena indices when the tree is built.

/// A writable register field: masked read-modify-write target.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegField {
    pub addr: u32,
    pub mask: u32,
}

/// A pollable status field. The field reads `running_value` (within `mask`)
/// while the clock is running; the complementary value within `mask` means
/// halted. Covers both active-high lock bits (PLL status) and active-high
/// halt bits (branch CBCR style, where `running_value` is 0).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatusField {
    pub addr: u32,
    pub mask: u32,
    pub running_value: u32,
}

impl StatusField {
    pub fn halted_value(&self) -> u32 {
        self.mask & !self.running_value
    }
}

/// Halt-status policy of a gated node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum HaltCheck {
    /// Poll the status field on both the enable and the disable edge.
    #[default]
    Wait,
    /// Poll only on the enable edge; the shared vote register is
    /// authoritative for disable, the status bit may stay asserted as long
    /// as any other voter holds the clock.
    Voted,
    /// Never poll.
    Skip,
}

/// One frequency table row.
///
/// `div_x2` encodes the half-integer divider as twice its value (`3` is a
/// divider of 1.5, `2` is a bypass). `m`/`n` are the fractional multiplier
/// terms; `m == 0` means the fractional stage is unused.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FreqEntry {
    pub rate: u64,
    pub parent_sel: u8,
    pub div_x2: u32,
    pub m: u16,
    pub n: u16,
}

impl FreqEntry {
    pub const fn new(rate: u64, parent_sel: u8, div_x2: u32, m: u16, n: u16) -> Self {
        Self {
            rate,
            parent_sel,
            div_x2,
            m,
            n,
        }
    }
}

/// Candidate parent: name plus the hardware mux selector code for it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub name: &'static str,
    pub selector: u8,
}

/// Node variant tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Ultimate root: no parents, fixed output rate.
    Oscillator { rate: u64 },
    /// Fixed-ratio divider/multiplier, output = parent * mult / div.
    FixedFactor { mult: u32, div: u32 },
    /// PLL. `l`/`m`/`n` are the bring-up configuration, producing
    /// reference * (l + m/n); a non-empty frequency table overrides them
    /// once a table row has been committed by `set_rate`.
    Pll { l: u32, m: u32, n: u32 },
    /// Root clock generator: mux + half-integer divider + M/N counter,
    /// driven entirely by its frequency table.
    Rcg,
    /// Gated branch, rate-transparent.
    Branch,
}

/// Static description of one node, fed to [`crate::ClockTree::new`].
#[derive(Debug, Clone)]
pub struct ClockDescriptor {
    pub name: &'static str,
    pub kind: NodeKind,
    pub parents: Vec<ParentRef>,
    pub freq_table: Vec<FreqEntry>,
    pub enable_reg: Option<RegField>,
    pub config_reg: Option<RegField>,
    pub halt: Option<StatusField>,
    pub halt_check: HaltCheck,
    pub set_rate_parent: bool,
}

impl ClockDescriptor {
    pub fn new(name: &'static str, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            parents: Vec::new(),
            freq_table: Vec::new(),
            enable_reg: None,
            config_reg: None,
            halt: None,
            halt_check: HaltCheck::Wait,
            set_rate_parent: false,
        }
    }

    pub fn parent(mut self, name: &'static str, selector: u8) -> Self {
        self.parents.push(ParentRef { name, selector });
        self
    }

    pub fn freq_table(mut self, table: Vec<FreqEntry>) -> Self {
        self.freq_table = table;
        self
    }

    pub fn enable_reg(mut self, field: RegField) -> Self {
        self.enable_reg = Some(field);
        self
    }

    pub fn config_reg(mut self, field: RegField) -> Self {
        self.config_reg = Some(field);
        self
    }

    pub fn halt(mut self, field: StatusField, check: HaltCheck) -> Self {
        self.halt = Some(field);
        self.halt_check = check;
        self
    }

    pub fn set_rate_parent(mut self) -> Self {
        self.set_rate_parent = true;
        self
    }
}

/// Resolved parent reference inside a built tree.
#[derive(Debug, Copy, Clone)]
pub(crate) struct ResolvedParent {
    pub idx: usize,
    pub selector: u8,
}

/// A node inside a built tree. Immutable after construction; all mutable
/// state lives in the per-tree state table.
#[derive(Debug)]
pub(crate) struct ClockNode {
    pub name: &'static str,
    pub kind: NodeKind,
    pub parents: Vec<ResolvedParent>,
    pub freq_table: Vec<FreqEntry>,
    pub enable_reg: Option<RegField>,
    pub config_reg: Option<RegField>,
    pub halt: Option<StatusField>,
    pub halt_check: HaltCheck,
    pub set_rate_parent: bool,
}

/// Gate state of a node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EnableState {
    #[default]
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}
