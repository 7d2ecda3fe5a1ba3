// SPDX-FileCopyrightText: 2025 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;

/// Register access boundary of the engine.
///
/// Addresses and masks are opaque to the engine; it only forwards the
/// descriptors attached to the nodes. `write` has read-modify-write
/// semantics: bits outside `mask` are left untouched.
pub trait RegisterIo {
    fn read(&mut self, addr: u32) -> u32;

    fn write(&mut self, addr: u32, mask: u32, value: u32);

    /// Repeatedly read `addr` until `(value & mask) == expected`, at most
    /// `max_attempts` times with `delay` between reads. Returns whether the
    /// expected value was observed.
    fn poll_until(
        &mut self,
        addr: u32,
        mask: u32,
        expected: u32,
        max_attempts: u32,
        delay: Duration,
    ) -> bool;
}

/// Retry budget for halt-status polls.
#[derive(Debug, Copy, Clone)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_micros(10),
        }
    }
}
