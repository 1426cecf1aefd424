// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clock controller driver for the Nuvoton N329.
//!
//! The clock tree is a fixed graph: the crystal feeds the two PLLs, and the
//! crystal or either PLL feeds each of the source-divided consumer clocks,
//! which in turn feed plain dividers and gates.  [`Clocks`] owns that graph
//! together with the register file it is built over, caches each node's
//! rate, and reference-counts enables the usual way: the first enable of a
//! clock enables its parent before ungating it, the last disable gates it
//! before releasing the parent.
//!
//! Rate selection is delegated to the solvers in [`n329_rate`]; this crate
//! only decides which solver applies to which node and moves the results
//! into registers.  All register access goes through [`regs::Mmio`], so the
//! whole driver runs against an in-memory register file on the host.

#![cfg_attr(not(test), no_std)]

use num_derive::FromPrimitive;

mod clk;
pub mod pll;
pub mod regs;
mod uart;

#[cfg(any(test, feature = "regfile"))]
extern crate alloc;

#[cfg(any(test, feature = "regfile"))]
pub mod regfile;

pub use clk::{ClockConfig, ClockId, Clocks, Kind, Node};
pub use n329_rate::Hz;
pub use uart::Uart;

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum ClkError {
    /// No clock or UART by that name or index.
    NoSuchClock = 1,
    /// The clock's rate is fixed by the board.
    ReadOnly = 2,
    /// The clock has no rate or parent of its own to set.
    NotSupported = 3,
    /// The requested parent cannot feed this clock.
    BadParent = 4,
    /// Unbalanced disable.
    NotEnabled = 5,
    BadBaud = 6,
}

impl From<ClkError> for u32 {
    fn from(e: ClkError) -> Self {
        e as u32
    }
}

impl core::convert::TryFrom<u32> for ClkError {
    type Error = ();

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        num_traits::FromPrimitive::from_u32(v).ok_or(())
    }
}
