// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clock rate solvers for the Nuvoton N329 family
//!
//! The N329 derives nearly every peripheral clock from one of three
//! references: the crystal and two PLLs (`APLL` and `UPLL`, called PLL-A and
//! PLL-B here) that are themselves fed by the crystal.  Picking register
//! values for a requested frequency is, in every case, a brute-force search
//! over small integer divider ranges for the nearest match.  This crate holds
//! those searches as pure functions so they can be exercised on the host:
//!
//! - [`solve_divided_rate`] picks a source, a PLL post-divider and a clock
//!   divider for a consumer clock (system, USB, USB 2.0, SD).
//! - [`solve_pll_triple`] picks the feedback, input and output dividers
//!   `(nf, nr, no)` that program a PLL's own output frequency.
//! - [`solve_uart_baud`] picks the UART baud-rate divider.
//!
//! None of these fail: each returns the best configuration it could find
//! (or a documented default) and the rate that configuration achieves, which
//! need not equal the request.
//!
//! The tie-break rules differ between solvers (the divided-rate search keeps
//! the first of several equally good candidates, the PLL and baud searches
//! keep the last) and must be preserved, because they decide which of
//! several equivalent register images ends up in hardware.

#![cfg_attr(not(test), no_std)]

mod baud;
mod divided;
mod pll;
mod search;

pub use baud::{solve_uart_baud, BaudDivider, BaudMode, BRD_MAX};
pub use divided::{
    solve_divided_rate, solve_divider, DividedRate, Source, PLL_DIVIDERS,
};
pub use pll::{
    plan_pll_rate, round_pll_rate, solve_pll_triple, PllPlan, PllSolution,
    PllTriple, PLL_FALLBACK, PLL_INPUT_MAX, PLL_INPUT_MIN, PLL_NF_MAX,
    PLL_NF_MIN, PLL_NR_MAX, PLL_NR_MIN, PLL_NO, PLL_VCO_MAX, PLL_VCO_MIN,
};

/// A frequency, in Hz.
pub type Hz = u32;

pub const MHZ: Hz = 1_000_000;
