// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! UART baud divider search.

use crate::search::{deviation, offer_or_equal, offer_strict, Best};
use crate::Hz;

/// Largest value the 16-bit `BRD` field holds.
pub const BRD_MAX: u32 = 0xffff;

/// Range of the extra divider tried in [`BaudMode::DivideX`].
const DIVIDE_X: core::ops::RangeInclusive<u32> = 10..=16;

/// Smallest `a` accepted in [`BaudMode::DivideOne`] is one above this.
const DIVIDE_ONE_A_FLOOR: u32 = 3;

/// The three ways the baud generator combines its fields, selected by the
/// `DIV_X_EN` (`dxe`) and `DIV_X_ONE` (`dxo`) bits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BaudMode {
    /// `dxe = 0`: `clock / (16 * (a + 2))`.
    Divide16,
    /// `dxe = 1, dxo = 0`: `clock / (b * (a + 2))`.
    DivideX,
    /// `dxe = 1, dxo = 1`: `clock / (a + 2)`.
    DivideOne,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BaudDivider {
    /// Base divider, `BRD`.
    pub a: u32,
    /// Extra divider in `[1, 16]`; only meaningful in [`BaudMode::DivideX`].
    pub b: u32,
    pub dxe: bool,
    pub dxo: bool,
}

impl BaudDivider {
    /// The slowest setting, used when nothing better exists.
    pub const SLOWEST: Self = Self {
        a: BRD_MAX,
        b: 1,
        dxe: false,
        dxo: false,
    };

    pub fn mode(&self) -> BaudMode {
        match (self.dxe, self.dxo) {
            (false, _) => BaudMode::Divide16,
            (true, false) => BaudMode::DivideX,
            (true, true) => BaudMode::DivideOne,
        }
    }

    fn divisor(&self) -> u64 {
        let base = u64::from(self.a) + 2;
        match self.mode() {
            BaudMode::Divide16 => 16 * base,
            BaudMode::DivideX => u64::from(self.b.max(1)) * base,
            BaudMode::DivideOne => base,
        }
    }

    /// The baud rate this divider produces from `clock`.
    pub fn baud(&self, clock: Hz) -> Hz {
        (u64::from(clock) / self.divisor()) as Hz
    }
}

/// `clock / div - 2`, if that is a legal `BRD` value.
fn brd(clock: Hz, div: u64) -> Option<u32> {
    let a = (u64::from(clock) / div).checked_sub(2)?;
    u32::try_from(a).ok().filter(|&a| a <= BRD_MAX)
}

/// Finds the baud divider nearest `baud_target` for a UART fed by `clock`.
///
/// The `/16` formula is tried first and kept as the running answer; an exact
/// hit returns at once.  The divide-by-one formula (with `a > 3`) then
/// replaces it only when strictly closer, again returning on an exact hit.
/// Finally `b` runs from 10 to 16, each candidate replacing the answer when
/// at least as close, so the largest `b` wins a tie.
///
/// When no formula yields a representable divider, or `baud_target` is 0,
/// the result is [`BaudDivider::SLOWEST`].
pub fn solve_uart_baud(baud_target: Hz, clock: Hz) -> BaudDivider {
    if baud_target == 0 {
        return BaudDivider::SLOWEST;
    }

    let baud = u64::from(baud_target);
    let mut best: Option<Best<BaudDivider>> = None;

    if let Some(a) = brd(clock, 16 * baud) {
        let candidate = BaudDivider {
            a,
            b: 1,
            dxe: false,
            dxo: false,
        };
        let dev = deviation(baud, candidate.baud(clock).into());
        if dev == 0 {
            return candidate;
        }
        best = Some(Best::new(candidate, dev));
    }

    if let Some(a) = brd(clock, baud).filter(|&a| a > DIVIDE_ONE_A_FLOOR) {
        let candidate = BaudDivider {
            a,
            b: 1,
            dxe: true,
            dxo: true,
        };
        let dev = deviation(baud, candidate.baud(clock).into());
        if dev == 0 {
            return candidate;
        }
        offer_strict(&mut best, candidate, dev);
    }

    for b in DIVIDE_X {
        if let Some(a) = brd(clock, u64::from(b) * baud) {
            let candidate = BaudDivider {
                a,
                b,
                dxe: true,
                dxo: false,
            };
            let dev = deviation(baud, candidate.baud(clock).into());
            offer_or_equal(&mut best, candidate, dev);
        }
    }

    best.map_or(BaudDivider::SLOWEST, |best| best.candidate)
}
