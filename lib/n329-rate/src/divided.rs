// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Source-select divider search.
//!
//! The system, USB, USB 2.0 and SD clocks share one shape: a source select
//! (crystal, PLL-A or PLL-B), a 3-bit post-divider applied to the PLL
//! output, and a final clock divider whose width depends on the consumer.

use crate::search::{deviation, Best};
use crate::Hz;

/// Number of PLL post-divider settings; setting `n` divides by `n + 1`.
pub const PLL_DIVIDERS: u32 = 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Source {
    Crystal,
    PllA,
    PllB,
}

/// A source and divider chain, with the rate it produces.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DividedRate {
    pub source: Source,
    /// PLL post-divider setting, in `[0, PLL_DIVIDERS)`.  Always 0 when the
    /// source is the crystal, which has no post-divider.
    pub pll_divider: u32,
    /// Clock divider setting, in `[0, clock_divider_max)`.
    pub clock_divider: u32,
    pub rate: Hz,
}

/// Finds the source and dividers whose output is nearest `target`.
///
/// The crystal is tried first, then PLL-B, then PLL-A, each over every
/// divider pair in ascending order.  A candidate only displaces the current
/// best when it is strictly closer, so among equally close results the one
/// found first wins; an exact match ends the search on the spot.
///
/// A `clock_divider_max` of 0 is treated as 1.  `target` is not checked: a
/// target of 0 simply lands on the slowest crystal candidate.
pub fn solve_divided_rate(
    target: Hz,
    crystal: Hz,
    pll_a: Hz,
    pll_b: Hz,
    clock_divider_max: u32,
) -> DividedRate {
    let max = clock_divider_max.max(1);
    let target64 = u64::from(target);

    let first = DividedRate {
        source: Source::Crystal,
        pll_divider: 0,
        clock_divider: 0,
        rate: crystal,
    };
    let mut best = Best::new(first, deviation(target64, crystal.into()));

    for clock_divider in 0..max {
        let rate = crystal / (clock_divider + 1);
        let candidate = DividedRate {
            clock_divider,
            rate,
            ..first
        };
        if rate == target {
            return candidate;
        }
        best.offer_strict(candidate, deviation(target64, rate.into()));
    }

    for (source, pll_rate) in [(Source::PllB, pll_b), (Source::PllA, pll_a)] {
        for pll_divider in 0..PLL_DIVIDERS {
            let divided = pll_rate / (pll_divider + 1);
            for clock_divider in 0..max {
                let rate = divided / (clock_divider + 1);
                let candidate = DividedRate {
                    source,
                    pll_divider,
                    clock_divider,
                    rate,
                };
                if rate == target {
                    return candidate;
                }
                best.offer_strict(candidate, deviation(target64, rate.into()));
            }
        }
    }

    best.candidate
}

/// Finds the divisor in `[1, max_divisor]` that brings `parent` nearest
/// `target`, for a plain divider with no source select.  Of two equally
/// close divisors the smaller (faster) one wins.  A zero target gets the
/// largest divisor.
pub fn solve_divider(parent: Hz, target: Hz, max_divisor: u32) -> u32 {
    let max = max_divisor.max(1);
    let Some(div) = parent.checked_div(target) else {
        return max;
    };
    let hi = div.clamp(1, max);

    // Smaller divisors may yield the same quotient as `hi`; start from the
    // smallest of them.
    let quotient = u64::from(parent / hi);
    let first = (u64::from(parent) / (quotient + 1) + 1) as u32;

    let target64 = u64::from(target);
    let mut best = Best::new(first, deviation(target64, quotient));
    if hi < max {
        let lo = hi + 1;
        best.offer_strict(lo, deviation(target64, (parent / lo).into()));
    }
    best.candidate
}
