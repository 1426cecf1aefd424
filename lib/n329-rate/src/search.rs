// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nearest-match bookkeeping shared by the solvers.

/// Absolute distance between a target and an achieved rate.
pub(crate) fn deviation(target: u64, achieved: u64) -> u64 {
    target.abs_diff(achieved)
}

/// The best candidate seen so far in a search, with its deviation from the
/// target.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Best<T> {
    pub candidate: T,
    pub deviation: u64,
}

impl<T: Copy> Best<T> {
    pub fn new(candidate: T, deviation: u64) -> Self {
        Self {
            candidate,
            deviation,
        }
    }

    /// Replaces the current best only if `deviation` is strictly smaller;
    /// an equally good later candidate loses to the one found first.
    pub fn offer_strict(&mut self, candidate: T, deviation: u64) -> bool {
        if deviation < self.deviation {
            *self = Self::new(candidate, deviation);
            true
        } else {
            false
        }
    }

    /// Replaces the current best if `deviation` is smaller or equal; an
    /// equally good later candidate wins.
    pub fn offer_or_equal(&mut self, candidate: T, deviation: u64) -> bool {
        if deviation <= self.deviation {
            *self = Self::new(candidate, deviation);
            true
        } else {
            false
        }
    }
}

/// Offers a candidate to an optional best, strict replacement.  The first
/// candidate offered always becomes the best.
pub(crate) fn offer_strict<T: Copy>(
    best: &mut Option<Best<T>>,
    candidate: T,
    deviation: u64,
) {
    match best {
        Some(b) => {
            b.offer_strict(candidate, deviation);
        }
        None => *best = Some(Best::new(candidate, deviation)),
    }
}

/// Offers a candidate to an optional best, replacing on ties.
pub(crate) fn offer_or_equal<T: Copy>(
    best: &mut Option<Best<T>>,
    candidate: T,
    deviation: u64,
) {
    match best {
        Some(b) => {
            b.offer_or_equal(candidate, deviation);
        }
        None => *best = Some(Best::new(candidate, deviation)),
    }
}
