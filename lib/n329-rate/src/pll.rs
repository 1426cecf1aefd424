// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PLL divider search.
//!
//! The N329 PLLs multiply the crystal by `nf / nr / no`:
//!
//! ```text
//!   fin --> [ / nr ] --> PFD --> VCO --+--> [ / no ] --> fout
//!                         ^            |
//!                         +--[ / nf ]--+
//! ```
//!
//! The phase detector input `fin / nr` must sit strictly between 1 and
//! 15 MHz, and the VCO (`fout * no`) between 100 and 500 MHz inclusive.

use crate::search::{deviation, offer_or_equal, Best};
use crate::{Hz, MHZ};

pub const PLL_NR_MIN: u32 = 2;
pub const PLL_NR_MAX: u32 = 33;
pub const PLL_NF_MIN: u32 = 2;
pub const PLL_NF_MAX: u32 = 513;

/// Legal output dividers, in search order.
pub const PLL_NO: [u32; 3] = [1, 2, 4];

/// Phase detector input bounds; both are exclusive.
pub const PLL_INPUT_MIN: Hz = MHZ;
pub const PLL_INPUT_MAX: Hz = 15 * MHZ;

/// VCO bounds; both are inclusive.
pub const PLL_VCO_MIN: u64 = 100 * MHZ as u64;
pub const PLL_VCO_MAX: u64 = 500 * MHZ as u64;

/// Used when no triple satisfies the constraints.
pub const PLL_FALLBACK: PllTriple = PllTriple {
    nf: 48,
    nr: 2,
    no: 4,
};

/// Feedback, input and output dividers for one PLL.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PllTriple {
    pub nf: u32,
    pub nr: u32,
    pub no: u32,
}

impl PllTriple {
    /// Output frequency for input `fin`, truncating after each step the way
    /// the hardware does.  Saturates rather than wrapping for absurd inputs.
    pub fn rate(&self, fin: Hz) -> Hz {
        let fout = u64::from(fin) * u64::from(self.nf)
            / u64::from(self.nr)
            / u64::from(self.no);
        Hz::try_from(fout).unwrap_or(Hz::MAX)
    }

    /// Whether this triple honors the divider ranges and both frequency
    /// windows for input `fin`.
    pub fn is_legal(&self, fin: Hz) -> bool {
        let input = match fin.checked_div(self.nr) {
            Some(input) => input,
            None => return false,
        };

        (PLL_NR_MIN..=PLL_NR_MAX).contains(&self.nr)
            && (PLL_NF_MIN..=PLL_NF_MAX).contains(&self.nf)
            && PLL_NO.contains(&self.no)
            && input > PLL_INPUT_MIN
            && input < PLL_INPUT_MAX
            && (PLL_VCO_MIN..=PLL_VCO_MAX)
                .contains(&(u64::from(self.rate(fin)) * u64::from(self.no)))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PllSolution {
    pub triple: PllTriple,
    pub rate: Hz,
}

/// What committing a new PLL rate should do to the hardware.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PllPlan {
    /// The requested rate is the input rate: pass the input straight
    /// through.
    Bypass,
    /// Program this triple and leave bypass mode.
    Lock(PllSolution),
}

impl PllPlan {
    pub fn rate(&self, fin: Hz) -> Hz {
        match self {
            PllPlan::Bypass => fin,
            PllPlan::Lock(solution) => solution.rate,
        }
    }
}

/// Finds the legal `(nf, nr, no)` whose output is nearest `fout_target`.
///
/// The output divider is walked upward through [`PLL_NO`] and, for each,
/// the input divider downward from 33 to 2.  Each pair contributes two
/// feedback candidates, `floor(fout_target * nr * no / fin)` and the one
/// above it.  Later candidates displace earlier ones on equal deviation.
///
/// If nothing survives the constraints the result is [`PLL_FALLBACK`] and
/// whatever rate it gives for `fin`.
pub fn solve_pll_triple(fin: Hz, fout_target: Hz) -> PllSolution {
    let target = u64::from(fout_target);
    let fin64 = u64::from(fin);
    let mut best: Option<Best<PllSolution>> = None;

    for no in PLL_NO {
        for nr in (PLL_NR_MIN..=PLL_NR_MAX).rev() {
            let input = fin / nr;
            if input <= PLL_INPUT_MIN || input >= PLL_INPUT_MAX {
                continue;
            }

            let nf = target * u64::from(nr) * u64::from(no) / fin64;
            for nf in [nf, nf + 1] {
                if nf < u64::from(PLL_NF_MIN) || nf > u64::from(PLL_NF_MAX) {
                    continue;
                }

                let fout = fin64 * nf / u64::from(nr) / u64::from(no);
                let vco = fout * u64::from(no);
                if !(PLL_VCO_MIN..=PLL_VCO_MAX).contains(&vco) {
                    continue;
                }

                let solution = PllSolution {
                    triple: PllTriple {
                        nf: nf as u32,
                        nr,
                        no,
                    },
                    rate: fout as Hz,
                };
                offer_or_equal(&mut best, solution, deviation(target, fout));
            }
        }
    }

    match best {
        Some(best) => best.candidate,
        None => PllSolution {
            triple: PLL_FALLBACK,
            rate: PLL_FALLBACK.rate(fin),
        },
    }
}

/// The rate a PLL would settle at if asked for `target`, without deciding
/// how to get there.
pub fn round_pll_rate(fin: Hz, target: Hz) -> Hz {
    if target == fin {
        fin
    } else {
        solve_pll_triple(fin, target).rate
    }
}

/// Decides how to commit `target`: bypass when it equals the input,
/// otherwise the triple nearest `target` rounded down to a whole MHz.
pub fn plan_pll_rate(fin: Hz, target: Hz) -> PllPlan {
    if target == fin {
        PllPlan::Bypass
    } else {
        PllPlan::Lock(solve_pll_triple(fin, target - target % MHZ))
    }
}
