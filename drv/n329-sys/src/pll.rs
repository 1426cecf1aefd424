// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! APLL and UPLL control.

use n329_rate::{plan_pll_rate, Hz, PllPlan, PllTriple};
use ringbuf::*;

use crate::regs::{Mmio, PllControl, APLLCON, UPLLCON};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PllId {
    Apll,
    Upll,
}

impl PllId {
    pub const fn addr(self) -> u32 {
        match self {
            PllId::Apll => APLLCON,
            PllId::Upll => UPLLCON,
        }
    }
}

/// What a PLL is doing, as decoded from its control register.  Power down
/// takes precedence over output disable, which takes precedence over
/// bypass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PllState {
    PoweredDown,
    Disabled,
    Bypassed,
    Locked(PllTriple),
}

impl PllState {
    pub fn decode(reg: PllControl) -> Self {
        if reg.pd() {
            PllState::PoweredDown
        } else if reg.oe() {
            PllState::Disabled
        } else if reg.bp() {
            PllState::Bypassed
        } else {
            PllState::Locked(PllTriple {
                nf: reg.nf(),
                nr: reg.nr(),
                no: reg.no(),
            })
        }
    }

    pub fn rate(&self, fin: Hz) -> Hz {
        match self {
            PllState::PoweredDown | PllState::Disabled => 0,
            PllState::Bypassed => fin,
            PllState::Locked(triple) => triple.rate(fin),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Enable(PllId),
    Disable(PllId),
    Bypass(PllId),
    Lock(PllId, u32, u32, u32),
}

ringbuf!(Trace, 16, Trace::None);

pub fn state(mmio: &impl Mmio, pll: PllId) -> PllState {
    PllState::decode(PllControl(mmio.read(pll.addr())))
}

pub fn recalc_rate(mmio: &impl Mmio, pll: PllId, fin: Hz) -> Hz {
    state(mmio, pll).rate(fin)
}

/// The rate the PLL is programmed for, whether or not it is running.
pub fn programmed_rate(mmio: &impl Mmio, pll: PllId, fin: Hz) -> Hz {
    let mut reg = PllControl(mmio.read(pll.addr()));
    reg.set_pd(false);
    reg.set_oe(false);
    PllState::decode(reg).rate(fin)
}

/// Powers the PLL up and enables its output.
pub fn enable(mmio: &mut impl Mmio, pll: PllId) {
    ringbuf_entry!(Trace::Enable(pll));
    mmio.modify(pll.addr(), |v| {
        let mut reg = PllControl(v);
        reg.set_pd(false);
        reg.set_oe(false);
        reg.0
    });
}

/// Disables the output; the PLL stays powered.
pub fn disable(mmio: &mut impl Mmio, pll: PllId) {
    ringbuf_entry!(Trace::Disable(pll));
    mmio.modify(pll.addr(), |v| {
        let mut reg = PllControl(v);
        reg.set_oe(true);
        reg.0
    });
}

/// Commits a new output rate and returns what the PLL will produce once
/// running.  Power and output enable are left alone.
pub fn set_rate(mmio: &mut impl Mmio, pll: PllId, fin: Hz, target: Hz) -> Hz {
    let plan = plan_pll_rate(fin, target);

    mmio.modify(pll.addr(), |v| {
        let mut reg = PllControl(v);
        match plan {
            PllPlan::Bypass => {
                ringbuf_entry!(Trace::Bypass(pll));
                reg.set_bp(true);
            }
            PllPlan::Lock(solution) => {
                let PllTriple { nf, nr, no } = solution.triple;
                ringbuf_entry!(Trace::Lock(pll, nf, nr, no));
                reg.set_triple(nf, nr, no);
                reg.set_bp(false);
            }
        }
        reg.0
    });

    plan.rate(fin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regfile::RegFile;

    const XTAL: Hz = 12_000_000;

    fn control(mmio: &RegFile, pll: PllId) -> PllControl {
        PllControl(mmio.read(pll.addr()))
    }

    #[test]
    fn decode_priority() {
        let mut reg = PllControl(0);
        reg.set_triple(32, 2, 4);
        assert_eq!(
            PllState::decode(reg),
            PllState::Locked(PllTriple {
                nf: 32,
                nr: 2,
                no: 4
            })
        );

        reg.set_bp(true);
        assert_eq!(PllState::decode(reg), PllState::Bypassed);
        reg.set_oe(true);
        assert_eq!(PllState::decode(reg), PllState::Disabled);
        reg.set_pd(true);
        assert_eq!(PllState::decode(reg), PllState::PoweredDown);
    }

    #[test]
    fn enable_and_disable() {
        let mut mmio = RegFile::default();
        mmio.write(APLLCON, 0x0005_0000 | 30 | (3 << 14));
        assert_eq!(recalc_rate(&mmio, PllId::Apll, XTAL), 0);

        enable(&mut mmio, PllId::Apll);
        assert_eq!(recalc_rate(&mmio, PllId::Apll, XTAL), 48_000_000);

        disable(&mut mmio, PllId::Apll);
        assert_eq!(state(&mmio, PllId::Apll), PllState::Disabled);
        assert!(!control(&mmio, PllId::Apll).pd());
        assert_eq!(recalc_rate(&mmio, PllId::Apll, XTAL), 0);
        assert_eq!(programmed_rate(&mmio, PllId::Apll, XTAL), 48_000_000);
    }

    #[test]
    fn set_rate_locks_and_leaves_bypass() {
        let mut mmio = RegFile::default();
        mmio.write(UPLLCON, 1 << 17);
        assert_eq!(recalc_rate(&mmio, PllId::Upll, XTAL), XTAL);

        let rate = set_rate(&mut mmio, PllId::Upll, XTAL, 192_000_000);
        assert_eq!(rate, 192_000_000);
        let reg = control(&mmio, PllId::Upll);
        assert!(!reg.bp());
        assert_eq!((reg.nf(), reg.nr(), reg.no()), (64, 2, 2));
        assert_eq!(recalc_rate(&mmio, PllId::Upll, XTAL), 192_000_000);

        // The APLL is untouched.
        assert_eq!(mmio.read(APLLCON), 0);
    }

    #[test]
    fn set_rate_to_input_bypasses() {
        let mut mmio = RegFile::default();
        set_rate(&mut mmio, PllId::Apll, XTAL, 240_000_000);
        let rate = set_rate(&mut mmio, PllId::Apll, XTAL, XTAL);
        assert_eq!(rate, XTAL);
        assert_eq!(state(&mmio, PllId::Apll), PllState::Bypassed);
        // The triple underneath is left as it was.
        assert_eq!(control(&mmio, PllId::Apll).nf(), 80);
    }

    #[test]
    fn set_rate_truncates_to_mhz() {
        let mut mmio = RegFile::default();
        let rate = set_rate(&mut mmio, PllId::Apll, XTAL, 48_750_000);
        assert_eq!(rate, 48_000_000);
        assert_eq!(recalc_rate(&mmio, PllId::Apll, XTAL), 48_000_000);
    }

    #[test]
    fn set_rate_keeps_power_state() {
        let mut mmio = RegFile::default();
        mmio.write(APLLCON, 1 << 16);
        set_rate(&mut mmio, PllId::Apll, XTAL, 240_000_000);
        assert_eq!(state(&mmio, PllId::Apll), PllState::PoweredDown);
        enable(&mut mmio, PllId::Apll);
        assert_eq!(recalc_rate(&mmio, PllId::Apll, XTAL), 240_000_000);
    }
}
