// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory register file, for running the driver off target.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::regs::{Mmio, PllControl, APLLCON, UPLLCON};

/// Unwritten registers read as zero.  Every write is remembered, in order.
#[derive(Clone, Debug, Default)]
pub struct RegFile {
    regs: BTreeMap<u32, u32>,
    writes: Vec<(u32, u32)>,
}

impl RegFile {
    /// Starts from `regs` without recording them as writes.
    pub fn with(regs: &[(u32, u32)]) -> Self {
        Self {
            regs: regs.iter().copied().collect(),
            writes: Vec::new(),
        }
    }

    /// Both PLLs powered down, everything else zero.
    pub fn at_reset() -> Self {
        let mut pd = PllControl(0);
        pd.set_pd(true);
        Self::with(&[(APLLCON, pd.0), (UPLLCON, pd.0)])
    }

    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }
}

impl Mmio for RegFile {
    fn read(&self, addr: u32) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.writes.push((addr, value));
        self.regs.insert(addr, value);
    }
}
