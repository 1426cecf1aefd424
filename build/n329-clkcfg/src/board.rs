// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board clock files.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use drv_n329_sys::regs::Mmio;
use drv_n329_sys::{ClockConfig, ClockId, Clocks, Hz, Uart};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Board {
    pub xtal_hz: Hz,
    pub apll_hz: Hz,
    pub upll_hz: Hz,
    /// Clocks to hold enabled, by name.
    #[serde(default)]
    pub enable: Vec<String>,
    /// Requested rates, by clock name.  The PLLs are set by `apll-hz` and
    /// `upll-hz` instead.
    #[serde(default)]
    pub rates: BTreeMap<String, Hz>,
    /// Baud rates, by UART name.
    #[serde(default)]
    pub uart: BTreeMap<String, Hz>,
}

fn clock(name: &str) -> Result<ClockId> {
    ClockId::from_name(name).ok_or_else(|| anyhow!("no clock named {name:?}"))
}

fn uart(name: &str) -> Result<Uart> {
    let index = name
        .strip_prefix("uart")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| anyhow!("bad UART name {name:?}"))?;
    Uart::new(index).map_err(|_| anyhow!("no UART {index}"))
}

impl Board {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let board: Self = toml::from_str(text)?;
        if board.xtal_hz == 0 {
            bail!("xtal-hz must be nonzero");
        }
        for pll in ["apll", "upll"] {
            if board.rates.contains_key(pll) {
                bail!("set {pll}-hz instead of rates.{pll}");
            }
        }
        Ok(board)
    }

    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig {
            xtal_hz: self.xtal_hz,
            apll_hz: self.apll_hz,
            upll_hz: self.upll_hz,
        }
    }

    /// Enables the listed clocks, sets rates parents first, then programs
    /// each UART (enabling its clock).
    pub fn apply<M: Mmio>(&self, clocks: &mut Clocks<M>) -> Result<()> {
        for name in &self.enable {
            clocks.enable(clock(name)?);
        }

        let mut rates = self
            .rates
            .iter()
            .map(|(name, &hz)| Ok((clock(name)?, hz)))
            .collect::<Result<Vec<_>>>()?;
        rates.sort_by_key(|&(id, _)| id as usize);

        for (id, hz) in rates {
            clocks.set_rate(id, hz).map_err(|e| {
                anyhow!("setting {} to {hz} Hz: {e:?}", id.name())
            })?;
        }

        for (name, &baud) in &self.uart {
            let uart = uart(name)?;
            clocks.enable(uart.clock());
            clocks
                .set_uart_baud(uart, baud)
                .map_err(|e| anyhow!("setting {name} to {baud} baud: {e:?}"))?;
        }
        Ok(())
    }
}
