// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The clock tree.

use enum_map::{Enum, EnumMap};
use n329_rate::{
    plan_pll_rate, round_pll_rate, solve_divided_rate, solve_divider,
    DividedRate, Hz, Source,
};
use ringbuf::*;

use crate::pll::{self, PllId, PllState};
use crate::regs::{
    Bit, DividerField, Field, Mmio, SourceDividerField, SourceSelect,
    SplitField, AHBCLK, APBCLK, CLKDIV0, CLKDIV1, CLKDIV2, CLKDIV3, CLKDIV4,
};
use crate::uart::Uart;
use crate::ClkError;

/// Every clock in the tree.  Declaration order is topological: each clock's
/// possible parents come before it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum ClockId {
    Xtal,
    Apll,
    Upll,
    Sys,
    Cpu,
    Hclk,
    Apb,
    Usb,
    Usb20,
    Sd,
    Adc,
    Uart0,
    Uart1,
    UsbHost,
    SdHost,
}

impl ClockId {
    pub const fn name(self) -> &'static str {
        match self {
            ClockId::Xtal => "xtal",
            ClockId::Apll => "apll",
            ClockId::Upll => "upll",
            ClockId::Sys => "sys",
            ClockId::Cpu => "cpu",
            ClockId::Hclk => "hclk",
            ClockId::Apb => "apb",
            ClockId::Usb => "usb",
            ClockId::Usb20 => "usb20",
            ClockId::Sd => "sd",
            ClockId::Adc => "adc",
            ClockId::Uart0 => "uart0",
            ClockId::Uart1 => "uart1",
            ClockId::UsbHost => "usb-host",
            ClockId::SdHost => "sd-host",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::iter().find(|id| id.name() == name)
    }

    /// All clocks, parents first.
    pub fn iter() -> impl Iterator<Item = Self> {
        (0..Self::LENGTH).map(Self::from_usize)
    }
}

/// Board-level rates.  The crystal rate is fixed; the PLL rates are the
/// nominal outputs wanted when choosing a source for a consumer clock.  A
/// nominal rate the PLL cannot produce is replaced by the nearest one it
/// can, so the two need not match.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClockConfig {
    pub xtal_hz: Hz,
    pub apll_hz: Hz,
    pub upll_hz: Hz,
}

/// How a node produces its rate, and what hardware it controls.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Kind {
    Fixed(Hz),
    Pll(PllId),
    Gate(Bit),
    /// Two gates that must both be open.
    AndGate(Bit, Bit),
    Divider(DividerField),
    SplitDivider(SplitField),
    SourceDivider(SourceDividerField),
}

#[derive(Copy, Clone, Debug)]
pub struct Node {
    pub kind: Kind,
    pub parent: Option<ClockId>,
    /// Cached by [`Clocks::recalc`].
    pub rate: Hz,
    pub enable_count: u32,
}

/// The fixed shape of the tree.  Source-divided clocks have no parent
/// until their source select is first read.
fn layout(id: ClockId, config: &ClockConfig) -> (Kind, Option<ClockId>) {
    use ClockId::*;

    match id {
        Xtal => (Kind::Fixed(config.xtal_hz), None),
        Apll => (Kind::Pll(PllId::Apll), Some(Xtal)),
        Upll => (Kind::Pll(PllId::Upll), Some(Xtal)),
        Sys => (
            Kind::SourceDivider(SourceDividerField::new(CLKDIV0, 0, 8, 4)),
            None,
        ),
        Cpu => (Kind::Divider(DividerField::new(CLKDIV4, 0, 4)), Some(Sys)),
        Hclk => (Kind::Divider(DividerField::new(CLKDIV4, 4, 4)), Some(Sys)),
        Apb => (Kind::Divider(DividerField::new(CLKDIV4, 8, 4)), Some(Hclk)),
        Usb => (
            Kind::SourceDivider(SourceDividerField::new(CLKDIV2, 0, 8, 4)),
            None,
        ),
        Usb20 => (
            Kind::SourceDivider(SourceDividerField::new(CLKDIV1, 0, 8, 4)),
            None,
        ),
        Sd => (
            Kind::SourceDivider(SourceDividerField::new(CLKDIV2, 16, 24, 8)),
            None,
        ),
        Adc => (
            Kind::SplitDivider(SplitField::new(
                CLKDIV3,
                Field::new(16, 8),
                Field::new(29, 2),
            )),
            Some(Xtal),
        ),
        Uart0 => (Kind::Gate(Bit::new(APBCLK, 3)), Some(Xtal)),
        Uart1 => (Kind::Gate(Bit::new(APBCLK, 4)), Some(Xtal)),
        UsbHost => (
            Kind::AndGate(Bit::new(AHBCLK, 3), Bit::new(AHBCLK, 18)),
            Some(Usb),
        ),
        SdHost => (Kind::Gate(Bit::new(AHBCLK, 23)), Some(Sd)),
    }
}

fn source_clock(select: SourceSelect) -> ClockId {
    match select {
        SourceSelect::Crystal => ClockId::Xtal,
        SourceSelect::Apll => ClockId::Apll,
        SourceSelect::Upll => ClockId::Upll,
    }
}

fn source_select(parent: ClockId) -> Option<SourceSelect> {
    match parent {
        ClockId::Xtal => Some(SourceSelect::Crystal),
        ClockId::Apll => Some(SourceSelect::Apll),
        ClockId::Upll => Some(SourceSelect::Upll),
        _ => None,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Enable(ClockId),
    Disable(ClockId),
    Divide(ClockId, u32),
    Divided {
        clock: ClockId,
        source: Source,
        pll_divider: u32,
        clock_divider: u32,
    },
    PllRestart(PllId, Hz),
    Reparent(ClockId, ClockId),
}

ringbuf!(Trace, 32, Trace::None);

#[derive(Debug)]
pub struct Clocks<M: Mmio> {
    mmio: M,
    config: ClockConfig,
    nodes: EnumMap<ClockId, Node>,
}

impl<M: Mmio> Clocks<M> {
    /// Builds the tree over `mmio` and reads back whatever state the
    /// hardware is in.
    ///
    /// `Sys` is held enabled from here on, since the CPU runs from it: no
    /// sequence of consumer enables and disables can switch it, or the
    /// source it is running from, off.
    pub fn new(mmio: M, config: ClockConfig) -> Self {
        let nodes = EnumMap::from_fn(|id| {
            let (kind, parent) = layout(id, &config);
            Node {
                kind,
                parent,
                rate: 0,
                enable_count: 0,
            }
        });

        let mut clocks = Self {
            mmio,
            config,
            nodes,
        };
        clocks.recalc();
        clocks.enable_inner(ClockId::Sys);
        clocks.recalc();
        clocks
    }

    pub fn mmio(&self) -> &M {
        &self.mmio
    }

    pub fn into_mmio(self) -> M {
        self.mmio
    }

    pub fn node(&self, id: ClockId) -> &Node {
        &self.nodes[id]
    }

    pub fn rate(&self, id: ClockId) -> Hz {
        self.nodes[id].rate
    }

    pub fn parent(&self, id: ClockId) -> Option<ClockId> {
        self.nodes[id].parent
    }

    fn parent_rate(&self, parent: Option<ClockId>) -> Hz {
        parent.map_or(0, |p| self.nodes[p].rate)
    }

    /// Recomputes every cached rate, and every source-divided clock's
    /// parent, from the registers.
    pub fn recalc(&mut self) {
        for id in ClockId::iter() {
            let (parent, rate) = self.read_node(id);
            let node = &mut self.nodes[id];
            node.parent = parent;
            node.rate = rate;
        }
    }

    fn read_node(&self, id: ClockId) -> (Option<ClockId>, Hz) {
        let node = &self.nodes[id];
        let parent_rate = self.parent_rate(node.parent);

        match node.kind {
            Kind::Fixed(hz) => (None, hz),
            Kind::Pll(pll) => {
                (node.parent, pll::recalc_rate(&self.mmio, pll, parent_rate))
            }
            Kind::Gate(_) | Kind::AndGate(..) => (node.parent, parent_rate),
            Kind::Divider(d) => {
                let div = d.decode(self.mmio.read(d.addr));
                (node.parent, parent_rate / div)
            }
            Kind::SplitDivider(s) => {
                let div = s.decode(self.mmio.read(s.addr));
                (node.parent, parent_rate / div)
            }
            Kind::SourceDivider(f) => {
                let reg = self.mmio.read(f.addr);
                let parent = source_clock(f.source(reg));
                (Some(parent), self.nodes[parent].rate / f.divisor(reg))
            }
        }
    }

    /// Whether the clock and everything above it is running.
    pub fn is_enabled(&self, id: ClockId) -> bool {
        let node = &self.nodes[id];
        let open = |bit: Bit| self.mmio.read(bit.addr) & bit.mask() != 0;

        let own = match node.kind {
            Kind::Pll(pll) => matches!(
                pll::state(&self.mmio, pll),
                PllState::Bypassed | PllState::Locked(_)
            ),
            Kind::Gate(bit) => open(bit),
            Kind::AndGate(a, b) => open(a) && open(b),
            _ => true,
        };
        own && node.parent.map_or(true, |p| self.is_enabled(p))
    }

    /// Takes a reference on `id`, enabling it (and its parent) if it was
    /// unreferenced.
    pub fn enable(&mut self, id: ClockId) {
        self.enable_inner(id);
        self.recalc();
    }

    fn enable_inner(&mut self, id: ClockId) {
        if self.nodes[id].enable_count == 0 {
            if let Some(parent) = self.nodes[id].parent {
                self.enable_inner(parent);
            }
            ringbuf_entry!(Trace::Enable(id));
            self.gate(id, true);
        }
        let node = &mut self.nodes[id];
        node.enable_count = node.enable_count.saturating_add(1);
    }

    /// Drops a reference on `id`.  The last reference gates the clock and
    /// then releases its parent.
    pub fn disable(&mut self, id: ClockId) -> Result<(), ClkError> {
        self.disable_inner(id)?;
        self.recalc();
        Ok(())
    }

    fn disable_inner(&mut self, id: ClockId) -> Result<(), ClkError> {
        let node = &mut self.nodes[id];
        node.enable_count = node
            .enable_count
            .checked_sub(1)
            .ok_or(ClkError::NotEnabled)?;

        if node.enable_count == 0 {
            let parent = node.parent;
            ringbuf_entry!(Trace::Disable(id));
            self.gate(id, false);
            if let Some(parent) = parent {
                self.disable_inner(parent)?;
            }
        }
        Ok(())
    }

    fn gate(&mut self, id: ClockId, on: bool) {
        match (self.nodes[id].kind, on) {
            (Kind::Pll(pll), true) => pll::enable(&mut self.mmio, pll),
            (Kind::Pll(pll), false) => pll::disable(&mut self.mmio, pll),
            (Kind::Gate(bit), true) => self.mmio.set_bits(bit.addr, bit.mask()),
            (Kind::Gate(bit), false) => {
                self.mmio.clear_bits(bit.addr, bit.mask())
            }
            (Kind::AndGate(a, b), true) => {
                self.mmio.set_bits(a.addr, a.mask());
                self.mmio.set_bits(b.addr, b.mask());
            }
            (Kind::AndGate(a, b), false) => {
                self.mmio.clear_bits(a.addr, a.mask());
                self.mmio.clear_bits(b.addr, b.mask());
            }
            _ => (),
        }
    }

    fn nominal_rate(&self, pll: PllId) -> Hz {
        match pll {
            PllId::Apll => self.config.apll_hz,
            PllId::Upll => self.config.upll_hz,
        }
    }

    /// The rate `pll` runs at when a source divider picks it: its nominal
    /// rate, as the PLL solver would program it.
    fn source_rate(&self, pll: PllId) -> Hz {
        let fin = self.config.xtal_hz;
        plan_pll_rate(fin, self.nominal_rate(pll)).rate(fin)
    }

    fn solve_source(&self, f: SourceDividerField, target: Hz) -> DividedRate {
        solve_divided_rate(
            target,
            self.config.xtal_hz,
            self.source_rate(PllId::Apll),
            self.source_rate(PllId::Upll),
            f.clock_divider_max(),
        )
    }

    /// The rate [`Clocks::set_rate`] would reach, without touching any
    /// register.
    pub fn round_rate(&self, id: ClockId, target: Hz) -> Result<Hz, ClkError> {
        let node = &self.nodes[id];
        let parent_rate = self.parent_rate(node.parent);

        Ok(match node.kind {
            Kind::Fixed(hz) => hz,
            Kind::Pll(_) => round_pll_rate(parent_rate, target),
            Kind::Gate(_) | Kind::AndGate(..) => parent_rate,
            Kind::Divider(d) => {
                parent_rate
                    / solve_divider(parent_rate, target, d.max_divisor())
            }
            Kind::SplitDivider(s) => {
                parent_rate
                    / solve_divider(parent_rate, target, s.max_divisor())
            }
            Kind::SourceDivider(f) => self.solve_source(f, target).rate,
        })
    }

    /// Programs `id` as near `target` as it goes and returns the rate it
    /// now runs at.  A PLL, or a source-divided clock on a PLL that is not
    /// yet running, reports the rate it will produce once enabled.
    pub fn set_rate(
        &mut self,
        id: ClockId,
        target: Hz,
    ) -> Result<Hz, ClkError> {
        let node = self.nodes[id];
        let parent_rate = self.parent_rate(node.parent);

        match node.kind {
            Kind::Fixed(_) => return Err(ClkError::ReadOnly),
            Kind::Gate(_) | Kind::AndGate(..) => {
                return Err(ClkError::NotSupported)
            }
            Kind::Pll(pll) => {
                let rate =
                    pll::set_rate(&mut self.mmio, pll, parent_rate, target);
                self.recalc();
                return Ok(rate);
            }
            Kind::Divider(d) => {
                let div = solve_divider(parent_rate, target, d.max_divisor());
                ringbuf_entry!(Trace::Divide(id, div));
                self.mmio.modify(d.addr, |v| d.encode(v, div));
            }
            Kind::SplitDivider(s) => {
                let div = solve_divider(parent_rate, target, s.max_divisor());
                ringbuf_entry!(Trace::Divide(id, div));
                self.mmio.modify(s.addr, |v| s.encode(v, div));
            }
            Kind::SourceDivider(f) => {
                let rate = self.set_divided_rate(id, f, target)?;
                self.recalc();
                return Ok(rate);
            }
        }

        self.recalc();
        Ok(self.nodes[id].rate)
    }

    fn set_divided_rate(
        &mut self,
        id: ClockId,
        f: SourceDividerField,
        target: Hz,
    ) -> Result<Hz, ClkError> {
        let solution = self.solve_source(f, target);
        let select = SourceSelect::from(solution.source);

        // The search assumed the PLL at its source rate.  Power comes from
        // the enable count, through `switch_source` or a later `enable`.
        if let Kind::Pll(pll) = self.nodes[source_clock(select)].kind {
            let fin = self.config.xtal_hz;
            let rate = self.source_rate(pll);
            if pll::programmed_rate(&self.mmio, pll, fin) != rate {
                ringbuf_entry!(Trace::PllRestart(pll, rate));
                let nominal = self.nominal_rate(pll);
                pll::set_rate(&mut self.mmio, pll, fin, nominal);
            }
        }

        ringbuf_entry!(Trace::Divided {
            clock: id,
            source: solution.source,
            pll_divider: solution.pll_divider,
            clock_divider: solution.clock_divider,
        });
        self.switch_source(
            id,
            f,
            select,
            solution.pll_divider,
            solution.clock_divider,
        )?;
        Ok(solution.rate)
    }

    /// Writes a source-divided clock's register.  If the clock is enabled
    /// and its source changes, the new source is enabled before the switch
    /// and the old one released after it.
    fn switch_source(
        &mut self,
        id: ClockId,
        f: SourceDividerField,
        select: SourceSelect,
        pll_divider: u32,
        clock_divider: u32,
    ) -> Result<(), ClkError> {
        let parent = source_clock(select);
        let old = self.nodes[id].parent;
        let moving = self.nodes[id].enable_count > 0 && old != Some(parent);

        if moving {
            self.enable_inner(parent);
        }
        self.mmio.modify(f.addr, |v| {
            f.encode(v, select, pll_divider, clock_divider)
        });
        self.nodes[id].parent = Some(parent);

        if let (true, Some(old)) = (moving, old) {
            ringbuf_entry!(Trace::Reparent(id, parent));
            self.disable_inner(old)?;
        }
        Ok(())
    }

    /// Switches a source-divided clock to `parent`, keeping its divider
    /// settings.
    pub fn set_parent(
        &mut self,
        id: ClockId,
        parent: ClockId,
    ) -> Result<(), ClkError> {
        let Kind::SourceDivider(f) = self.nodes[id].kind else {
            return Err(ClkError::NotSupported);
        };
        let select = source_select(parent).ok_or(ClkError::BadParent)?;

        let reg = self.mmio.read(f.addr);
        self.switch_source(
            id,
            f,
            select,
            f.pll_divider.get(reg),
            f.clock_divider.get(reg),
        )?;
        self.recalc();
        Ok(())
    }

    /// Programs `uart` for `baud` from its gate clock's current rate, and
    /// returns the baud rate reached.
    pub fn set_uart_baud(
        &mut self,
        uart: Uart,
        baud: Hz,
    ) -> Result<Hz, ClkError> {
        let clock = self.rate(uart.clock());
        uart.set_baud(&mut self.mmio, clock, baud)
    }

    pub fn uart_baud(&self, uart: Uart) -> Hz {
        uart.baud(&self.mmio, self.rate(uart.clock()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{PllControl, APLLCON, UPLLCON};
    use crate::regfile::RegFile;

    const CONFIG: ClockConfig = ClockConfig {
        xtal_hz: 12_000_000,
        apll_hz: 240_000_000,
        upll_hz: 192_000_000,
    };

    /// APLL locked at 240 MHz, UPLL powered down, `Sys` from APLL / 2,
    /// `Apb` at half of `Hclk`, everything else at reset values.
    fn booted() -> Clocks<RegFile> {
        let mut apll = PllControl(0);
        apll.set_triple(80, 2, 2);

        Clocks::new(
            RegFile::with(&[
                (APLLCON, apll.0),
                (UPLLCON, 1 << 16),
                (CLKDIV0, (0b10 << 3) | (1 << 8)),
                (CLKDIV4, 1 << 8),
            ]),
            CONFIG,
        )
    }

    fn reg(clocks: &Clocks<RegFile>, addr: u32) -> u32 {
        clocks.mmio().read(addr)
    }

    #[test]
    fn names() {
        for id in ClockId::iter() {
            assert_eq!(ClockId::from_name(id.name()), Some(id));
        }
        assert_eq!(ClockId::from_name("nope"), None);
        assert_eq!(ClockId::iter().next(), Some(ClockId::Xtal));
    }

    #[test]
    fn parents_precede_children() {
        let clocks = booted();
        for id in ClockId::iter() {
            if let Some(parent) = clocks.parent(id) {
                assert!(parent.into_usize() < id.into_usize(), "{id:?}");
            }
        }
    }

    #[test]
    fn boot_state() {
        let clocks = booted();
        assert_eq!(clocks.rate(ClockId::Xtal), 12_000_000);
        assert_eq!(clocks.rate(ClockId::Apll), 240_000_000);
        assert_eq!(clocks.rate(ClockId::Upll), 0);
        assert_eq!(clocks.parent(ClockId::Sys), Some(ClockId::Apll));
        assert_eq!(clocks.rate(ClockId::Sys), 120_000_000);
        assert_eq!(clocks.rate(ClockId::Cpu), 120_000_000);
        assert_eq!(clocks.rate(ClockId::Hclk), 120_000_000);
        assert_eq!(clocks.rate(ClockId::Apb), 60_000_000);
        assert_eq!(clocks.parent(ClockId::Usb), Some(ClockId::Xtal));
        assert_eq!(clocks.rate(ClockId::Usb), 12_000_000);
        assert_eq!(clocks.rate(ClockId::Adc), 12_000_000);
        assert_eq!(clocks.rate(ClockId::Uart0), 12_000_000);

        // `Sys` holds its whole chain.
        assert_eq!(clocks.node(ClockId::Sys).enable_count, 1);
        assert_eq!(clocks.node(ClockId::Apll).enable_count, 1);
        assert_eq!(clocks.node(ClockId::Xtal).enable_count, 1);
        assert_eq!(clocks.node(ClockId::Upll).enable_count, 0);
        assert!(clocks.is_enabled(ClockId::Cpu));
        assert!(!clocks.is_enabled(ClockId::Upll));
    }

    #[test]
    fn enable_is_refcounted() {
        let mut clocks = booted();
        let gate = 1 << 23;

        clocks.enable(ClockId::SdHost);
        clocks.enable(ClockId::SdHost);
        assert_eq!(reg(&clocks, AHBCLK) & gate, gate);
        assert_eq!(clocks.node(ClockId::Sd).enable_count, 1);
        assert!(clocks.is_enabled(ClockId::SdHost));

        clocks.disable(ClockId::SdHost).unwrap();
        assert_eq!(reg(&clocks, AHBCLK) & gate, gate);

        clocks.disable(ClockId::SdHost).unwrap();
        assert_eq!(reg(&clocks, AHBCLK) & gate, 0);
        assert_eq!(clocks.node(ClockId::Sd).enable_count, 0);
        assert!(!clocks.is_enabled(ClockId::SdHost));

        assert_eq!(
            clocks.disable(ClockId::SdHost),
            Err(ClkError::NotEnabled)
        );
    }

    #[test]
    fn and_gate_needs_both_bits() {
        let mut clocks = booted();
        let both = (1 << 3) | (1 << 18);

        clocks.enable(ClockId::UsbHost);
        assert_eq!(reg(&clocks, AHBCLK) & both, both);
        assert!(clocks.is_enabled(ClockId::UsbHost));

        clocks.disable(ClockId::UsbHost).unwrap();
        assert_eq!(reg(&clocks, AHBCLK) & both, 0);
        assert!(!clocks.is_enabled(ClockId::UsbHost));

        let mut mmio = clocks.into_mmio();
        mmio.write(AHBCLK, 1 << 3);
        let clocks = Clocks::new(mmio, CONFIG);
        assert!(!clocks.is_enabled(ClockId::UsbHost));
    }

    #[test]
    fn refusals() {
        let mut clocks = booted();
        assert_eq!(
            clocks.set_rate(ClockId::Xtal, 1_000_000),
            Err(ClkError::ReadOnly)
        );
        assert_eq!(
            clocks.set_rate(ClockId::Uart0, 1_000_000),
            Err(ClkError::NotSupported)
        );
        assert_eq!(
            clocks.set_parent(ClockId::Cpu, ClockId::Xtal),
            Err(ClkError::NotSupported)
        );
        assert_eq!(
            clocks.set_parent(ClockId::Sys, ClockId::Cpu),
            Err(ClkError::BadParent)
        );
    }

    #[test]
    fn plain_divider() {
        let mut clocks = booted();

        assert_eq!(clocks.set_rate(ClockId::Apb, 30_000_000), Ok(30_000_000));
        assert_eq!((reg(&clocks, CLKDIV4) >> 8) & 0xf, 3);

        // 60 MHz and 40 MHz are equally far from 50 MHz; the smaller
        // divisor wins.
        assert_eq!(clocks.round_rate(ClockId::Cpu, 50_000_000), Ok(60_000_000));
        assert_eq!(clocks.set_rate(ClockId::Cpu, 50_000_000), Ok(60_000_000));
        assert_eq!(reg(&clocks, CLKDIV4) & 0xf, 1);
        // Apb hangs off Hclk, not Cpu.
        assert_eq!(clocks.rate(ClockId::Apb), 30_000_000);
    }

    #[test]
    fn split_divider() {
        let mut clocks = booted();
        assert_eq!(clocks.set_rate(ClockId::Adc, 12_000), Ok(12_000));

        // 999 = 0b11_1110_0111.
        let r = reg(&clocks, CLKDIV3);
        assert_eq!((r >> 16) & 0xff, 0xe7);
        assert_eq!((r >> 29) & 0b11, 0b11);
    }

    #[test]
    fn source_divider_programs_its_pll() {
        let mut clocks = booted();

        assert_eq!(clocks.round_rate(ClockId::Usb, 48_000_000), Ok(48_000_000));
        assert_eq!(clocks.set_rate(ClockId::Usb, 48_000_000), Ok(48_000_000));
        assert_eq!(clocks.parent(ClockId::Usb), Some(ClockId::Upll));

        // Source 3 (UPLL), N0 = 0, N1 = 3.
        let r = reg(&clocks, CLKDIV2);
        assert_eq!((r >> 3) & 0b11, 0b11);
        assert_eq!(r & 0b111, 0);
        assert_eq!((r >> 8) & 0xf, 3);

        // Programmed, but nobody holds it yet.
        let upll = PllControl(reg(&clocks, UPLLCON));
        assert!(upll.pd());
        assert_eq!((upll.nf(), upll.nr(), upll.no()), (64, 2, 2));
        assert_eq!(clocks.node(ClockId::Upll).enable_count, 0);
        assert!(!clocks.is_enabled(ClockId::Upll));
        assert_eq!(clocks.rate(ClockId::Usb), 0);

        clocks.enable(ClockId::Usb);
        assert_eq!(clocks.node(ClockId::Upll).enable_count, 1);
        assert_eq!(clocks.rate(ClockId::Upll), 192_000_000);
        assert_eq!(clocks.rate(ClockId::Usb), 48_000_000);

        clocks.disable(ClockId::Usb).unwrap();
        assert_eq!(clocks.node(ClockId::Upll).enable_count, 0);
        assert!(!clocks.is_enabled(ClockId::Upll));
    }

    #[test]
    fn unreachable_nominal_rate() {
        // 7 MHz is below every legal VCO / NO, so the APLL falls back to
        // (48, 2, 4), which is 72 MHz.
        let mut clocks = Clocks::new(
            booted().into_mmio(),
            ClockConfig {
                apll_hz: 7_000_000,
                ..CONFIG
            },
        );

        assert_eq!(clocks.round_rate(ClockId::Sys, 72_000_000), Ok(72_000_000));
        assert_eq!(clocks.set_rate(ClockId::Sys, 72_000_000), Ok(72_000_000));
        assert_eq!(clocks.rate(ClockId::Sys), 72_000_000);
        assert_eq!(clocks.rate(ClockId::Apll), 72_000_000);

        // Already where the search wants it.
        let apll = reg(&clocks, APLLCON);
        let writes = clocks.mmio().writes().len();
        assert_eq!(clocks.set_rate(ClockId::Sys, 72_000_000), Ok(72_000_000));
        assert_eq!(reg(&clocks, APLLCON), apll);
        assert_eq!(clocks.mmio().writes().len(), writes + 1);
    }

    #[test]
    fn nominal_rate_below_a_megahertz_step() {
        // The PLL is committed in whole MHz.
        let mut clocks = Clocks::new(
            booted().into_mmio(),
            ClockConfig {
                apll_hz: 100_500_000,
                ..CONFIG
            },
        );

        let start = clocks.mmio().writes().len();
        for _ in 0..2 {
            assert_eq!(
                clocks.round_rate(ClockId::Sys, 100_500_000),
                Ok(100_000_000)
            );
            assert_eq!(
                clocks.set_rate(ClockId::Sys, 100_500_000),
                Ok(100_000_000)
            );
            assert_eq!(clocks.rate(ClockId::Apll), 100_000_000);
        }

        let apll_writes = clocks.mmio().writes()[start..]
            .iter()
            .filter(|(addr, _)| *addr == APLLCON)
            .count();
        assert_eq!(apll_writes, 1);
    }

    #[test]
    fn running_pll_is_left_alone() {
        let mut clocks = booted();
        let before = reg(&clocks, APLLCON);
        let writes = clocks.mmio().writes().len();

        // 240 MHz / 4, on the already running APLL.
        assert_eq!(clocks.set_rate(ClockId::Sys, 60_000_000), Ok(60_000_000));
        assert_eq!(reg(&clocks, APLLCON), before);
        assert_eq!(clocks.mmio().writes().len(), writes + 1);

        assert_eq!(clocks.rate(ClockId::Cpu), 60_000_000);
        assert_eq!(clocks.rate(ClockId::Apb), 30_000_000);
    }

    #[test]
    fn enabled_clock_moves_its_reference() {
        let mut clocks = booted();

        clocks.enable(ClockId::Usb);
        assert_eq!(clocks.node(ClockId::Xtal).enable_count, 2);

        clocks.set_rate(ClockId::Usb, 48_000_000).unwrap();
        assert_eq!(clocks.node(ClockId::Upll).enable_count, 1);
        assert_eq!(clocks.node(ClockId::Xtal).enable_count, 2);

        clocks.disable(ClockId::Usb).unwrap();
        assert_eq!(clocks.node(ClockId::Upll).enable_count, 0);
        assert_eq!(clocks.node(ClockId::Xtal).enable_count, 1);
        assert_eq!(
            pll::state(clocks.mmio(), PllId::Upll),
            PllState::Disabled
        );
        assert_eq!(clocks.rate(ClockId::Usb), 0);
    }

    #[test]
    fn set_parent_keeps_dividers() {
        let mut clocks = booted();

        // The crystal path has no PLL divider; N1 = 1 still halves it.
        clocks.set_parent(ClockId::Sys, ClockId::Xtal).unwrap();
        assert_eq!(clocks.rate(ClockId::Sys), 6_000_000);
        assert_eq!(clocks.node(ClockId::Apll).enable_count, 0);
        assert_eq!(clocks.rate(ClockId::Apll), 0);

        clocks.set_parent(ClockId::Sys, ClockId::Apll).unwrap();
        assert_eq!(clocks.node(ClockId::Apll).enable_count, 1);
        assert_eq!(clocks.rate(ClockId::Sys), 120_000_000);
    }

    #[test]
    fn round_rate_writes_nothing() {
        let clocks = booted();
        let writes = clocks.mmio().writes().len();

        assert_eq!(clocks.round_rate(ClockId::Xtal, 1), Ok(12_000_000));
        assert_eq!(
            clocks.round_rate(ClockId::Upll, 192_000_000),
            Ok(192_000_000)
        );
        assert_eq!(clocks.round_rate(ClockId::Sys, 96_000_000), Ok(96_000_000));
        assert_eq!(clocks.round_rate(ClockId::SdHost, 1), Ok(12_000_000));
        assert_eq!(clocks.mmio().writes().len(), writes);
    }

    #[test]
    fn pll_rate() {
        let mut clocks = booted();
        assert_eq!(clocks.set_rate(ClockId::Upll, 96_000_000), Ok(96_000_000));
        // Still powered down.
        assert_eq!(clocks.rate(ClockId::Upll), 0);

        clocks.enable(ClockId::Upll);
        assert_eq!(clocks.rate(ClockId::Upll), 96_000_000);
    }

    #[test]
    fn uart_baud_follows_its_clock() {
        let mut clocks = booted();
        let uart = Uart::new(1).unwrap();

        assert_eq!(clocks.set_uart_baud(uart, 115_200), Ok(115_384));
        assert_eq!(clocks.uart_baud(uart), 115_384);
        assert_eq!(clocks.set_uart_baud(uart, 0), Err(ClkError::BadBaud));
    }
}
