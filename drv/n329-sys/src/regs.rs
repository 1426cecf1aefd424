// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clock controller and UART register layouts.
//!
//! Everything here is a pure description of where bits live, plus the
//! [`Mmio`] seam through which the rest of the driver touches them.

use bitfield::bitfield;
use n329_rate::Source;

/// Clock controller, inside the global control register block.
pub const CLK_BASE: u32 = 0xb000_0200;

pub const PWRCON: u32 = CLK_BASE;
pub const AHBCLK: u32 = CLK_BASE + 0x04;
pub const APBCLK: u32 = CLK_BASE + 0x08;
pub const CLKDIV0: u32 = CLK_BASE + 0x0c;
pub const CLKDIV1: u32 = CLK_BASE + 0x10;
pub const CLKDIV2: u32 = CLK_BASE + 0x14;
pub const CLKDIV3: u32 = CLK_BASE + 0x18;
pub const CLKDIV4: u32 = CLK_BASE + 0x1c;
pub const APLLCON: u32 = CLK_BASE + 0x20;
pub const UPLLCON: u32 = CLK_BASE + 0x24;

pub const UART0_BASE: u32 = 0xb800_8000;
pub const UART1_BASE: u32 = 0xb800_8100;

/// Offset of the baud rate register within a UART.
pub const UART_BAUD: u32 = 0x24;

/// Access to memory-mapped registers, by absolute address.
pub trait Mmio {
    fn read(&self, addr: u32) -> u32;
    fn write(&mut self, addr: u32, value: u32);

    fn modify(&mut self, addr: u32, f: impl FnOnce(u32) -> u32) {
        let value = self.read(addr);
        self.write(addr, f(value));
    }

    fn set_bits(&mut self, addr: u32, mask: u32) {
        self.modify(addr, |v| v | mask);
    }

    fn clear_bits(&mut self, addr: u32, mask: u32) {
        self.modify(addr, |v| v & !mask);
    }
}

/// The real thing: volatile accesses to the physical address space.
pub struct Volatile {
    _private: (),
}

impl Volatile {
    /// # Safety
    ///
    /// Only one `Volatile` may exist, the caller must be running with the
    /// clock controller and UARTs mapped at their physical addresses, and
    /// nothing else may be modifying those registers.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Mmio for Volatile {
    fn read(&self, addr: u32) -> u32 {
        // Safety: `Volatile::new`'s contract covers every address handed to
        // us by this crate.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    fn write(&mut self, addr: u32, value: u32) {
        // Safety: as above.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

/// A contiguous bit field within a 32-bit register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Field {
    pub shift: u32,
    pub width: u32,
}

impl Field {
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Largest value the field holds.
    pub const fn max(&self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }

    pub const fn mask(&self) -> u32 {
        self.max() << self.shift
    }

    pub const fn get(&self, reg: u32) -> u32 {
        (reg & self.mask()) >> self.shift
    }

    /// Returns `reg` with the field replaced by `value`, truncated to fit.
    pub const fn set(&self, reg: u32, value: u32) -> u32 {
        (reg & !self.mask()) | ((value << self.shift) & self.mask())
    }
}

/// A single-bit clock gate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Bit {
    pub addr: u32,
    pub bit: u32,
}

impl Bit {
    pub const fn new(addr: u32, bit: u32) -> Self {
        Self { addr, bit }
    }

    pub const fn mask(&self) -> u32 {
        1 << self.bit
    }
}

/// A plain divider: divisor is the field value plus one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DividerField {
    pub addr: u32,
    pub field: Field,
}

impl DividerField {
    pub const fn new(addr: u32, shift: u32, width: u32) -> Self {
        Self {
            addr,
            field: Field::new(shift, width),
        }
    }

    pub const fn max_divisor(&self) -> u32 {
        self.field.max() + 1
    }

    pub const fn decode(&self, reg: u32) -> u32 {
        self.field.get(reg) + 1
    }

    /// `divisor` is clamped to what the field can express.
    pub fn encode(&self, reg: u32, divisor: u32) -> u32 {
        self.field
            .set(reg, divisor.clamp(1, self.max_divisor()) - 1)
    }
}

/// A divider whose value is split across two non-adjacent fields of one
/// register: `low` holds the least significant bits, `high` the rest.
/// As with [`DividerField`], the divisor is the value plus one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SplitField {
    pub addr: u32,
    pub low: Field,
    pub high: Field,
}

impl SplitField {
    pub const fn new(addr: u32, low: Field, high: Field) -> Self {
        Self { addr, low, high }
    }

    pub const fn max_divisor(&self) -> u32 {
        1 << (self.low.width + self.high.width)
    }

    pub const fn decode(&self, reg: u32) -> u32 {
        ((self.high.get(reg) << self.low.width) | self.low.get(reg)) + 1
    }

    /// `divisor` is clamped to what the fields can express.
    pub fn encode(&self, reg: u32, divisor: u32) -> u32 {
        let value = divisor.clamp(1, self.max_divisor()) - 1;
        let reg = self.low.set(reg, value & self.low.max());
        self.high.set(reg, value >> self.low.width)
    }
}

/// Encoding of a source select field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum SourceSelect {
    Crystal = 0b00,
    Apll = 0b10,
    Upll = 0b11,
}

impl SourceSelect {
    /// `0b01` is reserved and behaves as the crystal.
    pub const fn decode(bits: u32) -> Self {
        match bits & 0b11 {
            0b10 => SourceSelect::Apll,
            0b11 => SourceSelect::Upll,
            _ => SourceSelect::Crystal,
        }
    }
}

impl From<Source> for SourceSelect {
    fn from(s: Source) -> Self {
        match s {
            Source::Crystal => SourceSelect::Crystal,
            Source::PllA => SourceSelect::Apll,
            Source::PllB => SourceSelect::Upll,
        }
    }
}

/// A consumer clock's source select, PLL post-divider (`N0`) and clock
/// divider (`N1`), all in one register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SourceDividerField {
    pub addr: u32,
    pub source: Field,
    pub pll_divider: Field,
    pub clock_divider: Field,
}

impl SourceDividerField {
    /// `N0` at `[n0+2:n0]`, the source select just above it, and an `N1`
    /// of `n1_width` bits at `n1`.
    pub const fn new(addr: u32, n0: u32, n1: u32, n1_width: u32) -> Self {
        Self {
            addr,
            pll_divider: Field::new(n0, 3),
            source: Field::new(n0 + 3, 2),
            clock_divider: Field::new(n1, n1_width),
        }
    }

    /// Number of clock divider settings.
    pub const fn clock_divider_max(&self) -> u32 {
        self.clock_divider.max() + 1
    }

    pub const fn source(&self, reg: u32) -> SourceSelect {
        SourceSelect::decode(self.source.get(reg))
    }

    /// Total division applied after the source.  The PLL post-divider only
    /// exists on the PLL paths.
    pub const fn divisor(&self, reg: u32) -> u32 {
        let n1 = self.clock_divider.get(reg) + 1;
        match self.source(reg) {
            SourceSelect::Crystal => n1,
            _ => n1 * (self.pll_divider.get(reg) + 1),
        }
    }

    pub fn encode(
        &self,
        reg: u32,
        source: SourceSelect,
        pll_divider: u32,
        clock_divider: u32,
    ) -> u32 {
        let reg = self.source.set(reg, source as u32);
        let reg = self.pll_divider.set(reg, pll_divider);
        self.clock_divider.set(reg, clock_divider)
    }
}

bitfield! {
    /// `APLLCON` / `UPLLCON`.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct PllControl(u32);
    impl Debug;
    /// Feedback divider, `nf - 2`.
    pub fb_dv, set_fb_dv: 8, 0;
    /// Input divider, `nr - 2`.
    pub in_dv, set_in_dv: 13, 9;
    /// Output divider code; see [`PllControl::no`].
    pub out_dv, set_out_dv: 15, 14;
    /// Power down.
    pub pd, set_pd: 16;
    /// Bypass: output follows the input.
    pub bp, set_bp: 17;
    /// Output disable.
    pub oe, set_oe: 18;
}

impl PllControl {
    pub fn nf(&self) -> u32 {
        self.fb_dv() + 2
    }

    pub fn nr(&self) -> u32 {
        self.in_dv() + 2
    }

    /// Both middle codes divide by two.
    pub fn no(&self) -> u32 {
        match self.out_dv() {
            0 => 1,
            1 | 2 => 2,
            _ => 4,
        }
    }

    /// Writes `(nf, nr, no)`; `no` values other than 1, 2 and 4 are encoded
    /// as 4.
    pub fn set_triple(&mut self, nf: u32, nr: u32, no: u32) {
        self.set_fb_dv(nf.saturating_sub(2));
        self.set_in_dv(nr.saturating_sub(2));
        self.set_out_dv(match no {
            1 => 0,
            2 => 1,
            _ => 3,
        });
    }
}

bitfield! {
    /// UART `BAUD`.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct BaudControl(u32);
    impl Debug;
    /// Base divider, `a`.
    pub brd, set_brd: 15, 0;
    /// Extra divider, `b - 1`.
    pub divider_x, set_divider_x: 27, 24;
    pub div_x_one, set_div_x_one: 28;
    pub div_x_en, set_div_x_en: 29;
}

impl From<n329_rate::BaudDivider> for BaudControl {
    fn from(d: n329_rate::BaudDivider) -> Self {
        let mut reg = BaudControl(0);
        reg.set_brd(d.a);
        reg.set_divider_x(d.b.saturating_sub(1));
        reg.set_div_x_one(d.dxo);
        reg.set_div_x_en(d.dxe);
        reg
    }
}

impl From<BaudControl> for n329_rate::BaudDivider {
    fn from(reg: BaudControl) -> Self {
        n329_rate::BaudDivider {
            a: reg.brd(),
            b: reg.divider_x() + 1,
            dxe: reg.div_x_en(),
            dxo: reg.div_x_one(),
        }
    }
}
