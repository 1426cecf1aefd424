// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! UART baud rate programming.

use n329_rate::{solve_uart_baud, BaudDivider, Hz};
use ringbuf::*;

use crate::clk::ClockId;
use crate::regs::{BaudControl, Mmio, UART0_BASE, UART1_BASE, UART_BAUD};
use crate::ClkError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Uart {
    index: u8,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Baud {
        index: u8,
        baud: Hz,
        divider: BaudDivider,
    },
}

ringbuf!(Trace, 8, Trace::None);

impl Uart {
    pub const COUNT: usize = 2;

    pub fn new(index: usize) -> Result<Self, ClkError> {
        if index < Self::COUNT {
            Ok(Self { index: index as u8 })
        } else {
            Err(ClkError::NoSuchClock)
        }
    }

    pub fn index(self) -> usize {
        usize::from(self.index)
    }

    pub fn base(self) -> u32 {
        match self.index {
            0 => UART0_BASE,
            _ => UART1_BASE,
        }
    }

    /// The gate clock feeding this UART.
    pub fn clock(self) -> ClockId {
        match self.index {
            0 => ClockId::Uart0,
            _ => ClockId::Uart1,
        }
    }

    /// Programs the divider nearest `baud` for a UART fed by `clock` and
    /// returns the baud rate it gives.
    pub fn set_baud(
        self,
        mmio: &mut impl Mmio,
        clock: Hz,
        baud: Hz,
    ) -> Result<Hz, ClkError> {
        if baud == 0 {
            return Err(ClkError::BadBaud);
        }

        let divider = solve_uart_baud(baud, clock);
        ringbuf_entry!(Trace::Baud {
            index: self.index,
            baud,
            divider,
        });
        mmio.write(self.base() + UART_BAUD, BaudControl::from(divider).0);
        Ok(divider.baud(clock))
    }

    pub fn baud(self, mmio: &impl Mmio, clock: Hz) -> Hz {
        let reg = BaudControl(mmio.read(self.base() + UART_BAUD));
        BaudDivider::from(reg).baud(clock)
    }
}
