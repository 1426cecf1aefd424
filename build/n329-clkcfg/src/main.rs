// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use drv_n329_sys::regfile::RegFile;
use drv_n329_sys::regs::BaudControl;
use drv_n329_sys::{ClockId, Clocks, Hz};
use n329_rate::{plan_pll_rate, solve_divided_rate, solve_uart_baud, PllPlan};

mod board;

use board::Board;

#[derive(Debug, Parser)]
#[clap(max_term_width = 80, about = "N329 clock planner")]
struct Args {
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Apply a board clock file to a reset clock tree and show the result
    Plan {
        /// Board clock file (TOML)
        board: PathBuf,
    },
    /// Solve a PLL's dividers
    Pll {
        /// PLL input frequency
        #[clap(long, parse(try_from_str = parse_int::parse), default_value_t = 12_000_000)]
        fin: Hz,
        #[clap(parse(try_from_str = parse_int::parse))]
        target: Hz,
    },
    /// Solve a consumer clock's source and dividers
    Divided {
        /// Number of clock divider settings
        #[clap(long, parse(try_from_str = parse_int::parse), default_value_t = 16)]
        max: u32,
        #[clap(long, parse(try_from_str = parse_int::parse), default_value_t = 12_000_000)]
        xtal: Hz,
        #[clap(long, parse(try_from_str = parse_int::parse))]
        apll: Hz,
        #[clap(long, parse(try_from_str = parse_int::parse))]
        upll: Hz,
        #[clap(parse(try_from_str = parse_int::parse))]
        target: Hz,
    },
    /// Solve a UART baud divider
    Baud {
        /// UART input clock
        #[clap(long, parse(try_from_str = parse_int::parse), default_value_t = 12_000_000)]
        clock: Hz,
        #[clap(parse(try_from_str = parse_int::parse))]
        baud: Hz,
    },
}

fn plan(path: &std::path::Path) -> Result<()> {
    let board = Board::load(path)?;
    let mut clocks = Clocks::new(RegFile::at_reset(), board.clock_config());
    board.apply(&mut clocks)?;

    println!("{:<10} {:<8} {:>12} {:>4}  ON", "CLOCK", "PARENT", "HZ", "REFS");
    for id in ClockId::iter() {
        let node = clocks.node(id);
        println!(
            "{:<10} {:<8} {:>12} {:>4}  {}",
            id.name(),
            node.parent.map_or("-", ClockId::name),
            node.rate,
            node.enable_count,
            if clocks.is_enabled(id) { "yes" } else { "no" },
        );
    }

    println!();
    println!("{:<10} VALUE", "ADDR");
    for (addr, value) in clocks.mmio().writes() {
        println!("{addr:#010x} {value:#010x}");
    }
    Ok(())
}

pub fn main() -> Result<()> {
    let args = Args::parse();

    match args.cmd {
        Cmd::Plan { board } => plan(&board)?,
        Cmd::Pll { fin, target } => match plan_pll_rate(fin, target) {
            PllPlan::Bypass => println!("bypass: {fin} Hz"),
            PllPlan::Lock(s) => println!(
                "nf={} nr={} no={}: {} Hz",
                s.triple.nf, s.triple.nr, s.triple.no, s.rate
            ),
        },
        Cmd::Divided {
            max,
            xtal,
            apll,
            upll,
            target,
        } => {
            let r = solve_divided_rate(target, xtal, apll, upll, max);
            println!(
                "{:?} / {} / {}: {} Hz",
                r.source,
                r.pll_divider + 1,
                r.clock_divider + 1,
                r.rate
            );
        }
        Cmd::Baud { clock, baud } => {
            let d = solve_uart_baud(baud, clock);
            println!(
                "a={} b={} dxe={} dxo={} ({:?}): {} baud, BAUD={:#010x}",
                d.a,
                d.b,
                d.dxe as u8,
                d.dxo as u8,
                d.mode(),
                d.baud(clock),
                BaudControl::from(d).0,
            );
        }
    }

    Ok(())
}
