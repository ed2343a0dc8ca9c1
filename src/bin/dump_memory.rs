use dmg_mmu::cartridge::{Cartridge, MapperKind};
use dmg_mmu::cpu_bus::CpuBus;
use dmg_mmu::mmu::{Mmu, MmuConfig, Peripherals};
use dmg_mmu::peripherals::{HeldKeys, LatchedDisplay, LatchedInterrupts, LatchedTimer, SharedClock};
use std::env;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

// CPU-visible memory dump, read through the MMU after power-on.
// Usage:
//   dmg-mmu-dump game.gb --mapper mbc1 --bank 3 --start 0x4000 --len 0x100
//   dmg-mmu-dump game.gb --start $FE00 --len 0XA0 --nonzero
// DUMP_START / DUMP_LEN may be used instead of --start / --len.

struct Args {
    rom: PathBuf,
    mapper: MapperKind,
    bank: Option<usize>,
    start: u32,
    len: u32,
    nonzero_only: bool,
}

/// Addresses and sizes: decimal, `0x`/`0X` hex, or `$` hex as in GB assembly listings.
fn parse_number(s: &str) -> Option<u32> {
    let s = s.trim();
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('$'));
    match hex {
        Some(digits) => u32::from_str_radix(digits, 16).ok(),
        None => s.parse().ok(),
    }
}

fn parse_mapper(s: &str) -> Option<MapperKind> {
    match s.to_ascii_lowercase().as_str() {
        "nrom" | "rom" | "none" => Some(MapperKind::Nrom),
        "mbc1" => Some(MapperKind::Mbc1),
        "mbc2" => Some(MapperKind::Mbc2),
        "mbc3" => Some(MapperKind::Mbc3),
        "mbc5" => Some(MapperKind::Mbc5),
        _ => None,
    }
}

fn parse_args() -> Result<Args, String> {
    let mut args = env::args().skip(1);
    let mut rom: Option<PathBuf> = None;
    let mut mapper = MapperKind::Nrom;
    let mut bank: Option<usize> = None;
    let mut start: Option<u32> = None;
    let mut len: Option<u32> = None;
    let mut nonzero_only = false;

    while let Some(a) = args.next() {
        match a.as_str() {
            "--mapper" => {
                let v = args.next().unwrap_or_default();
                mapper = parse_mapper(&v).ok_or_else(|| format!("unknown mapper '{}'", v))?;
            }
            "--bank" => {
                bank = args.next().and_then(|v| parse_number(&v)).map(|n| n as usize);
            }
            "--start" => {
                start = args.next().and_then(|v| parse_number(&v));
            }
            "--len" | "--length" => {
                len = args.next().and_then(|v| parse_number(&v));
            }
            "--nonzero" | "--nz" => {
                nonzero_only = true;
            }
            _ => {
                if rom.is_none() {
                    rom = Some(PathBuf::from(&a));
                }
            }
        }
    }

    let rom = rom.ok_or("ROM path is required")?;
    let start = start
        .or_else(|| env::var("DUMP_START").ok().and_then(|s| parse_number(&s)))
        .unwrap_or(0x0000);
    let len = len
        .or_else(|| env::var("DUMP_LEN").ok().and_then(|s| parse_number(&s)))
        .unwrap_or(0x0100);

    Ok(Args { rom, mapper, bank, start, len, nonzero_only })
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let cart = match Cartridge::load(&args.rom, args.mapper) {
        Ok(cart) => cart,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let clock: SharedClock = Rc::default();
    let peripherals = Peripherals {
        clock: Box::new(clock),
        display: Box::new(LatchedDisplay::new()),
        timer: Box::new(LatchedTimer::default()),
        interrupts: Box::new(LatchedInterrupts::default()),
        input: Box::new(HeldKeys::default()),
    };
    let mut mmu = Mmu::new(cart, peripherals, MmuConfig::from_env());
    if let Some(n) = args.bank {
        mmu.switch_bank(n);
    }

    if args.start > 0xFFFF {
        eprintln!("Start 0x{:05X} is outside the 16-bit address space", args.start);
        process::exit(2);
    }
    let end = args.start.saturating_add(args.len).min(0x10000);
    println!(
        "Memory dump: start=0x{:04X} len=0x{:04X} boot_overlay={}{}",
        args.start,
        end - args.start,
        mmu.boot_overlay_mapped(),
        if args.nonzero_only { " [nonzero only]" } else { "" }
    );

    let mut addr = args.start;
    while addr < end {
        let line_end = (addr + 16).min(end);
        let line: Vec<u8> = (addr..line_end).map(|a| mmu.read_byte(a as u16)).collect();
        if !args.nonzero_only || line.iter().any(|&b| b != 0) {
            print!("{:04X}:", addr);
            for b in &line {
                print!(" {:02X}", b);
            }
            println!();
        }
        addr = line_end;
    }
}
