//! Memory bank controllers, reduced to what the MMU needs from them: deciding
//! whether a CPU write is a controller register write, and which ROM bank it
//! selects.
//!
//! RAM enable, banking mode and RAM bank registers are latched so debuggers
//! and tests can inspect them, but external RAM itself is a flat window:
//! 0xA000-0xBFFF accesses reach the store whatever these registers hold.

use crate::debug_flags;

/// Outcome of offering a CPU write to the cartridge's bank controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperWrite {
    /// Not a controller register; the MMU stores the byte as usual.
    PassThrough,
    /// Swallowed by the controller with no visible effect on the address space.
    Consumed,
    /// Swallowed, and the switchable ROM window must now show this bank.
    SwitchBank(usize),
}

pub trait Mapper {
    fn name(&self) -> &'static str;
    fn classify_write(&mut self, addr: u16, value: u8) -> MapperWrite;

    /// Whether external RAM has been unlocked with the 0x0A pattern. Only
    /// reported; the MMU does not gate RAM accesses on it.
    fn ram_enabled(&self) -> bool {
        false
    }
}

/// Supported controller families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperKind {
    Nrom,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

impl MapperKind {
    pub fn build(self) -> Box<dyn Mapper> {
        match self {
            MapperKind::Nrom => Box::new(Nrom),
            MapperKind::Mbc1 => Box::new(Mbc1::new()),
            MapperKind::Mbc2 => Box::new(Mbc2::new()),
            MapperKind::Mbc3 => Box::new(Mbc3::new()),
            MapperKind::Mbc5 => Box::new(Mbc5::new()),
        }
    }
}

fn switch_to(name: &str, bank: usize) -> MapperWrite {
    if debug_flags::mapper() {
        log::debug!("{} selects ROM bank {}", name, bank);
    }
    MapperWrite::SwitchBank(bank)
}

//===========================================================================//

/// Plain 32KB cartridge: ROM is immutable and there are no registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nrom;

impl Mapper for Nrom {
    fn name(&self) -> &'static str {
        "ROM ONLY"
    }

    fn classify_write(&mut self, addr: u16, _value: u8) -> MapperWrite {
        if addr < 0x8000 {
            MapperWrite::Consumed
        } else {
            MapperWrite::PassThrough
        }
    }
}

//===========================================================================//

#[derive(Debug, Clone)]
pub struct Mbc1 {
    bank_lo: u8,
    bank_hi: u8,
    ram_enabled: bool,
    advanced_mode: bool,
}

impl Mbc1 {
    pub fn new() -> Self {
        Self { bank_lo: 1, bank_hi: 0, ram_enabled: false, advanced_mode: false }
    }

    /// Mode select register (0x6000-0x7FFF). Latched only.
    pub fn advanced_mode(&self) -> bool {
        self.advanced_mode
    }

    fn rom_bank(&self) -> usize {
        let lo = if self.bank_lo == 0 { 1 } else { self.bank_lo };
        (usize::from(self.bank_hi) << 5) | usize::from(lo)
    }
}

impl Default for Mbc1 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper for Mbc1 {
    fn name(&self) -> &'static str {
        "MBC1"
    }

    fn classify_write(&mut self, addr: u16, value: u8) -> MapperWrite {
        match addr {
            0x0000..=0x1FFF => {
                self.ram_enabled = value & 0x0F == 0x0A;
                MapperWrite::Consumed
            }
            0x2000..=0x3FFF => {
                self.bank_lo = value & 0x1F;
                switch_to(self.name(), self.rom_bank())
            }
            0x4000..=0x5FFF => {
                self.bank_hi = value & 0x03;
                switch_to(self.name(), self.rom_bank())
            }
            0x6000..=0x7FFF => {
                self.advanced_mode = value & 0x01 != 0;
                MapperWrite::Consumed
            }
            _ => MapperWrite::PassThrough,
        }
    }

    fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }
}

//===========================================================================//

#[derive(Debug, Clone)]
pub struct Mbc2 {
    rom_bank: u8,
    ram_enabled: bool,
}

impl Mbc2 {
    pub fn new() -> Self {
        Self { rom_bank: 1, ram_enabled: false }
    }
}

impl Default for Mbc2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper for Mbc2 {
    fn name(&self) -> &'static str {
        "MBC2"
    }

    fn classify_write(&mut self, addr: u16, value: u8) -> MapperWrite {
        match addr {
            // Address bit 8 picks the register.
            0x0000..=0x3FFF if addr & 0x0100 != 0 => {
                self.rom_bank = match value & 0x0F {
                    0 => 1,
                    bank => bank,
                };
                switch_to(self.name(), usize::from(self.rom_bank))
            }
            0x0000..=0x3FFF => {
                self.ram_enabled = value & 0x0F == 0x0A;
                MapperWrite::Consumed
            }
            0x4000..=0x7FFF => MapperWrite::Consumed,
            _ => MapperWrite::PassThrough,
        }
    }

    fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }
}

//===========================================================================//

#[derive(Debug, Clone)]
pub struct Mbc3 {
    rom_bank: u8,
    ram_select: u8,
    ram_enabled: bool,
}

impl Mbc3 {
    pub fn new() -> Self {
        Self { rom_bank: 1, ram_select: 0, ram_enabled: false }
    }

    /// RAM bank (0x00-0x03) or RTC register (0x08-0x0C) mapped at 0xA000.
    pub fn ram_select(&self) -> u8 {
        self.ram_select
    }
}

impl Default for Mbc3 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper for Mbc3 {
    fn name(&self) -> &'static str {
        "MBC3"
    }

    fn classify_write(&mut self, addr: u16, value: u8) -> MapperWrite {
        match addr {
            0x0000..=0x1FFF => {
                self.ram_enabled = value & 0x0F == 0x0A;
                MapperWrite::Consumed
            }
            0x2000..=0x3FFF => {
                self.rom_bank = match value & 0x7F {
                    0 => 1,
                    bank => bank,
                };
                switch_to(self.name(), usize::from(self.rom_bank))
            }
            0x4000..=0x5FFF => {
                // RAM bank 0-3 or RTC register 0x08-0x0C
                self.ram_select = value;
                MapperWrite::Consumed
            }
            // RTC latch
            0x6000..=0x7FFF => MapperWrite::Consumed,
            _ => MapperWrite::PassThrough,
        }
    }

    fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }
}

//===========================================================================//

#[derive(Debug, Clone)]
pub struct Mbc5 {
    rom_bank: u16,
    ram_bank: u8,
    ram_enabled: bool,
}

impl Mbc5 {
    pub fn new() -> Self {
        Self { rom_bank: 1, ram_bank: 0, ram_enabled: false }
    }

    /// Latched only; external RAM is not banked.
    pub fn ram_bank(&self) -> u8 {
        self.ram_bank
    }
}

impl Default for Mbc5 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper for Mbc5 {
    fn name(&self) -> &'static str {
        "MBC5"
    }

    fn classify_write(&mut self, addr: u16, value: u8) -> MapperWrite {
        match addr {
            0x0000..=0x1FFF => {
                self.ram_enabled = value & 0x0F == 0x0A;
                MapperWrite::Consumed
            }
            0x2000..=0x2FFF => {
                self.rom_bank = (self.rom_bank & 0x100) | u16::from(value);
                switch_to(self.name(), usize::from(self.rom_bank))
            }
            0x3000..=0x3FFF => {
                self.rom_bank = (self.rom_bank & 0x0FF) | (u16::from(value & 0x01) << 8);
                switch_to(self.name(), usize::from(self.rom_bank))
            }
            0x4000..=0x5FFF => {
                self.ram_bank = value & 0x0F;
                MapperWrite::Consumed
            }
            0x6000..=0x7FFF => MapperWrite::Consumed,
            _ => MapperWrite::PassThrough,
        }
    }

    fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }
}

//===========================================================================//
