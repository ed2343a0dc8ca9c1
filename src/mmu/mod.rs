//! DMG address decoding: boot overlay, OAM DMA, I/O registers, echo RAM and
//! VRAM contention layered over a flat 64KB store.

#[cfg(test)]
mod tests;

use bitflags::bitflags;

use crate::boot_rom::{BootOverlay, DMG_BOOT_ROM};
use crate::cartridge::{Cartridge, MapperWrite, BANK_SIZE};
use crate::cpu_bus::CpuBus;
use crate::debug_flags;
use crate::dma::{DmaPhase, OamDma, OAM_DMA_LEN, OAM_START};
use crate::peripherals::{Clock, Display, Input, Interrupts, LcdMode, Timer};

const ADDRESS_SPACE: usize = 0x10000;

pub const VRAM_START: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9FFF;
pub const ECHO_START: u16 = 0xE000;
pub const ECHO_END: u16 = 0xFDFF;
const ECHO_OFFSET: u16 = 0x2000;

pub mod reg {
    pub const JOYP: u16 = 0xFF00;
    pub const SB: u16 = 0xFF01;
    pub const DIV: u16 = 0xFF04;
    pub const TIMA: u16 = 0xFF05;
    pub const TMA: u16 = 0xFF06;
    pub const TAC: u16 = 0xFF07;
    pub const IF: u16 = 0xFF0F;
    pub const LCDC: u16 = 0xFF40;
    pub const STAT: u16 = 0xFF41;
    pub const SCY: u16 = 0xFF42;
    pub const SCX: u16 = 0xFF43;
    pub const LY: u16 = 0xFF44;
    pub const LYC: u16 = 0xFF45;
    pub const DMA: u16 = 0xFF46;
    pub const BGP: u16 = 0xFF47;
    pub const OBP0: u16 = 0xFF48;
    pub const OBP1: u16 = 0xFF49;
    pub const WY: u16 = 0xFF4A;
    pub const WX: u16 = 0xFF4B;
    pub const KEY1: u16 = 0xFF4D;
    pub const BOOT: u16 = 0xFF50;
    pub const IE: u16 = 0xFFFF;
}

/// I/O state left behind by the boot program (sound, LCDC and palettes).
const POST_BOOT_IO: [(u16, u8); 20] = [
    (0xFF02, 0x7E),
    (0xFF10, 0x80),
    (0xFF11, 0xBF),
    (0xFF12, 0xF3),
    (0xFF14, 0xBF),
    (0xFF16, 0x3F),
    (0xFF19, 0xBF),
    (0xFF1A, 0x7F),
    (0xFF1B, 0xFF),
    (0xFF1C, 0x9F),
    (0xFF1E, 0xBF),
    (0xFF20, 0xFF),
    (0xFF23, 0xBF),
    (0xFF24, 0x77),
    (0xFF25, 0xF3),
    (0xFF26, 0xF1),
    (0xFF40, 0x91),
    (0xFF47, 0xFC),
    (0xFF48, 0xFF),
    (0xFF49, 0xFF),
];

bitflags! {
    /// P1 select lines. A cleared bit selects that key group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct JoypadSelect: u8 {
        const DIRECTIONS = 0b00010000;
        const BUTTONS = 0b00100000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmuConfig {
    /// Map the boot overlay at power-on.
    pub boot_overlay: bool,
    /// Drop CPU writes to VRAM while the display is drawing.
    pub vram_write_gate: bool,
}

impl MmuConfig {
    /// Permissive setup for tooling: no boot overlay, VRAM always writable.
    pub fn debug() -> Self {
        Self { boot_overlay: false, vram_write_gate: false }
    }

    pub fn from_env() -> Self {
        Self {
            boot_overlay: !debug_flags::skip_boot_rom(),
            vram_write_gate: !debug_flags::permissive_vram(),
        }
    }
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self { boot_overlay: true, vram_write_gate: true }
    }
}

/// The devices behind the I/O registers, handed to the MMU at construction.
pub struct Peripherals {
    pub clock: Box<dyn Clock>,
    pub display: Box<dyn Display>,
    pub timer: Box<dyn Timer>,
    pub interrupts: Box<dyn Interrupts>,
    pub input: Box<dyn Input>,
}

pub struct Mmu {
    store: Box<[u8]>,
    boot: BootOverlay,
    dma: OamDma,
    joypad: JoypadSelect,
    cartridge: Cartridge,
    clock: Box<dyn Clock>,
    display: Box<dyn Display>,
    timer: Box<dyn Timer>,
    interrupts: Box<dyn Interrupts>,
    input: Box<dyn Input>,
    config: MmuConfig,
}

impl Mmu {
    pub fn new(cartridge: Cartridge, peripherals: Peripherals, config: MmuConfig) -> Self {
        let Peripherals { clock, display, timer, interrupts, input } = peripherals;
        let mut mmu = Mmu {
            store: vec![0; ADDRESS_SPACE].into_boxed_slice(),
            boot: BootOverlay::new(DMG_BOOT_ROM, config.boot_overlay),
            dma: OamDma::new(),
            joypad: JoypadSelect::empty(),
            cartridge,
            clock,
            display,
            timer,
            interrupts,
            input,
            config,
        };
        mmu.initialize();
        mmu
    }

    /// Power-on state: cleared store, banks 0 and 1 mapped, post-boot I/O values.
    /// The boot overlay is left as it is.
    pub fn initialize(&mut self) {
        self.store.fill(0);
        let rom = self.cartridge.bytes();
        self.store[..2 * BANK_SIZE].copy_from_slice(&rom[..2 * BANK_SIZE]);
        for &(addr, value) in POST_BOOT_IO.iter() {
            self.store[addr as usize] = value;
        }
        self.dma.reset();
        self.joypad = JoypadSelect::empty();
    }

    /// Maps ROM bank `n` into 0x4000-0x7FFF. Out-of-range banks are logged
    /// and leave the window untouched.
    pub fn switch_bank(&mut self, n: usize) {
        let Some(bank) = self.cartridge.bank(n) else {
            log::warn!(
                "Bank switch to illegal bank {} ({} banks), ignoring",
                n,
                self.cartridge.bank_count()
            );
            return;
        };
        self.store[BANK_SIZE..2 * BANK_SIZE].copy_from_slice(bank);
    }

    /// Brings the DMA engine up to `now`. Every CPU access calls this first.
    pub fn advance_dma(&mut self, now: u64) -> DmaPhase {
        self.dma.advance(now, &mut self.store)
    }

    /// Store byte as the display controller sees it: no overlay, no DMA, no contention.
    pub fn raw_byte(&self, addr: u16) -> u8 {
        self.store[addr as usize]
    }

    pub fn vram(&self) -> &[u8] {
        &self.store[VRAM_START as usize..=VRAM_END as usize]
    }

    pub fn oam(&self) -> &[u8] {
        &self.store[OAM_START as usize..(OAM_START + OAM_DMA_LEN) as usize]
    }

    pub fn boot_overlay_mapped(&self) -> bool {
        self.boot.is_mapped()
    }

    pub fn dma(&self) -> &OamDma {
        &self.dma
    }

    pub fn joypad_select(&self) -> JoypadSelect {
        self.joypad
    }

    pub fn config(&self) -> MmuConfig {
        self.config
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn display(&self) -> &dyn Display {
        self.display.as_ref()
    }

    pub fn display_mut(&mut self) -> &mut dyn Display {
        self.display.as_mut()
    }

    pub fn timer_mut(&mut self) -> &mut dyn Timer {
        self.timer.as_mut()
    }

    pub fn interrupts_mut(&mut self) -> &mut dyn Interrupts {
        self.interrupts.as_mut()
    }

    fn vram_blocked(&self, addr: u16) -> bool {
        (VRAM_START..=VRAM_END).contains(&addr) && self.display.mode() == LcdMode::Drawing
    }

    fn read_joypad(&self) -> u8 {
        let mut mask = 0;
        if !self.joypad.contains(JoypadSelect::BUTTONS) {
            mask = self.input.buttons();
        }
        if !self.joypad.contains(JoypadSelect::DIRECTIONS) {
            mask = self.input.directions();
        }
        0xC0 | (0x0F ^ (mask & 0x0F)) | self.joypad.bits()
    }

    fn read_io(&self, addr: u16) -> Option<u8> {
        let value = match addr {
            reg::JOYP => self.read_joypad(),
            reg::DIV => self.timer.div(),
            reg::TIMA => self.timer.counter(),
            reg::TMA => self.timer.modulo(),
            reg::TAC => self.timer.control(),
            reg::IF => self.interrupts.flags(),
            reg::STAT => self.display.status(),
            reg::LY => self.display.line(),
            reg::LYC => self.display.ly_compare(),
            // No double-speed mode on DMG.
            reg::KEY1 => 0xFF,
            reg::IE => self.interrupts.enable(),
            _ => return None,
        };
        Some(value)
    }

    /// Returns true when the register is fully handled and must not reach the store.
    fn write_io(&mut self, addr: u16, value: u8, now: u64) -> bool {
        match addr {
            reg::JOYP => self.joypad = JoypadSelect::from_bits_truncate(value),
            // Link port data: accepted, nothing attached.
            reg::SB => {}
            reg::DIV => self.timer.set_div(value),
            reg::TIMA => self.timer.set_counter(value),
            reg::TMA => self.timer.set_modulo(value),
            reg::TAC => self.timer.set_control(value),
            reg::IF => self.interrupts.set_flags(value),
            reg::LCDC => self.display.set_control(value),
            reg::STAT => self.display.set_status(value),
            reg::SCY => self.display.set_scroll_y(value),
            reg::SCX => self.display.set_scroll_x(value),
            reg::LYC => self.display.set_ly_compare(value),
            reg::DMA => {
                self.dma.trigger(value, now);
            }
            reg::BGP => self.display.set_bg_palette(value),
            reg::OBP0 => self.display.set_obj_palette0(value),
            reg::OBP1 => self.display.set_obj_palette1(value),
            reg::WY => self.display.set_window_y(value),
            reg::WX => self.display.set_window_x(value),
            reg::BOOT => self.boot.unmap(),
            reg::IE => {
                self.interrupts.set_enable(value);
                return true;
            }
            _ => {}
        }
        false
    }
}

impl CpuBus for Mmu {
    fn read_byte(&mut self, addr: u16) -> u8 {
        let phase = self.advance_dma(self.clock.cycles());

        if let Some(value) = self.boot.read(addr) {
            return value;
        }

        if let DmaPhase::Copying { elapsed } = phase {
            if let Some(value) = self.dma.intercept_read(addr, elapsed, &self.store) {
                return value;
            }
        }

        if let Some(value) = self.read_io(addr) {
            return value;
        }

        let addr = if (ECHO_START..=ECHO_END).contains(&addr) { addr - ECHO_OFFSET } else { addr };

        if self.vram_blocked(addr) {
            return 0xFF;
        }

        self.store[addr as usize]
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        let now = self.clock.cycles();
        let phase = self.advance_dma(now);

        if matches!(phase, DmaPhase::Copying { .. }) && self.dma.blocks_write(addr) {
            log::trace!("Write 0x{:02X} to 0x{:04X} lost to OAM DMA", value, addr);
            return;
        }

        match self.cartridge.classify_write(addr, value) {
            MapperWrite::PassThrough => {}
            MapperWrite::Consumed => return,
            MapperWrite::SwitchBank(n) => {
                self.switch_bank(n);
                return;
            }
        }

        if self.write_io(addr, value, now) {
            return;
        }

        if self.config.vram_write_gate && self.vram_blocked(addr) {
            return;
        }

        let addr = if (ECHO_START..=ECHO_END).contains(&addr) { addr - ECHO_OFFSET } else { addr };
        self.store[addr as usize] = value;
    }
}
