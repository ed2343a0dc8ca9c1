//! Memory subsystem for a DMG (original Game Boy) emulator.
//!
//! The CPU core sees a flat 64KB space through [`cpu_bus::CpuBus`]; [`mmu::Mmu`]
//! implements it and resolves every access against, in order:
//!
//! - **boot_rom** – 256-byte boot overlay at 0x0000, unmapped by a write to 0xFF50
//! - **dma** – OAM DMA state machine and CPU bus conflicts while it runs
//! - **peripherals** – display, timer, interrupt and input registers
//! - echo RAM (0xE000-0xFDFF) and VRAM contention during mode 3
//! - **cartridge** – ROM image and bank controller write filtering

pub mod boot_rom;
pub mod cartridge;
pub mod cpu_bus;
pub mod debug_flags;
pub mod dma;
pub mod mmu;
pub mod peripherals;
