use super::*;
use crate::boot_rom::DMG_BOOT_ROM;
use crate::cartridge::{Mapper, MapperKind};
use crate::peripherals::{
    HeldKeys, LatchedDisplay, LatchedInterrupts, LatchedTimer, SharedClock,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct Rig {
    mmu: Mmu,
    clock: SharedClock,
    lcd: Rc<RefCell<LatchedDisplay>>,
    keys: Rc<RefCell<HeldKeys>>,
}

/// Every bank starts with its own index; the rest is a position-dependent pattern.
fn banked_rom(banks: usize) -> Vec<u8> {
    let mut rom: Vec<u8> = (0..banks * BANK_SIZE)
        .map(|i| (i as u8).wrapping_mul(7) ^ (i >> 14) as u8)
        .collect();
    for n in 0..banks {
        rom[n * BANK_SIZE] = n as u8;
    }
    rom[0x0010] = 0xA5;
    rom
}

fn rig_with(kind: MapperKind, banks: usize, config: MmuConfig) -> Rig {
    let clock: SharedClock = Rc::new(Cell::new(0));
    let lcd = Rc::new(RefCell::new(LatchedDisplay::new()));
    let keys = Rc::new(RefCell::new(HeldKeys::default()));
    let cartridge = Cartridge::new(banked_rom(banks), kind).unwrap();
    let peripherals = Peripherals {
        clock: Box::new(Rc::clone(&clock)),
        display: Box::new(Rc::clone(&lcd)),
        timer: Box::new(LatchedTimer::default()),
        interrupts: Box::new(LatchedInterrupts::default()),
        input: Box::new(Rc::clone(&keys)),
    };
    Rig { mmu: Mmu::new(cartridge, peripherals, config), clock, lcd, keys }
}

fn rig() -> Rig {
    rig_with(MapperKind::Mbc1, 8, MmuConfig::debug())
}

fn pattern(k: usize) -> u8 {
    (k as u8).wrapping_mul(13).wrapping_add(0x21)
}

fn seed(mmu: &mut Mmu, base: u16) {
    for k in 0..OAM_DMA_LEN {
        mmu.write_byte(base + k, pattern(k as usize));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_ram_mirrors_work_ram() {
        let Rig { mut mmu, .. } = rig();
        for addr in ECHO_START..=ECHO_END {
            mmu.write_byte(addr, (addr >> 3) as u8);
            assert_eq!(mmu.read_byte(addr - 0x2000), (addr >> 3) as u8);
            assert_eq!(mmu.read_byte(addr), mmu.read_byte(addr - 0x2000));
        }

        mmu.write_byte(0xC123, 0x5A);
        assert_eq!(mmu.read_byte(0xE123), 0x5A);
        // The echo cells themselves are never written.
        assert_eq!(mmu.raw_byte(0xE123), 0x00);
    }

    #[test]
    fn test_boot_overlay_until_disabled() {
        let Rig { mut mmu, .. } = rig_with(MapperKind::Mbc1, 4, MmuConfig::default());
        assert!(mmu.boot_overlay_mapped());
        assert_eq!(mmu.read_byte(0x0010), DMG_BOOT_ROM[0x10]);
        assert_eq!(mmu.read_byte(0x0100), mmu.raw_byte(0x0100));

        mmu.write_byte(reg::BOOT, 0x01);
        assert!(!mmu.boot_overlay_mapped());
        assert_eq!(mmu.read_byte(0x0010), 0xA5);

        mmu.write_byte(reg::BOOT, 0x01);
        assert!(!mmu.boot_overlay_mapped());
        assert_eq!(mmu.read_byte(0x0010), 0xA5);
    }

    #[test]
    fn test_debug_config_starts_without_overlay() {
        let Rig { mut mmu, .. } = rig();
        assert!(!mmu.boot_overlay_mapped());
        assert_eq!(mmu.read_byte(0x0010), 0xA5);
    }

    #[test]
    fn test_dma_basic_transfer() {
        let Rig { mut mmu, clock, .. } = rig();
        seed(&mut mmu, 0xC000);

        clock.set(1000);
        mmu.write_byte(reg::DMA, 0xC0);
        assert_eq!(mmu.dma().pending_start, Some(1002));

        clock.set(1162);
        for k in 0..OAM_DMA_LEN {
            assert_eq!(mmu.read_byte(OAM_START + k), pattern(k as usize));
        }
        assert_eq!(mmu.dma().pending_start, None);
        assert_eq!(mmu.oam()[5], pattern(5));
    }

    #[test]
    fn test_dma_copy_is_lazy() {
        let Rig { mut mmu, clock, .. } = rig();
        seed(&mut mmu, 0xC000);
        clock.set(10);
        mmu.write_byte(reg::DMA, 0xC0);

        // Still inside the startup delay: nothing has moved yet.
        clock.set(11);
        assert_eq!(mmu.advance_dma(11), DmaPhase::Scheduled);
        assert_eq!(mmu.raw_byte(OAM_START), 0x00);

        assert_eq!(mmu.advance_dma(12), DmaPhase::Copying { elapsed: 0 });
        assert_eq!(mmu.raw_byte(OAM_START + 3), pattern(3));
    }

    #[test]
    fn test_dma_video_bus_conflict_glitch() {
        let Rig { mut mmu, clock, .. } = rig();
        seed(&mut mmu, 0x8000);
        mmu.write_byte(0x9000, 0x77);
        mmu.write_byte(0xC100, 0x66);

        clock.set(0);
        mmu.write_byte(reg::DMA, 0x80);
        for elapsed in [0u64, 37, 159] {
            clock.set(2 + elapsed);
            let seen = mmu.read_byte(0x9000);
            assert_eq!(seen, pattern(elapsed as usize));
            assert_eq!(seen, mmu.raw_byte(OAM_START + elapsed as u16));
            assert_eq!(mmu.read_byte(0xC100), 0x66);
        }

        clock.set(2 + 160);
        assert_eq!(mmu.read_byte(0x9000), 0x77);
    }

    #[test]
    fn test_dma_external_bus_conflict_glitch() {
        let Rig { mut mmu, clock, .. } = rig();
        seed(&mut mmu, 0xC000);
        mmu.write_byte(0x8800, 0x99);
        mmu.write_byte(0xD000, 0x44);

        mmu.write_byte(reg::DMA, 0xC0);
        clock.set(2 + 20);
        assert_eq!(mmu.read_byte(0xD000), pattern(20));
        assert_eq!(mmu.read_byte(0x0150), pattern(20));
        assert_eq!(mmu.read_byte(0x8800), 0x99);
        // HRAM reads go through, but writes there share the external bus.
        assert_eq!(mmu.read_byte(0xFF80), 0x00);
        mmu.write_byte(0xFF80, 0x3C);
        assert_eq!(mmu.raw_byte(0xFF80), 0x00);
        mmu.write_byte(0x8800, 0x98);
        assert_eq!(mmu.raw_byte(0x8800), 0x98);

        clock.set(2 + 160);
        mmu.write_byte(0xFF80, 0x3C);
        assert_eq!(mmu.read_byte(0xFF80), 0x3C);
    }

    #[test]
    fn test_dma_register_locked_during_external_copy() {
        let Rig { mut mmu, clock, .. } = rig();
        seed(&mut mmu, 0xC000);

        mmu.write_byte(reg::DMA, 0xC0);
        clock.set(22);
        mmu.write_byte(reg::DMA, 0xD0);
        mmu.write_byte(reg::IE, 0x1F);
        assert_eq!(mmu.dma().source_base, 0xC000);
        assert_eq!(mmu.dma().pending_start, Some(2));
        assert_eq!(mmu.read_byte(reg::IE), 0x00);

        clock.set(2 + 160);
        assert_eq!(mmu.read_byte(OAM_START + 7), pattern(7));
    }

    #[test]
    fn test_oam_inaccessible_during_dma() {
        let Rig { mut mmu, clock, .. } = rig();
        seed(&mut mmu, 0x8000);
        mmu.write_byte(reg::DMA, 0x80);
        clock.set(50);

        for addr in OAM_START..OAM_START + OAM_DMA_LEN {
            assert_eq!(mmu.read_byte(addr), 0xFF);
        }
        mmu.write_byte(0xFE10, 0x12);
        mmu.write_byte(0xFE9F, 0x34);
        assert_eq!(mmu.raw_byte(0xFE10), pattern(0x10));
        assert_eq!(mmu.raw_byte(0xFE9F), pattern(0x9F));

        clock.set(200);
        mmu.write_byte(0xFE10, 0x12);
        assert_eq!(mmu.read_byte(0xFE10), 0x12);
    }

    #[test]
    fn test_same_bus_writes_dropped_during_dma() {
        let Rig { mut mmu, clock, .. } = rig();
        mmu.write_byte(reg::DMA, 0xC0);
        clock.set(30);

        mmu.write_byte(0xC200, 0x01);
        mmu.write_byte(0xE200, 0x02);
        assert_eq!(mmu.raw_byte(0xC200), 0x00);

        mmu.write_byte(0x8100, 0x03);
        assert_eq!(mmu.raw_byte(0x8100), 0x03);
    }

    #[test]
    fn test_dma_retrigger_on_dead_cycle_ignored() {
        let Rig { mut mmu, clock, .. } = rig();
        clock.set(10);
        mmu.write_byte(reg::DMA, 0xC0);
        clock.set(12);
        mmu.write_byte(reg::DMA, 0xD0);
        assert_eq!(mmu.dma().source_base, 0xC000);
        assert_eq!(mmu.dma().pending_start, Some(12));
    }

    #[test]
    fn test_dma_restart_while_copying() {
        let Rig { mut mmu, clock, .. } = rig();
        seed(&mut mmu, 0x8000);
        for k in 0..OAM_DMA_LEN {
            mmu.write_byte(0x9000 + k, !pattern(k as usize));
        }

        // A video-bus source leaves 0xFF46 reachable on the external bus.
        mmu.write_byte(reg::DMA, 0x80);
        clock.set(50);
        assert_eq!(mmu.advance_dma(50), DmaPhase::Copying { elapsed: 48 });
        mmu.write_byte(reg::DMA, 0x90);
        assert_eq!(mmu.dma().source_base, 0x9000);
        assert_eq!(mmu.dma().pending_start, Some(52));
        assert!(!mmu.dma().copied);

        clock.set(300);
        assert_eq!(mmu.read_byte(OAM_START + 7), !pattern(7));
    }

    #[test]
    fn test_word_round_trip() {
        let Rig { mut mmu, .. } = rig();
        for addr in [0xC000u16, 0xC0FF, 0xDFFE, 0xA010, 0xFF80] {
            mmu.write_word(addr, 0xBEEF);
            assert_eq!(mmu.read_word(addr), 0xBEEF);
        }
        mmu.write_word(0xC010, 0x1234);
        assert_eq!(mmu.raw_byte(0xC010), 0x34);
        assert_eq!(mmu.raw_byte(0xC011), 0x12);
    }

    #[test]
    fn test_switch_bank_validates_index() {
        let Rig { mut mmu, .. } = rig();
        let rom = banked_rom(8);

        mmu.switch_bank(5);
        assert_eq!(mmu.read_byte(0x4000), rom[5 * BANK_SIZE]);
        assert_eq!(mmu.read_byte(0x7FFF), rom[6 * BANK_SIZE - 1]);

        let before: Vec<u8> = (0x4000..0x8000u16).map(|a| mmu.raw_byte(a)).collect();
        mmu.switch_bank(8);
        mmu.switch_bank(200);
        let after: Vec<u8> = (0x4000..0x8000u16).map(|a| mmu.raw_byte(a)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_mapper_write_switches_bank() {
        let Rig { mut mmu, .. } = rig();
        let rom = banked_rom(8);

        mmu.write_byte(0x2000, 0x03);
        assert_eq!(mmu.read_byte(0x4000), 3);
        assert_eq!(mmu.read_byte(0x4001), rom[3 * BANK_SIZE + 1]);

        // Bank 31 does not exist on an 8-bank image.
        mmu.write_byte(0x2000, 0x1F);
        assert_eq!(mmu.read_byte(0x4000), 3);

        // The register write itself never reaches the store.
        assert_eq!(mmu.raw_byte(0x2000), rom[0x2000]);
    }

    #[test]
    fn test_external_ram_ignores_enable_latch() {
        let Rig { mut mmu, .. } = rig();
        assert!(!mmu.cartridge().mapper().ram_enabled());
        mmu.write_byte(0xA000, 0x42);
        assert_eq!(mmu.read_byte(0xA000), 0x42);

        mmu.write_byte(0x0000, 0x0A);
        assert!(mmu.cartridge().mapper().ram_enabled());
        mmu.write_byte(0x0000, 0x00);
        assert!(!mmu.cartridge().mapper().ram_enabled());
        mmu.write_byte(0xBFFF, 0x43);
        assert_eq!(mmu.read_byte(0xBFFF), 0x43);
    }

    #[test]
    fn test_nrom_rom_is_immutable() {
        let Rig { mut mmu, .. } = rig_with(MapperKind::Nrom, 2, MmuConfig::debug());
        let rom = banked_rom(2);
        mmu.write_byte(0x0010, 0x00);
        mmu.write_byte(0x2000, 0x01);
        mmu.write_byte(0x7FFF, 0x01);
        assert_eq!(mmu.read_byte(0x0010), 0xA5);
        assert_eq!(mmu.read_byte(0x2000), rom[0x2000]);
        assert_eq!(mmu.read_byte(0x7FFF), rom[0x7FFF]);

        mmu.write_byte(0xA000, 0x42);
        assert_eq!(mmu.read_byte(0xA000), 0x42);
    }

    #[test]
    fn test_vram_blocked_while_drawing() {
        let Rig { mut mmu, lcd, .. } = rig();
        mmu.write_byte(0x8000, 0x42);
        mmu.write_byte(0x9FFF, 0x43);

        lcd.borrow_mut().set_mode(LcdMode::Drawing);
        assert_eq!(mmu.read_byte(0x8000), 0xFF);
        assert_eq!(mmu.read_byte(0x9FFF), 0xFF);
        assert_eq!(mmu.raw_byte(0x8000), 0x42);
        assert_eq!(mmu.vram()[0x1FFF], 0x43);

        // Debug config leaves VRAM writable for tooling.
        mmu.write_byte(0x8001, 0x11);
        assert_eq!(mmu.raw_byte(0x8001), 0x11);

        lcd.borrow_mut().set_mode(LcdMode::OamScan);
        assert_eq!(mmu.read_byte(0x8000), 0x42);
    }

    #[test]
    fn test_vram_write_gate() {
        let Rig { mut mmu, lcd, .. } = rig_with(MapperKind::Mbc1, 4, MmuConfig::default());
        lcd.borrow_mut().set_mode(LcdMode::Drawing);
        mmu.write_byte(0x8000, 0x11);
        mmu.write_byte(0x9FFF, 0x22);
        assert_eq!(mmu.raw_byte(0x8000), 0x00);
        assert_eq!(mmu.raw_byte(0x9FFF), 0x00);

        lcd.borrow_mut().set_mode(LcdMode::VBlank);
        mmu.write_byte(0x8000, 0x11);
        assert_eq!(mmu.raw_byte(0x8000), 0x11);
    }

    #[test]
    fn test_joypad_select_groups() {
        let Rig { mut mmu, keys, .. } = rig();
        *keys.borrow_mut() = HeldKeys { buttons: 0b0001, directions: 0b0100 };

        mmu.write_byte(reg::JOYP, 0x10);
        assert_eq!(mmu.joypad_select(), JoypadSelect::DIRECTIONS);
        assert_eq!(mmu.read_byte(reg::JOYP), 0xDE);

        mmu.write_byte(reg::JOYP, 0x20);
        assert_eq!(mmu.read_byte(reg::JOYP), 0xEB);

        mmu.write_byte(reg::JOYP, 0x30);
        assert_eq!(mmu.read_byte(reg::JOYP), 0xFF);

        // With both groups selected the direction lines win.
        mmu.write_byte(reg::JOYP, 0x00);
        assert_eq!(mmu.read_byte(reg::JOYP), 0xCB);
    }

    #[test]
    fn test_io_registers_delegate() {
        let Rig { mut mmu, lcd, .. } = rig();

        mmu.write_byte(reg::TIMA, 0x12);
        mmu.write_byte(reg::TMA, 0x34);
        mmu.write_byte(reg::TAC, 0x05);
        assert_eq!(mmu.read_byte(reg::TIMA), 0x12);
        assert_eq!(mmu.read_byte(reg::TMA), 0x34);
        assert_eq!(mmu.read_byte(reg::TAC), 0xFD);
        mmu.write_byte(reg::DIV, 0x55);
        assert_eq!(mmu.read_byte(reg::DIV), 0x00);

        mmu.write_byte(reg::IF, 0x01);
        assert_eq!(mmu.read_byte(reg::IF), 0xE1);

        lcd.borrow_mut().set_line(0x90);
        assert_eq!(mmu.read_byte(reg::LY), 0x90);
        mmu.write_byte(reg::LYC, 0x90);
        assert_eq!(mmu.read_byte(reg::LYC), 0x90);
        assert_eq!(mmu.read_byte(reg::STAT) & 0x04, 0x04);

        assert_eq!(mmu.read_byte(reg::KEY1), 0xFF);
    }

    #[test]
    fn test_display_registers_write_through() {
        let Rig { mut mmu, lcd, .. } = rig();
        mmu.write_byte(reg::BGP, 0xE4);
        mmu.write_byte(reg::SCX, 0x08);
        mmu.write_byte(reg::WX, 0x07);
        assert_eq!(lcd.borrow().bg_palette, 0xE4);
        assert_eq!(lcd.borrow().scroll_x, 0x08);
        assert_eq!(lcd.borrow().window_x, 0x07);
        assert_eq!(mmu.read_byte(reg::BGP), 0xE4);
        assert_eq!(mmu.read_byte(reg::SCX), 0x08);
        assert_eq!(mmu.display().window_x(), 0x07);
    }

    #[test]
    fn test_interrupt_mask_not_stored() {
        let Rig { mut mmu, .. } = rig();
        mmu.write_byte(reg::IE, 0x1F);
        assert_eq!(mmu.read_byte(reg::IE), 0x1F);
        assert_eq!(mmu.raw_byte(reg::IE), 0x00);
        mmu.interrupts_mut().set_enable(0x01);
        assert_eq!(mmu.read_byte(reg::IE), 0x01);
    }

    #[test]
    fn test_power_on_state() {
        let Rig { mut mmu, .. } = rig();
        let rom = banked_rom(8);
        assert_eq!(mmu.raw_byte(0xFF40), 0x91);
        assert_eq!(mmu.raw_byte(0xFF26), 0xF1);
        assert_eq!(mmu.raw_byte(0xFF02), 0x7E);
        assert_eq!(mmu.read_byte(0xFF47), 0xFC);
        assert_eq!(mmu.read_byte(0x4000), 1);
        assert_eq!(mmu.read_byte(0x7FFE), rom[0x7FFE]);
        assert_eq!(mmu.read_byte(0xC000), 0x00);
    }

    #[test]
    fn test_initialize_resets_runtime_state() {
        let Rig { mut mmu, clock, .. } = rig_with(MapperKind::Mbc1, 4, MmuConfig::default());
        mmu.write_byte(reg::BOOT, 0x01);
        mmu.write_byte(0xC000, 0x99);
        mmu.write_byte(reg::JOYP, 0x30);
        clock.set(5);
        mmu.write_byte(reg::DMA, 0xC0);

        mmu.initialize();
        assert!(!mmu.boot_overlay_mapped());
        assert_eq!(mmu.read_byte(0x0010), 0xA5);
        assert_eq!(mmu.raw_byte(0xC000), 0x00);
        assert_eq!(mmu.joypad_select(), JoypadSelect::empty());
        assert_eq!(mmu.dma().pending_start, None);
    }
}
