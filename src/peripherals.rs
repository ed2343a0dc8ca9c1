//! Collaborator interfaces consumed by the MMU, plus register-latch
//! implementations that are good enough for tooling and tests.

use bitflags::bitflags;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Source of the CPU's monotonic cycle counter.
pub trait Clock {
    fn cycles(&self) -> u64;
}

/// A cycle counter shared between the CPU core and the MMU.
pub type SharedClock = Rc<Cell<u64>>;

impl Clock for SharedClock {
    fn cycles(&self) -> u64 {
        self.get()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LcdStatus: u8 {
        const MODE_LO = 0b00000001;
        const MODE_HI = 0b00000010;
        const LYC_EQUAL = 0b00000100;
        const HBLANK_IRQ = 0b00001000;
        const VBLANK_IRQ = 0b00010000;
        const OAM_IRQ = 0b00100000;
        const LYC_IRQ = 0b01000000;
    }
}

/// Display controller timing mode, taken from STAT bits 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdMode {
    HBlank,
    VBlank,
    OamScan,
    Drawing,
}

impl LcdMode {
    pub fn from_status(status: u8) -> Self {
        match status & 0x03 {
            0 => LcdMode::HBlank,
            1 => LcdMode::VBlank,
            2 => LcdMode::OamScan,
            _ => LcdMode::Drawing,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            LcdMode::HBlank => 0,
            LcdMode::VBlank => 1,
            LcdMode::OamScan => 2,
            LcdMode::Drawing => 3,
        }
    }
}

/// Display controller registers at 0xFF40-0xFF4B.
pub trait Display {
    fn control(&self) -> u8;
    fn set_control(&mut self, value: u8);
    fn status(&self) -> u8;
    fn set_status(&mut self, value: u8);
    fn scroll_y(&self) -> u8;
    fn set_scroll_y(&mut self, value: u8);
    fn scroll_x(&self) -> u8;
    fn set_scroll_x(&mut self, value: u8);
    /// Current scanline (LY).
    fn line(&self) -> u8;
    fn ly_compare(&self) -> u8;
    fn set_ly_compare(&mut self, value: u8);
    fn bg_palette(&self) -> u8;
    fn set_bg_palette(&mut self, value: u8);
    fn obj_palette0(&self) -> u8;
    fn set_obj_palette0(&mut self, value: u8);
    fn obj_palette1(&self) -> u8;
    fn set_obj_palette1(&mut self, value: u8);
    fn window_y(&self) -> u8;
    fn set_window_y(&mut self, value: u8);
    fn window_x(&self) -> u8;
    fn set_window_x(&mut self, value: u8);

    fn mode(&self) -> LcdMode {
        LcdMode::from_status(self.status())
    }
}

/// Divider and timer registers at 0xFF04-0xFF07.
pub trait Timer {
    fn div(&self) -> u8;
    fn set_div(&mut self, value: u8);
    fn counter(&self) -> u8;
    fn set_counter(&mut self, value: u8);
    fn modulo(&self) -> u8;
    fn set_modulo(&mut self, value: u8);
    fn control(&self) -> u8;
    fn set_control(&mut self, value: u8);
}

/// IF (0xFF0F) and IE (0xFFFF).
pub trait Interrupts {
    fn flags(&self) -> u8;
    fn set_flags(&mut self, value: u8);
    fn enable(&self) -> u8;
    fn set_enable(&mut self, value: u8);
}

/// Pressed-key masks, one bit per key, 1 = pressed.
pub trait Input {
    /// A, B, Select, Start in bits 0-3.
    fn buttons(&self) -> u8;
    /// Right, Left, Up, Down in bits 0-3.
    fn directions(&self) -> u8;
}

//===========================================================================//

// A device shared between the MMU and whatever steps it (PPU loop, timer
// tick, CPU interrupt dispatch) goes in as `Rc<RefCell<T>>`.
macro_rules! shared_device {
    ($trait:ident { get: [$($get:ident),*], set: [$($set:ident),*] }) => {
        impl<T: $trait> $trait for Rc<RefCell<T>> {
            $(fn $get(&self) -> u8 {
                self.borrow().$get()
            })*
            $(fn $set(&mut self, value: u8) {
                self.borrow_mut().$set(value)
            })*
        }
    };
}

shared_device!(Display {
    get: [control, status, scroll_y, scroll_x, line, ly_compare, bg_palette,
          obj_palette0, obj_palette1, window_y, window_x],
    set: [set_control, set_status, set_scroll_y, set_scroll_x, set_ly_compare,
          set_bg_palette, set_obj_palette0, set_obj_palette1, set_window_y, set_window_x]
});
shared_device!(Timer {
    get: [div, counter, modulo, control],
    set: [set_div, set_counter, set_modulo, set_control]
});
shared_device!(Interrupts {
    get: [flags, enable],
    set: [set_flags, set_enable]
});
shared_device!(Input {
    get: [buttons, directions],
    set: []
});

//===========================================================================//

/// Display registers with no timing behind them. STAT mode bits and LY are
/// driven through [`LatchedDisplay::set_mode`] and [`LatchedDisplay::set_line`].
#[derive(Debug, Clone, Default)]
pub struct LatchedDisplay {
    pub control: u8,
    status: LcdStatus,
    pub scroll_y: u8,
    pub scroll_x: u8,
    line: u8,
    pub ly_compare: u8,
    pub bg_palette: u8,
    pub obj_palette0: u8,
    pub obj_palette1: u8,
    pub window_y: u8,
    pub window_x: u8,
}

impl LatchedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: LcdMode) {
        self.status.remove(LcdStatus::MODE_LO | LcdStatus::MODE_HI);
        self.status |= LcdStatus::from_bits_truncate(mode.bits());
    }

    pub fn set_line(&mut self, line: u8) {
        self.line = line;
        self.status.set(LcdStatus::LYC_EQUAL, line == self.ly_compare);
    }
}

impl Display for LatchedDisplay {
    fn control(&self) -> u8 {
        self.control
    }
    fn set_control(&mut self, value: u8) {
        self.control = value;
    }
    fn status(&self) -> u8 {
        // Bit 7 is unused and reads back set.
        self.status.bits() | 0x80
    }
    fn set_status(&mut self, value: u8) {
        // Mode and coincidence bits are read-only.
        let read_only = LcdStatus::MODE_LO | LcdStatus::MODE_HI | LcdStatus::LYC_EQUAL;
        self.status = (self.status & read_only) | (LcdStatus::from_bits_truncate(value) - read_only);
    }
    fn scroll_y(&self) -> u8 {
        self.scroll_y
    }
    fn set_scroll_y(&mut self, value: u8) {
        self.scroll_y = value;
    }
    fn scroll_x(&self) -> u8 {
        self.scroll_x
    }
    fn set_scroll_x(&mut self, value: u8) {
        self.scroll_x = value;
    }
    fn line(&self) -> u8 {
        self.line
    }
    fn ly_compare(&self) -> u8 {
        self.ly_compare
    }
    fn set_ly_compare(&mut self, value: u8) {
        self.ly_compare = value;
        self.status.set(LcdStatus::LYC_EQUAL, self.line == value);
    }
    fn bg_palette(&self) -> u8 {
        self.bg_palette
    }
    fn set_bg_palette(&mut self, value: u8) {
        self.bg_palette = value;
    }
    fn obj_palette0(&self) -> u8 {
        self.obj_palette0
    }
    fn set_obj_palette0(&mut self, value: u8) {
        self.obj_palette0 = value;
    }
    fn obj_palette1(&self) -> u8 {
        self.obj_palette1
    }
    fn set_obj_palette1(&mut self, value: u8) {
        self.obj_palette1 = value;
    }
    fn window_y(&self) -> u8 {
        self.window_y
    }
    fn set_window_y(&mut self, value: u8) {
        self.window_y = value;
    }
    fn window_x(&self) -> u8 {
        self.window_x
    }
    fn set_window_x(&mut self, value: u8) {
        self.window_x = value;
    }
}

/// Timer registers without a running divider.
#[derive(Debug, Clone, Default)]
pub struct LatchedTimer {
    pub div: u8,
    pub counter: u8,
    pub modulo: u8,
    pub control: u8,
}

impl Timer for LatchedTimer {
    fn div(&self) -> u8 {
        self.div
    }
    fn set_div(&mut self, _value: u8) {
        // Any write resets the divider.
        self.div = 0;
    }
    fn counter(&self) -> u8 {
        self.counter
    }
    fn set_counter(&mut self, value: u8) {
        self.counter = value;
    }
    fn modulo(&self) -> u8 {
        self.modulo
    }
    fn set_modulo(&mut self, value: u8) {
        self.modulo = value;
    }
    fn control(&self) -> u8 {
        self.control | 0xF8
    }
    fn set_control(&mut self, value: u8) {
        self.control = value & 0x07;
    }
}

#[derive(Debug, Clone, Default)]
pub struct LatchedInterrupts {
    pub flags: u8,
    pub enable: u8,
}

impl Interrupts for LatchedInterrupts {
    fn flags(&self) -> u8 {
        self.flags | 0xE0
    }
    fn set_flags(&mut self, value: u8) {
        self.flags = value & 0x1F;
    }
    fn enable(&self) -> u8 {
        self.enable
    }
    fn set_enable(&mut self, value: u8) {
        self.enable = value;
    }
}

/// Fixed key state. The default has nothing pressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeldKeys {
    pub buttons: u8,
    pub directions: u8,
}

impl Input for HeldKeys {
    fn buttons(&self) -> u8 {
        self.buttons & 0x0F
    }
    fn directions(&self) -> u8 {
        self.directions & 0x0F
    }
}

//===========================================================================//
