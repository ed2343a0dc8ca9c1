// DMG OAM DMA engine and CPU bus-conflict emulation
use crate::debug_flags;

/// First byte of the object attribute table.
pub const OAM_START: u16 = 0xFE00;
/// Bytes moved by one transfer, one per cycle.
pub const OAM_DMA_LEN: u16 = 0xA0;
/// The engine needs two cycles after the trigger write before the first byte moves.
const STARTUP_DELAY: u64 = 2;

/// Where the engine is, as seen from a given cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaPhase {
    Idle,
    Scheduled,
    Copying { elapsed: u64 },
}

/// The DMG has two physical buses the CPU can contend on with the DMA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhysicalBus {
    Video,
    External,
}

impl PhysicalBus {
    fn of(addr: u16) -> Self {
        if (0x8000..0xA000).contains(&addr) {
            PhysicalBus::Video
        } else {
            PhysicalBus::External
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OamDma {
    /// Cycle at which the first byte moves. `None` when no transfer is scheduled or running.
    pub pending_start: Option<u64>,
    pub source_base: u16,
    pub copied: bool,
}

impl OamDma {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Handles a write to 0xFF46. Returns false when the write landed on the
    /// dead cycle of a transfer that is still starting up.
    pub fn trigger(&mut self, value: u8, now: u64) -> bool {
        if self.pending_start == Some(now) {
            log::trace!("OAM DMA trigger ignored on dead cycle {}", now);
            return false;
        }
        self.source_base = u16::from(value) << 8;
        self.copied = false;
        self.pending_start = Some(now + STARTUP_DELAY);
        if debug_flags::dma() {
            log::debug!(
                "OAM DMA scheduled src=0x{:04X} start_cycle={}",
                self.source_base,
                now + STARTUP_DELAY
            );
        }
        true
    }

    /// Moves the state machine up to `now`. The 160-byte block is copied into
    /// OAM exactly once, by the first call that sees the start cycle reached.
    pub fn advance(&mut self, now: u64, store: &mut [u8]) -> DmaPhase {
        let Some(start) = self.pending_start else {
            return DmaPhase::Idle;
        };
        if now < start {
            return DmaPhase::Scheduled;
        }

        if !self.copied {
            let src = self.source_base as usize;
            store.copy_within(src..src + OAM_DMA_LEN as usize, OAM_START as usize);
            self.copied = true;
        }

        let elapsed = now - start;
        if elapsed >= u64::from(OAM_DMA_LEN) {
            self.pending_start = None;
            if debug_flags::dma() {
                log::debug!("OAM DMA from 0x{:04X} finished at cycle {}", self.source_base, now);
            }
            return DmaPhase::Idle;
        }
        DmaPhase::Copying { elapsed }
    }

    fn conflicts(&self, addr: u16) -> bool {
        PhysicalBus::of(addr) == PhysicalBus::of(self.source_base)
    }

    fn owns_oam(addr: u16) -> bool {
        (OAM_START..=OAM_START + OAM_DMA_LEN).contains(&addr)
    }

    /// Value the CPU sees when reading `addr` mid-transfer, or `None` if the
    /// read is unaffected. I/O and HRAM reads always go through.
    pub fn intercept_read(&self, addr: u16, elapsed: u64, store: &[u8]) -> Option<u8> {
        if addr >= 0xFF00 {
            return None;
        }
        if Self::owns_oam(addr) {
            return Some(0xFF);
        }
        if self.conflicts(addr) {
            // The CPU latches whatever byte the engine just put on the bus.
            let glitch = store[OAM_START as usize + elapsed as usize];
            log::trace!("OAM DMA bus conflict read 0x{:04X} -> 0x{:02X}", addr, glitch);
            return Some(glitch);
        }
        None
    }

    /// True if a CPU write to `addr` is lost to the running transfer. Unlike
    /// reads, writes at 0xFF00 and above share the source's bus rule.
    pub fn blocks_write(&self, addr: u16) -> bool {
        Self::owns_oam(addr) || self.conflicts(addr)
    }
}
