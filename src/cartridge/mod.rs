mod mapper;

pub use mapper::{Mapper, MapperKind, MapperWrite, Mbc1, Mbc2, Mbc3, Mbc5, Nrom};

use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Size of one switchable ROM bank.
pub const BANK_SIZE: usize = 0x4000;

#[derive(Error, Debug)]
pub enum CartridgeError {
    #[error("ROM image is {len} bytes, need at least two 16KB banks")]
    TooSmall { len: usize },
    #[error("ROM image is {len} bytes, not a whole number of 16KB banks")]
    RaggedBanks { len: usize },
    #[error("error reading ROM from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A cartridge ROM image together with its bank controller.
pub struct Cartridge {
    rom: Vec<u8>,
    mapper: Box<dyn Mapper>,
}

impl Cartridge {
    pub fn new(rom: Vec<u8>, kind: MapperKind) -> Result<Self, CartridgeError> {
        if rom.len() < 2 * BANK_SIZE {
            return Err(CartridgeError::TooSmall { len: rom.len() });
        }
        if rom.len() % BANK_SIZE != 0 {
            return Err(CartridgeError::RaggedBanks { len: rom.len() });
        }
        let mapper = kind.build();
        log::info!(
            "Cartridge loaded - Mapper: {}, ROM: {} bytes ({} banks)",
            mapper.name(),
            rom.len(),
            rom.len() / BANK_SIZE
        );
        Ok(Cartridge { rom, mapper })
    }

    pub fn load<P: AsRef<Path>>(path: P, kind: MapperKind) -> Result<Self, CartridgeError> {
        let rom = fs::read(path.as_ref()).map_err(|source| CartridgeError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::new(rom, kind)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.rom
    }

    pub fn bank_count(&self) -> usize {
        self.rom.len() / BANK_SIZE
    }

    pub fn bank_valid(&self, n: usize) -> bool {
        n < self.bank_count()
    }

    /// The 16KB slice for bank `n`, if the image has one.
    pub fn bank(&self, n: usize) -> Option<&[u8]> {
        if !self.bank_valid(n) {
            return None;
        }
        let start = n * BANK_SIZE;
        Some(&self.rom[start..start + BANK_SIZE])
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    pub fn classify_write(&mut self, addr: u16, value: u8) -> MapperWrite {
        self.mapper.classify_write(addr, value)
    }
}
