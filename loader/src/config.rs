//! Loader configuration.
//!
//! `Policy` holds the tunable behavior, `Layout` the address map of the part.

use storage::{Geometry, Region};

use crate::buffer::BUFFER_SIZE;
use crate::{Error, Result};

/// Key that must be in `unlock_bsl` before the bootstrap loader area is
/// unprotected.
pub const BSL_UNLOCK_KEY: u32 = 0x600d_b0b5;

/// CS_CTL0.DCORSEL values.
pub mod dco {
    pub const MASK: u32 = 0x0007_0000;
    /// 3 MHz nominal, the reset default.
    pub const RANGE_3MHZ: u32 = 0x0001_0000;
    /// 24 MHz nominal.
    pub const RANGE_24MHZ: u32 = 0x0004_0000;
}

/// PCM active mode, LDO regulator, core voltage level 0.
pub const PCM_AM_LDO_VCORE0: u8 = 0x00;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Policy {
    /// Erase attempts before giving up, including the first.
    pub erase_attempts: u32,
    /// Bytes taken from each buffer during a continuous program.
    pub max_chunk: usize,
    /// Flash wait states used while programming, on both banks.
    pub safe_wait_state: u32,
    /// Clock range used while programming.
    pub program_clock_range: u32,
    /// Clock range dropped to before the saved wait states come back.
    pub restore_clock_range: u32,
    /// Power state entered for programming.
    pub program_power_state: u8,
    pub bsl_key: u32,
    /// Vector table base while the loader runs.
    pub ram_vectors: u32,
    /// Vector table base handed back on exit.
    pub flash_vectors: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            erase_attempts: 5,
            max_chunk: BUFFER_SIZE,
            safe_wait_state: 2,
            program_clock_range: dco::RANGE_24MHZ,
            restore_clock_range: dco::RANGE_3MHZ,
            program_power_state: PCM_AM_LDO_VCORE0,
            bsl_key: BSL_UNLOCK_KEY,
            ram_vectors: 0x0100_0000,
            flash_vectors: 0x0000_0000,
        }
    }
}

impl Policy {
    pub fn validate(&self) -> Result<()> {
        if self.erase_attempts == 0 || self.max_chunk == 0 || self.max_chunk > BUFFER_SIZE {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

/// Flash address map.
///
/// Information flash is split by the device TLV and the bootstrap loader:
///
/// +-------------+--------------------------------+
/// | info.start  | user information flash         |
/// | tlv_base    | device TLV, never unprotected  |
/// | bsl_start   | bootstrap loader, key gated    |
/// | info_middle | upper information flash        |
/// | info.end    |                                |
/// +-------------+--------------------------------+
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Layout {
    pub main: Region,
    pub info: Region,
    pub tlv_base: u32,
    pub bsl_start: u32,
    pub info_middle: u32,
}

impl Layout {
    pub const FLASH_BASE: u32 = 0x0000_0000;
    pub const INFO_BASE: u32 = 0x0020_0000;
    pub const TLV_BASE: u32 = 0x0020_1000;
    pub const BSL_START: u32 = 0x0020_2000;
    pub const INFO_MIDDLE: u32 = 0x0020_4000;

    /// The MSP432P4111 family map, sized by what the chip reports.
    pub fn from_geometry<G: Geometry>(chip: &G) -> Layout {
        Layout {
            main: Region::with_len(Self::FLASH_BASE, chip.flash_size()),
            info: Region::with_len(Self::INFO_BASE, chip.info_flash_size()),
            tlv_base: Self::TLV_BASE,
            bsl_start: Self::BSL_START,
            info_middle: Self::INFO_MIDDLE,
        }
    }

    /// Information flash below the TLV.
    pub fn info_lower(&self) -> Region {
        Region::new(self.info.start, self.tlv_base.min(self.info.end))
    }

    pub fn bsl(&self) -> Region {
        Region::new(self.bsl_start, self.info_middle.min(self.info.end))
    }

    /// Information flash above the bootstrap loader.
    pub fn info_upper(&self) -> Region {
        Region::new(self.info_middle, self.info.end)
    }
}
