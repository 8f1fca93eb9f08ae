//! Chip styles
//!
//! The MSP432P4 parts differ mostly in how much flash they carry.  The
//! address map is the same: main flash from 0, information flash at 2 MiB,
//! both in 4 KiB sectors.

use anyhow::{anyhow, Result};
use storage::Region;

use crate::{PowerConfig, SimFlash};

/// Where information flash starts on every part.
pub const INFO_BASE: u32 = 0x0020_0000;

/// Power and clock state out of reset: one wait state per bank, LDO at core
/// voltage 1, DCO at 12 MHz.
pub const RESET_POWER: PowerConfig = PowerConfig {
    wait_states: [1, 1],
    power_state: 0x01,
    core_voltage: 1,
    clock_range: 0x0003_0000,
};

/// The configuration of a simulated part.
#[derive(Debug, Clone, Copy)]
pub struct ChipLayout {
    pub main_size: u32,
    pub info_size: u32,
    pub sector_size: u32,
    pub power: PowerConfig,
}

impl ChipLayout {
    pub fn build(&self) -> Result<SimFlash> {
        if self.sector_size == 0 || !self.sector_size.is_power_of_two() {
            return Err(anyhow!("sector size {:#x} is not a power of two", self.sector_size));
        }
        if self.main_size % self.sector_size != 0 || self.info_size % self.sector_size != 0 {
            return Err(anyhow!("flash sizes must be whole sectors"));
        }
        if self.main_size > INFO_BASE {
            return Err(anyhow!("main flash {:#x} overlaps information flash", self.main_size));
        }
        Ok(SimFlash::new(
            Region::with_len(0, self.main_size),
            Region::with_len(INFO_BASE, self.info_size),
            self.sector_size,
            self.power,
        ))
    }
}

/// MSP432P4111: main flash runs right up to information flash, so programs
/// can straddle the two.
pub static MSP432P4111: ChipLayout = ChipLayout {
    main_size: 2 * 1024 * 1024,
    info_size: 32 * 1024,
    sector_size: 4 * 1024,
    power: RESET_POWER,
};

/// A smaller part, with a gap between main and information flash.
pub static COMPACT: ChipLayout = ChipLayout {
    main_size: 256 * 1024,
    info_size: 16 * 1024,
    sector_size: 4 * 1024,
    power: RESET_POWER,
};

/// All of the chip styles.
pub static ALL_CHIPS: [&ChipLayout; 2] = [&MSP432P4111, &COMPACT];

/// An iterator that builds each of the chip styles in turn.
pub fn all_chips() -> impl Iterator<Item = Result<SimFlash>> {
    ALL_CHIPS.iter().map(|chip| chip.build())
}
