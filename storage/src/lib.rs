//! Flash controller capabilities.
//!
//! The flash loader never touches flash controller, power manager or clock
//! system registers itself.  Everything it needs from the chip is expressed
//! by the three traits here, implemented once for real hardware by the board
//! crate and once by the simulator used in tests.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// The address range is not backed by main or information flash.
    OutOfBounds,
    /// A sector in the range is still write protected.
    Protected,
    /// Programming would need to set bits that are already cleared.
    NotErased,
    /// The post-operation verify read back different data.
    Verify,
    /// The power manager refused the requested transition.
    Power,
}

pub type Result<T> = core::result::Result<T, Error>;

/// The two flash banks.  Each has its own wait-state setting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Bank {
    Bank0,
    Bank1,
}

impl Bank {
    pub const ALL: [Bank; 2] = [Bank::Bank0, Bank::Bank1];
}

/// A half open range of flash addresses, `start..end`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Region {
    pub start: u32,
    pub end: u32,
}

impl Region {
    pub const fn new(start: u32, end: u32) -> Region {
        Region { start, end }
    }

    /// Build a region from a base and a length.  Saturates at the top of the
    /// address space.
    pub const fn with_len(start: u32, len: u32) -> Region {
        Region { start, end: start.saturating_add(len) }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.start <= addr && addr < self.end
    }

    /// Does `other` lie entirely within this region.
    pub fn covers(&self, other: &Region) -> bool {
        other.is_empty() || (self.start <= other.start && other.end <= self.end)
    }

    /// The overlapping part of two regions, if any.
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let r = Region::new(self.start.max(other.start), self.end.min(other.end));
        if r.is_empty() { None } else { Some(r) }
    }

    /// The inclusive last address, as vendor drivers expect it.
    pub fn last(&self) -> u32 {
        self.end.saturating_sub(1)
    }
}

/// The on-chip flash controller.
///
/// Erase operations include the controller's own verify pass, so an `Ok`
/// means the range reads back erased.
pub trait FlashController {
    /// Write protect every sector overlapping `region`.
    fn protect(&mut self, region: Region) -> Result<()>;
    /// Remove write protection from every sector overlapping `region`.
    fn unprotect(&mut self, region: Region) -> Result<()>;

    /// Erase the sector containing `address`.
    fn erase_sector(&mut self, address: u32) -> Result<()>;
    /// Erase every unprotected sector of main and information flash.
    fn mass_erase(&mut self) -> Result<()>;
    /// Program `src` starting at `dst`.  The span must not cross from main
    /// into information flash.
    fn program(&mut self, src: &[u8], dst: u32) -> Result<()>;

    fn wait_state(&self, bank: Bank) -> u32;
    fn set_wait_state(&mut self, bank: Bank, wait_state: u32);
}

/// Power manager and clock system.
pub trait PowerControl {
    fn core_voltage_level(&self) -> u8;
    fn set_core_voltage_level(&mut self, level: u8) -> Result<()>;

    fn power_state(&self) -> u8;
    fn set_power_state(&mut self, state: u8) -> Result<()>;

    /// The DCO frequency range selection, as the raw register field.
    fn clock_range(&self) -> u32;
    fn set_clock_range(&mut self, range: u32);

    /// Point the core at the vector table found at `base`.
    fn set_vector_table(&mut self, base: u32);
}

/// Device geometry, as reported by the chip itself.
pub trait Geometry {
    /// Size of main flash, in bytes.
    fn flash_size(&self) -> u32;
    /// Size of information flash, in bytes.
    fn info_flash_size(&self) -> u32;
}

/// Check that a `length` byte span at `offset` lies inside `area`, and return
/// it as a region.
pub fn check_span(area: &Region, offset: u32, length: usize) -> Result<Region> {
    let length = u32::try_from(length).map_err(|_| Error::OutOfBounds)?;
    let end = offset.checked_add(length).ok_or(Error::OutOfBounds)?;
    let span = Region::new(offset, end);
    if !area.covers(&span) || !area.contains(offset) {
        return Err(Error::OutOfBounds);
    }
    Ok(span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_math() {
        let main = Region::with_len(0, 0x20_0000);
        let info = Region::with_len(0x20_0000, 0x8000);
        assert_eq!(main.len(), 0x20_0000);
        assert_eq!(main.last(), 0x1f_ffff);
        assert!(main.intersect(&info).is_none());
        assert_eq!(
            Region::new(0x1f_f000, 0x20_1000).intersect(&info),
            Some(Region::new(0x20_0000, 0x20_1000))
        );
        assert!(Region::new(5, 5).is_empty());
        assert_eq!(Region::with_len(u32::MAX - 1, 16).end, u32::MAX);
    }

    #[test]
    fn span_checks() {
        let info = Region::with_len(0x20_0000, 0x8000);
        assert_eq!(
            check_span(&info, 0x20_0000, 16),
            Ok(Region::new(0x20_0000, 0x20_0010))
        );
        assert_eq!(check_span(&info, 0x20_7ff0, 32), Err(Error::OutOfBounds));
        assert_eq!(check_span(&info, 0x1f_fff0, 32), Err(Error::OutOfBounds));
        assert_eq!(check_span(&info, u32::MAX, 2), Err(Error::OutOfBounds));
        // Zero length at the very end is not inside the area.
        assert_eq!(check_span(&info, 0x20_8000, 0), Err(Error::OutOfBounds));
    }
}
