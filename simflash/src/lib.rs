//! Simulated flash controller
//!
//! A model of an MSP432P4 flash controller together with the parts of the
//! power manager and clock system the loader touches.  It is detailed enough
//! for the loader's tests to observe what real hardware would do with the
//! calls made:
//!
//! - Flash is NOR: erase sets a sector to 0xff, programming can only clear
//!   bits.  Programming over bits that would need to be set fails.
//! - Every sector starts out write protected, as after reset.  Erase and
//!   program fail on protected sectors.  Mass erase only touches unprotected
//!   sectors, and fails when there are none.
//! - A program may not cross from main into information flash; the real
//!   controller addresses them as separate arrays.
//! - Setting the power state also moves the core voltage level, which is
//!   encoded in the low bit of the power state.
//!
//! Every call is recorded in a journal, and `Faults` lets a test make
//! individual operations fail.

use storage::{Bank, Error, FlashController, Geometry, PowerControl, Region, Result};

pub mod gen;
pub mod styles;

/// A call made against the simulator.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Op {
    Protect(Region),
    Unprotect(Region),
    EraseSector(u32),
    MassErase,
    Program { dst: u32, len: usize },
    SetWaitState(Bank, u32),
    SetPowerState(u8),
    SetCoreVoltage(u8),
    SetClockRange(u32),
    SetVectorTable(u32),
}

/// Injected failures.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    /// Fail this many erase attempts (sector or mass) before letting one
    /// succeed.
    pub erase_failures: u32,
    /// Fail any program whose span includes this address.
    pub program_fail_at: Option<u32>,
    /// Refuse every power state change.
    pub power_state: bool,
    /// Refuse every core voltage change.
    pub core_voltage: bool,
}

/// Power and clock configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PowerConfig {
    pub wait_states: [u32; 2],
    pub power_state: u8,
    pub core_voltage: u8,
    pub clock_range: u32,
}

/// One contiguous flash array.
struct Array {
    region: Region,
    sector_size: u32,
    data: Vec<u8>,
    protected: Vec<bool>,
}

impl Array {
    fn new(region: Region, sector_size: u32) -> Array {
        let sectors = (region.len() / sector_size) as usize;
        Array {
            region,
            sector_size,
            data: vec![0xff; region.len() as usize],
            protected: vec![true; sectors],
        }
    }

    /// Sector indices overlapping `region`.
    fn sectors(&self, region: &Region) -> core::ops::Range<usize> {
        match self.region.intersect(region) {
            Some(r) => {
                let first = (r.start - self.region.start) / self.sector_size;
                let last = (r.end - 1 - self.region.start) / self.sector_size;
                first as usize..last as usize + 1
            }
            None => 0..0,
        }
    }

    fn erase(&mut self, sector: usize) {
        let size = self.sector_size as usize;
        self.data[sector * size..(sector + 1) * size].fill(0xff);
    }
}

pub struct SimFlash {
    main: Array,
    info: Array,
    power: PowerConfig,
    vector_table: u32,
    journal: Vec<Op>,
    pub faults: Faults,
}

impl SimFlash {
    pub fn new(main: Region, info: Region, sector_size: u32, power: PowerConfig) -> SimFlash {
        SimFlash {
            main: Array::new(main, sector_size),
            info: Array::new(info, sector_size),
            power,
            vector_table: 0,
            journal: Vec::new(),
            faults: Faults::default(),
        }
    }

    pub fn info_base(&self) -> u32 {
        self.info.region.start
    }

    pub fn power_config(&self) -> PowerConfig {
        self.power
    }

    pub fn vector_table(&self) -> u32 {
        self.vector_table
    }

    pub fn journal(&self) -> &[Op] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Number of journal entries matching `pred`.
    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.journal.iter().filter(|op| pred(op)).count()
    }

    /// Every program attempt, in order, as `(dst, len)`.
    pub fn programs(&self) -> Vec<(u32, usize)> {
        self.journal
            .iter()
            .filter_map(|op| match *op {
                Op::Program { dst, len } => Some((dst, len)),
                _ => None,
            })
            .collect()
    }

    /// Read back flash contents, continuing from main into information flash
    /// where the two meet.  Panics on any byte outside of flash.
    pub fn read(&self, addr: u32, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut pos = addr;
        while out.len() < len {
            let array = self.array(pos).expect("read outside of flash");
            let start = (pos - array.region.start) as usize;
            let n = (len - out.len()).min(array.data.len() - start);
            out.extend_from_slice(&array.data[start..start + n]);
            pos += n as u32;
        }
        out
    }

    /// Write flash contents directly, without protection or NOR rules.
    pub fn install(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        let array = self.array_mut(addr).ok_or(Error::OutOfBounds)?;
        storage::check_span(&array.region, addr, bytes.len())?;
        let start = (addr - array.region.start) as usize;
        array.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn is_protected(&self, addr: u32) -> bool {
        match self.array(addr) {
            Some(array) => {
                let sector = ((addr - array.region.start) / array.sector_size) as usize;
                array.protected[sector]
            }
            None => true,
        }
    }

    /// Is every sector of main and information flash protected.
    pub fn all_protected(&self) -> bool {
        self.main.protected.iter().chain(self.info.protected.iter()).all(|p| *p)
    }

    fn array(&self, addr: u32) -> Option<&Array> {
        [&self.main, &self.info].into_iter().find(|a| a.region.contains(addr))
    }

    fn array_mut(&mut self, addr: u32) -> Option<&mut Array> {
        if self.main.region.contains(addr) {
            Some(&mut self.main)
        } else if self.info.region.contains(addr) {
            Some(&mut self.info)
        } else {
            None
        }
    }

    fn set_protection(&mut self, region: Region, protected: bool) -> Result<()> {
        let mut touched = false;
        for array in [&mut self.main, &mut self.info] {
            for sector in array.sectors(&region) {
                array.protected[sector] = protected;
                touched = true;
            }
        }
        if touched { Ok(()) } else { Err(Error::OutOfBounds) }
    }

    /// Consume one injected erase failure, if any are left.
    fn erase_fault(&mut self) -> Result<()> {
        if self.faults.erase_failures > 0 {
            self.faults.erase_failures -= 1;
            return Err(Error::Verify);
        }
        Ok(())
    }
}

impl FlashController for SimFlash {
    fn protect(&mut self, region: Region) -> Result<()> {
        self.journal.push(Op::Protect(region));
        self.set_protection(region, true)
    }

    fn unprotect(&mut self, region: Region) -> Result<()> {
        self.journal.push(Op::Unprotect(region));
        self.set_protection(region, false)
    }

    fn erase_sector(&mut self, address: u32) -> Result<()> {
        self.journal.push(Op::EraseSector(address));
        let array = self.array_mut(address).ok_or(Error::OutOfBounds)?;
        let sector = ((address - array.region.start) / array.sector_size) as usize;
        if array.protected[sector] {
            return Err(Error::Protected);
        }
        array.erase(sector);
        self.erase_fault()
    }

    fn mass_erase(&mut self) -> Result<()> {
        self.journal.push(Op::MassErase);
        let mut erased = 0;
        for array in [&mut self.main, &mut self.info] {
            for sector in 0..array.protected.len() {
                if !array.protected[sector] {
                    array.erase(sector);
                    erased += 1;
                }
            }
        }
        if erased == 0 {
            return Err(Error::Protected);
        }
        self.erase_fault()
    }

    fn program(&mut self, src: &[u8], dst: u32) -> Result<()> {
        self.journal.push(Op::Program { dst, len: src.len() });
        let span = {
            let array = self.array(dst).ok_or(Error::OutOfBounds)?;
            storage::check_span(&array.region, dst, src.len())?
        };
        if let Some(bad) = self.faults.program_fail_at {
            if span.contains(bad) {
                return Err(Error::Verify);
            }
        }

        let array = self.array_mut(dst).ok_or(Error::OutOfBounds)?;
        if array.sectors(&span).any(|s| array.protected[s]) {
            return Err(Error::Protected);
        }
        let start = (dst - array.region.start) as usize;
        let cells = &mut array.data[start..start + src.len()];
        if cells.iter().zip(src).any(|(old, new)| old & new != *new) {
            return Err(Error::NotErased);
        }
        cells.copy_from_slice(src);
        Ok(())
    }

    fn wait_state(&self, bank: Bank) -> u32 {
        self.power.wait_states[bank as usize]
    }

    fn set_wait_state(&mut self, bank: Bank, wait_state: u32) {
        self.journal.push(Op::SetWaitState(bank, wait_state));
        self.power.wait_states[bank as usize] = wait_state;
    }
}

impl PowerControl for SimFlash {
    fn core_voltage_level(&self) -> u8 {
        self.power.core_voltage
    }

    fn set_core_voltage_level(&mut self, level: u8) -> Result<()> {
        self.journal.push(Op::SetCoreVoltage(level));
        if self.faults.core_voltage || level > 1 {
            return Err(Error::Power);
        }
        self.power.core_voltage = level;
        self.power.power_state = (self.power.power_state & !1) | level;
        Ok(())
    }

    fn power_state(&self) -> u8 {
        self.power.power_state
    }

    fn set_power_state(&mut self, state: u8) -> Result<()> {
        self.journal.push(Op::SetPowerState(state));
        if self.faults.power_state {
            return Err(Error::Power);
        }
        self.power.power_state = state;
        self.power.core_voltage = state & 1;
        Ok(())
    }

    fn clock_range(&self) -> u32 {
        self.power.clock_range
    }

    fn set_clock_range(&mut self, range: u32) {
        self.journal.push(Op::SetClockRange(range));
        self.power.clock_range = range;
    }

    fn set_vector_table(&mut self, base: u32) {
        self.journal.push(Op::SetVectorTable(base));
        self.vector_table = base;
    }
}

impl Geometry for SimFlash {
    fn flash_size(&self) -> u32 {
        self.main.region.len()
    }

    fn info_flash_size(&self) -> u32 {
        self.info.region.len()
    }
}
