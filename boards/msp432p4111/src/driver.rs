//! MSP432P4111 flash, power and clock access.
//!
//! Flash and power management go through the TI driver library, which is
//! linked in statically.  The DCO range and the watchdog are poked directly,
//! as the driver library calls for them drag in most of the clock system.
//!
//! The driver library takes inclusive end addresses.

use core::ptr;

use storage::{Bank, Error, FlashController, Geometry, PowerControl, Region, Result};

#[allow(non_snake_case)]
extern "C" {
    fn FlashCtl_A_protectMemory(start: u32, end: u32) -> bool;
    fn FlashCtl_A_unprotectMemory(start: u32, end: u32) -> bool;
    fn FlashCtl_A_eraseSector(addr: u32) -> bool;
    fn FlashCtl_A_performMassErase() -> bool;
    fn FlashCtl_A_programMemory(src: *const u8, dest: *mut u8, length: u32) -> bool;
    fn FlashCtl_A_setWaitState(bank: u32, wait_state: u32);
    fn FlashCtl_A_getWaitState(bank: u32) -> u32;

    fn PCM_setCoreVoltageLevel(level: u8) -> bool;
    fn PCM_getCoreVoltageLevel() -> u8;
    fn PCM_setPowerState(state: u8) -> bool;
    fn PCM_getPowerState() -> u8;

    fn SysCtl_A_getFlashSize() -> u32;
    fn SysCtl_A_getInfoFlashSize() -> u32;
}

const CS_BASE: usize = 0x4001_0400;
const CS_KEY: *mut u32 = CS_BASE as *mut u32;
const CS_CTL0: *mut u32 = (CS_BASE + 0x04) as *mut u32;
const CS_KEY_VAL: u32 = 0x0000_695a;
const CS_CTL0_DCORSEL_MASK: u32 = 0x0007_0000;

const WDT_A_CTL: *mut u16 = 0x4000_480c as *mut u16;
/// WDTPW | WDTHOLD
const WDT_A_HOLD: u16 = 0x5a80;

/// Stop the watchdog.  Erases run far longer than its default period.
pub fn hold_watchdog() {
    unsafe { ptr::write_volatile(WDT_A_CTL, WDT_A_HOLD) }
}

fn check(ok: bool, err: Error) -> Result<()> {
    if ok { Ok(()) } else { Err(err) }
}

/// The on-chip flash controller together with PCM and CS.
///
/// There is one of these per chip, `take` it once from `main`.
pub struct Msp432 {
    _private: (),
}

impl Msp432 {
    /// # Safety
    ///
    /// Nothing else may drive the flash controller, PCM or CS while the
    /// returned value is alive.
    pub unsafe fn take() -> Msp432 {
        Msp432 { _private: () }
    }
}

impl FlashController for Msp432 {
    fn protect(&mut self, region: Region) -> Result<()> {
        check(unsafe { FlashCtl_A_protectMemory(region.start, region.last()) }, Error::Protected)
    }

    fn unprotect(&mut self, region: Region) -> Result<()> {
        check(unsafe { FlashCtl_A_unprotectMemory(region.start, region.last()) }, Error::Protected)
    }

    fn erase_sector(&mut self, address: u32) -> Result<()> {
        check(unsafe { FlashCtl_A_eraseSector(address) }, Error::Verify)
    }

    fn mass_erase(&mut self) -> Result<()> {
        check(unsafe { FlashCtl_A_performMassErase() }, Error::Verify)
    }

    fn program(&mut self, src: &[u8], dst: u32) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        let ok =
            unsafe { FlashCtl_A_programMemory(src.as_ptr(), dst as *mut u8, src.len() as u32) };
        check(ok, Error::Verify)
    }

    fn wait_state(&self, bank: Bank) -> u32 {
        unsafe { FlashCtl_A_getWaitState(bank as u32) }
    }

    fn set_wait_state(&mut self, bank: Bank, wait_state: u32) {
        unsafe { FlashCtl_A_setWaitState(bank as u32, wait_state) }
    }
}

impl PowerControl for Msp432 {
    fn core_voltage_level(&self) -> u8 {
        unsafe { PCM_getCoreVoltageLevel() }
    }

    fn set_core_voltage_level(&mut self, level: u8) -> Result<()> {
        check(unsafe { PCM_setCoreVoltageLevel(level) }, Error::Power)
    }

    fn power_state(&self) -> u8 {
        unsafe { PCM_getPowerState() }
    }

    fn set_power_state(&mut self, state: u8) -> Result<()> {
        check(unsafe { PCM_setPowerState(state) }, Error::Power)
    }

    fn clock_range(&self) -> u32 {
        unsafe { ptr::read_volatile(CS_CTL0) & CS_CTL0_DCORSEL_MASK }
    }

    fn set_clock_range(&mut self, range: u32) {
        unsafe {
            ptr::write_volatile(CS_KEY, CS_KEY_VAL);
            let ctl0 = ptr::read_volatile(CS_CTL0);
            let dcorsel = range & CS_CTL0_DCORSEL_MASK;
            ptr::write_volatile(CS_CTL0, (ctl0 & !CS_CTL0_DCORSEL_MASK) | dcorsel);
            ptr::write_volatile(CS_KEY, 0);
        }
    }

    fn set_vector_table(&mut self, base: u32) {
        unsafe {
            let p = cortex_m::Peripherals::steal();
            p.SCB.vtor.write(base);
        }
    }
}

impl Geometry for Msp432 {
    fn flash_size(&self) -> u32 {
        unsafe { SysCtl_A_getFlashSize() }
    }

    fn info_flash_size(&self) -> u32 {
        unsafe { SysCtl_A_getInfoFlashSize() }
    }
}
