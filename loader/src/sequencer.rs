//! Power and clock sequencing around a programming session.
//!
//! Flash can only be programmed with the core in a suitable power mode and
//! with enough wait states for the clock.  `Session::enter` records the
//! configuration it finds and switches to programming settings;
//! `Session::leave` consumes the session and puts the recorded configuration
//! back, so each capture is restored exactly once.

use log::{debug, error, warn};
use storage::{Bank, FlashController, PowerControl};

use crate::config::Policy;
use crate::{Error, Result};

/// The configuration found at init.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct BackupParams {
    pub bank0_wait: u32,
    pub bank1_wait: u32,
    pub clock_range: u32,
    pub core_voltage: u8,
    pub power_state: u8,
}

impl BackupParams {
    pub fn capture<H: FlashController + PowerControl>(hw: &H) -> BackupParams {
        BackupParams {
            bank0_wait: hw.wait_state(Bank::Bank0),
            bank1_wait: hw.wait_state(Bank::Bank1),
            clock_range: hw.clock_range(),
            core_voltage: hw.core_voltage_level(),
            power_state: hw.power_state(),
        }
    }

    fn wait_state(&self, bank: Bank) -> u32 {
        match bank {
            Bank::Bank0 => self.bank0_wait,
            Bank::Bank1 => self.bank1_wait,
        }
    }
}

/// An open programming session.
#[derive(Debug)]
pub struct Session {
    backup: BackupParams,
}

impl Session {
    /// Save the current configuration and switch to programming settings.
    ///
    /// The session is opened even when the power switch fails: wait states and
    /// clock have been changed regardless, and are restored on leave.  The
    /// power failure is returned alongside.
    pub fn enter<H>(hw: &mut H, policy: &Policy) -> (Session, Result<()>)
    where
        H: FlashController + PowerControl,
    {
        hw.set_vector_table(policy.ram_vectors);
        let backup = BackupParams::capture(hw);
        debug!("enter programming mode, saved {:?}", backup);

        let session = Session { backup };
        let result = session.apply(hw, policy);
        (session, result)
    }

    /// Switch to programming settings again, keeping the first backup.
    pub fn apply<H>(&self, hw: &mut H, policy: &Policy) -> Result<()>
    where
        H: FlashController + PowerControl,
    {
        let power = hw.set_power_state(policy.program_power_state);
        if let Err(e) = power {
            error!("power state {:#x} refused: {:?}", policy.program_power_state, e);
        }

        for bank in Bank::ALL {
            hw.set_wait_state(bank, policy.safe_wait_state);
        }
        hw.set_clock_range(policy.program_clock_range);

        power.map_err(Error::from)
    }

    /// Restore the saved configuration, in reverse order of `enter`.
    ///
    /// The clock drops to the slow range before the saved wait states come
    /// back, and the final clock range is only restored once power and core
    /// voltage are back.  Both fallible restores are attempted.
    pub fn leave<H>(self, hw: &mut H, policy: &Policy) -> Result<()>
    where
        H: FlashController + PowerControl,
    {
        let backup = self.backup;
        debug!("leave programming mode, restoring {:?}", backup);

        hw.set_clock_range(policy.restore_clock_range);
        for bank in Bank::ALL {
            hw.set_wait_state(bank, backup.wait_state(bank));
        }

        let power = hw.set_power_state(backup.power_state);
        let voltage = hw.set_core_voltage_level(backup.core_voltage);

        hw.set_clock_range(backup.clock_range);
        hw.set_vector_table(policy.flash_vectors);

        if let Err(e) = power {
            error!("restoring power state {:#x} failed: {:?}", backup.power_state, e);
        }
        if let Err(e) = voltage {
            error!("restoring core voltage {} failed: {:?}", backup.core_voltage, e);
        }
        power.and(voltage).map_err(Error::from)
    }

    pub fn backup(&self) -> &BackupParams {
        &self.backup
    }
}

/// Leave without a session: nothing to restore, but the vector table still
/// goes back to flash.
pub(crate) fn leave_without_session<H: PowerControl>(hw: &mut H, policy: &Policy) -> Result<()> {
    warn!("exit without init, nothing to restore");
    hw.set_vector_table(policy.flash_vectors);
    Err(Error::NoSession)
}
