//! Flash write protection.
//!
//! Flash stays write protected except while an erase or program is running.
//! Each operation unlocks what it needs and `lock_all` puts protection back on
//! main and information flash afterwards, whatever the outcome.

use heapless::Vec;
use log::{error, trace};
use storage::{FlashController, Region};

use crate::config::Layout;
use crate::mailbox::EraseParam;

/// What an operation needs unprotected.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UnlockScope {
    /// Mass erase: only the memories selected by the host.
    Erase(EraseParam),
    /// Sector erase and program: all of main and information flash.
    All,
}

/// Largest number of separate ranges one unlock touches.
const MAX_UNLOCK_REGIONS: usize = 4;

pub struct LockManager<'a> {
    layout: &'a Layout,
    bsl_key: u32,
}

impl<'a> LockManager<'a> {
    pub fn new(layout: &'a Layout, bsl_key: u32) -> LockManager<'a> {
        LockManager { layout, bsl_key }
    }

    /// The ranges to unprotect for `scope`, given the key the host supplied.
    /// The device TLV is never among them.
    pub fn unlock_regions(&self, scope: UnlockScope, key: u32) -> Vec<Region, MAX_UNLOCK_REGIONS> {
        let (main, info) = match scope {
            UnlockScope::Erase(regions) => {
                (regions.contains(EraseParam::MAIN), regions.contains(EraseParam::INFO))
            }
            UnlockScope::All => (true, true),
        };

        let mut out = Vec::new();
        let mut add = |region: Region| {
            if !region.is_empty() {
                // Capacity covers every region pushed below.
                let _ = out.push(region);
            }
        };
        if main {
            add(self.layout.main);
        }
        if info {
            add(self.layout.info_lower());
            if key == self.bsl_key {
                add(self.layout.bsl());
            }
            add(self.layout.info_upper());
        }
        out
    }

    /// The ranges `lock_all` protects.
    pub fn lock_regions(&self) -> [Region; 2] {
        [self.layout.main, self.layout.info]
    }

    pub fn unlock<F: FlashController>(&self, flash: &mut F, scope: UnlockScope, key: u32) {
        for region in self.unlock_regions(scope, key) {
            trace!("unprotect {:#x}..{:#x}", region.start, region.end);
            // A range left protected shows up as a failure of the operation
            // that needed it.
            if let Err(e) = flash.unprotect(region) {
                error!("unprotect {:#x}..{:#x} failed: {:?}", region.start, region.end, e);
            }
        }
    }

    /// Protect main and information flash.  Both ranges are always attempted.
    pub fn lock_all<F: FlashController>(&self, flash: &mut F) {
        for region in self.lock_regions() {
            trace!("protect {:#x}..{:#x}", region.start, region.end);
            if let Err(e) = flash.protect(region) {
                error!("protect {:#x}..{:#x} failed: {:?}", region.start, region.end, e);
            }
        }
    }

    /// Run `op` with the flash unlocked for `scope`, locking again afterwards.
    pub fn with_unlocked<F, R>(
        &self,
        flash: &mut F,
        scope: UnlockScope,
        key: u32,
        op: impl FnOnce(&mut F) -> R,
    ) -> R
    where
        F: FlashController,
    {
        self.unlock(flash, scope, key);
        let result = op(flash);
        self.lock_all(flash);
        result
    }
}
