//! Erase and program operations.
//!
//! Every operation runs with flash unlocked only for its own duration; the
//! lock manager re-protects flash before the result is returned.
//!
//! Program data arrives through the shared buffers.  For each buffer the
//! engine waits for `DATA_READY`, sets `ACTIVE`, programs, and then clears
//! both bits, at which point the host may refill it.  A continuous program
//! takes whichever buffer is ready, buffer one first on a tie, so the host
//! can fill one buffer while the other is being programmed.  Because of the
//! tie break, a host keeps at most one buffer ready but unclaimed; two ready
//! buffers are taken buffer one first, whatever order they were filled in.

use core::hint;

use heapless::Vec;
use log::{debug, error, trace, warn};
use storage::FlashController;

use crate::buffer::{BufferId, Buffers, BUFFER_SIZE};
use crate::config::{Layout, Policy};
use crate::lock::{LockManager, UnlockScope};
use crate::mailbox::{BufferStatus, ControlBlock, EraseParam};
use crate::{Error, Result};

/// One driver call worth of a program request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Span {
    /// Offset into the source data.
    pub offset: usize,
    pub dst: u32,
    pub len: usize,
}

/// Split `len` bytes at `dst` where they cross `boundary`.  A span that does
/// not cross is returned whole.
pub fn split_span(dst: u32, len: usize, boundary: u32) -> Vec<Span, 2> {
    let mut spans = Vec::new();
    let end = dst as u64 + len as u64;
    if dst < boundary && end > boundary as u64 {
        let head = (boundary - dst) as usize;
        let _ = spans.push(Span { offset: 0, dst, len: head });
        let _ = spans.push(Span { offset: head, dst: boundary, len: len - head });
    } else {
        let _ = spans.push(Span { offset: 0, dst, len });
    }
    spans
}

/// The outcome of each driver call a program request turned into.
#[derive(Debug)]
pub struct SplitResult {
    pub parts: Vec<(Span, storage::Result<()>), 2>,
}

impl SplitResult {
    /// Succeeds only if every part did.  Every part has already run.
    pub fn into_result(self) -> Result<()> {
        let mut result = Ok(());
        for (span, part) in self.parts {
            if let Err(e) = part {
                error!("program {:#x}+{:#x} failed: {:?}", span.dst, span.len, e);
                if result.is_ok() {
                    result = Err(Error::Flash(e));
                }
            }
        }
        result
    }
}

/// Program `data` at `dst`, splitting at the start of information flash.
/// Both halves are programmed even if the first fails.
pub fn program_split<F: FlashController>(
    flash: &mut F,
    info_base: u32,
    data: &[u8],
    dst: u32,
) -> SplitResult {
    let mut parts = Vec::new();
    for span in split_span(dst, data.len(), info_base) {
        trace!("program {:#x}+{:#x}", span.dst, span.len);
        let result = if span.len == 0 {
            Ok(())
        } else {
            flash.program(&data[span.offset..span.offset + span.len], span.dst)
        };
        let _ = parts.push((span, result));
    }
    SplitResult { parts }
}

/// The erase and program operations, bound to the agent's shared state.
pub struct Engine<'a, 'b> {
    pub policy: &'a Policy,
    pub layout: &'a Layout,
    pub block: &'a ControlBlock,
    pub buffers: &'a Buffers<'b>,
}

impl<'a, 'b> Engine<'a, 'b> {
    fn lock(&self) -> LockManager<'a> {
        LockManager::new(self.layout, self.policy.bsl_key)
    }

    /// Erase main and/or information flash.
    pub fn mass_erase<F: FlashController>(
        &self,
        flash: &mut F,
        regions: EraseParam,
        bsl_key: u32,
    ) -> Result<u32> {
        self.lock().with_unlocked(flash, UnlockScope::Erase(regions), bsl_key, |flash| {
            self.retry_erase(|| flash.mass_erase())
        })
    }

    /// Erase the sector holding `address`.
    pub fn sector_erase<F: FlashController>(
        &self,
        flash: &mut F,
        address: u32,
        bsl_key: u32,
    ) -> Result<u32> {
        self.lock().with_unlocked(flash, UnlockScope::All, bsl_key, |flash| {
            self.retry_erase(|| flash.erase_sector(address))
        })
    }

    /// Run an erase until it verifies, up to the policy's attempt limit.
    /// Returns the number of attempts used.
    ///
    /// An erase that only verifies on the last permitted attempt still counts
    /// as a success.  Older MSP432 loaders report that case as a verify
    /// failure; hosts written against them see SUCCESS here instead.
    fn retry_erase(&self, mut erase: impl FnMut() -> storage::Result<()>) -> Result<u32> {
        let mut last = storage::Error::Verify;
        for attempt in 1..=self.policy.erase_attempts {
            match erase() {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    warn!("erase attempt {} failed: {:?}", attempt, e);
                    last = e;
                }
            }
        }
        Err(Error::EraseExhausted { attempts: self.policy.erase_attempts, last })
    }

    /// Program `length` bytes from buffer one to `address`.
    pub fn program<F: FlashController>(
        &self,
        flash: &mut F,
        address: u32,
        length: u32,
        bsl_key: u32,
    ) -> Result<()> {
        self.lock().with_unlocked(flash, UnlockScope::All, bsl_key, |flash| {
            let id = self.wait_ready(&[BufferId::One]);
            self.consume(flash, id, address, length as usize)
        })
    }

    /// Program `length` bytes to `address`, streamed through both buffers in
    /// chunks of at most `max_chunk` bytes.  Stops at the first failed chunk.
    pub fn continuous_program<F: FlashController>(
        &self,
        flash: &mut F,
        address: u32,
        length: u32,
        bsl_key: u32,
    ) -> Result<()> {
        let mut remaining = length as usize;
        let mut dst = address;
        while remaining > 0 {
            let chunk = remaining.min(self.policy.max_chunk);
            remaining -= chunk;

            let result = self.lock().with_unlocked(flash, UnlockScope::All, bsl_key, |flash| {
                let id = self.wait_ready(&BufferId::ALL);
                self.consume(flash, id, dst, chunk)
            });
            dst = dst.wrapping_add(chunk as u32);

            if let Err(e) = result {
                error!("continuous program aborted, {:#x} bytes left", remaining);
                return Err(e);
            }
        }
        debug!("continuous program of {:#x} bytes at {:#x} done", length, address);
        Ok(())
    }

    /// Busy wait until one of `candidates` has data, taking the first ready
    /// one in order.
    fn wait_ready(&self, candidates: &[BufferId]) -> BufferId {
        loop {
            for &id in candidates {
                if self.block.buffer_status(id).contains(BufferStatus::DATA_READY) {
                    return id;
                }
            }
            hint::spin_loop();
        }
    }

    /// Claim a ready buffer, program `len` bytes of it to `dst`, and hand it
    /// back to the host.
    fn consume<F: FlashController>(
        &self,
        flash: &mut F,
        id: BufferId,
        dst: u32,
        len: usize,
    ) -> Result<()> {
        self.block.claim_buffer(id);
        trace!("buffer {:?}: {:#x} bytes to {:#x}", id, len, dst);

        let result = if len > BUFFER_SIZE {
            error!("{:#x} bytes do not fit in a buffer", len);
            Err(Error::Oversize { length: len as u32 })
        } else {
            // The host does not touch the buffer until it is released below.
            let data = unsafe { self.buffers.get(id).contents(len) };
            program_split(flash, self.layout.info.start, data, dst).into_result()
        };

        self.block.release_buffer(id);
        result
    }
}
