//! The shared control block.
//!
//! The host and the agent talk through a small block of words at a fixed
//! address.  There is no hardware locking: each field has exactly one writer
//! at any point in the protocol, and the handoff is carried by the ordering of
//! the accesses.
//!
//! - The host fills in the parameters, then writes `command`.  The agent reads
//!   `command` with acquire ordering, so the parameters it reads afterwards are
//!   the ones written for this command.
//! - The agent writes `status` with release ordering, then clears `command`.
//! - For each buffer the host fills the data, then sets `DATA_READY` with
//!   release ordering.  The agent observes `DATA_READY` with acquire ordering
//!   before touching the data, and clears both bits with release ordering
//!   once it no longer reads the buffer.
//!
//! The layout below is fixed by agreement with the host.
//!
//! +--------+------------------+
//! | Offset | Field            |
//! +--------+------------------+
//! | 0x00   | command          |
//! | 0x04   | status           |
//! | 0x08   | reserved         |
//! | 0x0c   | dst_address      |
//! | 0x10   | src_length       |
//! | 0x14   | buffer 1 status  |
//! | 0x18   | buffer 2 status  |
//! | 0x1c   | erase_param      |
//! | 0x20   | unlock_bsl       |
//! +--------+------------------+

use core::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

use crate::buffer::BufferId;

/// Where the host expects the control block.
pub const CONTROL_BLOCK_ADDR: usize = 0x2000_0150;

/// Raw command codes, as written by the host.
pub mod code {
    pub const NONE: u32 = 0x00;
    pub const MASS_ERASE: u32 = 0x01;
    pub const SECTOR_ERASE: u32 = 0x02;
    pub const PROGRAM: u32 = 0x04;
    pub const INIT: u32 = 0x08;
    pub const EXIT: u32 = 0x10;
    pub const CONTINUOUS_PROGRAM: u32 = 0x20;
}

/// The status word reported back to the host.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u32)]
pub enum Status {
    Busy = 0x0000_0001,
    Success = 0x0000_0ace,
    Error = 0x0000_dead,
    VerifyError = 0xdead_dead,
    PowerError = 0x00de_ad00,
    WrongCommand = 0x0000_0bad,
}

impl Status {
    pub fn from_raw(raw: u32) -> Option<Status> {
        let status = match raw {
            0x0000_0001 => Status::Busy,
            0x0000_0ace => Status::Success,
            0x0000_dead => Status::Error,
            0xdead_dead => Status::VerifyError,
            0x00de_ad00 => Status::PowerError,
            0x0000_0bad => Status::WrongCommand,
            _ => return None,
        };
        Some(status)
    }

    /// Everything but `Busy` ends a command.
    pub fn is_terminal(self) -> bool {
        self != Status::Busy
    }
}

bitflags! {
    /// Handshake bits of one buffer descriptor.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct BufferStatus: u32 {
        /// The agent is consuming the buffer.
        const ACTIVE = 0x01;
        /// The host has filled the buffer.
        const DATA_READY = 0x10;
    }
}

impl BufferStatus {
    /// `ACTIVE` is only meaningful while `DATA_READY` is still set.
    pub fn is_valid(self) -> bool {
        !self.contains(BufferStatus::ACTIVE) || self.contains(BufferStatus::DATA_READY)
    }

    /// Neither bit set: the host may refill the buffer.
    pub fn is_free(self) -> bool {
        !self.intersects(BufferStatus::ACTIVE | BufferStatus::DATA_READY)
    }
}

bitflags! {
    /// Which memories a mass erase may touch.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct EraseParam: u32 {
        const MAIN = 0x01;
        const INFO = 0x02;
    }
}

/// A decoded request, carrying the parameters it was issued with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    Init,
    MassErase { regions: EraseParam, bsl_key: u32 },
    SectorErase { address: u32, bsl_key: u32 },
    Program { address: u32, length: u32, bsl_key: u32 },
    ContinuousProgram { address: u32, length: u32, bsl_key: u32 },
    Exit,
}

impl Command {
    /// Decode `raw`, reading its parameters from `block`.  Returns `None` for
    /// codes this agent does not know, including `NONE`.
    pub fn decode(raw: u32, block: &ControlBlock) -> Option<Command> {
        let bsl_key = block.unlock_bsl();
        let command = match raw {
            code::INIT => Command::Init,
            code::MASS_ERASE => Command::MassErase {
                regions: block.erase_param(),
                bsl_key,
            },
            code::SECTOR_ERASE => Command::SectorErase {
                address: block.dst_address(),
                bsl_key,
            },
            code::PROGRAM => Command::Program {
                address: block.dst_address(),
                length: block.src_length(),
                bsl_key,
            },
            code::CONTINUOUS_PROGRAM => Command::ContinuousProgram {
                address: block.dst_address(),
                length: block.src_length(),
                bsl_key,
            },
            code::EXIT => Command::Exit,
            _ => return None,
        };
        Some(command)
    }

    pub fn code(&self) -> u32 {
        match self {
            Command::Init => code::INIT,
            Command::MassErase { .. } => code::MASS_ERASE,
            Command::SectorErase { .. } => code::SECTOR_ERASE,
            Command::Program { .. } => code::PROGRAM,
            Command::ContinuousProgram { .. } => code::CONTINUOUS_PROGRAM,
            Command::Exit => code::EXIT,
        }
    }

    /// The status reported when this command fails.
    pub fn failure_status(&self) -> Status {
        match self {
            Command::MassErase { .. } => Status::VerifyError,
            Command::Init => Status::PowerError,
            _ => Status::Error,
        }
    }
}

/// The control block itself.  Every field is a 32-bit word.
#[derive(Debug, Default)]
#[repr(C)]
pub struct ControlBlock {
    command: AtomicU32,
    status: AtomicU32,
    _reserved: AtomicU32,
    dst_address: AtomicU32,
    src_length: AtomicU32,
    buffer_status: [AtomicU32; 2],
    erase_param: AtomicU32,
    unlock_bsl: AtomicU32,
}

const _: () = assert!(core::mem::size_of::<ControlBlock>() == 0x24);

impl ControlBlock {
    pub const fn new() -> ControlBlock {
        ControlBlock {
            command: AtomicU32::new(code::NONE),
            status: AtomicU32::new(0),
            _reserved: AtomicU32::new(0),
            dst_address: AtomicU32::new(0),
            src_length: AtomicU32::new(0),
            buffer_status: [AtomicU32::new(0), AtomicU32::new(0)],
            erase_param: AtomicU32::new(0),
            unlock_bsl: AtomicU32::new(0),
        }
    }

    /// View the control block living at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must be word aligned, reserved for the control block for the
    /// rest of the program, and not accessed other than through atomics.
    pub unsafe fn at(addr: usize) -> &'static ControlBlock {
        &*(addr as *const ControlBlock)
    }

    // Agent side.

    pub fn command(&self) -> u32 {
        self.command.load(Ordering::Acquire)
    }

    pub fn clear_command(&self) {
        self.command.store(code::NONE, Ordering::Release);
    }

    pub fn set_status(&self, status: Status) {
        self.status.store(status as u32, Ordering::Release);
    }

    // The parameters are published by the acquire load of `command`.

    pub fn dst_address(&self) -> u32 {
        self.dst_address.load(Ordering::Relaxed)
    }

    pub fn src_length(&self) -> u32 {
        self.src_length.load(Ordering::Relaxed)
    }

    pub fn erase_param(&self) -> EraseParam {
        EraseParam::from_bits_retain(self.erase_param.load(Ordering::Relaxed))
    }

    pub fn unlock_bsl(&self) -> u32 {
        self.unlock_bsl.load(Ordering::Relaxed)
    }

    pub fn buffer_status(&self, id: BufferId) -> BufferStatus {
        BufferStatus::from_bits_retain(self.buffer_status[id.index()].load(Ordering::Acquire))
    }

    /// Mark a ready buffer as being consumed.
    pub fn claim_buffer(&self, id: BufferId) {
        self.buffer_status[id.index()].fetch_or(BufferStatus::ACTIVE.bits(), Ordering::AcqRel);
    }

    /// Hand a consumed buffer back to the host.
    pub fn release_buffer(&self, id: BufferId) {
        let mask = !(BufferStatus::ACTIVE | BufferStatus::DATA_READY).bits();
        self.buffer_status[id.index()].fetch_and(mask, Ordering::Release);
    }

    // Host side.  The agent never calls these; they describe what the host
    // does, and let a simulated host drive the agent.

    pub fn status(&self) -> Option<Status> {
        Status::from_raw(self.raw_status())
    }

    pub fn raw_status(&self) -> u32 {
        self.status.load(Ordering::Acquire)
    }

    /// Forget the previous result, so that a stale terminal status is not
    /// mistaken for the next command's.  Only valid while the agent is idle.
    pub fn reset_status(&self) {
        self.status.store(0, Ordering::Relaxed);
    }

    pub fn set_dst_address(&self, address: u32) {
        self.dst_address.store(address, Ordering::Relaxed);
    }

    pub fn set_src_length(&self, length: u32) {
        self.src_length.store(length, Ordering::Relaxed);
    }

    pub fn set_erase_param(&self, regions: EraseParam) {
        self.erase_param.store(regions.bits(), Ordering::Relaxed);
    }

    pub fn set_unlock_bsl(&self, key: u32) {
        self.unlock_bsl.store(key, Ordering::Relaxed);
    }

    /// Publish a command, and every parameter written before it.
    pub fn submit(&self, raw: u32) {
        self.command.store(raw, Ordering::Release);
    }

    /// Publish a filled buffer.
    pub fn mark_ready(&self, id: BufferId) {
        self.buffer_status[id.index()].fetch_or(BufferStatus::DATA_READY.bits(), Ordering::Release);
    }
}
