//! A flash loader agent that runs from RAM.
//!
//! A debug probe loads this agent into SRAM, starts it, and then drives it by
//! writing commands into a control block at an agreed address.  The agent
//! erases and programs on-chip flash on the host's behalf, streaming data
//! through two shared buffers, and reports a status word for each command.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

mod buffer;
mod config;
mod dispatch;
mod engine;
mod lock;
mod mailbox;
mod sequencer;

pub use buffer::{BufferId, Buffers, SharedBuffer, BUFFER1_ADDR, BUFFER2_ADDR, BUFFER_SIZE};
pub use config::{dco, Layout, Policy, BSL_UNLOCK_KEY, PCM_AM_LDO_VCORE0};
pub use dispatch::{Agent, Outcome, Poll};
pub use engine::{program_split, split_span, Engine, Span, SplitResult};
pub use lock::{LockManager, UnlockScope};
pub use mailbox::{
    code, BufferStatus, Command, ControlBlock, EraseParam, Status, CONTROL_BLOCK_ADDR,
};
pub use sequencer::{BackupParams, Session};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// The flash controller or power manager rejected an operation.
    Flash(storage::Error),
    /// An erase kept failing until the retry ceiling was reached.
    EraseExhausted { attempts: u32, last: storage::Error },
    /// The host asked for more bytes than a buffer holds.
    Oversize { length: u32 },
    /// Exit was requested without a matching init.
    NoSession,
    /// The policy cannot be used with the fixed buffers.
    InvalidConfig,
}

impl From<storage::Error> for Error {
    fn from(e: storage::Error) -> Self {
        Error::Flash(e)
    }
}
