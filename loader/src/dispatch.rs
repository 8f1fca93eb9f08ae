//! The command loop.
//!
//! `Agent::run` polls the control block forever.  Each recognized command is
//! acknowledged with `Busy`, executed to completion, answered with a terminal
//! status, and only then is the command slot cleared.  An unknown code is
//! answered with `WrongCommand` and left in the slot; the host clears it by
//! writing its next command.

use core::hint;

use log::{debug, error, info, warn};
use storage::{FlashController, Geometry, PowerControl};

use crate::buffer::Buffers;
use crate::config::{Layout, Policy};
use crate::engine::Engine;
use crate::mailbox::{code, Command, ControlBlock, Status};
use crate::sequencer::{self, Session};
use crate::Result;

/// What one pass of the loop did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Poll {
    /// The command slot was empty.
    Idle,
    Handled(Outcome),
    /// An unknown code sat in the command slot.
    Rejected(u32),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Outcome {
    pub command: Command,
    pub status: Status,
}

pub struct Agent<'a, H> {
    hw: H,
    block: &'a ControlBlock,
    buffers: Buffers<'a>,
    policy: Policy,
    layout: Layout,
    session: Option<Session>,
}

impl<'a, H> Agent<'a, H>
where
    H: FlashController + PowerControl + Geometry,
{
    pub fn new(
        hw: H,
        block: &'a ControlBlock,
        buffers: Buffers<'a>,
        policy: Policy,
    ) -> Result<Agent<'a, H>> {
        policy.validate()?;
        let layout = Layout::from_geometry(&hw);
        info!("flash loader: main {:#x?}, info {:#x?}", layout.main, layout.info);
        Ok(Agent { hw, block, buffers, policy, layout, session: None })
    }

    /// Serve commands forever.
    pub fn run(&mut self) -> ! {
        loop {
            if self.poll() == Poll::Idle {
                hint::spin_loop();
            }
        }
    }

    /// One pass of the command loop.
    pub fn poll(&mut self) -> Poll {
        let raw = self.block.command();
        if raw == code::NONE {
            return Poll::Idle;
        }

        let command = match Command::decode(raw, self.block) {
            Some(command) => command,
            None => {
                self.block.set_status(Status::WrongCommand);
                return Poll::Rejected(raw);
            }
        };

        debug!("command {:x?}", command);
        self.block.set_status(Status::Busy);
        let status = self.execute(command);
        self.block.set_status(status);
        self.block.clear_command();
        debug!("command {:#x} -> {:?}", raw, status);

        Poll::Handled(Outcome { command, status })
    }

    fn execute(&mut self, command: Command) -> Status {
        if self.session.is_none() && !matches!(command, Command::Init | Command::Exit) {
            warn!("{:x?} outside of a programming session", command);
        }

        let engine = Engine {
            policy: &self.policy,
            layout: &self.layout,
            block: self.block,
            buffers: &self.buffers,
        };
        let hw = &mut self.hw;

        let result = match command {
            Command::Init => match &self.session {
                Some(session) => {
                    warn!("init with a session open, keeping the first backup");
                    session.apply(hw, &self.policy)
                }
                None => {
                    let (session, result) = Session::enter(hw, &self.policy);
                    self.session = Some(session);
                    result
                }
            },
            Command::MassErase { regions, bsl_key } => {
                engine.mass_erase(hw, regions, bsl_key).map(|_| ())
            }
            Command::SectorErase { address, bsl_key } => {
                engine.sector_erase(hw, address, bsl_key).map(|_| ())
            }
            Command::Program { address, length, bsl_key } => {
                engine.program(hw, address, length, bsl_key)
            }
            Command::ContinuousProgram { address, length, bsl_key } => {
                engine.continuous_program(hw, address, length, bsl_key)
            }
            Command::Exit => match self.session.take() {
                Some(session) => session.leave(hw, &self.policy),
                None => sequencer::leave_without_session(hw, &self.policy),
            },
        };

        match result {
            Ok(()) => Status::Success,
            Err(e) => {
                error!("{:x?} failed: {:?}", command, e);
                command.failure_status()
            }
        }
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn into_hardware(self) -> H {
        self.hw
    }

    /// Is a programming session open.
    pub fn in_session(&self) -> bool {
        self.session.is_some()
    }
}
