// Shared pieces for driving an agent from a simulated host.

#![allow(dead_code)]

use std::thread;

use loader::{
    code, Agent, BufferId, BufferStatus, Buffers, ControlBlock, EraseParam, Outcome, Poll, Policy,
    SharedBuffer, Status,
};
use simflash::SimFlash;

/// The memory shared between host and agent.
pub struct Rig {
    pub block: ControlBlock,
    pub one: SharedBuffer,
    pub two: SharedBuffer,
}

impl Rig {
    pub fn new() -> Rig {
        let _ = pretty_env_logger::try_init();
        Rig {
            block: ControlBlock::new(),
            one: SharedBuffer::new(),
            two: SharedBuffer::new(),
        }
    }

    pub fn agent(&self, flash: SimFlash, policy: Policy) -> Agent<'_, SimFlash> {
        Agent::new(flash, &self.block, Buffers::new(&self.one, &self.two), policy).unwrap()
    }

    pub fn host(&self) -> Host<'_> {
        Host {
            block: &self.block,
            buffers: Buffers::new(&self.one, &self.two),
        }
    }
}

/// The host's side of the protocol.
pub struct Host<'a> {
    pub block: &'a ControlBlock,
    pub buffers: Buffers<'a>,
}

impl<'a> Host<'a> {
    /// Post a command.  Only valid while the agent is idle.
    pub fn issue(&self, raw: u32) {
        self.block.reset_status();
        self.block.submit(raw);
    }

    pub fn sector_erase(&self, address: u32) {
        self.block.set_dst_address(address);
        self.issue(code::SECTOR_ERASE);
    }

    pub fn mass_erase(&self, regions: EraseParam, key: u32) {
        self.block.set_erase_param(regions);
        self.block.set_unlock_bsl(key);
        self.issue(code::MASS_ERASE);
    }

    pub fn program(&self, raw: u32, address: u32, length: usize) {
        self.block.set_dst_address(address);
        self.block.set_src_length(length as u32);
        self.issue(raw);
    }

    /// Wait for the agent to finish the current command.
    pub fn wait_done(&self) -> Status {
        loop {
            // Command first: once it reads clear, the final status is visible.
            let command = self.block.command();
            match self.block.status() {
                Some(Status::WrongCommand) => return Status::WrongCommand,
                Some(status) if status.is_terminal() && command == code::NONE => return status,
                _ => thread::yield_now(),
            }
        }
    }

    /// Run a command to completion.
    pub fn call(&self, raw: u32) -> Status {
        self.issue(raw);
        self.wait_done()
    }

    /// Fill one buffer and publish it.
    pub fn load(&self, id: BufferId, data: &[u8]) {
        assert!(self.block.buffer_status(id).is_free(), "refilling a busy buffer");
        unsafe { self.buffers.get(id).fill(data) };
        self.block.mark_ready(id);
    }

    /// Stream `data` through both buffers in `chunk` sized pieces,
    /// alternating buffers.  A buffer is only refilled once it reads free, and
    /// only while the other one is not waiting to be claimed, so the agent
    /// always takes the pieces in order.
    pub fn stream(&self, data: &[u8], chunk: usize) {
        for (n, piece) in data.chunks(chunk).enumerate() {
            let id = BufferId::ALL[n % 2];
            let other = BufferId::ALL[(n + 1) % 2];
            loop {
                let mine = self.block.buffer_status(id);
                let theirs = self.block.buffer_status(other);
                assert!(mine.is_valid(), "{:?}: {:?}", id, mine);
                assert!(theirs.is_valid(), "{:?}: {:?}", other, theirs);
                if mine.is_free() && theirs != BufferStatus::DATA_READY {
                    break;
                }
                thread::yield_now();
            }
            self.load(id, piece);
        }
    }
}

/// Poll until `count` commands have been handled.
pub fn serve(agent: &mut Agent<'_, SimFlash>, count: usize) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    while outcomes.len() < count {
        match agent.poll() {
            Poll::Handled(outcome) => outcomes.push(outcome),
            Poll::Idle => thread::yield_now(),
            Poll::Rejected(raw) => panic!("unexpected command {:#x}", raw),
        }
    }
    outcomes
}

/// Check that program calls cover `start..start + len` exactly, in order.
pub fn assert_covers(programs: &[(u32, usize)], start: u32, len: usize) {
    let mut next = start;
    for &(dst, n) in programs {
        assert_eq!(dst, next, "gap or overlap in {:x?}", programs);
        assert!(n > 0);
        next += n as u32;
    }
    assert_eq!(next, start + len as u32, "short coverage in {:x?}", programs);
}
