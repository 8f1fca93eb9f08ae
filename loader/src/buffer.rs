//! Shared data buffers.
//!
//! Two fixed RAM buffers carry program data from the host.  Ownership moves
//! through the buffer status bits in the control block; the bytes themselves
//! are plain memory that the host writes behind the agent's back.

use core::cell::UnsafeCell;

/// Size of each buffer, and the largest chunk programmed in one step.
pub const BUFFER_SIZE: usize = 0x1000;

pub const BUFFER1_ADDR: usize = 0x2000_2000;
pub const BUFFER2_ADDR: usize = 0x2000_3000;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferId {
    One,
    Two,
}

impl BufferId {
    /// In order of preference when both buffers are ready.
    pub const ALL: [BufferId; 2] = [BufferId::One, BufferId::Two];

    pub(crate) fn index(self) -> usize {
        match self {
            BufferId::One => 0,
            BufferId::Two => 1,
        }
    }
}

/// One buffer worth of memory written by the host.
#[repr(transparent)]
pub struct SharedBuffer(UnsafeCell<[u8; BUFFER_SIZE]>);

// Access is serialized by the buffer handshake, not by the type system.
unsafe impl Sync for SharedBuffer {}

impl SharedBuffer {
    pub const fn new() -> SharedBuffer {
        SharedBuffer(UnsafeCell::new([0xff; BUFFER_SIZE]))
    }

    /// View the buffer living at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must point at `BUFFER_SIZE` bytes reserved for this buffer for
    /// the rest of the program.
    pub unsafe fn at(addr: usize) -> &'static SharedBuffer {
        &*(addr as *const SharedBuffer)
    }

    /// The first `len` bytes of the buffer.
    ///
    /// # Safety
    ///
    /// The caller must own the buffer: `DATA_READY` observed set and not yet
    /// cleared.  The host does not write it during that window.
    pub unsafe fn contents(&self, len: usize) -> &[u8] {
        let data = &*self.0.get();
        &data[..len.min(BUFFER_SIZE)]
    }

    /// Copy `data` into the start of the buffer.  This is the host's half of
    /// the handshake.
    ///
    /// # Safety
    ///
    /// The buffer must be free: both status bits clear.
    pub unsafe fn fill(&self, data: &[u8]) {
        let buf = &mut *self.0.get();
        let len = data.len().min(BUFFER_SIZE);
        buf[..len].copy_from_slice(&data[..len]);
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        SharedBuffer::new()
    }
}

/// The pair of buffers, indexed by `BufferId`.
pub struct Buffers<'a> {
    slots: [&'a SharedBuffer; 2],
}

impl<'a> Buffers<'a> {
    pub fn new(one: &'a SharedBuffer, two: &'a SharedBuffer) -> Buffers<'a> {
        Buffers { slots: [one, two] }
    }

    pub fn get(&self, id: BufferId) -> &'a SharedBuffer {
        self.slots[id.index()]
    }
}
