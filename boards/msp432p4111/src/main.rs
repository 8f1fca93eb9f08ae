#![no_main]
#![no_std]

#[cfg(not(feature = "rtt"))]
use panic_halt as _;
#[cfg(feature = "rtt")]
use {defmt_rtt as _, panic_probe as _};

use cortex_m_rt::entry;
use loader::{
    Agent, Buffers, ControlBlock, Policy, SharedBuffer, BUFFER1_ADDR, BUFFER2_ADDR,
    CONTROL_BLOCK_ADDR,
};

mod driver;

/// Start of the image in the SRAM code alias, where cortex-m-rt puts the
/// vector table.  Matches FLASH in memory.x.
const AGENT_VECTORS: u32 = 0x0100_4000;

#[entry]
fn main() -> ! {
    driver::hold_watchdog();
    cortex_m::interrupt::disable();

    // The host owns these addresses; nothing in the image overlaps them.
    let block = unsafe { ControlBlock::at(CONTROL_BLOCK_ADDR) };
    let buffers =
        unsafe { Buffers::new(SharedBuffer::at(BUFFER1_ADDR), SharedBuffer::at(BUFFER2_ADDR)) };
    let hw = unsafe { driver::Msp432::take() };

    let policy = Policy {
        ram_vectors: AGENT_VECTORS,
        ..Policy::default()
    };
    let mut agent = match Agent::new(hw, block, buffers, policy) {
        Ok(agent) => agent,
        Err(_) => loop {
            cortex_m::asm::bkpt();
        },
    };

    #[cfg(feature = "rtt")]
    defmt::info!("flash loader ready");

    agent.run()
}
