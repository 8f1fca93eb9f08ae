// Continuous programming through the double buffer.

mod common;

use std::thread;

use loader::{code, BufferId, Command, EraseParam, Policy, Status, BUFFER_SIZE};
use simflash::gen::PayloadBuilder;
use simflash::{styles, SimFlash};

use common::{assert_covers, serve, Rig};

/// Stream `data` to `dst` with a host thread, returning the final status and
/// the flash.
fn stream(flash: SimFlash, policy: Policy, dst: u32, data: &[u8]) -> (Status, SimFlash) {
    let rig = Rig::new();
    let mut agent = rig.agent(flash, policy);
    let host = rig.host();

    let status = thread::scope(|s| {
        let handle = s.spawn(|| {
            host.program(code::CONTINUOUS_PROGRAM, dst, data.len());
            host.stream(data, policy.max_chunk);
            host.wait_done()
        });
        serve(&mut agent, 1);
        handle.join().unwrap()
    });

    assert_eq!(rig.block.command(), code::NONE);
    if status == Status::Success {
        for id in BufferId::ALL {
            assert!(rig.block.buffer_status(id).is_free());
        }
    }
    (status, agent.into_hardware())
}

#[test]
fn chunks_land_in_order() {
    let data = PayloadBuilder::default().size(10_000).build();
    let flash = styles::MSP432P4111.build().unwrap();
    let (status, flash) = stream(flash, Policy::default(), 0x1_0000, &data);

    assert_eq!(status, Status::Success);
    assert_eq!(
        flash.programs(),
        vec![(0x1_0000, BUFFER_SIZE), (0x1_1000, BUFFER_SIZE), (0x1_2000, 1808)]
    );
    assert_eq!(flash.read(0x1_0000, data.len()), &data[..]);
    assert!(flash.all_protected());
}

#[test]
fn small_chunks_across_information_flash() {
    let data = PayloadBuilder::default().size(6000).seed(9).build();
    let flash = styles::MSP432P4111.build().unwrap();
    let info = flash.info_base();
    let policy = Policy { max_chunk: 1000, ..Policy::default() };
    let dst = info - 2500;
    let (status, flash) = stream(flash, policy, dst, &data);

    assert_eq!(status, Status::Success);
    let programs = flash.programs();
    assert_covers(&programs, dst, data.len());
    // The third chunk is split at the start of information flash.
    assert_eq!(programs[2], (info - 500, 500));
    assert_eq!(programs[3], (info, 500));
    assert_eq!(flash.read(dst, 2500), &data[..2500]);
    assert_eq!(flash.read(info, 3500), &data[2500..]);
}

#[test]
fn every_chip() {
    let data = PayloadBuilder::default().size(9000).seed(2).build();
    for flash in styles::all_chips() {
        let (status, flash) = stream(flash.unwrap(), Policy::default(), 0x4000, &data);
        assert_eq!(status, Status::Success);
        assert_covers(&flash.programs(), 0x4000, data.len());
        assert_eq!(flash.read(0x4000, data.len()), &data[..]);
    }
}

#[test]
fn uneven_chunk_sizes() {
    let data = PayloadBuilder::default().size(3 * 1024 + 17).seed(5).build();
    for max_chunk in [1, 255, 1024, BUFFER_SIZE] {
        let policy = Policy { max_chunk, ..Policy::default() };
        let flash = styles::COMPACT.build().unwrap();
        let (status, flash) = stream(flash, policy, 0x2_0000, &data);
        assert_eq!(status, Status::Success, "chunk {}", max_chunk);
        let programs = flash.programs();
        assert_eq!(programs.len(), (data.len() + max_chunk - 1) / max_chunk);
        assert_covers(&programs, 0x2_0000, data.len());
    }
}

#[test]
fn failed_chunk_stops_stream() {
    let data = PayloadBuilder::default().size(3 * BUFFER_SIZE).build();
    let mut flash = styles::MSP432P4111.build().unwrap();
    flash.faults.program_fail_at = Some(0x1_0000 + BUFFER_SIZE as u32 + 8);
    let (status, flash) = stream(flash, Policy::default(), 0x1_0000, &data);

    assert_eq!(status, Status::Error);
    assert_eq!(flash.programs(), vec![(0x1_0000, BUFFER_SIZE), (0x1_1000, BUFFER_SIZE)]);
    assert!(flash.all_protected());
}

#[test]
fn zero_length_takes_no_buffer() {
    let rig = Rig::new();
    let mut agent = rig.agent(styles::MSP432P4111.build().unwrap(), Policy::default());
    let host = rig.host();

    host.program(code::CONTINUOUS_PROGRAM, 0x1_0000, 0);
    assert_eq!(serve(&mut agent, 1)[0].status, Status::Success);
    assert!(agent.hardware().programs().is_empty());
    assert!(agent.hardware().all_protected());
}

#[test]
fn full_session() {
    let rig = Rig::new();
    let mut flash = styles::MSP432P4111.build().unwrap();
    flash.install(0x8000, &[0; 64]).unwrap();
    let before = flash.power_config();
    let mut agent = rig.agent(flash, Policy::default());
    let host = rig.host();
    let data = PayloadBuilder::default().size(5000).seed(11).build();

    let outcomes = thread::scope(|s| {
        let handle = s.spawn(|| {
            assert_eq!(host.call(code::INIT), Status::Success);

            host.block.set_erase_param(EraseParam::MAIN);
            assert_eq!(host.call(code::MASS_ERASE), Status::Success);

            host.program(code::CONTINUOUS_PROGRAM, 0x8000, data.len());
            host.stream(&data, BUFFER_SIZE);
            assert_eq!(host.wait_done(), Status::Success);

            assert_eq!(host.call(code::EXIT), Status::Success);
        });
        let outcomes = serve(&mut agent, 4);
        handle.join().unwrap();
        outcomes
    });

    let commands: Vec<u32> = outcomes.iter().map(|o| o.command.code()).collect();
    assert_eq!(commands, [code::INIT, code::MASS_ERASE, code::CONTINUOUS_PROGRAM, code::EXIT]);
    assert!(matches!(
        outcomes[1].command,
        Command::MassErase { regions, .. } if regions == EraseParam::MAIN
    ));
    assert!(outcomes.iter().all(|o| o.status == Status::Success));

    let flash = agent.hardware();
    assert_eq!(flash.read(0x8000, data.len()), &data[..]);
    assert_eq!(flash.power_config(), before);
    assert!(flash.all_protected());
    assert!(!agent.in_session());
}
