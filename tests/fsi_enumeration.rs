// CLASSIFICATION: COMMUNITY
// Filename: fsi_enumeration.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

mod common;

use cohesix_fsi::crc4::seal;
use cohesix_fsi::registry::pool_snapshot;
use cohesix_fsi::scan::ConfigEntry;
use cohesix_fsi::sim::{SimFabric, SimOp, SimSlave};
use cohesix_fsi::{
    register_master, registered_masters, unregister_master, FsiError, LinkState,
    TestRegistryGuard,
};
use common::*;
use serial_test::serial;

#[test]
#[serial]
fn empty_link_registers_nothing() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let fabric = SimFabric::new();
    let master = root_master(&fabric, 1);

    register_master(&master).unwrap();

    assert!(master.slaves().is_empty());
    assert_eq!(master.link_state(0), Some(LinkState::Broken));
    assert!(fabric.ops().contains(&SimOp::Read {
        link: 0,
        id: 3,
        addr: 0x800,
        size: 4
    }));
    // The probe failed, so no id was ever assigned.
    assert!(fabric.writes_to(0x800).is_empty());
}

#[test]
#[serial]
fn one_slave_two_engines() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let fabric = fabric_with(two_engine_slave());
    let master = root_master(&fabric, 1);

    let idx = register_master(&master).unwrap();

    let slaves = master.slaves();
    assert_eq!(slaves.len(), 1);
    let slave = &slaves[0];
    assert_eq!(slave.name(), "slave@00:00");
    assert_eq!(slave.chip_id(), seal(CHIP_ID));
    assert_eq!(master.link_state(0), Some(LinkState::Populated));

    let engines = slave.engines();
    assert_eq!(engines.len(), 2);
    let (a, b) = (&engines[0], &engines[1]);
    assert_eq!((a.engine_type(), a.version()), (0x5, 1));
    assert_eq!((a.addr(), a.size(), a.si1s_bit()), (0xc00, 0x400, 1));
    assert_eq!((b.engine_type(), b.version()), (0x9, 2));
    assert_eq!((b.addr(), b.size(), b.si1s_bit()), (0x1000, 0x800, 2));
    assert_eq!(a.name(), format!("{idx:02x}:00:00:00"));
    assert_eq!(b.name(), format!("{idx:02x}:00:00:01"));

    let ops = fabric.ops();
    assert!(ops.contains(&SimOp::Write {
        link: 0,
        id: 3,
        addr: 0x800,
        value: 0xa0ff_0100
    }));
    assert_eq!(fabric.writes_to(SRSIC0_ADDR), vec![0xffff_ffff]);
    assert_eq!(fabric.writes_to(0x800 + 0x6c), vec![0xffff_ffff]);
}

#[test]
#[serial]
fn crc_poisoned_entry_stops_the_walk() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let slave = two_engine_slave();
    let second = slave.reg(16);
    slave.poke(16, second ^ 0xf);
    let fabric = fabric_with(slave);
    let master = root_master(&fabric, 1);

    register_master(&master).unwrap();

    let slaves = master.slaves();
    assert_eq!(slaves.len(), 1);
    let engines = slaves[0].engines();
    assert_eq!(engines.len(), 1);
    assert_eq!(engines[0].addr(), 0xc00);
}

#[test]
#[serial]
fn bad_chip_id_is_not_registered() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let slave = two_engine_slave();
    slave.poke(0, seal(CHIP_ID) ^ 0x1);
    let fabric = fabric_with(slave);
    let master = root_master(&fabric, 1);

    register_master(&master).unwrap();

    assert!(master.slaves().is_empty());
    assert_eq!(master.link_state(0), Some(LinkState::Probed));
}

#[test]
#[serial]
fn failed_link_enable_skips_the_link() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let fabric = fabric_with(two_engine_slave());
    fabric.fail_link_enable(0);
    let master = root_master(&fabric, 1);

    register_master(&master).unwrap();

    assert!(master.slaves().is_empty());
    assert_eq!(master.link_state(0), Some(LinkState::Idle));
    assert!(!fabric.ops().contains(&SimOp::Break { link: 0 }));
}

#[test]
#[serial]
fn engine_layout_invariants() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let slave = SimSlave::with_table(
        CHIP_ID,
        &[
            ConfigEntry::engine(0x3, 1, 2),
            ConfigEntry::engine(0x0, 0, 4),
            ConfigEntry::engine(0x4, 1, 0),
            ConfigEntry::engine(0x6, 3, 1),
            ConfigEntry::engine(0x7, 1, 8),
        ],
    );
    let fabric = fabric_with(slave);
    let master = root_master(&fabric, 1);
    register_master(&master).unwrap();

    let engines = master.slaves()[0].engines();
    assert_eq!(engines.len(), 3);
    assert_eq!(
        engines.iter().map(|e| e.addr()).collect::<Vec<_>>(),
        vec![0xc00, 0x2400, 0x2800]
    );
    assert_eq!(
        engines.iter().map(|e| e.si1s_bit()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    for pair in engines.windows(2) {
        assert!(pair[0].addr() + pair[0].size() <= pair[1].addr());
        assert!(pair[0].unit() < pair[1].unit());
    }
    for e in &engines {
        assert!(e.addr() >= 0xc00);
        assert!(u64::from(e.addr()) + u64::from(e.size()) <= 1 << 32);
    }
}

#[test]
#[serial]
fn engine_access_is_bounded() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let slave = two_engine_slave();
    slave.poke(0xc00 + 0x3fc, 0x5a5a_0001);
    let fabric = fabric_with(slave);
    let master = root_master(&fabric, 1);
    register_master(&master).unwrap();
    let engine = master.slaves()[0].engines()[0].clone();

    assert_eq!(engine.read_u32(0x3fc), Ok(0x5a5a_0001));
    engine.write_u32(0, 0x1234_5678).unwrap();
    assert_eq!(fabric.slave(0).unwrap().reg(0xc00), 0x1234_5678);

    let mut word = [0u8; 4];
    assert!(matches!(
        engine.read(0x3fd, &mut word),
        Err(FsiError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.read(0x401, &mut word),
        Err(FsiError::InvalidArgument(_))
    ));
    let mut half = [0u8; 2];
    assert!(engine.read(0x3fe, &mut half).is_ok());
}

#[test]
#[serial]
fn peek_returns_the_describing_word() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let fabric = fabric_with(two_engine_slave());
    let master = root_master(&fabric, 1);
    register_master(&master).unwrap();

    let engines = master.slaves()[0].engines();
    let second = ConfigEntry::decode(engines[1].peek().unwrap()).unwrap();
    assert_eq!(second.engine_type, 0x9);
    assert_eq!(second.slots, 2);
    assert!(!second.next);
}

#[test]
#[serial]
fn raw_window_checks_alignment() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let fabric = fabric_with(two_engine_slave());
    let master = root_master(&fabric, 1);
    register_master(&master).unwrap();
    let slave = master.slaves()[0].clone();

    let mut word = [0u8; 4];
    assert_eq!(slave.raw_read(0, &mut word), Ok(4));
    assert_eq!(u32::from_be_bytes(word), seal(CHIP_ID));
    assert_eq!(slave.raw_write(0x2000, &0xfeed_f00du32.to_be_bytes()), Ok(4));
    assert_eq!(fabric.slave(0).unwrap().reg(0x2000), 0xfeed_f00d);

    assert!(slave.raw_read(2, &mut word).is_err());
    assert!(slave.raw_read(0x1_0000_0000, &mut word).is_err());
    let mut short = [0u8; 2];
    assert!(slave.raw_read(0, &mut short).is_err());
}

#[test]
#[serial]
fn register_unregister_restores_pool() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let before = pool_snapshot();
    let fabric = fabric_with(two_engine_slave());
    let master = root_master(&fabric, 2);

    register_master(&master).unwrap();
    assert_eq!(
        register_master(&master),
        Err(FsiError::AlreadyPresent("master"))
    );
    assert_eq!(registered_masters().len(), 1);

    unregister_master(&master).unwrap();
    assert_eq!(pool_snapshot(), before);
    assert!(master.slaves().is_empty());
    assert_eq!(master.link_state(0), Some(LinkState::Idle));
    assert!(registered_masters().is_empty());
    assert_eq!(unregister_master(&master), Err(FsiError::NotFound("master")));
}

#[test]
#[serial]
fn never_registered_master_is_not_found() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let master = root_master(&SimFabric::new(), 1);
    assert_eq!(unregister_master(&master), Err(FsiError::NotFound("master")));
}
