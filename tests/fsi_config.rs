// CLASSIFICATION: COMMUNITY
// Filename: fsi_config.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

mod common;

use cohesix_fsi::config::{
    get_config, ipoll_period_ms, ipoll_period_show, ipoll_period_store, set_config,
    FsiConfig, HublinkPolicy,
};
use cohesix_fsi::{register_master, FsiError, TestRegistryGuard};
use common::*;
use serial_test::serial;

#[test]
#[serial]
fn period_attribute_round_trip() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    set_config(FsiConfig::default()).unwrap();
    assert_eq!(ipoll_period_show(), "100\n");

    assert_eq!(ipoll_period_store("250\n"), Ok(4));
    assert_eq!(ipoll_period_show(), "250\n");
    assert_eq!(ipoll_period_store("0x20"), Ok(4));
    assert_eq!(ipoll_period_ms(), 32);
    assert_eq!(ipoll_period_store("010"), Ok(3));
    assert_eq!(ipoll_period_ms(), 8);
}

#[test]
#[serial]
fn out_of_range_period_keeps_current_value() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    set_config(FsiConfig::default()).unwrap();

    for bad in ["1", "0", "10000", "99999999999"] {
        assert!(matches!(
            ipoll_period_store(bad),
            Err(FsiError::InvalidArgument(_))
        ));
    }
    assert!(ipoll_period_store("soon").is_err());
    assert_eq!(ipoll_period_ms(), 100);

    assert_eq!(ipoll_period_store("2"), Ok(1));
    assert_eq!(ipoll_period_store("9999"), Ok(4));
    assert_eq!(ipoll_period_ms(), 9999);
}

#[test]
#[serial]
fn set_config_validates_period() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let cfg = FsiConfig {
        ipoll_period_ms: 10_000,
        ..FsiConfig::default()
    };
    assert!(set_config(cfg).is_err());

    let cfg = FsiConfig {
        ipoll_period_ms: 20,
        slave_id_mask: 0b0001,
        hublink_policy: HublinkPolicy::RoundRobin,
    };
    set_config(cfg.clone()).unwrap();
    assert_eq!(get_config(), cfg);
}

#[test]
#[serial]
fn slave_mask_gates_enumeration() {
    init_logging();
    let _guard = TestRegistryGuard::new();
    let cfg = FsiConfig {
        slave_id_mask: 0b0010,
        ..FsiConfig::default()
    };
    set_config(cfg).unwrap();
    let fabric = fabric_with(two_engine_slave());
    let master = root_master(&fabric, 1);

    register_master(&master).unwrap();

    let slaves = master.slaves();
    assert_eq!(slaves.len(), 1);
    assert_eq!(slaves[0].id(), 1);
    assert_eq!(slaves[0].name(), "slave@00:01");
    assert_eq!(fabric.writes_to(0x800), vec![0xa1ff_0100]);
}
