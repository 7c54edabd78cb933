//! Device tree behaviour over the in-memory backend.
//!
//! | Test | Description |
//! |------|-------------|
//! | `test_wr_nic_scenario` | Open by name, walk the tree, decode a 16-bit block |
//! | `test_open_by_id` | Id selects the `name-0x<id>` instance |
//! | `test_open_failures` | Unknown, empty and failing opens report `OpenFailure` |
//! | `test_attribute_surface` | Attribute order and round trip on every node kind |
//! | `test_closed_device_rejects_handles` | Handles outliving `close` fail fast |
//! | `test_block_read_all_fail_fast` | First failing channel aborts the sweep |
//! | `test_corrupt_blocks_surface` | Short payloads and impossible sample sizes are typed errors |
//! | `test_flush_all_best_effort` | Every buffer is flushed, last failure reported |
//! | `test_output_cset` | `block_write` on output, direction errors on both sides |

use std::sync::Arc;

use rust_zio::mock::{MockCset, MockDevice, MockStore};
use rust_zio::{Block, ChannelAlarms, Device, Samples, ZioError};
use zio_sys::{Alarms, ControlHeader, Direction, ObjectType};

// =============================================================================
// Helpers
// =============================================================================

fn wr_nic_store() -> Arc<MockStore> {
    let store = Arc::new(MockStore::new());
    store.add_device(
        MockDevice::new("wr-nic")
            .with_attr("gain", 1)
            .with_attr("offset", 0)
            .with_ext_attr("tstamp-mode", 2)
            .with_cset(
                MockCset::new(Direction::Input, 2)
                    .with_attr("nbits", 16)
                    .with_trigger_attr("nsamples", 4)
                    .with_chan_attr("resolution", 16),
            )
            .with_cset(MockCset::new(Direction::Input, 1)),
    );
    store
}

fn header(seq: u32, nsamples: u32, ssize: u16) -> ControlHeader {
    ControlHeader {
        major_version: 1,
        seq_num: seq,
        nsamples,
        ssize,
        nbits: ssize.saturating_mul(8),
        ..Default::default()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_wr_nic_scenario() {
    let store = wr_nic_store();
    let dev = Device::open(store.clone(), "wr-nic", None).unwrap();

    assert_eq!(dev.id(), None);
    assert_eq!(dev.n_cset(), 2);
    assert_eq!(dev.cset(0).unwrap().n_chan(), 2);
    assert_eq!(dev.cset(1).unwrap().n_chan(), 1);
    assert_eq!(dev.node().obj_type(), ObjectType::Device);

    store.push_block(
        "wr-nic-0000-0-1",
        &header(7, 4, 2),
        &[0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00],
    );
    let chan = dev.cset(0).unwrap().channel(1).unwrap();
    let block = chan.block_read().unwrap();
    assert_eq!(block.ctrl.seq_num, 7);
    assert_eq!(block.samples, Samples::U16(vec![1, 2, 3, 4]));
}

#[test]
fn test_open_by_id() {
    let store = Arc::new(MockStore::new());
    store.add_device(MockDevice::new("zzero").with_id(0x2a).with_cset(MockCset::new(Direction::Input, 1)));

    let dev = Device::open(store.clone(), "zzero", Some(0x2a)).unwrap();
    assert_eq!(dev.id(), Some(0x2a));
    assert_eq!(dev.node().devname(), "zzero-002a");

    let err = Device::open(store, "zzero", None).unwrap_err();
    assert!(matches!(err, ZioError::OpenFailure { id: None, .. }));
}

#[test]
fn test_open_failures() {
    let store = wr_nic_store();

    match Device::open(store.clone(), "nope", Some(3)) {
        Err(ZioError::OpenFailure { name, id, strerror }) => {
            assert_eq!(name, "nope");
            assert_eq!(id, Some(3));
            assert_eq!(strerror, "No ZIO device available");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(matches!(
        Device::open(store.clone(), "", None),
        Err(ZioError::OpenFailure { .. })
    ));

    store.fail_open(Some(libc::EACCES));
    let err = Device::open(store.clone(), "wr-nic", None).unwrap_err();
    assert!(err.is_backend_error());
    // Nothing was built, so nothing is released.
    assert!(store.closed().is_empty());
}

#[test]
fn test_attribute_surface() {
    let store = wr_nic_store();
    let dev = Device::open(store.clone(), "wr-nic", None).unwrap();

    let names: Vec<_> = dev.node().attributes().iter().map(|a| a.name()).collect();
    assert_eq!(names, vec!["gain", "offset", "tstamp-mode"]);

    let cset = dev.cset(0).unwrap();
    assert_eq!(cset.node().attributes().len(), 1);
    assert_eq!(cset.trigger().node().attributes()[0].read().unwrap(), 4);

    let chan = cset.channel(0).unwrap();
    let resolution = chan.node().attribute("resolution").unwrap();
    assert_eq!(resolution.to_string(), "resolution = 16");
    resolution.write(12).unwrap();
    assert_eq!(resolution.read().unwrap(), 12);

    assert!(chan.buffer().node().attributes().is_empty());
    assert_eq!(chan.to_string(), "chan0");
    assert_eq!(format!("{chan:#}"), "wr-nic-0000-0-0");

    chan.node().disable().unwrap();
    assert!(!chan.node().is_enabled().unwrap());
    chan.node().enable().unwrap();
    assert!(chan.node().is_enabled().unwrap());
}

#[test]
fn test_closed_device_rejects_handles() {
    let store = wr_nic_store();
    let dev = Device::open(store.clone(), "wr-nic", None).unwrap();
    let gain = dev.node().attribute("gain").unwrap().clone();
    assert_eq!(gain.read().unwrap(), 1);

    dev.close();
    assert_eq!(store.closed(), vec!["/sys/bus/zio/devices/wr-nic"]);

    let reads_before = store.read_count(gain.path());
    let err = gain.read().unwrap_err();
    assert!(err.is_closed());
    assert!(gain.write(3).unwrap_err().is_closed());
    assert_eq!(store.read_count(gain.path()), reads_before);
}

#[test]
fn test_block_read_all_fail_fast() {
    let store = wr_nic_store();
    let dev = Device::open(store.clone(), "wr-nic", None).unwrap();
    let cset = dev.cset(0).unwrap();

    store.push_block("wr-nic-0000-0-0", &header(1, 2, 1), &[5, 6]);
    store.push_block("wr-nic-0000-0-1", &header(1, 1, 4), &[9, 0, 0, 0]);
    let blocks = cset.block_read_all().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].samples, Samples::U8(vec![5, 6]));
    assert_eq!(blocks[1].samples, Samples::U32(vec![9]));

    // Second channel has nothing queued: its control read comes up short.
    store.push_block("wr-nic-0000-0-0", &header(2, 2, 1), &[7, 8]);
    match cset.block_read_all() {
        Err(ZioError::ReadFailure { context, strerror }) => {
            assert!(context.contains("wr-nic-0000-0-1"));
            assert_eq!(strerror, "Control block is not correct");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_corrupt_blocks_surface() {
    let store = wr_nic_store();
    let dev = Device::open(store.clone(), "wr-nic", None).unwrap();
    let chan = dev.cset(1).unwrap().channel(0).unwrap();

    store.push_block("wr-nic-0000-1-0", &header(2, 4, 2), &[0; 5]);
    assert!(matches!(
        chan.block_read(),
        Err(ZioError::Truncated {
            expected: 8,
            actual: 5
        })
    ));

    // An impossible sample size is refused before the payload is touched.
    store.push_block("wr-nic-0000-1-0", &header(3, u32::MAX, 0xffff), &[]);
    match chan.block_read() {
        Err(ZioError::ReadFailure { strerror, .. }) => {
            assert_eq!(strerror, "Control block is not correct");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_flush_all_best_effort() {
    let store = wr_nic_store();
    let dev = Device::open(store.clone(), "wr-nic", None).unwrap();
    let cset = dev.cset(0).unwrap();

    cset.flush_all().unwrap();
    let flush0 = "/sys/bus/zio/devices/wr-nic/cset0/chan0/buffer/flush";
    let flush1 = "/sys/bus/zio/devices/wr-nic/cset0/chan1/buffer/flush";
    assert_eq!(store.file(flush1).as_deref(), Some("1"));

    store.set_file(flush1, "");
    store.fail_path(flush0, libc::EBUSY);
    let err = cset.flush_all().unwrap_err();
    assert!(matches!(err, ZioError::IoFailure { ref path, .. } if path == flush0));
    // The failing first channel did not stop the second one.
    assert_eq!(store.file(flush1).as_deref(), Some("1"));
}

#[test]
fn test_trigger_and_buffer_selection() {
    let store = wr_nic_store();
    let dev = Device::open(store.clone(), "wr-nic", None).unwrap();
    let cset = dev.cset(0).unwrap();

    assert_eq!(cset.current_trigger().unwrap(), "user");
    assert_eq!(cset.current_buffer().unwrap(), "kmalloc");
    cset.change_trigger("timer").unwrap();
    cset.change_buffer("vmalloc").unwrap();
    assert_eq!(cset.current_trigger().unwrap(), "timer");
    assert_eq!(cset.current_buffer().unwrap(), "vmalloc");
}

#[test]
fn test_current_control_and_alarms() {
    let store = wr_nic_store();
    let dev = Device::open(store.clone(), "wr-nic", None).unwrap();
    let chan = dev.cset(0).unwrap().channel(1).unwrap();

    let ctrl = chan.current_control().unwrap();
    assert_eq!(ctrl.addr.devname(), "wr-nic");
    assert_eq!(ctrl.addr.chan, 1);

    assert_eq!(chan.alarms().unwrap(), ChannelAlarms::default());
    store.set_file(
        "/sys/bus/zio/devices/wr-nic/cset0/chan1/alarms",
        "3 16\n",
    );
    let alarms = chan.alarms().unwrap();
    assert!(alarms.zio.contains(Alarms::LOST_BLOCK | Alarms::LOST_TRIGGER));
    assert_eq!(alarms.driver, 16);

    chan.clear_alarms(alarms).unwrap();
    assert_eq!(
        store.file("/sys/bus/zio/devices/wr-nic/cset0/chan1/alarms").as_deref(),
        Some("3 16")
    );
}

#[test]
fn test_output_cset() {
    let store = Arc::new(MockStore::new());
    store.add_device(
        MockDevice::new("zzero")
            .with_cset(MockCset::new(Direction::Input, 1))
            .with_cset(MockCset::new(Direction::Output, 1)),
    );
    let dev = Device::open(store.clone(), "zzero", None).unwrap();
    let out = dev.cset(1).unwrap().channel(0).unwrap();
    assert_eq!(out.direction(), Direction::Output);

    let block = Block::new(header(9, 0, 0), Samples::U16(vec![0x0102, 0x0304]));
    out.block_write(&block).unwrap();
    let (ctrl, data) = store.take_written("zzero-0000-1-0");
    assert_eq!(ctrl, block.ctrl.encode());
    assert_eq!(data, vec![0x02, 0x01, 0x04, 0x03]);

    assert!(matches!(out.block_read(), Err(ZioError::ReadFailure { .. })));

    let input = dev.cset(0).unwrap().channel(0).unwrap();
    match input.block_write(&block) {
        Err(ZioError::WriteFailure { strerror, .. }) => {
            assert_eq!(strerror, "Wrong I/O direction while using char-device");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
