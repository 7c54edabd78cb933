//! End-to-end tests of the sysfs backend over a fixture tree.
//!
//! The fixture mimics `/sys/bus/zio` and `/dev/zio` inside a temporary
//! directory; the char devices are plain files holding one block each.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::sync::Arc;

use rust_zio::{device_list, trigger_list, Device, DeviceSession, Samples};
use tempfile::TempDir;
use zio_sys::{ControlFlags, ControlHeader, Direction, SysfsStore};

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn object(base: &Path, name: &str, devname: &str, devtype: &str) {
    write(&base.join("name"), format!("{name}\n").as_bytes());
    write(&base.join("devname"), format!("{devname}\n").as_bytes());
    write(&base.join("devtype"), format!("{devtype}\n").as_bytes());
    write(&base.join("enable"), b"1\n");
}

/// `wr-nic` behind a symlink, one input cset with one channel holding a
/// 32-bit block whose header carries the big-endian flag.
fn fixture() -> (TempDir, SysfsStore) {
    let tmp = TempDir::new().unwrap();
    let sys = tmp.path().join("sys");
    let dev = tmp.path().join("dev");

    let real = tmp.path().join("platform/wr-nic");
    object(&real, "wr-nic", "wr-nic-0000", "zio_zdev_type");
    write(&real.join("standard/version"), b"3\n");
    write(&real.join("standard/gain"), b"10\n");

    let cset = real.join("cset0");
    object(&cset, "cset0", "wr-nic-0000-0", "zio_cset_type");
    write(&cset.join("direction"), b"input\n");
    write(&cset.join("current_trigger"), b"user\n");
    write(&cset.join("current_buffer"), b"kmalloc\n");
    write(&cset.join("trigger/standard/post-samples"), b"2\n");

    let chan = cset.join("chan0");
    object(&chan, "chan0", "wr-nic-0000-0-0", "zio_chan_type");
    write(&chan.join("buffer/flush"), b"");
    write(&chan.join("alarms"), b"0 0\n");

    let mut ctrl = ControlHeader {
        seq_num: 42,
        nsamples: 2,
        ssize: 4,
        nbits: 32,
        flags: ControlFlags::BIG_ENDIAN.bits(),
        ..Default::default()
    };
    ctrl.addr.set_devname("wr-nic");
    write(&chan.join("current_control"), &ctrl.encode());
    write(&dev.join("wr-nic-0000-0-0-ctrl"), &ctrl.encode());
    write(&dev.join("wr-nic-0000-0-0-data"), &[1, 0, 0, 0, 2, 0, 0, 0]);

    fs::create_dir_all(sys.join("devices")).unwrap();
    symlink(&real, sys.join("devices/wr-nic")).unwrap();
    fs::create_dir_all(sys.join("devices/hw-wr-nic")).unwrap();
    write(&sys.join("available_triggers"), b"user\ntimer\n");

    let store = SysfsStore::new(&sys, &dev);
    (tmp, store)
}

#[test]
fn test_open_read_and_close() {
    let (_tmp, store) = fixture();
    let session = DeviceSession::open(Arc::new(store), "wr-nic", None).unwrap();
    let dev = session.device();

    assert_eq!(dev.node().name(), "wr-nic");
    assert_eq!(dev.n_cset(), 1);
    let cset = dev.cset(0).unwrap();
    assert_eq!(cset.direction(), Direction::Input);
    assert_eq!(cset.n_chan(), 1);
    assert_eq!(cset.trigger().node().attributes()[0].read().unwrap(), 2);

    let block = cset.channel(0).unwrap().block_read().unwrap();
    assert_eq!(block.ctrl.seq_num, 42);
    assert_eq!(block.samples, Samples::U32(vec![1, 2]));

    session.close();
}

#[test]
fn test_attributes_follow_sorted_directory_order() {
    let (_tmp, store) = fixture();
    let dev = Device::open(Arc::new(store), "wr-nic", None).unwrap();
    let names: Vec<_> = dev.node().attributes().iter().map(|a| a.name().to_string()).collect();
    assert_eq!(names, vec!["gain", "version"]);

    let gain = dev.node().attribute("gain").unwrap();
    gain.write(20).unwrap();
    assert_eq!(gain.read().unwrap(), 20);
    assert!(gain.permissions().unwrap().is_writable());
}

#[test]
fn test_current_control_from_sysfs() {
    let (_tmp, store) = fixture();
    let dev = Device::open(Arc::new(store), "wr-nic", None).unwrap();
    let ctrl = dev.cset(0).unwrap().channel(0).unwrap().current_control().unwrap();
    assert_eq!(ctrl.seq_num, 42);
    assert_eq!(ctrl.addr.devname(), "wr-nic");
}

#[test]
fn test_enable_and_flush_write_through() {
    let (tmp, store) = fixture();
    let dev = Device::open(Arc::new(store), "wr-nic", None).unwrap();
    let cset = dev.cset(0).unwrap();

    cset.node().disable().unwrap();
    assert!(!cset.node().is_enabled().unwrap());
    cset.flush_all().unwrap();

    let flush = tmp.path().join("platform/wr-nic/cset0/chan0/buffer/flush");
    assert_eq!(fs::read_to_string(flush).unwrap(), "1");
}

#[test]
fn test_listings() {
    let (_tmp, store) = fixture();
    assert_eq!(device_list(&store).unwrap(), vec!["wr-nic"]);
    assert_eq!(trigger_list(&store).unwrap(), vec!["user", "timer"]);
}
