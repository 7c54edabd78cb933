//! Acquisition loop over the in-memory backend.

use std::ops::ControlFlow;
use std::sync::Arc;

use rust_zio::mock::{MockCset, MockDevice, MockStore};
use rust_zio::{Acquisition, AcquisitionConfig, Device, ZioError};
use zio_sys::{Alarms, ControlHeader, Direction};

const CHAN0: &str = "adc-0000-0-0";
const CHAN1: &str = "adc-0000-0-1";

fn setup() -> (Arc<MockStore>, Device) {
    let store = Arc::new(MockStore::new());
    store.add_device(MockDevice::new("adc").with_cset(MockCset::new(Direction::Input, 2)));
    let dev = Device::open(store.clone(), "adc", None).unwrap();
    (store, dev)
}

fn push(store: &MockStore, chan: &str, seq: u32, samples: &[u8]) {
    let ctrl = ControlHeader {
        seq_num: seq,
        nsamples: samples.len() as u32,
        ssize: 1,
        ..Default::default()
    };
    store.push_block(chan, &ctrl, samples);
}

#[test]
fn test_max_sweeps_bounds_the_run() {
    let (store, dev) = setup();
    for seq in 0..5 {
        push(&store, CHAN0, seq, &[1, 2]);
        push(&store, CHAN1, seq, &[3]);
    }

    let acq = Acquisition::new(dev.cset(0).unwrap(), AcquisitionConfig::default().with_max_sweeps(3));
    let mut seen = Vec::new();
    let stats = acq
        .run(|chan, block| {
            seen.push((chan, block.ctrl.seq_num));
            ControlFlow::Continue(())
        })
        .unwrap();

    assert_eq!(stats.sweeps, 3);
    assert_eq!(stats.blocks, 6);
    assert_eq!(stats.samples, 9);
    assert_eq!(stats.sequence_gaps, 0);
    assert_eq!(stats.sequence_resets, 0);
    assert_eq!(&seen[..4], &[(0, 0), (1, 0), (0, 1), (1, 1)]);
}

#[test]
fn test_sink_break_stops_after_sweep() {
    let (store, dev) = setup();
    for seq in 0..3 {
        push(&store, CHAN0, seq, &[0]);
        push(&store, CHAN1, seq, &[0]);
    }

    let acq = Acquisition::new(dev.cset(0).unwrap(), AcquisitionConfig::default());
    let stats = acq
        .run(|chan, _| {
            if chan == 0 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
    // Both channels of the sweep are delivered before the loop ends.
    assert_eq!(stats.sweeps, 1);
    assert_eq!(stats.blocks, 2);
}

#[test]
fn test_stop_handle_checked_between_sweeps() {
    let (store, dev) = setup();
    for seq in 0..4 {
        push(&store, CHAN0, seq, &[0]);
        push(&store, CHAN1, seq, &[0]);
    }

    let acq = Acquisition::new(dev.cset(0).unwrap(), AcquisitionConfig::default());
    let stop = acq.stop_handle();
    let stats = acq
        .run(|chan, block| {
            if chan == 1 && block.ctrl.seq_num == 1 {
                stop.stop();
            }
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(stats.sweeps, 2);
    assert!(acq.stop_handle().is_stopped());
}

#[test]
fn test_gaps_and_alarms_are_counted() {
    let (store, dev) = setup();
    push(&store, CHAN0, 10, &[0]);
    push(&store, CHAN1, 10, &[0]);
    push(&store, CHAN0, 13, &[0]);
    let alarmed = ControlHeader {
        seq_num: 11,
        nsamples: 1,
        ssize: 1,
        zio_alarms: Alarms::LOST_BLOCK.bits(),
        ..Default::default()
    };
    store.push_block(CHAN1, &alarmed, &[0]);

    let acq = Acquisition::new(dev.cset(0).unwrap(), AcquisitionConfig::default().with_max_sweeps(2));
    let stats = acq.run(|_, _| ControlFlow::Continue(())).unwrap();
    assert_eq!(stats.sequence_gaps, 2);
    assert_eq!(stats.alarmed_blocks, 1);
}

#[test]
fn test_counter_reset_is_not_a_gap() {
    let (store, dev) = setup();
    for seq in [41, 42, 0, 1] {
        push(&store, CHAN0, seq, &[0]);
        push(&store, CHAN1, seq, &[0]);
    }
    // A repeated number is a reset as well.
    push(&store, CHAN0, 1, &[0]);
    push(&store, CHAN1, 2, &[0]);

    let acq = Acquisition::new(dev.cset(0).unwrap(), AcquisitionConfig::default().with_max_sweeps(5));
    let stats = acq.run(|_, _| ControlFlow::Continue(())).unwrap();
    assert_eq!(stats.sweeps, 5);
    assert_eq!(stats.sequence_resets, 3);
    assert_eq!(stats.sequence_gaps, 0);
}

#[test]
fn test_read_failure_ends_run() {
    let (store, dev) = setup();
    push(&store, CHAN0, 0, &[0]);
    push(&store, CHAN1, 0, &[0]);
    push(&store, CHAN0, 1, &[0]);

    let acq = Acquisition::new(dev.cset(0).unwrap(), AcquisitionConfig::default());
    let mut delivered = 0;
    let err = acq
        .run(|_, _| {
            delivered += 1;
            ControlFlow::Continue(())
        })
        .unwrap_err();
    assert!(matches!(err, ZioError::ReadFailure { .. }));
    assert_eq!(delivered, 2);
}
