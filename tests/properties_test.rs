//! Property tests for attribute discovery, sample decoding and attribute I/O.

use std::sync::Arc;

use proptest::prelude::*;
use rust_zio::mock::{MockDevice, MockStore};
use rust_zio::node::scan_attribute_paths;
use rust_zio::{decode_samples, Device, ZioError};
use zio_sys::ControlHeader;

fn slots(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop_oneof![Just(String::new()), "[a-z]{1,8}"], 0..=max)
}

fn leading_non_empty(slots: &[String]) -> usize {
    slots.iter().take_while(|s| !s.is_empty()).count()
}

fn header(nsamples: u32, ssize: u16) -> ControlHeader {
    ControlHeader {
        nsamples,
        ssize,
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn attribute_count_is_leading_std_plus_leading_ext(std in slots(16), ext in slots(32)) {
        let paths = scan_attribute_paths(&std, &ext);
        let n_std = leading_non_empty(&std);
        let n_ext = leading_non_empty(&ext);
        prop_assert_eq!(paths.len(), n_std + n_ext);

        let expected: Vec<&str> = std[..n_std]
            .iter()
            .chain(&ext[..n_ext])
            .map(String::as_str)
            .collect();
        prop_assert_eq!(paths, expected);
    }

    #[test]
    fn supported_sizes_decode_every_sample(
        ssize in prop_oneof![Just(1u16), Just(2u16), Just(4u16), Just(8u16)],
        (nsamples, seed) in (0u32..64, any::<u64>()),
        flags in any::<u32>(),
    ) {
        let len = nsamples as usize * ssize as usize;
        let payload: Vec<u8> = (0..len)
            .map(|i| (seed.rotate_left(i as u32 % 64) as u8) ^ i as u8)
            .collect();
        let ctrl = ControlHeader {
            flags,
            ..header(nsamples, ssize)
        };

        let samples = decode_samples(&ctrl, &payload).unwrap();
        prop_assert_eq!(samples.len(), nsamples as usize);
        prop_assert_eq!(samples.width(), ssize as usize);
        prop_assert_eq!(samples.to_bytes(), payload);
    }

    #[test]
    fn other_sizes_are_rejected(
        ssize in any::<u16>().prop_filter("supported size", |s| !matches!(s, 1 | 2 | 4 | 8)),
        nsamples in 0u32..16,
        extra in 0usize..16,
    ) {
        let payload = vec![0u8; nsamples as usize * ssize as usize % 4096 + extra];
        let err = decode_samples(&header(nsamples, ssize), &payload).unwrap_err();
        prop_assert!(matches!(err, ZioError::UnsupportedSampleSize(s) if s == ssize));
    }

    #[test]
    fn short_payloads_are_truncated(
        ssize in prop_oneof![Just(1u16), Just(2u16), Just(4u16), Just(8u16)],
        nsamples in 1u32..64,
        short_by in 1usize..8,
    ) {
        let expected = nsamples as usize * ssize as usize;
        let actual = expected.saturating_sub(short_by);
        let err = decode_samples(&header(nsamples, ssize), &vec![0u8; actual]).unwrap_err();
        let is_truncated = matches!(
            err,
            ZioError::Truncated { expected: e, actual: a } if e == expected && a == actual
        );
        prop_assert!(is_truncated);
    }

    #[test]
    fn written_values_read_back(value in any::<u32>()) {
        let store = Arc::new(MockStore::new());
        store.add_device(MockDevice::new("zzero").with_attr("offset", 0));
        let dev = Device::open(store, "zzero", None).unwrap();
        let offset = dev.node().attribute("offset").unwrap();
        offset.write(value).unwrap();
        prop_assert_eq!(offset.read().unwrap(), value);
    }
}
