mod common;
use common::*;

use sunnyboy_bridge::error::SwrError;
use sunnyboy_bridge::swr::channel::Catalogue;
use sunnyboy_bridge::swr::data::{decode, Value};

#[test]
fn analog_sample_scales_by_gain_and_offset() {
    let catalogue =
        Catalogue::decode(&analog_record(7, "Pac", "W", 0.10000000149011612, 0.0)).unwrap();
    let channel = catalogue.get("Pac").unwrap();

    let payload = sample_payload(1, 0x41, 7, 1, 1000, 1, &235u16.to_le_bytes());
    let sample = decode(&payload, channel).unwrap();

    assert_eq!(sample.channel, "Pac");
    assert_eq!(sample.since, 1000);
    match sample.value {
        Value::Analog { raw, scaled } => {
            assert_eq!(raw, 235);
            assert!((scaled - 23.5).abs() < 1e-6, "scaled = {}", scaled);
        }
        other => panic!("expected analog value, got {:?}", other),
    }
}

#[test]
fn analog_offset_is_added_after_the_gain() {
    let catalogue = Catalogue::decode(&analog_record(2, "Temperature", "C", 0.5, -10.0)).unwrap();
    let channel = catalogue.get("Temperature").unwrap();

    let payload = sample_payload(1, 0x41, 2, 1, 0, 1, &100u16.to_le_bytes());
    let sample = decode(&payload, channel).unwrap();

    assert_eq!(sample.value.scaled(), Some(40.0));
}

#[test]
fn counter_sample_scales_by_gain_alone() {
    let catalogue = Catalogue::decode(&counter_record(4, "E-Total", "kWh", 0.25)).unwrap();
    let channel = catalogue.get("E-Total").unwrap();

    let payload = sample_payload(4, 0x41, 4, 1, 0, 1, &1_000_000u32.to_le_bytes());
    let sample = decode(&payload, channel).unwrap();

    match sample.value {
        Value::Counter { raw, scaled } => {
            assert_eq!(raw, 1_000_000);
            assert_eq!(scaled, 250_000.0);
        }
        other => panic!("expected counter value, got {:?}", other),
    }
}

#[test]
fn digital_sample_carries_both_texts() {
    let catalogue = Catalogue::decode(&digital_record(3, "Betrieb", "Stop", "Mpp")).unwrap();
    let channel = catalogue.get("Betrieb").unwrap();

    let mut body = Vec::new();
    body.extend(fixed_text::<16>("Stop"));
    body.extend(fixed_text::<16>("Mpp"));
    let payload = sample_payload(2, 0x41, 3, 1, 0, 1, &body);
    let sample = decode(&payload, channel).unwrap();

    assert_eq!(
        sample.value,
        Value::Digital {
            text_low: "Stop".to_string(),
            text_high: "Mpp".to_string(),
        }
    );
    assert_eq!(sample.value.scaled(), None);
}

#[test]
fn status_sample_keeps_raw_bytes() {
    let catalogue = Catalogue::decode(&status_record(5, "Fehler", &[0, 0])).unwrap();
    let channel = catalogue.get("Fehler").unwrap();

    let payload = sample_payload(8, 0x41, 5, 1, 0, 1, &[0xDE, 0xAD, 0xBE, 0xEF]);
    let sample = decode(&payload, channel).unwrap();

    assert_eq!(sample.value, Value::Status([0xDE, 0xAD, 0xBE, 0xEF]));
}

#[test]
fn extra_bytes_after_the_first_value_are_ignored() {
    let catalogue = Catalogue::decode(&analog_record(7, "Vac", "V", 1.0, 0.0)).unwrap();
    let channel = catalogue.get("Vac").unwrap();

    let mut body = 231u16.to_le_bytes().to_vec();
    body.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);
    let payload = sample_payload(1, 0x41, 7, 2, 0, 1, &body);
    let sample = decode(&payload, channel).unwrap();

    assert_eq!(sample.value.scaled(), Some(231.0));
    assert_eq!(sample.data_sets, 2);
}

#[test]
fn truncated_payload_is_rejected() {
    let catalogue = Catalogue::decode(&analog_record(7, "Vac", "V", 1.0, 0.0)).unwrap();
    let channel = catalogue.get("Vac").unwrap();

    let payload = sample_payload(1, 0x41, 7, 1, 0, 1, &[0xEB]);
    assert!(matches!(
        decode(&payload, channel),
        Err(SwrError::SampleMalformed(_))
    ));

    assert!(matches!(
        decode(&[1, 0x41], channel),
        Err(SwrError::SampleMalformed(_))
    ));
}

#[test]
fn mismatched_channel_header_is_rejected() {
    let catalogue = Catalogue::decode(&analog_record(7, "Vac", "V", 1.0, 0.0)).unwrap();
    let channel = catalogue.get("Vac").unwrap();

    // counter type in the header, analog descriptor referenced
    let payload = sample_payload(4, 0x41, 7, 1, 0, 1, &231u16.to_le_bytes());
    assert!(matches!(
        decode(&payload, channel),
        Err(SwrError::SampleMalformed(_))
    ));

    // wrong channel index
    let payload = sample_payload(1, 0x41, 9, 1, 0, 1, &231u16.to_le_bytes());
    assert!(matches!(
        decode(&payload, channel),
        Err(SwrError::SampleMalformed(_))
    ));
}
