mod common;
use common::*;

use sunnyboy_bridge::config::Config;
use sunnyboy_bridge::coordinator::Coordinator;
use sunnyboy_bridge::database::ChannelData;
use sunnyboy_bridge::prelude::Channels;
use sunnyboy_bridge::transport::{Endpoint, Transport};
use tokio::net::TcpListener;

const POLL_TIME: i64 = 1_700_000_100;

fn test_config(addr: &str) -> Config {
    let mut config = Config::default();
    config.device = addr.to_string();
    config.timeout_long_ms = 400;
    config.timeout_short_ms = 50;
    config.online_settle_secs = 0;
    config
}

async fn start_coordinator(devices: Vec<FakeDevice>) -> (Coordinator, Channels) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(serve_bus(listener, devices));

    let config = test_config(&addr);
    let channels = Channels::new();
    let transport = Transport::new(Endpoint::Tcp(addr), None);
    (
        Coordinator::new(config, channels.clone(), transport),
        channels,
    )
}

fn drain(
    rx: &mut tokio::sync::broadcast::Receiver<ChannelData>,
) -> (Vec<sunnyboy_bridge::database::StatsRow>, Vec<String>) {
    let mut stats = Vec::new();
    let mut comments = Vec::new();
    while let Ok(data) = rx.try_recv() {
        match data {
            ChannelData::Stats(row) => stats.push(row),
            ChannelData::Comment(row) => comments.push(row.comment),
            ChannelData::Shutdown => {}
        }
    }
    (stats, comments)
}

#[tokio::test]
async fn discovers_enumerates_and_polls_one_device() {
    let device = FakeDevice::healthy(2, 123_001_122, POLL_TIME as u32);
    let expected: Vec<(String, f64)> = device
        .channels
        .iter()
        .map(|c| (c.name.clone(), c.expected_scaled()))
        .collect();

    let (mut coordinator, channels) = start_coordinator(vec![device]).await;
    let mut rx = channels.to_database.subscribe();

    coordinator.start_network().await.unwrap();
    assert_eq!(coordinator.devices().len(), 1);
    assert_eq!(coordinator.devices()[0].addr, 2);
    assert_eq!(coordinator.devices()[0].serial, 123_001_122);
    assert_eq!(coordinator.devices()[0].catalogue.len(), 8);

    coordinator.poll_cycle(POLL_TIME).await.unwrap();

    let (stats, comments) = drain(&mut rx);
    assert_eq!(stats.len(), 1);
    let row = &stats[0];
    assert_eq!(row.addr, 2);
    for (name, value) in &expected {
        let got = row.value(name).unwrap_or_else(|| panic!("{} missing", name));
        assert!((got - value).abs() < 1e-9, "{}: {} != {}", name, got, value);
    }

    // the device synced at the poll time, so no mismatch warnings
    assert!(
        !comments.iter().any(|c| c.contains("synced at")),
        "unexpected sync warnings: {:?}",
        comments
    );
}

#[tokio::test]
async fn dead_grid_frequency_suppresses_only_that_row() {
    let good = FakeDevice::healthy(2, 111, POLL_TIME as u32);
    let mut dead = FakeDevice::healthy(3, 222, POLL_TIME as u32);
    dead.channels
        .iter_mut()
        .find(|c| c.name == "Fac")
        .unwrap()
        .raw = 0;

    let (mut coordinator, channels) = start_coordinator(vec![good, dead]).await;
    let mut rx = channels.to_database.subscribe();

    coordinator.start_network().await.unwrap();
    assert_eq!(coordinator.devices().len(), 2);

    coordinator.poll_cycle(POLL_TIME).await.unwrap();

    let (stats, comments) = drain(&mut rx);
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].addr, 2);
    assert!(
        comments.iter().any(|c| c.contains("row discarded")),
        "expected a discard comment: {:?}",
        comments
    );
}

#[tokio::test]
async fn stale_sync_time_warns_but_keeps_the_sample() {
    let device = FakeDevice::healthy(2, 333, (POLL_TIME - 60) as u32);

    let (mut coordinator, channels) = start_coordinator(vec![device]).await;
    let mut rx = channels.to_database.subscribe();

    coordinator.start_network().await.unwrap();
    coordinator.poll_cycle(POLL_TIME).await.unwrap();

    let (stats, comments) = drain(&mut rx);
    assert_eq!(stats.len(), 1);
    assert!(
        comments.iter().any(|c| c.contains("synced at")),
        "expected sync warnings: {:?}",
        comments
    );
}
