#![allow(dead_code)]

use sunnyboy_bridge::swr::frame::{Control, Frame};
use sunnyboy_bridge::swr::packet::Command;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Pads text into an N-byte NUL-padded field, the way descriptor names
/// and units arrive on the wire.
pub fn fixed_text<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    out[..s.len()].copy_from_slice(s.as_bytes());
    out
}

fn record_header(index: u8, type1: u8, type2: u8, name: &str) -> Vec<u8> {
    let mut r = vec![index, type1, type2];
    r.extend(0u16.to_le_bytes());
    r.extend(1u16.to_le_bytes());
    r.extend(fixed_text::<16>(name));
    r
}

pub fn analog_record(index: u8, name: &str, unit: &str, gain: f32, offset: f32) -> Vec<u8> {
    let mut r = record_header(index, 1, 0x41, name);
    r.extend(fixed_text::<8>(unit));
    r.extend(gain.to_le_bytes());
    r.extend(offset.to_le_bytes());
    r
}

pub fn digital_record(index: u8, name: &str, text_low: &str, text_high: &str) -> Vec<u8> {
    let mut r = record_header(index, 2, 0x41, name);
    r.extend(fixed_text::<16>(text_low));
    r.extend(fixed_text::<16>(text_high));
    r
}

pub fn counter_record(index: u8, name: &str, unit: &str, gain: f32) -> Vec<u8> {
    let mut r = record_header(index, 4, 0x41, name);
    r.extend(fixed_text::<8>(unit));
    r.extend(gain.to_le_bytes());
    r
}

pub fn status_record(index: u8, name: &str, bitmap: &[u8]) -> Vec<u8> {
    let mut r = record_header(index, 8, 0x41, name);
    r.extend((bitmap.len() as u16).to_le_bytes());
    r.extend_from_slice(bitmap);
    r
}

/// A `GetData` response payload: the fixed header followed by `body`.
pub fn sample_payload(
    type1: u8,
    type2: u8,
    index: u8,
    data_sets: u16,
    since: u32,
    time_basis: u32,
    body: &[u8],
) -> Vec<u8> {
    let mut r = vec![type1, type2, index];
    r.extend(data_sets.to_le_bytes());
    r.extend(since.to_le_bytes());
    r.extend(time_basis.to_le_bytes());
    r.extend_from_slice(body);
    r
}

/// One scripted channel on a [`FakeDevice`].
#[derive(Clone)]
pub struct FakeChannel {
    pub index: u8,
    /// 1 = analog, 4 = counter.
    pub kind: u8,
    pub name: String,
    pub unit: String,
    pub gain: f32,
    pub offset: f32,
    pub raw: u32,
}

impl FakeChannel {
    pub fn analog(index: u8, name: &str, unit: &str, gain: f32, raw: u16) -> Self {
        Self {
            index,
            kind: 1,
            name: name.to_string(),
            unit: unit.to_string(),
            gain,
            offset: 0.0,
            raw: raw as u32,
        }
    }

    pub fn counter(index: u8, name: &str, unit: &str, gain: f32, raw: u32) -> Self {
        Self {
            index,
            kind: 4,
            name: name.to_string(),
            unit: unit.to_string(),
            gain,
            offset: 0.0,
            raw,
        }
    }

    pub fn expected_scaled(&self) -> f64 {
        self.raw as f64 * self.gain as f64 + self.offset as f64
    }
}

/// One scripted inverter behind the fake bus.
#[derive(Clone)]
pub struct FakeDevice {
    pub addr: u16,
    pub serial: u32,
    pub device_type: [u8; 8],
    pub channels: Vec<FakeChannel>,
    /// Reported in every sample's `since` field.
    pub since: u32,
}

impl FakeDevice {
    pub fn new(addr: u16, serial: u32, since: u32, channels: Vec<FakeChannel>) -> Self {
        Self {
            addr,
            serial,
            device_type: fixed_text::<8>("SWR 700"),
            channels,
            since,
        }
    }

    /// The eight monitored channels with healthy values.
    pub fn healthy(addr: u16, serial: u32, since: u32) -> Self {
        Self::new(
            addr,
            serial,
            since,
            vec![
                FakeChannel::analog(1, "Pac", "W", 0.5, 3000),
                FakeChannel::analog(2, "Ipv", "A", 0.01, 500),
                FakeChannel::analog(3, "Vpv", "V", 0.1, 4000),
                FakeChannel::counter(4, "E-Total", "kWh", 0.1, 123_456),
                FakeChannel::counter(5, "h-Total", "h", 1.0, 7777),
                FakeChannel::analog(6, "Temperature", "C", 0.1, 412),
                FakeChannel::analog(7, "Vac", "V", 0.1, 2310),
                FakeChannel::analog(8, "Fac", "Hz", 0.01, 5002),
            ],
        )
    }

    fn net_start_payload(&self) -> Vec<u8> {
        let mut r = self.serial.to_le_bytes().to_vec();
        r.extend_from_slice(&self.device_type);
        r
    }

    fn cinfo_payload(&self) -> Vec<u8> {
        let mut r = Vec::new();
        for ch in &self.channels {
            match ch.kind {
                1 => r.extend(analog_record(ch.index, &ch.name, &ch.unit, ch.gain, ch.offset)),
                4 => r.extend(counter_record(ch.index, &ch.name, &ch.unit, ch.gain)),
                _ => unreachable!("fake devices only script analog and counter channels"),
            }
        }
        r
    }

    fn data_payload(&self, index: u8) -> Option<Vec<u8>> {
        let ch = self.channels.iter().find(|c| c.index == index)?;
        let body: Vec<u8> = match ch.kind {
            1 => (ch.raw as u16).to_le_bytes().to_vec(),
            4 => ch.raw.to_le_bytes().to_vec(),
            _ => return None,
        };
        Some(sample_payload(ch.kind, 0x41, ch.index, 1, self.since, 1, &body))
    }
}

/// A scripted SWR-NET bus behind a TCP listener: answers discovery for
/// every device, serves channel catalogues (split across two fragments)
/// and sample values, and ignores the online broadcast.
pub async fn serve_bus(listener: TcpListener, devices: Vec<FakeDevice>) {
    let (mut socket, _) = listener.accept().await.expect("accept");
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 512];

    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        while let Ok(Some((frame, used))) = Frame::decode(&buf) {
            buf.drain(..used);
            handle(&mut socket, &devices, frame).await;
        }
    }
}

async fn handle(socket: &mut TcpStream, devices: &[FakeDevice], frame: Frame) {
    match frame.command {
        Command::GetNetStart => {
            for device in devices {
                let reply = Frame::new(
                    device.addr,
                    0,
                    Control::Response,
                    0,
                    Command::GetNetStart,
                    device.net_start_payload(),
                );
                socket.write_all(&reply.bytes()).await.expect("write");
            }
        }
        Command::GetCinfo => {
            let Some(device) = devices.iter().find(|d| d.addr == frame.dst) else {
                return;
            };
            let payload = device.cinfo_payload();
            let split = payload.len() / 2;
            let first = Frame::new(
                device.addr,
                0,
                Control::Response,
                1,
                Command::GetCinfo,
                payload[..split].to_vec(),
            );
            let last = Frame::new(
                device.addr,
                0,
                Control::Response,
                0,
                Command::GetCinfo,
                payload[split..].to_vec(),
            );
            socket.write_all(&first.bytes()).await.expect("write");
            socket.write_all(&last.bytes()).await.expect("write");
        }
        Command::SynOnline => {}
        Command::GetData => {
            let Some(device) = devices.iter().find(|d| d.addr == frame.dst) else {
                return;
            };
            let Some(payload) = device.data_payload(frame.payload[2]) else {
                return;
            };
            let reply = Frame::new(
                device.addr,
                0,
                Control::Response,
                0,
                Command::GetData,
                payload,
            );
            socket.write_all(&reply.bytes()).await.expect("write");
        }
        _ => {}
    }
}
