//! Devices discovered on the bus.

use crate::error::SwrError;
use crate::swr::channel::{trimmed, Catalogue};

/// The 8-byte device-type tag reported at discovery (e.g. `SWR 700`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceType([u8; 8]);

impl DeviceType {
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl From<[u8; 8]> for DeviceType {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", trimmed(&self.0))
    }
}

impl std::fmt::Debug for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", trimmed(&self.0))
    }
}

/// One inverter on the bus.
///
/// Created at discovery; the catalogue is attached by enumeration and
/// the device is retained for the process lifetime unless re-discovery
/// is forced.
#[derive(Clone, Debug)]
pub struct Device {
    /// Bus address assigned by the inverter firmware; never zero.
    pub addr: u16,
    pub serial: u32,
    pub device_type: DeviceType,
    pub catalogue: Catalogue,
}

impl Device {
    /// Parses the payload of a `GetNetStart` response:
    /// `[serial:4 LE][type:8]`.
    pub fn from_net_start(addr: u16, payload: &[u8]) -> Result<Self, SwrError> {
        if payload.len() < 12 {
            return Err(SwrError::SampleMalformed(format!(
                "net-start payload too short: {} bytes",
                payload.len()
            )));
        }
        let serial = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let mut tag = [0u8; 8];
        tag.copy_from_slice(&payload[4..12]);

        Ok(Self {
            addr,
            serial,
            device_type: tag.into(),
            catalogue: Catalogue::default(),
        })
    }
}
