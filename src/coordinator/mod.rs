//! The protocol driver.
//!
//! Owns the transport and the discovered device set, and sequences the
//! three phases of the session protocol: discovery, channel enumeration
//! and the per-cycle polling round. The bus is half-duplex, so every
//! exchange here is strictly sequential.

use crate::prelude::*;

pub mod commands;

use crate::database::{ChannelData, CommentRow, StatsRow};
use crate::swr::device::Device;

pub struct Coordinator {
    config: Config,
    channels: Channels,
    transport: Transport,
    devices: Vec<Device>,
}

impl Coordinator {
    pub fn new(config: Config, channels: Channels, transport: Transport) -> Self {
        Self {
            config,
            channels,
            transport,
            devices: Vec::new(),
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn transport_open(&self) -> bool {
        self.transport.is_open()
    }

    pub async fn open(&mut self) -> Result<(), SwrError> {
        self.transport.open().await
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Phases A and B: discover the bus, then enumerate every device's
    /// channel catalogue. Fails when no device answers; the scheduler
    /// retries after one interval.
    pub async fn start_network(&mut self) -> Result<()> {
        self.transport.open().await?;
        self.discover().await?;
        self.enumerate().await?;
        Ok(())
    }

    async fn discover(&mut self) -> Result<()> {
        let devices = commands::discover::Discover::new(&mut self.transport, &self.config)
            .run()
            .await?;

        if devices.is_empty() {
            comment(&self.channels, None, "no inverters answered discovery".to_string());
            bail!("no devices discovered on {}", self.config.device());
        }

        for device in &devices {
            info!(
                "found device {} (serial {}, type {})",
                device.addr, device.serial, device.device_type
            );
            comment(
                &self.channels,
                Some(device.addr),
                format!(
                    "discovered inverter serial {} type {}",
                    device.serial, device.device_type
                ),
            );
        }

        self.devices = devices;
        Ok(())
    }

    async fn enumerate(&mut self) -> Result<()> {
        let mut devices = std::mem::take(&mut self.devices);

        for device in &mut devices {
            let result = commands::channel_info::ChannelInfo::new(
                &mut self.transport,
                &self.config,
                device.addr,
            )
            .run()
            .await;

            match result {
                Ok(catalogue) => {
                    info!("device {}: {} channels", device.addr, catalogue.len());
                    for channel in catalogue.iter() {
                        comment(
                            &self.channels,
                            Some(device.addr),
                            format!("channel {} ({})", channel.name, channel.kind),
                        );
                    }
                    device.catalogue = catalogue;
                }
                Err(e) => {
                    warn!("device {}: channel enumeration failed: {}", device.addr, e);
                    comment(
                        &self.channels,
                        Some(device.addr),
                        format!("channel enumeration failed: {}", e),
                    );
                }
            }
        }

        self.devices = devices;
        Ok(())
    }

    /// Phase C: one time-aligned polling round across all devices.
    pub async fn poll_cycle(&mut self, poll_time: i64) -> Result<()> {
        debug!("poll cycle at {}", poll_time);

        commands::syn_online::SynOnline::new(&mut self.transport, poll_time)
            .run()
            .await?;

        // the first channel of the first device fails to answer without
        // this settle time
        tokio::time::sleep(self.config.online_settle()).await;

        for device in &self.devices {
            let mut values: Vec<(String, f64)> = Vec::new();

            for name in self.config.channels() {
                let Some(channel) = device.catalogue.get(name) else {
                    debug!("device {}: no channel {}", device.addr, name);
                    continue;
                };

                let result = commands::read_data::ReadData::new(
                    &mut self.transport,
                    &self.config,
                    device.addr,
                    channel,
                )
                .run()
                .await;

                match result {
                    Ok(sample) => {
                        if sample.since != poll_time as u32 {
                            comment(
                                &self.channels,
                                Some(device.addr),
                                format!(
                                    "channel {}: device synced at {} instead of {}",
                                    name, sample.since, poll_time
                                ),
                            );
                        }
                        if let Some(scaled) = sample.value.scaled() {
                            trace!("device {} {} = {}", device.addr, name, scaled);
                            values.push((name.clone(), scaled));
                        }
                    }
                    Err(e) => {
                        warn!("device {} channel {}: {}", device.addr, name, e);
                        comment(
                            &self.channels,
                            Some(device.addr),
                            format!("channel {}: {}", name, e),
                        );
                    }
                }
            }

            if sanity_gate(&values) {
                let row = StatsRow::new(poll_time, device.addr, values);
                if self
                    .channels
                    .to_database
                    .send(ChannelData::Stats(row))
                    .is_err()
                {
                    bail!("send(to_database) failed - channel closed?");
                }
            } else {
                debug!(
                    "device {}: row discarded, startup or partial read",
                    device.addr
                );
                comment(
                    &self.channels,
                    Some(device.addr),
                    "row discarded: key channels missing or grid not up".to_string(),
                );
            }
        }

        Ok(())
    }
}

/// The per-device filter that suppresses rows while an inverter starts
/// up or answers only partially: the grid frequency must look live and
/// the three key channels must all be present.
pub fn sanity_gate(values: &[(String, f64)]) -> bool {
    let present = |name: &str| values.iter().any(|(n, _)| n == name);
    let fac = values.iter().find(|(n, _)| n == "Fac").map(|(_, v)| *v);

    matches!(fac, Some(v) if v > 50.0)
        && present("Temperature")
        && present("E-Total")
        && present("h-Total")
}

fn comment(channels: &Channels, addr: Option<u16>, text: String) {
    if channels
        .to_database
        .send(ChannelData::Comment(CommentRow::new(addr, text)))
        .is_err()
    {
        error!("send(to_database) failed - channel closed?");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn gate_passes_a_live_inverter() {
        assert!(sanity_gate(&values(&[
            ("Fac", 50.02),
            ("Temperature", 41.2),
            ("E-Total", 1234.5),
            ("h-Total", 8765.0),
        ])));
    }

    #[test]
    fn gate_drops_dead_grid_frequency() {
        assert!(!sanity_gate(&values(&[
            ("Fac", 0.0),
            ("Temperature", 41.2),
            ("E-Total", 1234.5),
            ("h-Total", 8765.0),
        ])));
    }

    #[test]
    fn gate_drops_missing_key_channels() {
        assert!(!sanity_gate(&values(&[("Fac", 50.02), ("Temperature", 41.2)])));
        assert!(!sanity_gate(&values(&[])));
    }
}
