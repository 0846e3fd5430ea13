use crate::prelude::*;

use super::receive_response;
use crate::swr::device::Device;
use crate::swr::frame::{Control, Frame};
use crate::swr::packet::Command;

/// Broadcasts `GetNetStart` and gathers every answering device until the
/// bus goes quiet.
pub struct Discover<'a> {
    transport: &'a mut Transport,
    config: &'a Config,
}

impl<'a> Discover<'a> {
    pub fn new(transport: &'a mut Transport, config: &'a Config) -> Self {
        Self { transport, config }
    }

    pub async fn run(mut self) -> Result<Vec<Device>, SwrError> {
        let frame = Frame::request(0, 0, Command::GetNetStart, Control::Broadcast, vec![]);
        self.transport.write_all(&frame.bytes()).await?;

        let mut devices: Vec<Device> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let result = receive_response(
                self.transport,
                &mut buf,
                self.config.timeout_long(),
                self.config.timeout_short(),
            )
            .await;

            match result {
                Ok(response) => {
                    if response.command != Command::GetNetStart {
                        debug!("ignoring {:?} response during discovery", response.command);
                        continue;
                    }
                    // address 0 is the controller itself
                    if response.src == 0 {
                        continue;
                    }
                    if devices.iter().any(|d| d.addr == response.src) {
                        continue;
                    }
                    match Device::from_net_start(response.src, &response.payload) {
                        Ok(device) => devices.push(device),
                        Err(e) => warn!("device {}: {}", response.src, e),
                    }
                }
                Err(SwrError::NoResponse) => break,
                Err(SwrError::FragmentInconsistent) => {
                    warn!("inconsistent fragments during discovery, response dropped");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(devices)
    }
}
