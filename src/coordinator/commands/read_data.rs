use crate::prelude::*;

use super::exchange;
use crate::swr::channel::Channel;
use crate::swr::data::{self, Sample};
use crate::swr::frame::{Control, Frame};
use crate::swr::packet::Command;

/// Requests the current value of one channel on one device.
pub struct ReadData<'a> {
    transport: &'a mut Transport,
    config: &'a Config,
    addr: u16,
    channel: &'a Channel,
}

impl<'a> ReadData<'a> {
    pub fn new(
        transport: &'a mut Transport,
        config: &'a Config,
        addr: u16,
        channel: &'a Channel,
    ) -> Self {
        Self {
            transport,
            config,
            addr,
            channel,
        }
    }

    pub async fn run(self) -> Result<Sample, SwrError> {
        let payload = vec![
            self.channel.kind.into(),
            self.channel.kind2,
            self.channel.index,
        ];
        let frame = Frame::request(self.addr, 0, Command::GetData, Control::Request, payload);
        let response = exchange(self.transport, self.config, &frame).await?;
        data::decode(&response.payload, self.channel)
    }
}
