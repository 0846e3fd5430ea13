use crate::prelude::*;

use super::exchange;
use crate::swr::channel::Catalogue;
use crate::swr::frame::{Control, Frame};
use crate::swr::packet::Command;

/// Requests one device's channel catalogue.
pub struct ChannelInfo<'a> {
    transport: &'a mut Transport,
    config: &'a Config,
    addr: u16,
}

impl<'a> ChannelInfo<'a> {
    pub fn new(transport: &'a mut Transport, config: &'a Config, addr: u16) -> Self {
        Self {
            transport,
            config,
            addr,
        }
    }

    pub async fn run(self) -> Result<Catalogue, SwrError> {
        let frame = Frame::request(self.addr, 0, Command::GetCinfo, Control::Request, vec![]);
        let response = exchange(self.transport, self.config, &frame).await?;
        Catalogue::decode(&response.payload)
    }
}
