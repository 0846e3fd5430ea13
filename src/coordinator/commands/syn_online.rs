use crate::prelude::*;

use crate::swr::frame::{Control, Frame};
use crate::swr::packet::Command;

/// Broadcasts the poll time to every device on the bus. No response is
/// awaited.
pub struct SynOnline<'a> {
    transport: &'a mut Transport,
    poll_time: i64,
}

impl<'a> SynOnline<'a> {
    pub fn new(transport: &'a mut Transport, poll_time: i64) -> Self {
        Self {
            transport,
            poll_time,
        }
    }

    pub async fn run(self) -> Result<(), SwrError> {
        let payload = (self.poll_time as u32).to_le_bytes().to_vec();
        let frame = Frame::request(0, 0, Command::SynOnline, Control::Broadcast, payload);
        self.transport.write_all(&frame.bytes()).await
    }
}
