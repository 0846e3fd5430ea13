use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Channels {
    pub to_database: broadcast::Sender<database::ChannelData>,
    pub to_scheduler: broadcast::Sender<crate::scheduler::ChannelData>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            to_database: Self::channel(),
            to_scheduler: Self::channel(),
        }
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(2048).0
    }
}
