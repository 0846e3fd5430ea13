pub use crate::channels::Channels;
pub use crate::config::{self, Config};
pub use crate::coordinator::{self, Coordinator};
pub use crate::database::{self, Database};
pub use crate::datalog_writer::DatalogWriter;
pub use crate::error::SwrError;
pub use crate::options::Options;
pub use crate::scheduler::{self, Scheduler};
pub use crate::swr;
pub use crate::transport::Transport;

pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use tokio::sync::broadcast;
