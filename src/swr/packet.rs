//! Command codes and logical-response reassembly.
//!
//! A single command may be answered by several telegrams; the packet
//! counter counts down across them and reaches zero on the final one.

use crate::error::SwrError;
use crate::swr::frame::{Control, Frame};
use log::debug;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// SWR-NET session commands.
///
/// `SetData` is deliberately never issued; the bridge is a pure reader.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Command {
    GetNetStart = 6,
    GetCinfo = 9,
    SynOnline = 10,
    GetData = 11,
    SetData = 12,
    PDelimit = 40,
}

/// The logical result of one command, payloads concatenated across all
/// of its fragments.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub src: u16,
    pub dst: u16,
    pub control: Control,
    pub command: Command,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct Pending {
    src: u16,
    dst: u16,
    control: Control,
    command: Command,
    payload: Vec<u8>,
    last_cnt: u8,
}

/// Accumulates fragments of the current logical response.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: Option<Pending>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// No fragment is currently being accumulated.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// Discards any partially accumulated response.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Feeds one decoded frame in. Returns the completed [`Response`]
    /// once the packet counter reaches zero.
    ///
    /// Fragments after the first must match the pending response on
    /// source, destination, control and command; a mismatch aborts the
    /// accumulated response with [`SwrError::FragmentInconsistent`].
    pub fn push(&mut self, frame: Frame) -> Result<Option<Response>, SwrError> {
        match self.pending.as_mut() {
            None => {
                if frame.pkt_cnt == 0 {
                    return Ok(Some(Response {
                        src: frame.src,
                        dst: frame.dst,
                        control: frame.control,
                        command: frame.command,
                        payload: frame.payload,
                    }));
                }
                self.pending = Some(Pending {
                    src: frame.src,
                    dst: frame.dst,
                    control: frame.control,
                    command: frame.command,
                    payload: frame.payload,
                    last_cnt: frame.pkt_cnt,
                });
                Ok(None)
            }
            Some(pending) => {
                if pending.src != frame.src
                    || pending.dst != frame.dst
                    || pending.control != frame.control
                    || pending.command != frame.command
                {
                    self.pending = None;
                    return Err(SwrError::FragmentInconsistent);
                }

                // counters count down to zero across fragments
                if frame.pkt_cnt >= pending.last_cnt {
                    debug!(
                        "packet counter went {} -> {} mid-response",
                        pending.last_cnt, frame.pkt_cnt
                    );
                }
                pending.payload.extend_from_slice(&frame.payload);
                pending.last_cnt = frame.pkt_cnt;

                if frame.pkt_cnt == 0 {
                    let done = self.pending.take().expect("pending fragment");
                    return Ok(Some(Response {
                        src: done.src,
                        dst: done.dst,
                        control: done.control,
                        command: done.command,
                        payload: done.payload,
                    }));
                }
                Ok(None)
            }
        }
    }
}
