//! SWR-NET telegram framing.
//!
//! One on-wire telegram:
//!
//! ```text
//! AA AA | 68 | L | L | 68 | src_lo src_hi | dst_lo dst_hi | ctl | pkt | cmd | payload | crc_lo crc_hi | 16
//! ```
//!
//! `L` is the user-payload length (duplicated for error detection) and the
//! checksum is the unsigned 16-bit sum of every byte from `src_lo` through
//! the last payload byte. The leading `AA` wake bytes are mandatory on
//! transmit and optional on receive.

use crate::error::SwrError;
use crate::swr::packet::Command;
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const WAKE: u8 = 0xAA;
pub const TELEGRAM_START: u8 = 0x68;
pub const TELEGRAM_END: u8 = 0x16;

/// Address of the controller (us) on the bus.
pub const CONTROLLER_ADDR: u16 = 0;

/// Header bytes covered by the checksum: src, dst, ctl, pkt, cmd.
const HEADER_LEN: usize = 7;
/// Smallest decodable telegram: 68 L L 68 + header + crc + end.
const MIN_FRAME_LEN: usize = 4 + HEADER_LEN + 3;

/// The control byte, as seen at component boundaries. The raw value only
/// exists inside the codec.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Control {
    Request = 0,
    Response = 64,
    Broadcast = 128,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub src: u16,
    pub dst: u16,
    pub control: Control,
    pub pkt_cnt: u8,
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(
        src: u16,
        dst: u16,
        control: Control,
        pkt_cnt: u8,
        command: Command,
        payload: Vec<u8>,
    ) -> Self {
        assert!(payload.len() <= u8::MAX as usize, "payload exceeds one telegram");
        Self {
            src,
            dst,
            control,
            pkt_cnt,
            command,
            payload,
        }
    }

    /// A frame originated by the controller (source address 0).
    pub fn request(dst: u16, pkt_cnt: u8, command: Command, control: Control, payload: Vec<u8>) -> Self {
        Self::new(CONTROLLER_ADDR, dst, control, pkt_cnt, command, payload)
    }

    /// Encodes the frame, wake bytes included.
    pub fn bytes(&self) -> Vec<u8> {
        let len = self.payload.len() as u8;
        let mut r = Vec::with_capacity(self.payload.len() + MIN_FRAME_LEN + 2);

        r.push(WAKE);
        r.push(WAKE);
        r.push(TELEGRAM_START);
        r.push(len);
        r.push(len);
        r.push(TELEGRAM_START);
        r.extend_from_slice(&self.src.to_le_bytes());
        r.extend_from_slice(&self.dst.to_le_bytes());
        r.push(self.control.into());
        r.push(self.pkt_cnt);
        r.push(self.command.into());
        r.extend_from_slice(&self.payload);

        let crc = checksum(&r[6..]);
        r.extend_from_slice(&crc.to_le_bytes());
        r.push(TELEGRAM_END);

        r
    }

    /// Decodes one frame from the front of `input`.
    ///
    /// Returns the frame and the number of bytes consumed, or `Ok(None)`
    /// when `input` holds only a prefix of a telegram (the caller should
    /// read more). The 1200-baud link interleaves fragments with silent
    /// gaps, so a read may deliver several telegrams or a partial one.
    pub fn decode(input: &[u8]) -> Result<Option<(Frame, usize)>, SwrError> {
        let mut pos = 0;
        while pos < input.len() && input[pos] == WAKE {
            pos += 1;
        }

        let rest = &input[pos..];
        if rest.len() < MIN_FRAME_LEN {
            return Ok(None);
        }
        if rest[0] != TELEGRAM_START {
            return Err(SwrError::FrameMalformed(format!(
                "expected telegram start, got {:#04x}",
                rest[0]
            )));
        }
        let (len1, len2) = (rest[1], rest[2]);
        if rest[3] != TELEGRAM_START {
            return Err(SwrError::FrameMalformed(format!(
                "expected second telegram start, got {:#04x}",
                rest[3]
            )));
        }
        if len1 != len2 {
            return Err(SwrError::FrameLengthMismatch {
                first: len1,
                second: len2,
            });
        }

        let payload_len = len1 as usize;
        let total = 4 + HEADER_LEN + payload_len + 3;
        if rest.len() < total {
            return Ok(None);
        }

        let body = &rest[4..4 + HEADER_LEN + payload_len];
        let trailer = &rest[4 + HEADER_LEN + payload_len..total];
        if trailer[2] != TELEGRAM_END {
            return Err(SwrError::FrameMalformed(format!(
                "expected end marker, got {:#04x}",
                trailer[2]
            )));
        }
        let expected = u16::from_le_bytes([trailer[0], trailer[1]]);
        let calculated = checksum(body);
        if expected != calculated {
            return Err(SwrError::FrameChecksum {
                expected,
                calculated,
            });
        }

        let src = u16::from_le_bytes([body[0], body[1]]);
        let dst = u16::from_le_bytes([body[2], body[3]]);
        let control = Control::try_from(body[4])
            .map_err(|_| SwrError::FrameMalformed(format!("unknown control byte {:#04x}", body[4])))?;
        let pkt_cnt = body[5];
        let command = Command::try_from(body[6])
            .map_err(|_| SwrError::FrameMalformed(format!("unknown command byte {:#04x}", body[6])))?;

        Ok(Some((
            Frame {
                src,
                dst,
                control,
                pkt_cnt,
                command,
                payload: body[HEADER_LEN..].to_vec(),
            },
            pos + total,
        )))
    }
}

/// Unsigned 16-bit additive checksum over `data`.
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |sum, b| sum.wrapping_add(*b as u16))
}
