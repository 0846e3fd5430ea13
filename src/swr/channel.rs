//! Channel catalogue decoding.
//!
//! A `GetCinfo` response carries a run of variable-length records, one
//! per measurement variable the device advertises. Every record starts
//! with a fixed header and continues with a tail selected by the primary
//! channel type.

use crate::error::SwrError;
use nom::bytes::complete::take;
use nom::number::complete::{le_f32, le_u16, le_u8};
use nom::IResult;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Primary channel type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ChannelKind {
    Analog = 1,
    Digital = 2,
    Counter = 4,
    Status = 8,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelKind::Analog => "analog",
            ChannelKind::Digital => "digital",
            ChannelKind::Counter => "counter",
            ChannelKind::Status => "status",
        };
        write!(f, "{}", s)
    }
}

/// Type-specific descriptor fields.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelDetail {
    Analog { unit: String, gain: f32, offset: f32 },
    Digital { text_low: String, text_high: String },
    Counter { unit: String, gain: f32 },
    Status { bitmap: Vec<u8> },
}

/// One measurement variable advertised by a device.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub index: u8,
    pub kind: ChannelKind,
    /// Secondary type bitmask (input/output/param/spot/mean/test flags).
    pub kind2: u8,
    pub format: u16,
    pub access: u16,
    pub name: String,
    pub detail: ChannelDetail,
}

impl Channel {
    /// Gain and offset applied to raw sample values. Digital and status
    /// channels carry their value unscaled.
    pub fn scaling(&self) -> Option<(f32, f32)> {
        match &self.detail {
            ChannelDetail::Analog { gain, offset, .. } => Some((*gain, *offset)),
            ChannelDetail::Counter { gain, .. } => Some((*gain, 0.0)),
            _ => None,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match &self.detail {
            ChannelDetail::Analog { unit, .. } | ChannelDetail::Counter { unit, .. } => Some(unit),
            _ => None,
        }
    }
}

/// The channel catalogue of one device, in advertisement order.
///
/// Names are canonicalized (trailing whitespace/NUL stripped) once at
/// decode time; lookups take the canonical form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalogue {
    channels: Vec<Channel>,
}

impl Catalogue {
    /// Decodes the user payload of a `GetCinfo` response.
    pub fn decode(payload: &[u8]) -> Result<Self, SwrError> {
        let mut channels = Vec::new();
        let mut input = payload;
        while !input.is_empty() {
            let (rest, channel) = parse_record(input)?;
            channels.push(channel);
            input = rest;
        }
        Ok(Self { channels })
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Strips trailing whitespace and NUL padding from a fixed-width text
/// field.
pub(crate) fn trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

fn parse_record(input: &[u8]) -> Result<(&[u8], Channel), SwrError> {
    let (rest, (index, kind_raw, kind2, format, access, name)) =
        record_header(input).map_err(|_| SwrError::ChannelMalformed)?;

    let kind =
        ChannelKind::try_from(kind_raw).map_err(|_| SwrError::ChannelUnknownType(kind_raw))?;

    let (rest, detail) = match kind {
        ChannelKind::Analog => analog_tail(rest),
        ChannelKind::Digital => digital_tail(rest),
        ChannelKind::Counter => counter_tail(rest),
        ChannelKind::Status => status_tail(rest),
    }
    .map_err(|_| SwrError::ChannelMalformed)?;

    Ok((
        rest,
        Channel {
            index,
            kind,
            kind2,
            format,
            access,
            name: trimmed(name),
            detail,
        },
    ))
}

fn record_header(input: &[u8]) -> IResult<&[u8], (u8, u8, u8, u16, u16, &[u8])> {
    let (input, index) = le_u8(input)?;
    let (input, kind) = le_u8(input)?;
    let (input, kind2) = le_u8(input)?;
    let (input, format) = le_u16(input)?;
    let (input, access) = le_u16(input)?;
    let (input, name) = take(16usize)(input)?;
    Ok((input, (index, kind, kind2, format, access, name)))
}

fn analog_tail(input: &[u8]) -> IResult<&[u8], ChannelDetail> {
    let (input, unit) = take(8usize)(input)?;
    let (input, gain) = le_f32(input)?;
    let (input, offset) = le_f32(input)?;
    Ok((
        input,
        ChannelDetail::Analog {
            unit: trimmed(unit),
            gain,
            offset,
        },
    ))
}

fn digital_tail(input: &[u8]) -> IResult<&[u8], ChannelDetail> {
    let (input, text_low) = take(16usize)(input)?;
    let (input, text_high) = take(16usize)(input)?;
    Ok((
        input,
        ChannelDetail::Digital {
            text_low: trimmed(text_low),
            text_high: trimmed(text_high),
        },
    ))
}

fn counter_tail(input: &[u8]) -> IResult<&[u8], ChannelDetail> {
    let (input, unit) = take(8usize)(input)?;
    let (input, gain) = le_f32(input)?;
    Ok((
        input,
        ChannelDetail::Counter {
            unit: trimmed(unit),
            gain,
        },
    ))
}

fn status_tail(input: &[u8]) -> IResult<&[u8], ChannelDetail> {
    let (input, size) = le_u16(input)?;
    let (input, bitmap) = take(size as usize)(input)?;
    Ok((
        input,
        ChannelDetail::Status {
            bitmap: bitmap.to_vec(),
        },
    ))
}
