//! Measurement sample decoding.
//!
//! A `GetData` response carries a small header followed by one value
//! whose layout is selected by the primary type of the channel the
//! request referenced. Devices may append further records; only the
//! first value is taken.

use crate::error::SwrError;
use crate::swr::channel::{trimmed, Channel, ChannelDetail, ChannelKind};
use nom::bytes::complete::take;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::IResult;

/// The decoded value of one sample.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Analog { raw: u16, scaled: f64 },
    Counter { raw: u32, scaled: f64 },
    Digital { text_low: String, text_high: String },
    Status([u8; 4]),
}

impl Value {
    /// The gain/offset-scaled numeric value, where one exists.
    pub fn scaled(&self) -> Option<f64> {
        match self {
            Value::Analog { scaled, .. } | Value::Counter { scaled, .. } => Some(*scaled),
            _ => None,
        }
    }
}

/// One measurement captured during a poll.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Canonical name of the channel the value belongs to.
    pub channel: String,
    pub kind: ChannelKind,
    pub data_sets: u16,
    /// The time the device last synchronized, as reported by it.
    pub since: u32,
    pub time_basis: u32,
    pub value: Value,
}

/// Decodes the user payload of a `GetData` response against the channel
/// descriptor the request referenced.
pub fn decode(payload: &[u8], channel: &Channel) -> Result<Sample, SwrError> {
    let (rest, (kind_raw, _kind2, index, data_sets, since, time_basis)) =
        sample_header(payload).map_err(|_| SwrError::SampleMalformed("truncated header".into()))?;

    if kind_raw != u8::from(channel.kind) {
        return Err(SwrError::SampleMalformed(format!(
            "channel type {:#04x} does not match descriptor {}",
            kind_raw, channel.kind
        )));
    }
    if index != channel.index {
        return Err(SwrError::SampleMalformed(format!(
            "channel index {} does not match descriptor {}",
            index, channel.index
        )));
    }

    let value = match &channel.detail {
        ChannelDetail::Analog { gain, offset, .. } => {
            let (_, raw) =
                le_u16::<_, nom::error::Error<&[u8]>>(rest)
                    .map_err(|_| SwrError::SampleMalformed("truncated analog value".into()))?;
            Value::Analog {
                raw,
                scaled: raw as f64 * *gain as f64 + *offset as f64,
            }
        }
        ChannelDetail::Counter { gain, .. } => {
            let (_, raw) =
                le_u32::<_, nom::error::Error<&[u8]>>(rest)
                    .map_err(|_| SwrError::SampleMalformed("truncated counter value".into()))?;
            Value::Counter {
                raw,
                scaled: raw as f64 * *gain as f64,
            }
        }
        ChannelDetail::Digital { .. } => {
            let (_, (text_low, text_high)) = digital_value(rest)
                .map_err(|_| SwrError::SampleMalformed("truncated digital value".into()))?;
            Value::Digital {
                text_low: trimmed(text_low),
                text_high: trimmed(text_high),
            }
        }
        ChannelDetail::Status { .. } => {
            let (_, bytes) = take::<_, _, nom::error::Error<&[u8]>>(4usize)(rest)
                .map_err(|_| SwrError::SampleMalformed("truncated status value".into()))?;
            let mut raw = [0u8; 4];
            raw.copy_from_slice(bytes);
            Value::Status(raw)
        }
    };

    Ok(Sample {
        channel: channel.name.clone(),
        kind: channel.kind,
        data_sets,
        since,
        time_basis,
        value,
    })
}

fn sample_header(input: &[u8]) -> IResult<&[u8], (u8, u8, u8, u16, u32, u32)> {
    let (input, kind) = le_u8(input)?;
    let (input, kind2) = le_u8(input)?;
    let (input, index) = le_u8(input)?;
    let (input, data_sets) = le_u16(input)?;
    let (input, since) = le_u32(input)?;
    let (input, time_basis) = le_u32(input)?;
    Ok((input, (kind, kind2, index, data_sets, since, time_basis)))
}

fn digital_value(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    let (input, text_low) = take(16usize)(input)?;
    let (input, text_high) = take(16usize)(input)?;
    Ok((input, (text_low, text_high)))
}
