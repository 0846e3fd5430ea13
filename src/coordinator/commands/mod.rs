pub mod channel_info;
pub mod discover;
pub mod read_data;
pub mod syn_online;

use crate::prelude::*;
use crate::swr::frame::Frame;
use crate::swr::packet::{Reassembler, Response};
use std::time::Duration;

/// Reassembles one logical response from the bus.
///
/// `buf` carries bytes left over from earlier telegrams; one quiet
/// window may deliver several of them (discovery in particular). A frame
/// that fails to decode is discarded together with the rest of the
/// buffered bytes and the read continues, so a corrupt telegram degrades
/// into `NoResponse` rather than poisoning the stream.
pub(crate) async fn receive_response(
    transport: &mut Transport,
    buf: &mut Vec<u8>,
    timeout_long: Duration,
    timeout_short: Duration,
) -> Result<Response, SwrError> {
    let mut reassembler = Reassembler::new();

    loop {
        loop {
            match Frame::decode(buf) {
                Ok(Some((frame, used))) => {
                    buf.drain(..used);
                    if let Some(response) = reassembler.push(frame)? {
                        return Ok(response);
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("discarding corrupt telegram: {}", err);
                    buf.clear();
                    break;
                }
            }
        }

        let chunk = transport
            .read_until_quiet(timeout_long, timeout_short)
            .await?;
        if chunk.is_empty() {
            return Err(SwrError::NoResponse);
        }
        buf.extend_from_slice(&chunk);
    }
}

/// Sends a unicast request and waits for its response, skipping stale
/// responses from other devices or earlier commands.
pub(crate) async fn exchange(
    transport: &mut Transport,
    config: &Config,
    frame: &Frame,
) -> Result<Response, SwrError> {
    transport.write_all(&frame.bytes()).await?;

    let mut buf = Vec::new();
    loop {
        let response = receive_response(
            transport,
            &mut buf,
            config.timeout_long(),
            config.timeout_short(),
        )
        .await?;

        if response.command == frame.command && response.src == frame.dst {
            return Ok(response);
        }
        debug!(
            "ignoring unrelated response from {} (command {:?})",
            response.src, response.command
        );
    }
}
