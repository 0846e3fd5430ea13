use thiserror::Error;

/// Error kinds raised on the SWR-NET side of the bridge.
///
/// Application-level plumbing composes these through `anyhow`; the
/// protocol and transport layers return them directly so callers can
/// absorb each kind at the smallest scope that can still make progress.
#[derive(Debug, Error)]
pub enum SwrError {
    /// The serial device or TCP bridge could not be acquired.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The link failed mid-operation (partial write, broken pipe, ...).
    #[error("transport I/O error: {0}")]
    TransportIo(String),

    /// The byte stream does not match the telegram structure.
    #[error("malformed frame: {0}")]
    FrameMalformed(String),

    /// The duplicated length bytes at the front of a telegram disagree.
    #[error("frame length bytes disagree: {first} vs {second}")]
    FrameLengthMismatch { first: u8, second: u8 },

    /// The recomputed 16-bit sum differs from the frame trailer.
    #[error("frame checksum mismatch: expected {expected:#06x}, calculated {calculated:#06x}")]
    FrameChecksum { expected: u16, calculated: u16 },

    /// A fragment's addressing or command does not match the response
    /// being reassembled.
    #[error("fragment does not belong to the pending response")]
    FragmentInconsistent,

    /// A channel record advertises a primary type we do not know.
    #[error("unknown channel type {0:#04x}")]
    ChannelUnknownType(u8),

    /// A channel record ended before its type-specific tail.
    #[error("truncated channel record")]
    ChannelMalformed,

    /// A measurement payload could not be decoded.
    #[error("malformed sample payload: {0}")]
    SampleMalformed(String),

    /// The bus stayed silent for the whole long timeout.
    #[error("no response from the bus")]
    NoResponse,
}
