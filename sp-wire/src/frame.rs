use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::io::{self, Read, Write};

pub const DEFAULT_MAX_FRAME_BYTES: u32 = 10 * 1024 * 1024;
const LENGTH_PREFIX_BYTES: usize = 4;

/// Framing is strict (§4.1): a declared length over the configured maximum
/// is a protocol violation that closes the connection, not a heuristic.
/// Generic over the framed payload type so both the steady-state `Message`
/// envelope and the one-shot handshake challenge/response share one codec.
#[derive(Debug)]
pub enum FrameError {
    Io(io::Error),
    TooLarge { declared: u32, max: u32 },
    Decode(rmp_serde::decode::Error),
    Encode(rmp_serde::encode::Error),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Io(e) => write!(f, "frame io error: {e}"),
            FrameError::TooLarge { declared, max } => {
                write!(f, "frame of {declared} bytes exceeds max {max} bytes")
            }
            FrameError::Decode(e) => write!(f, "frame decode error: {e}"),
            FrameError::Encode(e) => write!(f, "frame encode error: {e}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        FrameError::Io(e)
    }
}

pub type FrameResult<T> = Result<T, FrameError>;

/// Encodes any framed payload as `[u32 BE length | canonical rmp-serde bytes]`.
pub fn encode_frame<T: Serialize>(msg: &T) -> FrameResult<Vec<u8>> {
    let payload = rmp_serde::to_vec(msg).map_err(FrameError::Encode)?;
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_BYTES + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Writes a single framed payload to `w`, a thin wrapper used by the
/// per-connection writer thread in `sp-transport` and by the handshake.
pub fn write_message<T: Serialize, W: Write>(w: &mut W, msg: &T) -> FrameResult<()> {
    let framed = encode_frame(msg)?;
    w.write_all(&framed)?;
    Ok(())
}

/// Reads exactly one framed payload from `r`, blocking until the full
/// length-prefixed frame has arrived. Rejects frames whose declared length
/// exceeds `max_frame_bytes` before reading the payload.
pub fn read_message<T: DeserializeOwned, R: Read>(r: &mut R, max_frame_bytes: u32) -> FrameResult<T> {
    let mut len_buf = [0u8; LENGTH_PREFIX_BYTES];
    r.read_exact(&mut len_buf)?;
    let declared = u32::from_be_bytes(len_buf);
    if declared > max_frame_bytes {
        return Err(FrameError::TooLarge { declared, max: max_frame_bytes });
    }
    let mut payload = vec![0u8; declared as usize];
    r.read_exact(&mut payload)?;
    rmp_serde::from_slice(&payload).map_err(FrameError::Decode)
}

/// Decodes a whole byte stream into the exact original sequence of
/// messages (§8 invariant 9), used by tests and by any in-memory transport.
pub fn decode_all<T: DeserializeOwned>(mut bytes: &[u8], max_frame_bytes: u32) -> FrameResult<Vec<T>> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        out.push(read_message(&mut bytes, max_frame_bytes)?);
    }
    Ok(out)
}
