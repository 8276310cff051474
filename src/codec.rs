//! Wire protocol codec for Open Protocol framed messages.
//!
//! Length-prefixed ASCII frames:
//!
//! ```text
//! LLLL MMMM RRR A SS PP FFFF DATA NUL
//! ```
//!
//! `LLLL` is a 4-digit decimal length counting itself and everything up to
//! (but excluding) the trailing `NUL`. All numeric header fields are
//! zero-padded ASCII decimal; `FFFF` is four reserved spaces.

use thiserror::Error;

/// Fixed width of each header field, in bytes.
const LEN_WIDTH: usize = 4;
const MID_WIDTH: usize = 4;
const REV_WIDTH: usize = 3;
const ACK_WIDTH: usize = 1;
const STATION_WIDTH: usize = 2;
const SPINDLE_WIDTH: usize = 2;
const SPARE_WIDTH: usize = 4;

/// Total header length, not counting `LLLL` itself or the trailing NUL.
const BODY_HEADER_WIDTH: usize =
    MID_WIDTH + REV_WIDTH + ACK_WIDTH + STATION_WIDTH + SPINDLE_WIDTH + SPARE_WIDTH;

/// A single decoded Open Protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub mid: u16,
    pub revision: u16,
    pub no_ack: bool,
    pub station: u8,
    pub spindle: u8,
    pub data: Vec<u8>,
}

impl Message {
    pub fn data_str(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Reasons a single frame failed to decode.
///
/// `Truncated` is not a stream-corrupting error: it means the buffer handed
/// to [`decode_frame`] didn't yet contain `LLLL` bytes. [`FrameDecoder`]
/// treats it as "wait for more data", never surfacing it to callers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("length field is not a 4-digit decimal number")]
    MalformedLength,
    #[error("frame is shorter than its declared length")]
    Truncated,
    #[error("MID field is not numeric")]
    BadMid,
    #[error("revision field is not numeric and not blank")]
    BadRevision,
    #[error("frame contains non-ASCII bytes")]
    NotAscii,
    #[error("frame is missing its trailing NUL terminator")]
    MissingNul,
}

/// Build one frame: `LLLL || body || 0x00`.
pub fn encode(
    mid: u16,
    revision: u16,
    data: &[u8],
    no_ack: bool,
    station: u8,
    spindle: u8,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(BODY_HEADER_WIDTH + data.len());
    body.extend(format!("{:0>width$}", mid, width = MID_WIDTH).into_bytes());
    body.extend(format!("{:0>width$}", revision, width = REV_WIDTH).into_bytes());
    body.push(if no_ack { b'1' } else { b'0' });
    body.extend(format!("{:0>width$}", station, width = STATION_WIDTH).into_bytes());
    body.extend(format!("{:0>width$}", spindle, width = SPINDLE_WIDTH).into_bytes());
    body.extend(std::iter::repeat(b' ').take(SPARE_WIDTH));
    body.extend_from_slice(data);

    let total_len = LEN_WIDTH + body.len();
    let mut out = Vec::with_capacity(total_len + 1);
    out.extend(format!("{:0>width$}", total_len, width = LEN_WIDTH).into_bytes());
    out.extend(body);
    out.push(0x00);
    out
}

/// Decode exactly one frame from the start of `bytes`.
///
/// On success returns the message and the number of bytes consumed
/// (`LLLL + 1`, including the trailing NUL).
pub fn decode_frame(bytes: &[u8]) -> Result<(Message, usize), DecodeError> {
    if bytes.len() < LEN_WIDTH {
        return Err(DecodeError::Truncated);
    }
    if !bytes[..LEN_WIDTH].is_ascii() {
        return Err(DecodeError::NotAscii);
    }
    let len_str = std::str::from_utf8(&bytes[..LEN_WIDTH]).map_err(|_| DecodeError::NotAscii)?;
    let total_len: usize = len_str
        .trim()
        .parse()
        .map_err(|_| DecodeError::MalformedLength)?;
    if total_len < LEN_WIDTH + BODY_HEADER_WIDTH {
        return Err(DecodeError::MalformedLength);
    }

    let consumed = total_len + 1; // + trailing NUL
    if bytes.len() < consumed {
        return Err(DecodeError::Truncated);
    }

    let frame = &bytes[..consumed];
    if !frame.is_ascii() {
        return Err(DecodeError::NotAscii);
    }
    if frame[consumed - 1] != 0x00 {
        return Err(DecodeError::MissingNul);
    }

    let body = &frame[LEN_WIDTH..total_len];
    let mut off = 0;

    let mid_str = std::str::from_utf8(&body[off..off + MID_WIDTH]).unwrap();
    let mid: u16 = mid_str.trim().parse().map_err(|_| DecodeError::BadMid)?;
    off += MID_WIDTH;

    let rev_str = std::str::from_utf8(&body[off..off + REV_WIDTH]).unwrap();
    let revision: u16 = if rev_str.trim().is_empty() {
        1
    } else {
        rev_str.trim().parse().map_err(|_| DecodeError::BadRevision)?
    };
    off += REV_WIDTH;

    let no_ack = body[off] == b'1';
    off += ACK_WIDTH;

    let station_str = std::str::from_utf8(&body[off..off + STATION_WIDTH]).unwrap();
    let station: u8 = station_str.trim().parse().unwrap_or(0);
    off += STATION_WIDTH;

    let spindle_str = std::str::from_utf8(&body[off..off + SPINDLE_WIDTH]).unwrap();
    let spindle: u8 = spindle_str.trim().parse().unwrap_or(0);
    off += SPINDLE_WIDTH;

    off += SPARE_WIDTH; // reserved
    let data = body[off..].to_vec();

    Ok((
        Message {
            mid,
            revision,
            no_ack,
            station,
            spindle,
            data,
        },
        consumed,
    ))
}

/// Incremental decoder that reassembles frames out of a TCP byte stream.
///
/// Feed bytes via [`FrameDecoder::feed`]; partial frames are retained across
/// calls. A [`DecodeError::MalformedLength`] cannot be recovered from byte-
/// for-byte (the frame boundary is unknown), so it clears the whole buffer —
/// an at-most-once recovery point. Any other per-frame error (bad MID,
/// bad revision, non-ASCII, missing NUL) still consumed exactly as many
/// bytes as the length field promised, so the stream stays in sync and
/// decoding resumes at the next frame.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed bytes into the decoder, returning each frame (or per-frame
    /// error) extracted this call, in arrival order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<Message, DecodeError>> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();

        loop {
            match decode_frame(&self.buf) {
                Ok((msg, consumed)) => {
                    self.buf.drain(..consumed);
                    out.push(Ok(msg));
                }
                Err(DecodeError::Truncated) => break,
                Err(DecodeError::MalformedLength) => {
                    self.buf.clear();
                    out.push(Err(DecodeError::MalformedLength));
                    break;
                }
                Err(e) => {
                    // Structurally complete frame, bad contents: we still
                    // know its length, so skip past it and keep going.
                    if let Some(consumed) = Self::recover_length(&self.buf) {
                        self.buf.drain(..consumed);
                    } else {
                        self.buf.clear();
                    }
                    out.push(Err(e));
                }
            }
        }

        out
    }

    /// Best-effort re-derivation of a malformed frame's byte length, used
    /// to resynchronize after a non-length decode error.
    fn recover_length(buf: &[u8]) -> Option<usize> {
        if buf.len() < LEN_WIDTH {
            return None;
        }
        let len_str = std::str::from_utf8(&buf[..LEN_WIDTH]).ok()?;
        let total_len: usize = len_str.trim().parse().ok()?;
        let consumed = total_len + 1;
        if buf.len() < consumed {
            None
        } else {
            Some(consumed)
        }
    }

    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}
