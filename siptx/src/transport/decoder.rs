use std::io;

use tokio_util::bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::message::headers::ContentLength;

use super::KEEP_ALIVE_RESPONSE;

const HEADERS_END: &[u8] = b"\n\r\n";

/// Splits a byte stream into complete SIP messages.
///
/// Stream oriented transports carry no message boundaries; the decoder
/// frames on the blank line and the `Content-Length` header, which is
/// mandatory on stream transports (RFC 3261 §18.3).
#[derive(Default)]
pub(crate) struct StreamingDecoder;

impl Decoder for StreamingDecoder {
    type Error = io::Error;
    type Item = Bytes;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Discard CRLF keep-alives between messages.
        while src.starts_with(KEEP_ALIVE_RESPONSE) {
            src.advance(KEEP_ALIVE_RESPONSE.len());
        }
        if src.is_empty() {
            return Ok(None);
        }

        let Some(pos) = find_subslice(src, HEADERS_END) else {
            return Ok(None);
        };
        let body_start = pos + HEADERS_END.len();
        let headers_end = pos + 1;

        let mut content_length = None;

        let lines = src[..headers_end].split(|&b| b == b'\n');
        for line in lines {
            let mut split = line.splitn(2, |&c| c == b':');
            let Some(name) = split.next() else {
                continue;
            };
            if !ContentLength::matches_name(trim_bytes(name)) {
                continue;
            }
            let Some(value) = split.next() else {
                continue;
            };
            let Ok(value_str) = std::str::from_utf8(value) else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid UTF-8 in Content-Length header",
                ));
            };
            if let Ok(parsed_value) = value_str.trim().parse::<usize>() {
                content_length = Some(parsed_value);
            }
        }

        let Some(content_length) = content_length else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Content-Length not found",
            ));
        };

        let expected_msg_size = body_start + content_length;
        if src.len() < expected_msg_size {
            src.reserve(expected_msg_size - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(expected_msg_size).freeze()))
    }
}

fn find_subslice(src: &[u8], pattern: &[u8]) -> Option<usize> {
    src.windows(pattern.len()).position(|window| window == pattern)
}

fn trim_bytes(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace());
    match (start, end) {
        (Some(start), Some(end)) => &bytes[start..=end],
        _ => &[],
    }
}
