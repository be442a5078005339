use std::io::Write;
use std::net::SocketAddr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Result;
use crate::message::headers::{ContentLength, Header, Headers};
use crate::message::{Request, Response, StatusCode};

use super::Transport;

/// Where and how an outbound message leaves the stack.
#[derive(Clone)]
pub struct SendInfo {
    /// The destination address.
    pub target: SocketAddr,
    /// The transport to send through.
    pub transport: Transport,
}

/// This type represents an outbound SIP request.
#[derive(Clone)]
pub struct OutgoingRequest {
    /// The SIP request message.
    pub message: Request,
    /// The encoded wire form.
    pub encoded: Bytes,
    /// The resolved send target.
    pub send_info: SendInfo,
}

impl OutgoingRequest {
    /// Encodes the request for the wire.
    pub fn new(message: Request, send_info: SendInfo) -> Result<Self> {
        let encoded = encode(
            &message.req_line.to_string(),
            &message.headers,
            message.body.as_ref(),
        )?;

        Ok(Self {
            message,
            encoded,
            send_info,
        })
    }
}

/// This type represents an outbound SIP response.
#[derive(Clone)]
pub struct OutgoingResponse {
    /// The SIP response message.
    pub message: Response,
    /// The encoded wire form.
    pub encoded: Bytes,
    /// The resolved send target.
    pub send_info: SendInfo,
}

impl OutgoingResponse {
    /// Encodes the response for the wire.
    pub fn new(message: Response, send_info: SendInfo) -> Result<Self> {
        let encoded = encode(
            &message.status_line.to_string(),
            &message.headers,
            message.body.as_ref(),
        )?;

        Ok(Self {
            message,
            encoded,
            send_info,
        })
    }

    /// Returns the response status code.
    pub fn status_code(&self) -> StatusCode {
        self.message.code()
    }

    /// Returns the response reason phrase.
    pub fn reason(&self) -> &str {
        &self.message.status_line.reason
    }
}

fn encode(start_line: &str, headers: &Headers, body: Option<&Bytes>) -> Result<Bytes> {
    let estimated_message_size = if body.is_none() { 800 } else { 1500 };
    let buf = BytesMut::with_capacity(estimated_message_size);

    let mut buf_writer = buf.writer();

    write!(buf_writer, "{}\r\n", start_line)?;

    let mut wrote_content_length = false;
    for header in headers.iter() {
        if matches!(header, Header::ContentLength(_)) {
            wrote_content_length = true;
        }
        write!(buf_writer, "{}\r\n", header)?;
    }

    if !wrote_content_length {
        let length = body.map(|b| b.len()).unwrap_or(0) as u32;
        write!(
            buf_writer,
            "{}: {}\r\n",
            ContentLength::NAME,
            ContentLength::new(length)
        )?;
    }

    write!(buf_writer, "\r\n")?;
    if let Some(body) = body {
        buf_writer.write_all(body)?;
    }

    Ok(buf_writer.into_inner().freeze())
}
