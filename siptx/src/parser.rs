#![deny(missing_docs)]
//! Wire parsing of SIP messages.
//!
//! [`Parser::parse`] turns a received datagram or framed stream chunk into a
//! [`SipMessage`]. Headers the stack interprets are parsed into their typed
//! form; everything else is preserved as raw name/value pairs.

use bytes::Bytes;

use crate::error::{Result, SipParseError};
use crate::message::headers::{
    CSeq, CallId, ContentLength, From, Header, Headers, MaxForwards, RecordRoute, Route, To, Via,
};
use crate::message::{
    Method, Request, RequestLine, Response, SIP_VERSION, SipMessage, StatusCode, StatusLine,
};

const HEADERS_END: &[u8] = b"\r\n\r\n";

/// SIP message parser.
pub struct Parser;

impl Parser {
    /// Parses a complete SIP message from the given buffer.
    pub fn parse(buf: &[u8]) -> Result<SipMessage> {
        let (head, body) = split_message(buf);
        let head = std::str::from_utf8(head)
            .map_err(|err| SipParseError::new(format!("Message is not valid UTF-8: {}", err)))?;

        let mut lines = unfold_lines(head);
        let start_line = lines
            .next()
            .ok_or_else(|| SipParseError::new("Empty message"))?;

        let mut headers = Headers::with_capacity(8);
        for line in lines {
            headers.push(parse_header_line(&line)?);
        }

        let body = extract_body(&headers, body);

        if let Some(rest) = start_line.strip_prefix(SIP_VERSION) {
            let status_line = parse_status_line(rest.trim_start())?;
            let mut response = Response::with_headers(status_line, headers);
            response.body = body;

            Ok(SipMessage::Response(response))
        } else {
            let req_line = parse_request_line(&start_line)?;
            let mut request = Request {
                req_line,
                headers,
                body: None,
            };
            request.body = body;

            Ok(SipMessage::Request(request))
        }
    }
}

fn split_message(buf: &[u8]) -> (&[u8], &[u8]) {
    match buf
        .windows(HEADERS_END.len())
        .position(|window| window == HEADERS_END)
    {
        Some(pos) => (&buf[..pos], &buf[pos + HEADERS_END.len()..]),
        None => (buf, &[][..]),
    }
}

// Joins folded continuation lines (leading whitespace) into the preceding
// header line (RFC 3261 §7.3.1).
fn unfold_lines(head: &str) -> impl Iterator<Item = String> {
    let mut unfolded: Vec<String> = Vec::new();

    for line in head.lines() {
        if line.is_empty() {
            continue;
        }
        if line.starts_with([' ', '\t'])
            && let Some(previous) = unfolded.last_mut()
        {
            previous.push(' ');
            previous.push_str(line.trim_start());
            continue;
        }
        unfolded.push(line.to_string());
    }

    unfolded.into_iter()
}

fn parse_request_line(line: &str) -> Result<RequestLine> {
    let mut parts = line.split_whitespace();

    let method = parts
        .next()
        .ok_or_else(|| SipParseError::new(format!("Invalid request line: {:?}", line)))?;
    let uri = parts
        .next()
        .ok_or_else(|| SipParseError::new(format!("Missing request URI: {:?}", line)))?;
    let version = parts
        .next()
        .ok_or_else(|| SipParseError::new(format!("Missing SIP version: {:?}", line)))?;

    if version != SIP_VERSION || parts.next().is_some() {
        return Err(SipParseError::new(format!("Invalid request line: {:?}", line)).into());
    }

    let method: Method = method.parse()?;
    let uri = uri.parse()?;

    Ok(RequestLine { method, uri })
}

fn parse_status_line(rest: &str) -> Result<StatusLine> {
    let (code, reason) = match rest.split_once(char::is_whitespace) {
        Some((code, reason)) => (code, reason.trim()),
        None => (rest, ""),
    };

    let code: u16 = code
        .parse()
        .map_err(|_| SipParseError::new(format!("Invalid status code: {:?}", code)))?;
    if !(100..=699).contains(&code) {
        return Err(SipParseError::new(format!("Status code out of range: {}", code)).into());
    }

    Ok(StatusLine::new(StatusCode::from(code), reason))
}

fn parse_header_line(line: &str) -> Result<Header> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| SipParseError::new(format!("Malformed header line: {:?}", line)))?;
    let name = name.trim();
    let value = value.trim();

    let header = if matches_name(name, Via::NAME, Some(Via::SHORT_NAME)) {
        Header::Via(value.parse()?)
    } else if matches_name(name, From::NAME, Some(From::SHORT_NAME)) {
        Header::From(value.parse()?)
    } else if matches_name(name, To::NAME, Some(To::SHORT_NAME)) {
        Header::To(value.parse()?)
    } else if matches_name(name, CallId::NAME, Some(CallId::SHORT_NAME)) {
        Header::CallId(value.parse()?)
    } else if matches_name(name, CSeq::NAME, None) {
        Header::CSeq(value.parse()?)
    } else if matches_name(name, MaxForwards::NAME, None) {
        Header::MaxForwards(value.parse()?)
    } else if matches_name(name, ContentLength::NAME, Some(ContentLength::SHORT_NAME)) {
        Header::ContentLength(value.parse()?)
    } else if matches_name(name, Route::NAME, None) {
        Header::Route(value.parse()?)
    } else if matches_name(name, RecordRoute::NAME, None) {
        Header::RecordRoute(value.parse()?)
    } else {
        Header::Other(name.into(), value.into())
    };

    Ok(header)
}

fn matches_name(name: &str, long: &str, short: Option<&str>) -> bool {
    name.eq_ignore_ascii_case(long) || short.is_some_and(|s| name.eq_ignore_ascii_case(s))
}

fn extract_body(headers: &Headers, body: &[u8]) -> Option<Bytes> {
    let length = headers
        .content_length()
        .map(|c| c.len() as usize)
        .unwrap_or(body.len());
    let body = &body[..length.min(body.len())];

    (!body.is_empty()).then(|| Bytes::copy_from_slice(body))
}
