//! Typed HTTP responses
//!
//! A [`Response`] always serializes as status line, headers, exactly one
//! blank line, then the body. Headers are fixed: content type, content length
//! and `Connection: close`, since every connection carries one exchange.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use embedded_io_async::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
}

impl Status {
    pub const fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NotFound => 404,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "Not Found",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Json,
    PlainText,
}

impl ContentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ContentType::Html => "text/html",
            ContentType::Json => "application/json",
            ContentType::PlainText => "text/plain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: ContentType,
    pub body: Cow<'static, str>,
}

impl Response {
    pub fn new(status: Status, content_type: ContentType, body: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn html(body: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Status::Ok, ContentType::Html, body)
    }

    pub fn json(body: String) -> Self {
        Self::new(Status::Ok, ContentType::Json, body)
    }

    pub fn not_found() -> Self {
        Self::new(Status::NotFound, ContentType::PlainText, "Not Found")
    }

    /// Status line and headers including the terminating blank line.
    pub fn head(&self) -> heapless::String<128> {
        let mut head = heapless::String::new();
        // Longest possible head is well under capacity.
        let _ = write!(
            head,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type.as_str(),
            self.body.len()
        );
        head
    }

    /// The complete response as bytes.
    pub fn encode(&self) -> Vec<u8> {
        let head = self.head();
        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(self.body.as_bytes());
        out
    }

    /// Write the response to a connection.
    pub async fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), W::Error> {
        writer.write_all(self.head().as_bytes()).await?;
        writer.write_all(self.body.as_bytes()).await?;
        writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockStream;

    fn split(bytes: &[u8]) -> (&str, &str) {
        let text = core::str::from_utf8(bytes).unwrap();
        text.split_once("\r\n\r\n").unwrap()
    }

    #[test]
    fn test_framing_has_one_blank_line() {
        let encoded = Response::html("<p>hi</p>").encode();
        let (head, body) = split(&encoded);

        assert_eq!(
            head,
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 9\r\nConnection: close"
        );
        assert_eq!(body, "<p>hi</p>");
        assert!(!head.contains("\r\n\r\n"));
    }

    #[test]
    fn test_not_found() {
        let encoded = Response::not_found().encode();
        let (head, body) = split(&encoded);

        assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(head.contains("Content-Type: text/plain"));
        assert_eq!(body, "Not Found");
    }

    #[test]
    fn test_empty_body_still_framed() {
        let encoded = Response::html("").encode();
        assert!(encoded.ends_with(b"Content-Length: 0\r\nConnection: close\r\n\r\n"));
    }

    #[test]
    fn test_write_to_matches_encode() {
        let response = Response::json(String::from("{\"decimal\": 1}"));
        let mut conn = MockStream::new(b"");

        embassy_futures::block_on(response.write_to(&mut conn)).unwrap();
        assert_eq!(conn.output, response.encode());
    }
}
