//! HTTP/1.1 framing: reads one fully buffered request and serializes a finished
//! response.

use crate::error::{ServerError, ServerResult};
use crate::http::{Method, Request, Response};
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

fn parse_error(message: &str) -> ServerError {
    ServerError::ParseError(message.to_string())
}

/// Reads the next request. Returns `None` when the peer closed the connection
/// before sending a request line.
pub(crate) async fn read_request<R>(reader: &mut R) -> ServerResult<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    if request_line.trim().is_empty() {
        return Ok(None);
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| parse_error("Invalid request line"))?;
    let target = parts.next().ok_or_else(|| parse_error("Invalid request line"))?;

    let mut headers: HashMap<String, String> = HashMap::new();
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 || line.trim().is_empty() {
            break;
        }

        if let Some((key, value)) = line.trim().split_once(':') {
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            match headers.get_mut(&key) {
                Some(existing) => {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
                None => {
                    headers.insert(key, value);
                }
            }
        }
    }

    let chunked = headers
        .get("transfer-encoding")
        .map(|encoding| encoding.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);

    let mut body = Vec::new();
    if chunked {
        body = read_chunked(reader).await?;
    } else if let Some(content_length) = headers.get("content-length") {
        let length = content_length
            .trim()
            .parse::<usize>()
            .map_err(|_| parse_error("Invalid Content-Length"))?;
        body.reserve(length);
        (&mut *reader).take(length as u64).read_to_end(&mut body).await?;
    }

    Ok(Some(Request::new(
        Method::from_string(method),
        target,
        headers,
        body,
    )))
}

async fn read_chunked<R>(reader: &mut R) -> ServerResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(parse_error("Unexpected end of chunked body"));
        }
        let size = line.trim().split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size, 16).map_err(|_| parse_error("Invalid chunk size"))?;

        if size == 0 {
            // trailers
            loop {
                let mut trailer = String::new();
                let read = reader.read_line(&mut trailer).await?;
                if read == 0 || trailer.trim().is_empty() {
                    return Ok(body);
                }
            }
        }

        let mut chunk = vec![0u8; size];
        reader.read_exact(&mut chunk).await?;
        body.extend_from_slice(&chunk);

        let mut terminator = String::new();
        reader.read_line(&mut terminator).await?;
    }
}

fn reason(status: u16) -> &'static str {
    ::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}

/// Serializes a finished response. The body is left out for HEAD requests.
pub(crate) fn encode_response(response: &Response, head: bool) -> Vec<u8> {
    let (status, headers, body) = response.snapshot();

    let mut response_line = format!("HTTP/1.1 {} {}\r\n", status, reason(status));
    for (name, value) in headers.iter() {
        for v in value.values() {
            response_line += &format!("{}: {}\r\n", name, v);
        }
    }
    if !headers.contains("content-length") {
        response_line += &format!("Content-Length: {}\r\n", body.len());
    }
    if !headers.contains("connection") {
        response_line += "Connection: close\r\n";
    }
    response_line += "\r\n";

    let mut bytes = response_line.into_bytes();
    if !head {
        bytes.extend_from_slice(&body);
    }
    bytes
}

pub(crate) fn bad_request(message: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 400 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reason(400),
        message.len(),
        message
    )
    .into_bytes()
}
