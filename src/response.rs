use bytes::Bytes;

/// A completed HTTP response.
///
/// Built incrementally while the transfer runs, exposed to the
/// completion handler only once the engine reports the transfer
/// finished. Header lines keep their arrival order with line
/// terminators stripped.
#[derive(Clone, Debug)]
pub struct Response {
    status_line: String,
    headers: Vec<String>,
    body: Bytes,
}

impl Response {
    pub(crate) fn new(status_line: String, headers: Vec<String>, body: Bytes) -> Self {
        Response {
            status_line,
            headers,
            body,
        }
    }

    /// Raw status line (e.g. `"HTTP/1.1 200 OK"`). Empty if the transfer
    /// ended before a complete header block arrived.
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// Numeric status code parsed out of the status line, if present.
    pub fn status_code(&self) -> Option<u16> {
        self.status_line.split(' ').nth(1)?.parse().ok()
    }

    /// Raw header lines, in arrival order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Get the value of the first header line matching `name`
    /// (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (n, v) = line.split_once(':')?;
            if n.trim().eq_ignore_ascii_case(name) {
                Some(v.trim())
            } else {
                None
            }
        })
    }

    /// Reference to the body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response and return the body bytes.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}
