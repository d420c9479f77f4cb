//! Reply line parsing
//!
//! Splits the raw control-socket byte stream into LF-terminated lines and
//! decodes the three-digit status code at the start of each line. Replies
//! may arrive split across several reads, or several in one read; the
//! unconsumed tail of the buffer is kept for the next read.

use crate::error::ControlError;

/// Terminator of both outgoing commands and incoming reply lines.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Finds the next complete line in `data` starting at `offset`.
///
/// Returns the line without its terminator (and without a trailing CR)
/// together with the offset just past the terminator, or `None` when no
/// complete line is available yet.
pub fn next_line(data: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let rest = data.get(offset..)?;
    let end = rest.iter().position(|&b| b == LINE_TERMINATOR)?;
    let mut line = &rest[..end];
    if let Some((&b'\r', head)) = line.split_last() {
        line = head;
    }
    Some((line, offset + end + 1))
}

/// One decoded reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    pub code: u16,
    /// `true` for the `NNN-` opening line of a multi-line reply.
    pub continues: bool,
    pub text: String,
}

/// Decodes the status code and message of a single reply line.
pub fn parse_reply_line(line: &str) -> Result<ReplyLine, ControlError> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(ControlError::MalformedReply(line.to_string()));
    }

    let code = bytes[..3]
        .iter()
        .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));
    let continues = bytes.get(3) == Some(&b'-');
    let text = if continues {
        line[4..].to_string()
    } else {
        line[3..].trim_start().to_string()
    };

    Ok(ReplyLine {
        code,
        continues,
        text,
    })
}

/// Accumulating receive buffer for the control socket.
#[derive(Debug, Default)]
pub struct ReplyBuffer {
    data: Vec<u8>,
    offset: usize,
}

impl ReplyBuffer {
    /// Appends freshly read bytes, first shifting any partial line to the
    /// start of the buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.offset > 0 {
            self.data.drain(..self.offset);
            self.offset = 0;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Takes the next complete line, decoded lossily as text.
    pub fn next_line(&mut self) -> Option<String> {
        let (line, next) = next_line(&self.data, self.offset)?;
        let text = String::from_utf8_lossy(line).into_owned();
        self.offset = next;
        Some(text)
    }

    /// Bytes received but not yet part of a complete line.
    pub fn pending_len(&self) -> usize {
        self.data.len() - self.offset
    }
}
