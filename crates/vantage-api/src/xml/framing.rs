// ── XML frame scanning ──
//
// The ACI service frames each request and response as one top-level XML
// element. The reader must find the end of that element without parsing
// the body: bodies may contain arbitrary entities, CDATA sections with
// fake closing tags, and comments. So this is a byte-level tag-depth
// scanner, not an XML parser.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Error;

/// Default frame size limit: 16 MiB.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Outside markup, at character data or between frames.
    Text,
    /// Just saw `<`, deciding what kind of markup follows.
    MarkupStart,
    /// Saw `<!`, deciding between comment, CDATA, and declaration.
    Bang,
    /// Inside `<!-- ... -->`. The payload counts trailing dashes.
    Comment(u8),
    /// Matching the `[CDATA[` prefix, payload = chars matched so far.
    CDataPrefix(u8),
    /// Inside `<![CDATA[ ... ]]>`. The payload counts trailing brackets.
    CData(u8),
    /// Inside `<? ... ?>` or `<!DOCTYPE ...>`, skipped to `>`.
    Skip { question: bool },
    /// Inside a start tag (`<Name ...>`).
    StartTag,
    /// Inside an end tag (`</Name>`).
    EndTag,
    /// Inside a quoted attribute value within a start tag.
    Quoted(u8),
}

/// Incremental scanner that recognizes one complete top-level element.
///
/// Feed bytes with [`push`](Self::push); when the element's closing tag
/// (or a top-level self-closing tag) brings the depth back to zero, the
/// accumulated frame is returned and any surplus bytes are left to the
/// caller.
pub struct FrameScanner {
    state: State,
    depth: usize,
    buf: Vec<u8>,
    max: usize,
    /// Whether the previous byte inside a start tag was `/`.
    self_closing: bool,
}

impl FrameScanner {
    pub fn new(max: usize) -> Self {
        Self {
            state: State::Text,
            depth: 0,
            buf: Vec::new(),
            max,
            self_closing: false,
        }
    }

    /// Consume bytes from `input`. Returns the number of bytes consumed
    /// and, if the frame completed, the frame bytes.
    pub fn push(&mut self, input: &[u8]) -> Result<(usize, Option<Vec<u8>>), Error> {
        for (i, &byte) in input.iter().enumerate() {
            // Inter-frame whitespace (the service emits a newline after
            // each response) is not part of any frame.
            if self.state == State::Text && self.depth == 0 && self.buf.is_empty() {
                if byte.is_ascii_whitespace() {
                    continue;
                }
                if byte != b'<' {
                    return Err(Error::protocol(format!(
                        "unexpected byte 0x{byte:02x} outside XML frame"
                    )));
                }
            }

            self.buf.push(byte);
            if self.buf.len() > self.max {
                return Err(Error::FrameTooLarge { limit: self.max });
            }

            if self.step(byte)? {
                let frame = std::mem::take(&mut self.buf);
                self.state = State::Text;
                self.depth = 0;
                return Ok((i + 1, Some(frame)));
            }
        }

        Ok((input.len(), None))
    }

    /// Advance the state machine by one byte. Returns `true` when the
    /// top-level element is complete.
    fn step(&mut self, byte: u8) -> Result<bool, Error> {
        match self.state {
            State::Text => {
                if byte == b'<' {
                    self.state = State::MarkupStart;
                }
            }
            State::MarkupStart => match byte {
                b'/' => self.state = State::EndTag,
                b'!' => self.state = State::Bang,
                b'?' => self.state = State::Skip { question: true },
                _ => {
                    self.state = State::StartTag;
                    self.self_closing = false;
                }
            },
            State::Bang => match byte {
                b'-' => self.state = State::Comment(0),
                b'[' => self.state = State::CDataPrefix(0),
                _ => self.state = State::Skip { question: false },
            },
            State::Comment(dashes) => {
                // The leading "<!-" already consumed one dash; the state
                // machine only needs the closing "-->" which cannot
                // appear inside a well-formed comment body.
                self.state = match (byte, dashes) {
                    (b'-', _) => State::Comment(dashes.saturating_add(1)),
                    (b'>', d) if d >= 2 => State::Text,
                    _ => State::Comment(0),
                };
            }
            State::CDataPrefix(matched) => {
                const PREFIX: &[u8] = b"CDATA[";
                if PREFIX.get(matched as usize) == Some(&byte) {
                    if matched as usize + 1 == PREFIX.len() {
                        self.state = State::CData(0);
                    } else {
                        self.state = State::CDataPrefix(matched + 1);
                    }
                } else {
                    return Err(Error::protocol("malformed CDATA section"));
                }
            }
            State::CData(brackets) => {
                self.state = match (byte, brackets) {
                    (b']', _) => State::CData(brackets.saturating_add(1)),
                    (b'>', b) if b >= 2 => State::Text,
                    _ => State::CData(0),
                };
            }
            State::Skip { question } => {
                if byte == b'>' && (!question || self.buf.ends_with(b"?>")) {
                    self.state = State::Text;
                }
            }
            State::StartTag => match byte {
                b'"' | b'\'' => {
                    self.state = State::Quoted(byte);
                    self.self_closing = false;
                }
                b'/' => self.self_closing = true,
                b'>' => {
                    self.state = State::Text;
                    if self.self_closing {
                        self.self_closing = false;
                        if self.depth == 0 {
                            return Ok(true);
                        }
                    } else {
                        self.depth += 1;
                    }
                }
                _ => self.self_closing = false,
            },
            State::EndTag => {
                if byte == b'>' {
                    self.state = State::Text;
                    self.depth = self.depth.checked_sub(1).ok_or_else(|| {
                        Error::protocol("closing tag without matching opening tag")
                    })?;
                    if self.depth == 0 {
                        return Ok(true);
                    }
                }
            }
            State::Quoted(quote) => {
                if byte == quote {
                    self.state = State::StartTag;
                }
            }
        }

        Ok(false)
    }
}

// ── FrameReader ──────────────────────────────────────────────────────

/// Reads complete XML frames from an async byte stream.
pub struct FrameReader<R> {
    reader: R,
    pending: Vec<u8>,
    max: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max: usize) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            max,
        }
    }

    /// Read until one complete top-level element has been consumed.
    pub async fn read_frame(&mut self) -> Result<String, Error> {
        let mut scanner = FrameScanner::new(self.max);

        loop {
            if !self.pending.is_empty() {
                let (consumed, frame) = scanner.push(&self.pending)?;
                self.pending.drain(..consumed);
                if let Some(frame) = frame {
                    return String::from_utf8(frame)
                        .map_err(|_| Error::protocol("frame is not valid UTF-8"));
                }
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self
                .reader
                .read(&mut chunk)
                .await
                .map_err(|_| Error::Disconnected)?;
            if n == 0 {
                return Err(Error::Disconnected);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scan(input: &str) -> Result<Option<String>, Error> {
        let mut scanner = FrameScanner::new(DEFAULT_MAX_FRAME);
        let (_, frame) = scanner.push(input.as_bytes())?;
        Ok(frame.map(|f| String::from_utf8(f).unwrap()))
    }

    #[test]
    fn simple_frame() {
        let frame = scan("<ILogin><Login><return>true</return></Login></ILogin>\n").unwrap();
        assert_eq!(
            frame.as_deref(),
            Some("<ILogin><Login><return>true</return></Login></ILogin>")
        );
    }

    #[test]
    fn nested_same_name_elements() {
        let input = "<A><A><A>deep</A></A></A>";
        assert_eq!(scan(input).unwrap().as_deref(), Some(input));
    }

    #[test]
    fn cdata_hides_closing_tag() {
        let input = "<IConfiguration><![CDATA[</IConfiguration>]]></IConfiguration>";
        assert_eq!(scan(input).unwrap().as_deref(), Some(input));
    }

    #[test]
    fn comment_hides_closing_tag() {
        let input = "<A><!-- </A> not real --></A>";
        assert_eq!(scan(input).unwrap().as_deref(), Some(input));
    }

    #[test]
    fn quoted_attribute_hides_angle_bracket() {
        let input = r#"<A note="a > b"><B/></A>"#;
        assert_eq!(scan(input).unwrap().as_deref(), Some(input));
    }

    #[test]
    fn self_closing_top_level() {
        assert_eq!(scan("<Ping/>").unwrap().as_deref(), Some("<Ping/>"));
    }

    #[test]
    fn incomplete_frame_returns_none() {
        assert_eq!(scan("<A><B>partial</B>").unwrap(), None);
    }

    #[test]
    fn leading_whitespace_skipped() {
        assert_eq!(scan("\r\n  <A>x</A>").unwrap().as_deref(), Some("<A>x</A>"));
    }

    #[test]
    fn surplus_bytes_left_unconsumed() {
        let mut scanner = FrameScanner::new(DEFAULT_MAX_FRAME);
        let input = b"<A>1</A><B>2</B>";
        let (consumed, frame) = scanner.push(input).unwrap();
        assert_eq!(frame.unwrap(), b"<A>1</A>");
        assert_eq!(&input[consumed..], b"<B>2</B>");
    }

    #[test]
    fn split_across_pushes() {
        let mut scanner = FrameScanner::new(DEFAULT_MAX_FRAME);
        let (_, first) = scanner.push(b"<A><B>he").unwrap();
        assert!(first.is_none());
        let (_, second) = scanner.push(b"llo</B></A>").unwrap();
        assert_eq!(second.unwrap(), b"<A><B>hello</B></A>");
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut scanner = FrameScanner::new(32);
        let err = scanner
            .push(b"<A>0123456789012345678901234567890123456789</A>")
            .unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { limit: 32 }));
    }

    #[test]
    fn garbage_outside_frame_rejected() {
        let mut scanner = FrameScanner::new(DEFAULT_MAX_FRAME);
        assert!(scanner.push(b"hello <A></A>").is_err());
    }

    #[test]
    fn unbalanced_closing_tag_rejected() {
        // A frame can't begin with a closing tag.
        let mut scanner = FrameScanner::new(DEFAULT_MAX_FRAME);
        assert!(scanner.push(b"</A>").is_err());
    }

    #[tokio::test]
    async fn frame_reader_buffers_partial_frames() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(client, DEFAULT_MAX_FRAME);

        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            server.write_all(b"<A><B>1</B>").await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            server.write_all(b"</A>\n<A>2</A>\n").await.unwrap();
        });

        assert_eq!(reader.read_frame().await.unwrap(), "<A><B>1</B></A>");
        assert_eq!(reader.read_frame().await.unwrap(), "<A>2</A>");
    }
}
