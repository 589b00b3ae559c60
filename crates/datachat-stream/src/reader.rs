use crate::error::StreamError;
use futures::{Stream, StreamExt};

pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a chunked byte stream into complete text lines.
///
/// Splitting happens on raw bytes, so a UTF-8 sequence cut across two chunks
/// is whole again before the line is decoded. Blank lines are skipped and a
/// trailing `\r` is removed.
pub struct LineReader<S> {
    inner: S,
    buffer: Vec<u8>,
    max_line_bytes: usize,
    finished: bool,
}

impl<S, B> LineReader<S>
where
    S: Stream<Item = Result<B, StreamError>> + Unpin,
    B: AsRef<[u8]>,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            finished: false,
        }
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    /// Next non-blank line. `None` once the source is exhausted; an `Err` is
    /// always the last item.
    pub async fn next_line(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            match self.take_line() {
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(result) => return Some(result),
                None => {}
            }

            if self.finished {
                return None;
            }

            if self.buffer.len() > self.max_line_bytes {
                return Some(Err(self.fail(StreamError::LineTooLong {
                    limit: self.max_line_bytes,
                })));
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => return Some(Err(self.fail(err))),
                None => {
                    self.finished = true;
                    if !self.buffer.is_empty() {
                        tracing::debug!(
                            bytes = self.buffer.len(),
                            "discarding unterminated trailing line"
                        );
                        self.buffer.clear();
                    }
                    return None;
                }
            }
        }
    }

    pub fn into_lines(self) -> impl Stream<Item = Result<String, StreamError>> {
        futures::stream::unfold(self, |mut reader| async move {
            reader.next_line().await.map(|line| (line, reader))
        })
    }

    fn take_line(&mut self) -> Option<Result<String, StreamError>> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        if pos > self.max_line_bytes {
            return Some(Err(self.fail(StreamError::LineTooLong {
                limit: self.max_line_bytes,
            })));
        }

        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(Ok(String::from_utf8_lossy(&line).into_owned()))
    }

    fn fail(&mut self, err: StreamError) -> StreamError {
        self.finished = true;
        self.buffer.clear();
        err
    }
}
