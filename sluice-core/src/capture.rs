//! Log capture
//!
//! Converts the two byte streams of a running process into an ordered
//! sequence of timestamped [`Line`]s.
//!
//! A [`Log`] hands out one [`LineWriter`] per standard stream. Writers accept
//! arbitrary chunks, buffer partial data per stream and emit a line for every
//! newline they see. [`Log::flush`] emits whatever is left in the buffers once
//! the process has exited, so an unterminated last line is not lost.
//!
//! Appending a line and invoking the line callback happen under one lock, so
//! writers on different threads never interleave inside the sequence or race
//! the callback. Ordering across stdout and stderr is the order in which lines
//! reach the capture point, which is not necessarily the order the process
//! produced them in.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;

use crate::domain::log::{Line, Stream};

type Callback = Box<dyn Fn(&Line) + Send + Sync>;

/// Errors raised when importing or exporting captured lines
///
/// Byte ingestion itself never fails.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to encode log as JSON: {0}")]
    JsonEncode(#[source] serde_json::Error),

    #[error("failed to decode log from JSON: {0}")]
    JsonDecode(#[source] serde_json::Error),

    #[error("failed to encode log as binary: {0}")]
    BinaryEncode(#[source] postcard::Error),

    #[error("failed to decode log from binary: {0}")]
    BinaryDecode(#[source] postcard::Error),
}

struct Inner {
    lines: Mutex<Vec<Line>>,
    callback: Callback,
    out_buf: Mutex<Vec<u8>>,
    err_buf: Mutex<Vec<u8>>,
}

/// Thread-safe, append-only log of captured output lines
///
/// Cloning a `Log` yields another handle to the same sequence.
#[derive(Clone)]
pub struct Log {
    inner: Arc<Inner>,
}

impl Log {
    /// Creates an empty log without a line callback
    pub fn new() -> Self {
        Self::with_callback(|_| {})
    }

    /// Creates an empty log that reports every completed line to `callback`
    ///
    /// The callback runs synchronously, while the log's lock is held, before the
    /// write that completed the line returns. It must not call back into the
    /// same log.
    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(&Line) + Send + Sync + 'static,
    {
        Self::build(Vec::new(), Box::new(callback))
    }

    /// Reconstructs a log from previously captured lines
    pub fn from_lines(lines: Vec<Line>) -> Self {
        Self::build(lines, Box::new(|_| {}))
    }

    fn build(lines: Vec<Line>, callback: Callback) -> Self {
        Self {
            inner: Arc::new(Inner {
                lines: Mutex::new(lines),
                callback,
                out_buf: Mutex::new(Vec::new()),
                err_buf: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Writer collecting lines written to stdout
    pub fn stdout(&self) -> LineWriter {
        self.writer(Stream::Out)
    }

    /// Writer collecting lines written to stderr
    pub fn stderr(&self) -> LineWriter {
        self.writer(Stream::Err)
    }

    pub fn writer(&self, stream: Stream) -> LineWriter {
        LineWriter {
            log: self.clone(),
            stream,
        }
    }

    /// Emits incomplete lines still buffered by the stderr and stdout writers
    pub fn flush(&self) {
        for stream in [Stream::Err, Stream::Out] {
            let mut buf = lock(self.buffer(stream));
            if !buf.is_empty() {
                let text = String::from_utf8_lossy(&buf).into_owned();
                buf.clear();
                self.emit(stream, text);
            }
        }
    }

    /// All lines captured so far, in capture order
    pub fn lines(&self) -> Vec<Line> {
        lock(&self.inner.lines).clone()
    }

    /// Lines captured after the first `skip` ones
    ///
    /// Useful for polling consumers that remember how much they have seen.
    /// Skipping past the end yields an empty list.
    pub fn lines_after(&self, skip: usize) -> Vec<Line> {
        let lines = lock(&self.inner.lines);
        lines.get(skip..).map(<[Line]>::to_vec).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.lines).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON representation of the lines, skipping the first `skip` ones
    pub fn to_json(&self, skip: usize) -> Result<String, LogError> {
        serde_json::to_string(&self.lines_after(skip)).map_err(LogError::JsonEncode)
    }

    /// Rebuilds a log from the output of [`Log::to_json`]
    pub fn from_json(json: &str) -> Result<Self, LogError> {
        let lines: Vec<Line> = serde_json::from_str(json).map_err(LogError::JsonDecode)?;
        Ok(Self::from_lines(lines))
    }

    /// Compact binary representation of all lines
    pub fn to_bytes(&self) -> Result<Vec<u8>, LogError> {
        postcard::to_stdvec(&*lock(&self.inner.lines)).map_err(LogError::BinaryEncode)
    }

    /// Rebuilds a log from the output of [`Log::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LogError> {
        let lines: Vec<Line> = postcard::from_bytes(bytes).map_err(LogError::BinaryDecode)?;
        Ok(Self::from_lines(lines))
    }

    fn buffer(&self, stream: Stream) -> &Mutex<Vec<u8>> {
        match stream {
            Stream::Out => &self.inner.out_buf,
            Stream::Err => &self.inner.err_buf,
        }
    }

    fn ingest(&self, stream: Stream, bytes: &[u8]) {
        let mut buf = lock(self.buffer(stream));
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            buf.extend_from_slice(&rest[..pos]);
            let text = String::from_utf8_lossy(&buf).into_owned();
            buf.clear();
            self.emit(stream, text);
            rest = &rest[pos + 1..];
        }

        buf.extend_from_slice(rest);
    }

    fn emit(&self, stream: Stream, text: String) {
        let mut lines = lock(&self.inner.lines);
        let line = Line {
            stream,
            timestamp: Utc::now(),
            text,
        };
        lines.push(line);
        if let Some(line) = lines.last() {
            (self.inner.callback)(line);
        }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log").field("lines", &self.len()).finish()
    }
}

/// Write sink for one standard stream of a [`Log`]
///
/// `write` never fails and always consumes the whole chunk. `flush` from
/// [`io::Write`] is a no-op; incomplete lines are only emitted by [`Log::flush`].
#[derive(Clone)]
pub struct LineWriter {
    log: Log,
    stream: Stream,
}

impl LineWriter {
    pub fn stream(&self) -> Stream {
        self.stream
    }
}

impl io::Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.ingest(self.stream, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for LineWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineWriter")
            .field("stream", &self.stream)
            .finish()
    }
}

// A panicking callback must not take the log down with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use std::thread;

    fn texts(log: &Log) -> Vec<String> {
        log.lines().into_iter().map(|l| l.text).collect()
    }

    #[test]
    fn test_splits_chunks_into_lines() {
        let log = Log::new();
        let mut out = log.stdout();

        out.write_all(b"hel").unwrap();
        assert!(log.is_empty());

        out.write_all(b"lo\nwor").unwrap();
        out.write_all(b"ld\n").unwrap();

        assert_eq!(texts(&log), vec!["hello", "world"]);
        assert!(log.lines().iter().all(|l| l.stream == Stream::Out));
    }

    #[test]
    fn test_flush_emits_unterminated_line() {
        let log = Log::new();
        log.stderr().write_all(b"a\n\nb").unwrap();
        assert_eq!(texts(&log), vec!["a", ""]);

        log.flush();
        assert_eq!(texts(&log), vec!["a", "", "b"]);

        // Nothing left to emit
        log.flush();
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_terminated_input_emits_nothing_on_flush() {
        let log = Log::new();
        log.stdout().write_all(b"one\ntwo\n").unwrap();
        log.flush();
        assert_eq!(texts(&log), vec!["one", "two"]);
    }

    #[test]
    fn test_empty_input() {
        let log = Log::new();
        log.stdout().write_all(b"").unwrap();
        log.flush();
        assert!(log.is_empty());
    }

    #[test]
    fn test_streams_buffer_independently() {
        let log = Log::new();
        let mut out = log.stdout();
        let mut err = log.stderr();

        out.write_all(b"out-").unwrap();
        err.write_all(b"err line\n").unwrap();
        out.write_all(b"line\n").unwrap();

        let lines = log.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].stream, Stream::Err);
        assert_eq!(lines[0].text, "err line");
        assert_eq!(lines[1].stream, Stream::Out);
        assert_eq!(lines[1].text, "out-line");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let log = Log::new();
        log.stdout().write_all(b"ok \xff\xfe done\n").unwrap();
        assert_eq!(texts(&log), vec!["ok \u{fffd}\u{fffd} done"]);
    }

    #[test]
    fn test_callback_sees_lines_before_write_returns() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let log = Log::with_callback(move |line| {
            sink.lock().unwrap().push(format!("{}: {}", line.stream, line.text));
        });

        log.stdout().write_all(b"first\n").unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        log.stderr().write_all(b"second\nthird").unwrap();
        log.flush();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["stdout: first", "stderr: second", "stderr: third"]
        );
    }

    #[test]
    fn test_concurrent_writers_keep_per_stream_order() {
        let log = Log::new();
        let per_stream = 500;

        let handles: Vec<_> = [Stream::Out, Stream::Err]
            .into_iter()
            .map(|stream| {
                let mut writer = log.writer(stream);
                thread::spawn(move || {
                    for i in 0..per_stream {
                        writeln!(writer, "{}-{}", stream, i).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lines = log.lines();
        assert_eq!(lines.len(), per_stream * 2);

        for stream in [Stream::Out, Stream::Err] {
            let texts: Vec<&str> = lines
                .iter()
                .filter(|l| l.stream == stream)
                .map(|l| l.text.as_str())
                .collect();
            let expected: Vec<String> =
                (0..per_stream).map(|i| format!("{}-{}", stream, i)).collect();
            assert_eq!(texts, expected);
        }
    }

    #[test]
    fn test_lines_after() {
        let log = Log::new();
        log.stdout().write_all(b"1\n2\n3\n").unwrap();

        let tail: Vec<String> = log.lines_after(1).into_iter().map(|l| l.text).collect();
        assert_eq!(tail, vec!["2", "3"]);
        assert!(log.lines_after(3).is_empty());
        assert!(log.lines_after(10).is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let log = Log::new();
        log.stdout().write_all(b"hello\n").unwrap();
        log.stderr().write_all(b"oops\n").unwrap();

        let json = log.to_json(0).unwrap();
        assert!(json.contains("\"stream\":\"stdout\""));
        assert!(json.contains("\"stream\":\"stderr\""));

        let restored = Log::from_json(&json).unwrap();
        assert_eq!(restored.lines(), log.lines());
    }

    #[test]
    fn test_json_skip() {
        let log = Log::new();
        log.stdout().write_all(b"a\nb\n").unwrap();

        let restored = Log::from_json(&log.to_json(1).unwrap()).unwrap();
        assert_eq!(texts(&restored), vec!["b"]);
    }

    #[test]
    fn test_binary_round_trip() {
        let log = Log::new();
        log.stdout().write_all(b"line one\n").unwrap();
        log.stderr().write_all(b"line two").unwrap();
        log.flush();

        let bytes = log.to_bytes().unwrap();
        let restored = Log::from_bytes(&bytes).unwrap();
        assert_eq!(restored.lines(), log.lines());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Log::from_json("{not json"),
            Err(LogError::JsonDecode(_))
        ));
        assert!(matches!(
            Log::from_bytes(&[0x05, 0x01]),
            Err(LogError::BinaryDecode(_))
        ));
    }

    #[test]
    fn test_restored_log_accepts_more_output() {
        let log = Log::from_lines(vec![Line::new(Stream::Out, "old")]);
        log.stdout().write_all(b"new\n").unwrap();
        assert_eq!(texts(&log), vec!["old", "new"]);
    }

    fn arb_output() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(prop_oneof![Just(b'\n'), any::<u8>()], 0..200)
    }

    /// Lines a byte stream must produce, whatever the chunking
    fn expected_lines(bytes: &[u8]) -> Vec<String> {
        let mut segments: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
        let tail = segments.pop().unwrap_or_default();
        if !tail.is_empty() {
            segments.push(tail);
        }
        segments
            .into_iter()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect()
    }

    proptest! {
        #[test]
        fn test_lines_do_not_depend_on_chunking(
            bytes in arb_output(),
            cuts in proptest::collection::vec(any::<usize>(), 0..8)
        ) {
            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
            cuts.push(bytes.len());
            cuts.sort_unstable();

            let log = Log::new();
            let mut out = log.stdout();
            let mut start = 0;
            for cut in cuts {
                out.write_all(&bytes[start..cut]).unwrap();
                start = cut;
            }
            log.flush();

            let newlines = bytes.iter().filter(|&&b| b == b'\n').count();
            let tail = bytes.iter().rev().take_while(|&&b| b != b'\n').count();
            prop_assert_eq!(log.len(), newlines + usize::from(tail > 0));
            prop_assert_eq!(texts(&log), expected_lines(&bytes));
        }

        #[test]
        fn test_exports_round_trip(out in arb_output(), err in arb_output()) {
            let log = Log::new();
            log.stdout().write_all(&out).unwrap();
            log.stderr().write_all(&err).unwrap();
            log.flush();

            let from_bytes = Log::from_bytes(&log.to_bytes().unwrap()).unwrap();
            prop_assert_eq!(from_bytes.lines(), log.lines());

            let from_json = Log::from_json(&log.to_json(0).unwrap()).unwrap();
            prop_assert_eq!(from_json.lines(), log.lines());
        }
    }
}
