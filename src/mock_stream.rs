use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::sync::{Arc, Mutex};

/// An in-memory IMAP peer: reads replay a canned server transcript, writes are recorded.
///
/// Once the transcript is exhausted reads fail with `ConnectionReset`, which is how a server
/// dropping the connection mid-response looks to the client.
pub(crate) struct MockStream {
    transcript: Vec<u8>,
    pos: usize,
    trickle: bool,
    written: CommandLog,
}

/// Shared view of everything the client wrote to a [`MockStream`].
#[derive(Clone, Default)]
pub(crate) struct CommandLog(Arc<Mutex<Vec<u8>>>);

impl CommandLog {
    /// The written bytes split into command lines, without line endings.
    pub(crate) fn commands(&self) -> Vec<String> {
        let written = self.0.lock().unwrap();
        String::from_utf8_lossy(&written)
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl MockStream {
    pub(crate) fn new(transcript: impl Into<Vec<u8>>) -> MockStream {
        MockStream {
            transcript: transcript.into(),
            pos: 0,
            trickle: false,
            written: CommandLog::default(),
        }
    }

    /// Hand out one byte per read, so responses arrive split at every possible point.
    pub(crate) fn trickle(mut self) -> MockStream {
        self.trickle = true;
        self
    }

    pub(crate) fn log(&self) -> CommandLog {
        self.written.clone()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = &self.transcript[self.pos..];
        if remaining.is_empty() {
            return Err(Error::new(ErrorKind::ConnectionReset, "peer went away"));
        }
        let mut n = min(buf.len(), remaining.len());
        if self.trickle {
            n = min(n, 1);
        }
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.written.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
