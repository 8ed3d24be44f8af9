//! `Read`/`Write` handles returned by `exec_pipe`: a non-blocking start
//! that hands the caller handles to drain at its own pace, backed by an
//! mpsc bridge to the worker thread actually driving the `ssh2::Channel`.

use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, Sender};

pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

impl PipeWriter {
    pub(crate) fn new(tx: Sender<Vec<u8>>) -> Self {
        PipeWriter { tx }
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "exec_pipe bridge thread exited"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct PipeReader {
    rx: Receiver<io::Result<Vec<u8>>>,
    buf: Vec<u8>,
    pos: usize,
}

impl PipeReader {
    pub(crate) fn new(rx: Receiver<io::Result<Vec<u8>>>) -> Self {
        PipeReader {
            rx,
            buf: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buf.len() {
            match self.rx.recv() {
                Ok(Ok(chunk)) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => return Err(e),
                // Bridge thread exited: end of stream.
                Err(_) => return Ok(0),
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

pub struct PipeHandles {
    pub stdin: PipeWriter,
    pub stdout: PipeReader,
    pub stderr: PipeReader,
}
