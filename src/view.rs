//! Scoped views: bounded delegation of a reader's byte source.
//!
//! A view grants temporary, exclusive use of a fixed number of bytes of the
//! source, starting at the offset where it was created. While a view is
//! outstanding the issuing [`Reader`](crate::reader::Reader) refuses every
//! other operation; the view in turn re-checks a shared validity cell and
//! the liveness of the source on each call, so a reader that moves on (or is
//! dropped) invalidates the view instead of racing it.
//!
//! [`Adapter`] wraps a [`Handle`] as a sequential [`std::io::Read`] /
//! [`std::io::BufRead`], pulling 64 KiB chunks from the view on demand.

use crate::error::Error;
use std::{
    cell::{Cell, RefCell},
    cmp,
    io::{self, BufRead, Read, Seek, SeekFrom},
    rc::{Rc, Weak},
};

/// Chunk size for [`Adapter`] reads and cross-stream copies.
pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

/// State shared between a reader and the view handle it issued.
#[derive(Debug)]
pub(crate) struct State {
    valid: Cell<bool>,
    remaining: Cell<u32>,
    end: u64,
}

impl State {
    pub(crate) fn new(length: u32, end: u64) -> Self {
        Self {
            valid: Cell::new(true),
            remaining: Cell::new(length),
            end,
        }
    }

    /// Still valid and not yet exhausted.
    pub(crate) fn is_engaged(&self) -> bool {
        self.valid.get() && self.remaining.get() > 0
    }

    pub(crate) fn invalidate(&self) {
        self.valid.set(false);
    }
}

/// Handle to a scoped view of a reader's byte source.
///
/// The handle never reads past the view's declared end, and every operation
/// first verifies that the view is still live. A source I/O failure poisons
/// the view permanently.
pub struct Handle<S> {
    source: Weak<RefCell<S>>,
    state: Rc<State>,
}

impl<S: Read + Seek> Handle<S> {
    pub(crate) fn new(source: Weak<RefCell<S>>, state: Rc<State>) -> Self {
        Self { source, state }
    }

    /// Check liveness and return the source for one operation.
    fn engage(&self) -> Result<Rc<RefCell<S>>, Error> {
        if !self.state.valid.get() {
            return Err(Error::ViewInvalidated);
        }
        self.source.upgrade().ok_or(Error::ViewInvalidated)
    }

    /// Fill `out` from the view, advancing it by `out.len()` bytes. Fails
    /// with [`Error::EndOfStream`] when fewer bytes remain than requested.
    pub fn read(&mut self, out: &mut [u8]) -> Result<(), Error> {
        let source = self.engage()?;
        let len = u32::try_from(out.len())
            .map_err(|_| Error::Invalid("view", "read length exceeds u32"))?;
        let remaining = self.state.remaining.get();
        if len > remaining {
            return Err(Error::EndOfStream);
        }
        let result = match source.borrow_mut().read_exact(out) {
            Ok(()) => {
                self.state.remaining.set(remaining - len);
                Ok(())
            }
            Err(err) => {
                self.state.invalidate();
                Err(Error::from_io(err))
            }
        };
        result
    }

    /// Bytes left to read in the view.
    pub fn remaining(&self) -> Result<u32, Error> {
        self.engage()?;
        Ok(self.state.remaining.get())
    }

    /// Advance past `n` bytes without copying.
    pub fn discard(&mut self, n: u32) -> Result<(), Error> {
        let source = self.engage()?;
        let remaining = self.state.remaining.get();
        if n > remaining {
            return Err(Error::EndOfStream);
        }
        let result = match source.borrow_mut().seek(SeekFrom::Current(i64::from(n))) {
            Ok(_) => {
                self.state.remaining.set(remaining - n);
                Ok(())
            }
            Err(err) => {
                self.state.invalidate();
                Err(Error::Io(err))
            }
        };
        result
    }

    /// Consume the rest of the view, leaving the source positioned exactly
    /// at the view's end and releasing the reader.
    pub fn discard_all(&mut self) -> Result<(), Error> {
        let source = self.engage()?;
        let result = match source.borrow_mut().seek(SeekFrom::Start(self.state.end)) {
            Ok(_) => {
                self.state.remaining.set(0);
                Ok(())
            }
            Err(err) => {
                self.state.invalidate();
                Err(Error::Io(err))
            }
        };
        result
    }

    /// False once the issuing reader has withdrawn the view, the reader no
    /// longer exists, or the source has errored.
    pub fn is_valid(&self) -> bool {
        self.state.valid.get() && self.source.strong_count() > 0
    }
}

/// Sequential [`Read`]/[`BufRead`] adapter over a scoped view.
///
/// Pulls up to [`CHUNK_SIZE`] bytes from the view whenever its buffer runs
/// dry. End-of-view is reported as end-of-input; view invalidation surfaces
/// as an I/O error.
pub struct Adapter<S> {
    handle: Handle<S>,
    chunk: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl<S: Read + Seek> Adapter<S> {
    /// Wrap `handle` for sequential consumption.
    pub fn new(handle: Handle<S>) -> Self {
        Self {
            handle,
            chunk: vec![0u8; CHUNK_SIZE].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }
}

impl<S: Read + Seek> BufRead for Adapter<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos == self.filled {
            let remaining = self.handle.remaining().map_err(io::Error::other)?;
            if remaining == 0 {
                return Ok(&[]);
            }
            let take = cmp::min(CHUNK_SIZE, remaining as usize);
            self.handle
                .read(&mut self.chunk[..take])
                .map_err(io::Error::other)?;
            self.pos = 0;
            self.filled = take;
        }
        Ok(&self.chunk[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = cmp::min(self.pos + amt, self.filled);
    }
}

impl<S: Read + Seek> Read for Adapter<S> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = cmp::min(available.len(), out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}
