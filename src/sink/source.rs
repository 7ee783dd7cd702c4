//! Byte sources for bulk transfer.
//!
//! A [`BodySource`] is a reader that can optionally reveal two things about
//! itself: that it is a file (which enables the sink's native fast path) and
//! that it can push its own bytes into a writer.

use std::fs::File;
use std::io::{self, Cursor, Read, Take, Write};

/// A reader handed to a bulk transfer.
pub trait BodySource: Read {
    /// The file behind this source, if it is one.
    fn as_file(&self) -> Option<&File> {
        None
    }

    /// Whether this source is a regular file.
    ///
    /// `None` means the source is not a file at all. The default stats the
    /// file returned by [`as_file`](BodySource::as_file).
    fn is_regular(&self) -> Option<io::Result<bool>> {
        self.as_file()
            .map(|file| file.metadata().map(|meta| meta.is_file()))
    }

    /// The source under a bounded view such as [`io::Take`].
    fn bounded_inner(&self) -> Option<&dyn BodySource> {
        None
    }

    /// Push all remaining bytes into `dst`.
    ///
    /// Returns `None` when the source cannot drive the transfer itself.
    fn write_to(&mut self, _dst: &mut dyn Write) -> Option<io::Result<u64>> {
        None
    }
}

impl BodySource for File {
    fn as_file(&self) -> Option<&File> {
        Some(self)
    }
}

impl<R: BodySource> BodySource for Take<R> {
    fn bounded_inner(&self) -> Option<&dyn BodySource> {
        Some(self.get_ref())
    }
}

impl<R: BodySource + ?Sized> BodySource for &mut R {
    fn as_file(&self) -> Option<&File> {
        (**self).as_file()
    }

    fn is_regular(&self) -> Option<io::Result<bool>> {
        (**self).is_regular()
    }

    fn bounded_inner(&self) -> Option<&dyn BodySource> {
        (**self).bounded_inner()
    }

    fn write_to(&mut self, dst: &mut dyn Write) -> Option<io::Result<u64>> {
        (**self).write_to(dst)
    }
}

impl BodySource for &[u8] {
    fn write_to(&mut self, dst: &mut dyn Write) -> Option<io::Result<u64>> {
        let mut written = 0u64;
        let mut data: &[u8] = *self;
        while !data.is_empty() {
            match dst.write(data) {
                Ok(0) => return Some(Err(io::ErrorKind::WriteZero.into())),
                Ok(n) => {
                    data = &data[n..];
                    *self = data;
                    written += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Some(Err(e)),
            }
        }
        Some(Ok(written))
    }
}

impl<T: AsRef<[u8]>> BodySource for Cursor<T> {
    fn write_to(&mut self, dst: &mut dyn Write) -> Option<io::Result<u64>> {
        let mut written = 0u64;
        loop {
            let pos = self.position().min(self.get_ref().as_ref().len() as u64);
            let remaining = &self.get_ref().as_ref()[pos as usize..];
            if remaining.is_empty() {
                return Some(Ok(written));
            }
            match dst.write(remaining) {
                Ok(0) => return Some(Err(io::ErrorKind::WriteZero.into())),
                Ok(n) => {
                    self.set_position(pos + n as u64);
                    written += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Hides the identity of the wrapped reader.
///
/// An `Opaque` source is never classified as a file and never drives its
/// own transfer, so every byte passes through the write path:
///
/// ```ignore
/// response_hook::sink::copy(w, &mut Opaque(file))?;
/// ```
#[derive(Debug)]
pub struct Opaque<R>(pub R);

impl<R: Read> Read for Opaque<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read> BodySource for Opaque<R> {}

/// Whether `src` is a regular file, looking through any number of bounded
/// views.
///
/// A failed stat is returned as is.
pub fn is_regular_file(src: &dyn BodySource) -> io::Result<bool> {
    let mut current = src;
    loop {
        if let Some(result) = current.is_regular() {
            return result;
        }
        match current.bounded_inner() {
            Some(inner) => current = inner,
            None => return Ok(false),
        }
    }
}
