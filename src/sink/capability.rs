//! Optional sink capabilities.
//!
//! A sink may implement any subset of the five capabilities below. The set a
//! sink offers is summarised as a 5-bit [`Capabilities`] mask.

use std::fmt;
use std::io;

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use tokio::sync::watch;

use super::source::BodySource;
use super::ResponseSink;

/// A single optional capability.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CloseNotify = 1 << 0,
    Flush = 1 << 1,
    Hijack = 1 << 2,
    Push = 1 << 3,
    ReadFrom = 1 << 4,
}

impl Capability {
    /// Every capability, in bit order.
    pub const ALL: [Capability; 5] = [
        Capability::CloseNotify,
        Capability::Flush,
        Capability::Hijack,
        Capability::Push,
        Capability::ReadFrom,
    ];

    pub fn bit(self) -> u8 {
        self as u8
    }
}

/// Set of capabilities, one bit per [`Capability`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const ALL: Capabilities = Capabilities(0b1_1111);

    /// Probe a sink for each capability.
    pub fn of(sink: &dyn ResponseSink) -> Self {
        let mut caps = Self::NONE;
        if sink.as_close_notifier().is_some() {
            caps = caps.with(Capability::CloseNotify);
        }
        if sink.as_flusher().is_some() {
            caps = caps.with(Capability::Flush);
        }
        if sink.as_hijacker().is_some() {
            caps = caps.with(Capability::Hijack);
        }
        if sink.as_pusher().is_some() {
            caps = caps.with(Capability::Push);
        }
        if sink.as_reader_from().is_some() {
            caps = caps.with(Capability::ReadFrom);
        }
        caps
    }

    /// Build a set from raw bits; bits above the fifth are ignored.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Capabilities::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Push bytes buffered by the transport to the client now.
pub trait Flusher: Send + Sync {
    fn flush(&self) -> io::Result<()>;
}

/// Anything usable as a raw, taken-over connection.
pub trait Connection: io::Read + io::Write + Send {}

impl<T: io::Read + io::Write + Send> Connection for T {}

/// A connection released from HTTP handling.
pub struct Hijacked {
    /// The raw connection; the caller now owns its lifecycle.
    pub conn: Box<dyn Connection>,
    /// Bytes the transport had already read from the connection.
    pub read_buf: Bytes,
}

impl fmt::Debug for Hijacked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hijacked")
            .field("read_buf", &self.read_buf.len())
            .finish_non_exhaustive()
    }
}

/// Relinquish the underlying connection, e.g. for a protocol upgrade.
pub trait Hijacker: Send + Sync {
    fn hijack(&self) -> io::Result<Hijacked>;
}

/// Options for a server push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Method of the promised request; transports default to GET.
    pub method: Option<Method>,
    /// Extra headers for the promised request.
    pub headers: HeaderMap,
}

/// Initiate a server push of `target`.
pub trait Pusher: Send + Sync {
    fn push(&self, target: &str, opts: Option<&PushOptions>) -> io::Result<()>;
}

/// Native bulk transfer from a byte source.
pub trait ReaderFrom: Send + Sync {
    fn read_from(&self, src: &mut dyn BodySource) -> io::Result<u64>;
}

/// Legacy client-disconnect notification.
///
/// The receiver observes `true` once the client has gone away.
pub trait CloseNotifier: Send + Sync {
    fn close_notify(&self) -> watch::Receiver<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_distinct() {
        let all: Capabilities = Capability::ALL.into_iter().collect();
        assert_eq!(all, Capabilities::ALL);
        assert_eq!(all.iter().count(), 5);
    }

    #[test]
    fn from_bits_masks_unknown_bits() {
        let caps = Capabilities::from_bits(0xff);
        assert_eq!(caps, Capabilities::ALL);
        assert!(Capabilities::from_bits(0b10_0000).is_empty());
    }

    #[test]
    fn contains_matches_with() {
        let caps = Capabilities::NONE
            .with(Capability::Flush)
            .with(Capability::ReadFrom);
        assert!(caps.contains(Capability::Flush));
        assert!(caps.contains(Capability::ReadFrom));
        assert!(!caps.contains(Capability::Push));
        assert_eq!(format!("{:?}", caps), "{Flush, ReadFrom}");
    }
}
