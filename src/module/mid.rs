//! Module identity: kinds, IDs, and the serial-number source.
//!
//! A module ID renders as `<letter><serial>` with an optional `|<addr>`
//! suffix, e.g. `D1`, `A42|127.0.0.1:8000`. The letter encodes the module
//! kind, the serial comes from a [`SerialGen`], and the address names the
//! network location of a remote module (absent for in-process modules).

use crate::error::{CrawlError, CrawlResult};
use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// The three module kinds the engine schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Downloader,
    Analyzer,
    Pipeline,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 3] = [
        ModuleKind::Downloader,
        ModuleKind::Analyzer,
        ModuleKind::Pipeline,
    ];

    /// The MID letter of this kind.
    pub fn letter(self) -> char {
        match self {
            ModuleKind::Downloader => 'D',
            ModuleKind::Analyzer => 'A',
            ModuleKind::Pipeline => 'P',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'D' => Some(ModuleKind::Downloader),
            'A' => Some(ModuleKind::Analyzer),
            'P' => Some(ModuleKind::Pipeline),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleKind::Downloader => "downloader",
            ModuleKind::Analyzer => "analyzer",
            ModuleKind::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// A module identifier, fixed at module construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mid {
    kind: ModuleKind,
    serial: u64,
    addr: Option<SocketAddr>,
}

impl Mid {
    pub fn new(kind: ModuleKind, serial: u64, addr: Option<SocketAddr>) -> Self {
        Self { kind, serial, addr }
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }
}

impl fmt::Display for Mid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.letter(), self.serial)?;
        if let Some(addr) = self.addr {
            write!(f, "|{addr}")?;
        }
        Ok(())
    }
}

impl FromStr for Mid {
    type Err = CrawlError;

    fn from_str(s: &str) -> CrawlResult<Self> {
        let mut chars = s.chars();
        let letter = chars
            .next()
            .ok_or_else(|| CrawlError::illegal("empty module ID"))?;
        let kind = ModuleKind::from_letter(letter)
            .ok_or_else(|| CrawlError::illegal(format!("illegal module type letter in ID {s:?}")))?;

        let rest = &s[letter.len_utf8()..];
        let (serial_part, addr_part) = match rest.split_once('|') {
            Some((serial, addr)) => (serial, Some(addr)),
            None => (rest, None),
        };

        let serial: u64 = serial_part
            .parse()
            .map_err(|_| CrawlError::illegal(format!("illegal serial number in ID {s:?}")))?;

        let addr = match addr_part {
            None | Some("") => None,
            Some(a) => Some(
                a.parse::<SocketAddr>()
                    .map_err(|_| CrawlError::illegal(format!("illegal address in ID {s:?}")))?,
            ),
        };

        Ok(Mid::new(kind, serial, addr))
    }
}

/// A cycling serial-number source shared by module factories.
///
/// Serials run from `start` to `max` inclusive; past `max` the generator
/// wraps back to `start` and bumps the cycle count. A `max` of zero means
/// `u64::MAX`.
#[derive(Debug)]
pub struct SerialGen {
    start: u64,
    max: u64,
    state: Mutex<SerialState>,
}

#[derive(Debug)]
struct SerialState {
    next: u64,
    cycle_count: u64,
}

impl SerialGen {
    pub fn new(start: u64, max: u64) -> Self {
        let max = if max == 0 { u64::MAX } else { max };
        Self {
            start,
            max,
            state: Mutex::new(SerialState {
                next: start,
                cycle_count: 0,
            }),
        }
    }

    /// The lowest serial this generator produces.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// The highest serial before wrapping.
    pub fn max(&self) -> u64 {
        self.max
    }

    /// The serial the next [`get`](Self::get) will return.
    pub fn next(&self) -> u64 {
        self.state.lock().next
    }

    /// How many times the generator has wrapped.
    pub fn cycle_count(&self) -> u64 {
        self.state.lock().cycle_count
    }

    /// Returns the current serial and advances, wrapping at `max`.
    pub fn get(&self) -> u64 {
        let mut state = self.state.lock();
        let serial = state.next;
        if state.next >= self.max {
            state.next = self.start;
            state.cycle_count += 1;
        } else {
            state.next += 1;
        }
        serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_round_trips_without_address() {
        let mid = Mid::new(ModuleKind::Downloader, 12, None);
        let text = mid.to_string();
        assert_eq!(text, "D12");
        assert_eq!(text.parse::<Mid>().unwrap(), mid);
    }

    #[test]
    fn mid_round_trips_with_address() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let mid = Mid::new(ModuleKind::Pipeline, 3, Some(addr));
        let text = mid.to_string();
        assert_eq!(text, "P3|127.0.0.1:8080");
        assert_eq!(text.parse::<Mid>().unwrap(), mid);
    }

    #[test]
    fn mid_rejects_malformed_input() {
        assert!("".parse::<Mid>().is_err());
        assert!("X1".parse::<Mid>().is_err());
        assert!("D".parse::<Mid>().is_err());
        assert!("Dabc".parse::<Mid>().is_err());
        assert!("D1|not-an-addr".parse::<Mid>().is_err());
    }

    #[test]
    fn mid_tolerates_empty_address_part() {
        let mid = "A5|".parse::<Mid>().unwrap();
        assert_eq!(mid.kind(), ModuleKind::Analyzer);
        assert_eq!(mid.serial(), 5);
        assert!(mid.addr().is_none());
    }

    #[test]
    fn serial_gen_counts_up_and_wraps() {
        let gen = SerialGen::new(1, 3);
        assert_eq!(gen.get(), 1);
        assert_eq!(gen.get(), 2);
        assert_eq!(gen.next(), 3);
        assert_eq!(gen.get(), 3);
        // Wrapped.
        assert_eq!(gen.get(), 1);
        assert_eq!(gen.cycle_count(), 1);
    }

    #[test]
    fn serial_gen_zero_max_means_unbounded() {
        let gen = SerialGen::new(1, 0);
        assert_eq!(gen.max(), u64::MAX);
        assert_eq!(gen.get(), 1);
        assert_eq!(gen.get(), 2);
        assert_eq!(gen.cycle_count(), 0);
    }
}
