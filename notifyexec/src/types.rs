//! Event types delivered by the filesystem notification provider.
//!
//! Bit values mirror the inotify constants, which is also what the Windows
//! notification layer exposes, so masks behave the same on every platform.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitset of filesystem event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(u32);

impl EventMask {
    pub const NONE: Self = Self(0);
    pub const ACCESS: Self = Self(0x1);
    pub const MODIFY: Self = Self(0x2);
    pub const ATTRIB: Self = Self(0x4);
    pub const CLOSE_WRITE: Self = Self(0x8);
    pub const CLOSE_NOWRITE: Self = Self(0x10);
    pub const OPEN: Self = Self(0x20);
    pub const MOVED_FROM: Self = Self(0x40);
    pub const MOVED_TO: Self = Self(0x80);
    pub const CREATE: Self = Self(0x100);
    pub const DELETE: Self = Self(0x200);
    pub const DELETE_SELF: Self = Self(0x400);
    pub const MOVE_SELF: Self = Self(0x800);

    pub const CLOSE: Self = Self(Self::CLOSE_WRITE.0 | Self::CLOSE_NOWRITE.0);
    pub const MOVE: Self = Self(Self::MOVED_FROM.0 | Self::MOVED_TO.0);
    pub const ALL_EVENTS: Self = Self(0xfff);

    /// Creates a mask from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if `self` and `other` share at least one bit.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Single-bit kinds in bit order, with the names used in event descriptions.
const KIND_NAMES: &[(EventMask, &str)] = &[
    (EventMask::ACCESS, "FS_ACCESS"),
    (EventMask::MODIFY, "FS_MODIFY"),
    (EventMask::ATTRIB, "FS_ATTRIB"),
    (EventMask::CLOSE_WRITE, "FS_CLOSE_WRITE"),
    (EventMask::CLOSE_NOWRITE, "FS_CLOSE_NOWRITE"),
    (EventMask::OPEN, "FS_OPEN"),
    (EventMask::MOVED_FROM, "FS_MOVED_FROM"),
    (EventMask::MOVED_TO, "FS_MOVED_TO"),
    (EventMask::CREATE, "FS_CREATE"),
    (EventMask::DELETE, "FS_DELETE"),
    (EventMask::DELETE_SELF, "FS_DELETE_SELF"),
    (EventMask::MOVE_SELF, "FS_MOVE_SELF"),
];

impl fmt::Display for EventMask {
    /// Formats as `FS_CREATE|FS_MODIFY`, with any unnamed bits appended in hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut remaining = self.0;
        let mut first = true;

        for (kind, name) in KIND_NAMES {
            if remaining & kind.0 != 0 {
                remaining &= !kind.0;
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        if remaining != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{remaining:#x}")?;
        }

        Ok(())
    }
}

/// A single filesystem change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Correlates the two halves of a move; 0 when the provider has none.
    pub cookie: u32,
    /// Path of the affected entry, relative to the watched directory.
    pub name: String,
    /// Kind(s) of change.
    pub mask: EventMask,
}

impl Event {
    #[must_use]
    pub fn new(cookie: u32, name: impl Into<String>, mask: EventMask) -> Self {
        Self {
            cookie,
            name: name.into(),
            mask,
        }
    }

    /// Human-readable description, e.g. `"a.txt": FS_CREATE`.
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.name, self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_masks_cover_their_parts() {
        assert!(EventMask::CLOSE.contains(EventMask::CLOSE_WRITE));
        assert!(EventMask::CLOSE.contains(EventMask::CLOSE_NOWRITE));
        assert!(EventMask::MOVE.contains(EventMask::MOVED_FROM));
        assert!(EventMask::MOVE.contains(EventMask::MOVED_TO));
        assert!(!EventMask::MOVE.intersects(EventMask::CREATE));
    }

    #[test]
    fn all_events_contains_every_named_kind() {
        for (kind, _) in KIND_NAMES {
            assert!(EventMask::ALL_EVENTS.contains(*kind));
        }
    }

    #[test]
    fn bitor_combines_masks() {
        let mut mask = EventMask::CREATE | EventMask::DELETE;
        assert_eq!(mask.bits(), 0x300);
        mask |= EventMask::MODIFY;
        assert!(mask.contains(EventMask::MODIFY));
    }

    #[test]
    fn mask_display_lists_kinds_in_bit_order() {
        let mask = EventMask::DELETE | EventMask::MODIFY;
        assert_eq!(mask.to_string(), "FS_MODIFY|FS_DELETE");
    }

    #[test]
    fn mask_display_appends_unknown_bits() {
        let mask = EventMask::from_bits(0x100 | 0x4000);
        assert_eq!(mask.to_string(), "FS_CREATE|0x4000");
        assert_eq!(EventMask::from_bits(0x8000).to_string(), "0x8000");
    }

    #[test]
    fn empty_mask_displays_as_empty_string() {
        assert!(EventMask::NONE.is_empty());
        assert_eq!(EventMask::NONE.to_string(), "");
    }

    #[test]
    fn event_description_quotes_name() {
        let event = Event::new(0, "a.txt", EventMask::CREATE);
        assert_eq!(event.description(), "\"a.txt\": FS_CREATE");
    }

    #[test]
    fn event_description_escapes_quotes_in_name() {
        let event = Event::new(7, "say \"hi\".txt", EventMask::MOVED_TO);
        assert_eq!(event.description(), r#""say \"hi\".txt": FS_MOVED_TO"#);
    }
}
