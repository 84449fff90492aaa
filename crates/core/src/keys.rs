use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::InputError;

/// A virtual-key code (Win32 VK numbering, also used by the stub backend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub u16);

impl Key {
    pub const F1: Key = Key(0x70);
    pub const F12: Key = Key(0x7B);

    pub fn code(self) -> u16 {
        self.0
    }

    pub fn class(self) -> KeyClass {
        match self.0 {
            0x70..=0x7B => KeyClass::Ability,
            0x30..=0x39 => KeyClass::Item,
            _ => KeyClass::Other,
        }
    }
}

impl FromStr for Key {
    type Err = InputError;

    /// Accepts `F1`..`F12`, single digits and letters, a few named keys, or `0x..` hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let upper = name.to_ascii_uppercase();
        let unknown = || InputError::UnknownKey(name.to_string());

        if let Some(hex) = upper.strip_prefix("0X") {
            return u16::from_str_radix(hex, 16).map(Key).map_err(|_| unknown());
        }
        if let Some(n) = upper.strip_prefix('F') {
            if !n.is_empty() {
                let n: u16 = n.parse().map_err(|_| unknown())?;
                if (1..=12).contains(&n) {
                    return Ok(Key(0x70 + n - 1));
                }
                return Err(unknown());
            }
        }
        let mut chars = upper.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_digit() || c.is_ascii_uppercase() {
                return Ok(Key(c as u16));
            }
        }
        match upper.as_str() {
            "SPACE" => Ok(Key(0x20)),
            "ENTER" | "RETURN" => Ok(Key(0x0D)),
            "TAB" => Ok(Key(0x09)),
            "ESC" | "ESCAPE" => Ok(Key(0x1B)),
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0x70..=0x7B => write!(f, "F{}", self.0 - 0x70 + 1),
            0x30..=0x39 | 0x41..=0x5A => write!(f, "{}", self.0 as u8 as char),
            0x20 => write!(f, "SPACE"),
            0x0D => write!(f, "ENTER"),
            0x09 => write!(f, "TAB"),
            0x1B => write!(f, "ESC"),
            code => write!(f, "0x{:02X}", code),
        }
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Key families the target application treats differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// Function keys, bound to primary abilities.
    Ability,
    /// Number row, bound to item slots.
    Item,
    Other,
}

/// Delivery mechanism for a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Every descendant window, then the top-level window, waiting for each.
    SyncBroadcast,
    /// Same window set, posted without waiting.
    AsyncBroadcast,
    /// Top-level window only, waiting for acknowledgment.
    TopLevelSync,
}

/// Per-class routing table handed to an input sink at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRouting {
    table: [(KeyClass, Channel); 3],
}

impl KeyRouting {
    pub fn standard() -> Self {
        Self {
            table: [
                (KeyClass::Ability, Channel::SyncBroadcast),
                (KeyClass::Item, Channel::AsyncBroadcast),
                (KeyClass::Other, Channel::TopLevelSync),
            ],
        }
    }

    pub fn route(&self, key: Key) -> Channel {
        let class = key.class();
        self.table
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, ch)| *ch)
            .unwrap_or(Channel::TopLevelSync)
    }
}

impl Default for KeyRouting {
    fn default() -> Self {
        Self::standard()
    }
}
