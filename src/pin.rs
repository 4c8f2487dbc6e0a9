use crate::errors::{Error, Result};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A PIN, as sent in a VERIFY body: one byte per character.
///
/// The card enforces its own policy (the profile PIN is 4 digits), so nothing is checked
/// here beyond the encoding. An empty PIN is never sent: a VERIFY without a body only
/// queries the retry counter. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Pin(Vec<u8>);

impl Pin {
    /// Maps each character to its ASCII code point.
    pub fn from_ascii(pin: &str) -> Result<Self> {
        if pin.is_empty() {
            return Err(Error::EmptyPin);
        }
        if !pin.is_ascii() {
            return Err(Error::NonAsciiPin);
        }
        Ok(Self(pin.as_bytes().to_vec()))
    }

    /// Takes raw bytes verbatim.
    pub fn from_bytes(pin: Vec<u8>) -> Self {
        Self(pin)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pin({})", "*".repeat(self.0.len()))
    }
}
