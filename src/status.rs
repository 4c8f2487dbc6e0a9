//! Status word interpretation.
//!
//! Every R-APDU ends in two status bytes, SW1 and SW2. 0x9000 is the only success code
//! we accept; the rest of the ISO 7816-4 table (section 5.6) is only used for diagnostics.

use std::borrow::Cow;
use std::fmt;

/// A raw status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(pub u8, pub u8);

impl StatusWord {
    pub const OK: Self = Self(0x90, 0x00);

    pub fn sw1(&self) -> u8 {
        self.0
    }

    pub fn sw2(&self) -> u8 {
        self.1
    }

    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    /// Classifies the status word.
    pub fn outcome(&self) -> StatusOutcome {
        match (self.0, self.1) {
            (0x90, 0x00) => StatusOutcome::Success,
            (0x63, x @ 0xC0..=0xCF) => StatusOutcome::AuthenticationFailed {
                retries: Some(x & 0x0F),
            },
            (0x63, 0x00) => StatusOutcome::AuthenticationFailed { retries: None },
            (0x69, 0x83) => StatusOutcome::AuthenticationFailed { retries: Some(0) },
            (0x6A, 0x82) => StatusOutcome::FileNotFound,
            (0x67, _) | (0x6C, _) => StatusOutcome::WrongLength,
            (sw1, sw2) => StatusOutcome::Other(sw1, sw2),
        }
    }

    /// Human-readable diagnosis, for operators.
    pub fn describe(&self) -> Cow<'static, str> {
        Cow::Borrowed(match (self.0, self.1) {
            (0x90, 0x00) => "OK",
            (0x61, x) => return format!("OK, {} byte(s) remaining", x).into(),
            // Warning - "State of non-volatile memory is unchanged"
            (0x62, 0x00) => "warning: no information given",
            (0x62, 0x81) => "warning: part of returned data may be corrupted",
            (0x62, 0x82) => "warning: end of file reached before reading Le bytes",
            (0x62, 0x83) => "warning: selected file deactivated",
            (0x62, 0x84) => "warning: file control information not formatted per ISO 7816-4",
            (0x62, 0x85) => "warning: selected file in termination state",
            (0x62, 0x86) => "warning: no input data available from a sensor on the card",
            // Warning - "State of non-volatile memory may have changed"
            (0x63, 0x00) => "authentication failed",
            (0x63, 0x81) => "warning: file filled up by the last write",
            (0x63, x @ 0xC0..=0xCF) => {
                return format!("authentication failed, {} attempt(s) left", x & 0x0F).into()
            }
            // Execution errors
            (0x64, 0x00) => "execution error: memory unchanged",
            (0x64, 0x01) => "execution error: immediate response required by the card",
            (0x65, 0x00) => "execution error: memory changed",
            (0x65, 0x81) => "execution error: memory failure",
            // Checking errors
            (0x67, 0x00) => "wrong length",
            (0x67, _) => "wrong length (Lc or Le)",
            (0x68, 0x00) => "functions in CLA not supported",
            (0x68, 0x81) => "logical channel not supported",
            (0x68, 0x82) => "secure messaging not supported",
            (0x68, 0x83) => "last command of the chain expected",
            (0x68, 0x84) => "command chaining not supported",
            (0x69, 0x00) => "command not allowed",
            (0x69, 0x81) => "command incompatible with file structure",
            (0x69, 0x82) => "security status not satisfied",
            (0x69, 0x83) => "authentication method blocked",
            (0x69, 0x84) => "reference data not usable",
            (0x69, 0x85) => "conditions of use not satisfied",
            (0x69, 0x86) => "command not allowed (no current EF)",
            (0x69, 0x87) => "expected secure messaging data objects missing",
            (0x69, 0x88) => "incorrect secure messaging data objects",
            (0x6A, 0x00) => "wrong parameters P1-P2",
            (0x6A, 0x80) => "incorrect parameters in the command data field",
            (0x6A, 0x81) => "function not supported",
            (0x6A, 0x82) => "file not found",
            (0x6A, 0x83) => "record not found",
            (0x6A, 0x84) => "not enough memory space in the file",
            (0x6A, 0x86) => "incorrect parameters P1-P2",
            (0x6A, 0x88) => "referenced data not found",
            (0x6B, 0x00) => "wrong parameters P1-P2 (offset outside the EF)",
            (0x6C, x) => return format!("wrong Le, exact length is {}", x).into(),
            (0x6D, 0x00) => "instruction not supported or invalid",
            (0x6E, 0x00) => "class not supported",
            (0x6F, 0x00) => "no precise diagnosis",
            (sw1, sw2) => return format!("unknown status {:02X}{:02X}", sw1, sw2).into(),
        })
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self(sw1, sw2)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.0, self.1)
    }
}

/// What a status word means for the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Success,
    /// 0x6300, 0x63CX (X retries left), or 0x6983 (blocked, zero retries left).
    AuthenticationFailed { retries: Option<u8> },
    /// 0x6A82.
    FileNotFound,
    /// 0x67XX, 0x6CXX.
    WrongLength,
    Other(u8, u8),
}

impl StatusOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for StatusOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::AuthenticationFailed { retries: None } => write!(f, "authentication failed"),
            Self::AuthenticationFailed { retries: Some(n) } => {
                write!(f, "authentication failed, {} attempt(s) left", n)
            }
            Self::FileNotFound => write!(f, "file not found"),
            Self::WrongLength => write!(f, "wrong length"),
            Self::Other(sw1, sw2) => write!(
                f,
                "other: {}",
                StatusWord(*sw1, *sw2).describe()
            ),
        }
    }
}
