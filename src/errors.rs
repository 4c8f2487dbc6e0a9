use crate::record::{Field, RecordFault};
use crate::session::Step;
use crate::status::StatusOutcome;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no card connection available")]
    TransportUnavailable,
    #[error("PC/SC: {0}")]
    Pcsc(#[from] pcsc::Error),

    #[error("response truncated: {0} byte(s), a status word needs 2")]
    TruncatedResponse(usize),
    #[error("command body is {0} bytes long, max is {1}")]
    CommandTooLong(usize, usize),
    #[error("malformed command frame: {0}")]
    MalformedCommand(&'static str),

    #[error("{step}: card returned {sw1:02X}{sw2:02X} ({category})")]
    ProtocolFailure {
        step: Step,
        sw1: u8,
        sw2: u8,
        category: StatusOutcome,
    },
    #[error("PIN verification failed: card returned {sw1:02X}{sw2:02X}{}", retries_suffix(.retries))]
    AuthenticationFailed {
        sw1: u8,
        sw2: u8,
        /// Remaining attempts, if the card told us.
        retries: Option<u8>,
    },

    #[error("malformed {field} segment: {fault}")]
    MalformedRecord { field: Field, fault: RecordFault },

    #[error("PIN contains non-ASCII characters")]
    NonAsciiPin,
    #[error("PIN is empty")]
    EmptyPin,
}

fn retries_suffix(retries: &Option<u8>) -> String {
    match retries {
        Some(0) => ", PIN is blocked".into(),
        Some(n) => format!(", {} attempt(s) left", n),
        None => String::new(),
    }
}

impl Error {
    /// Returns the raw status word, for errors caused by one.
    pub fn status(&self) -> Option<(u8, u8)> {
        match self {
            Self::ProtocolFailure { sw1, sw2, .. } | Self::AuthenticationFailed { sw1, sw2, .. } => {
                Some((*sw1, *sw2))
            }
            _ => None,
        }
    }
}
