pub mod pcsc;

pub use self::pcsc::PcscTransport;

use crate::apdu::{Command, Response};
use crate::errors::Result;
use zeroize::Zeroizing;

/// A connection to a card, owned by the caller.
///
/// Implementations only move bytes; status words are left to the caller to interpret.
pub trait Transport {
    /// Sends one raw command frame and blocks until the card answers. The returned bytes
    /// include the trailing SW1 SW2.
    fn transmit(&mut self, frame: &[u8]) -> Result<Vec<u8>>;

    /// Whether there's a card on the other end.
    fn is_connected(&self) -> bool {
        true
    }

    /// Performs one command/response round trip.
    fn exchange(&mut self, cmd: &Command) -> Result<Response> {
        // The frame may hold a PIN.
        let frame = Zeroizing::new(cmd.encode()?);
        let raw = self.transmit(&frame)?;
        Response::decode(&raw)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn transmit(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        (**self).transmit(frame)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn exchange(&mut self, cmd: &Command) -> Result<Response> {
        (**self).exchange(cmd)
    }
}
