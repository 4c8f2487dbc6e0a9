use crate::errors::Result;
use crate::transport::Transport;
use tracing::{trace, trace_span};

/// A card connected through PC/SC.
pub struct PcscTransport {
    pub card: pcsc::Card,
}

impl PcscTransport {
    pub fn new(card: pcsc::Card) -> Self {
        Self { card }
    }
}

impl Transport for PcscTransport {
    fn transmit(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        let span = trace_span!("pcsc_transmit");
        let _enter = span.enter();

        // Frames aren't logged here, they may contain a PIN.
        trace!(len = frame.len(), ">> TX");
        let mut rbuf = [0; pcsc::MAX_BUFFER_SIZE];
        let rsp = self.card.transmit(frame, &mut rbuf)?;
        trace!(len = rsp.len(), "<< RX");
        Ok(rsp.to_vec())
    }

    fn is_connected(&self) -> bool {
        // Fails with RemovedCard/ResetCard once the card is gone.
        self.card.status2_owned().is_ok()
    }
}
