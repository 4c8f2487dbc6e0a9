//! Hooks for reporting what a session does.

use crate::apdu::{Command, Response};
use crate::errors::Error;
use crate::session::Step;
use tracing::{debug, warn};

/// Receives session events. Every method defaults to doing nothing.
///
/// Commands may carry a PIN; implementations must not print `Command::data` for VERIFY.
/// `Command::data_hex()` and `Command`'s `Debug` impl already mask it.
pub trait Observer {
    fn command_sent(&mut self, _step: Step, _cmd: &Command) {}
    fn response_received(&mut self, _step: Step, _rsp: &Response) {}
    fn step_failed(&mut self, _step: Step, _err: &Error) {}
}

impl Observer for () {}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn command_sent(&mut self, step: Step, cmd: &Command) {
        (**self).command_sent(step, cmd)
    }

    fn response_received(&mut self, step: Step, rsp: &Response) {
        (**self).response_received(step, rsp)
    }

    fn step_failed(&mut self, step: Step, err: &Error) {
        (**self).step_failed(step, err)
    }
}

/// Emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn command_sent(&mut self, step: Step, cmd: &Command) {
        debug!(
            %step,
            header = %hex::encode_upper([cmd.cla, cmd.ins, cmd.p1, cmd.p2]),
            data = %cmd.data_hex(),
            le = ?cmd.le,
            ">> TX"
        );
    }

    fn response_received(&mut self, step: Step, rsp: &Response) {
        debug!(
            %step,
            sw = %rsp.status(),
            len = rsp.data_len(),
            "<< RX: {}",
            rsp.status().describe()
        );
    }

    fn step_failed(&mut self, step: Step, err: &Error) {
        warn!(%step, "{}", err);
    }
}
