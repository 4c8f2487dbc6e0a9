//! The basic four info read sequence.
//!
//! Every step depends on card-side state left by the one before it (selected DF/EF,
//! verified PIN), so the steps run strictly in order, one exchange each, and the first
//! non-9000 status word ends the whole read. Nothing is retried: three wrong PINs lock the
//! profile application.

use crate::apdu::{Command, ReadBinary, Response, Select, Verify};
use crate::errors::{Error, Result};
use crate::observer::{Observer, TracingObserver};
use crate::pin::Pin;
use crate::profile::Profile;
use crate::record::{self, BasicInfo};
use crate::status::{StatusOutcome, StatusWord};
use crate::transport::Transport;
use std::fmt;
use tracing::{debug, trace_span};

/// One step of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    SelectApplication,
    SelectPinFile,
    VerifyPin,
    SelectDataFile,
    ReadData,
    ParseRecord,
}

impl Step {
    /// The state a session is in once this step succeeds.
    pub fn completes(&self) -> State {
        match self {
            Self::SelectApplication => State::ApplicationSelected,
            Self::SelectPinFile => State::PinFileSelected,
            Self::VerifyPin => State::Authenticated,
            Self::SelectDataFile => State::DataFileSelected,
            Self::ReadData => State::DataRead,
            Self::ParseRecord => State::Parsed,
        }
    }

    /// The error for a failed status word at this step.
    fn error(&self, sw: StatusWord, outcome: StatusOutcome) -> Error {
        match self {
            Self::VerifyPin => Error::AuthenticationFailed {
                sw1: sw.sw1(),
                sw2: sw.sw2(),
                retries: match outcome {
                    StatusOutcome::AuthenticationFailed { retries } => retries,
                    _ => None,
                },
            },
            step => Error::ProtocolFailure {
                step: *step,
                sw1: sw.sw1(),
                sw2: sw.sw2(),
                category: outcome,
            },
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SelectApplication => "SELECT profile AP",
            Self::SelectPinFile => "SELECT profile PIN EF",
            Self::VerifyPin => "VERIFY profile PIN",
            Self::SelectDataFile => "SELECT basic four info EF",
            Self::ReadData => "READ BINARY basic four info",
            Self::ParseRecord => "parse basic four info",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    ApplicationSelected,
    PinFileSelected,
    Authenticated,
    DataFileSelected,
    DataRead,
    Parsed,
    /// The given step failed; the rest of the sequence was skipped.
    Failed(Step),
}

/// Runs the read sequence over a borrowed transport. The session never connects or
/// disconnects the card.
pub struct Session<'a, T: Transport, O: Observer = TracingObserver> {
    transport: &'a mut T,
    observer: O,
    profile: Profile,
    state: State,
}

impl<'a, T: Transport> Session<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self {
            transport,
            observer: TracingObserver,
            profile: Profile::default(),
            state: State::Idle,
        }
    }
}

impl<'a, T: Transport, O: Observer> Session<'a, T, O> {
    pub fn with_observer<O2: Observer>(self, observer: O2) -> Session<'a, T, O2> {
        Session {
            transport: self.transport,
            observer,
            profile: self.profile,
            state: self.state,
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Reads the basic four info, verifying `pin` against the profile application.
    ///
    /// Each call runs the whole sequence from [`State::Idle`]. An empty PIN or a
    /// disconnected transport fails before the first step: nothing is sent, the state stays
    /// `Idle`, and the observer isn't notified, since it only hears about steps.
    pub fn read_basic_info(&mut self, pin: Pin) -> Result<BasicInfo> {
        let span = trace_span!("read_basic_info");
        let _enter = span.enter();

        self.state = State::Idle;
        if pin.is_empty() {
            return Err(Error::EmptyPin);
        }
        if !self.transport.is_connected() {
            return Err(Error::TransportUnavailable);
        }

        let cmd = Select::name(self.profile.application.clone()).into();
        self.exchange(Step::SelectApplication, cmd)?;

        let cmd = Select::id(self.profile.pin_file.clone()).into();
        self.exchange(Step::SelectPinFile, cmd)?;

        let cmd = Verify::new(&pin).into();
        drop(pin);
        self.exchange(Step::VerifyPin, cmd)?;

        let cmd = Select::id(self.profile.data_file.clone()).into();
        self.exchange(Step::SelectDataFile, cmd)?;

        let data = self
            .exchange(Step::ReadData, ReadBinary::full().into())?
            .into_payload()
            .unwrap_or_default();
        debug!(len = data.len(), "Read basic four info");

        match record::parse(&data, &self.profile.manifest) {
            Ok(info) => {
                self.state = Step::ParseRecord.completes();
                Ok(info)
            }
            Err(err) => Err(self.fail(Step::ParseRecord, err)),
        }
    }

    /// Performs one step's exchange; anything but 0x9000 fails the session.
    fn exchange(&mut self, step: Step, cmd: Command) -> Result<Response> {
        self.observer.command_sent(step, &cmd);
        let rsp = match self.transport.exchange(&cmd) {
            Ok(rsp) => rsp,
            Err(err) => return Err(self.fail(step, err)),
        };
        drop(cmd);
        self.observer.response_received(step, &rsp);

        let sw = rsp.status();
        let outcome = sw.outcome();
        if !outcome.is_success() {
            return Err(self.fail(step, step.error(sw, outcome)));
        }
        self.state = step.completes();
        Ok(rsp)
    }

    fn fail(&mut self, step: Step, err: Error) -> Error {
        self.state = State::Failed(step);
        self.observer.step_failed(step, &err);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{sample_record, Field, Manifest, RecordFault};
    use std::collections::VecDeque;

    /// Answers with canned responses, in order, and remembers what it was sent.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        responses: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
        disconnected: bool,
    }

    impl ScriptedTransport {
        fn new<I: IntoIterator<Item = Vec<u8>>>(responses: I) -> Self {
            Self {
                responses: responses.into_iter().collect(),
                ..Default::default()
            }
        }

        /// Four 9000s, then the record.
        fn happy(record: Vec<u8>) -> Self {
            let mut read = record;
            read.extend_from_slice(&[0x90, 0x00]);
            Self::new([ok(), ok(), ok(), ok(), read])
        }
    }

    impl Transport for ScriptedTransport {
        fn transmit(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
            self.sent.push(frame.to_vec());
            self.responses
                .pop_front()
                .ok_or(Error::TransportUnavailable)
        }

        fn is_connected(&self) -> bool {
            !self.disconnected
        }
    }

    #[derive(Debug, Default)]
    struct RecordingObserver {
        events: Vec<String>,
    }

    impl Observer for RecordingObserver {
        fn command_sent(&mut self, step: Step, cmd: &Command) {
            self.events.push(format!("tx {} {:?}", step, cmd));
        }

        fn response_received(&mut self, step: Step, rsp: &Response) {
            self.events.push(format!("rx {} {}", step, rsp.status()));
        }

        fn step_failed(&mut self, step: Step, err: &Error) {
            self.events.push(format!("fail {}: {}", step, err));
        }
    }

    fn ok() -> Vec<u8> {
        vec![0x90, 0x00]
    }

    fn pin() -> Pin {
        Pin::from_ascii("1234").expect("invalid test PIN")
    }

    const NAME: &str = "番号　花子";
    const ADDRESS: &str = "東京都千代田区永田町１丁目７－１";

    #[test]
    fn test_read_basic_info() -> Result<()> {
        let mut transport =
            ScriptedTransport::happy(sample_record(NAME, ADDRESS, "19850123", "2"));
        let mut session = Session::new(&mut transport);
        let info = session.read_basic_info(pin())?;
        assert_eq!(session.state(), State::Parsed);
        assert_eq!(
            info.into_tuple(),
            (
                NAME.to_string(),
                ADDRESS.to_string(),
                "19850123".to_string(),
                "2".to_string()
            )
        );

        assert_eq!(
            transport.sent,
            vec![
                vec![
                    0x00, 0xA4, 0x04, 0x0C, 0x0A, 0xD3, 0x92, 0x10, 0x00, 0x31, 0x00, 0x01, 0x01,
                    0x04, 0x08
                ],
                vec![0x00, 0xA4, 0x02, 0x0C, 0x02, 0x00, 0x11],
                vec![0x00, 0x20, 0x00, 0x80, 0x04, 0x31, 0x32, 0x33, 0x34],
                vec![0x00, 0xA4, 0x02, 0x0C, 0x02, 0x00, 0x02],
                vec![0x00, 0xB0, 0x00, 0x00, 0x00],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_wrong_pin_stops_before_data_file() {
        let mut transport = ScriptedTransport::new([ok(), ok(), vec![0x63, 0x00], ok(), ok()]);
        let mut session = Session::new(&mut transport);
        match session.read_basic_info(pin()) {
            Err(Error::AuthenticationFailed {
                sw1: 0x63,
                sw2: 0x00,
                retries: None,
            }) => {}
            v => panic!("wrong result: {:?}", v),
        }
        assert_eq!(session.state(), State::Failed(Step::VerifyPin));
        assert_eq!(transport.sent.len(), 3);
    }

    #[test]
    fn test_wrong_pin_reports_retries() {
        let mut transport = ScriptedTransport::new([ok(), ok(), vec![0x63, 0xC2]]);
        match Session::new(&mut transport).read_basic_info(pin()) {
            Err(Error::AuthenticationFailed {
                retries: Some(2), ..
            }) => {}
            v => panic!("wrong result: {:?}", v),
        }
    }

    #[test]
    fn test_any_verify_failure_is_authentication_failure() {
        let mut transport = ScriptedTransport::new([ok(), ok(), vec![0x69, 0x84]]);
        match Session::new(&mut transport).read_basic_info(pin()) {
            Err(Error::AuthenticationFailed {
                sw1: 0x69,
                sw2: 0x84,
                retries: None,
            }) => {}
            v => panic!("wrong result: {:?}", v),
        }
    }

    #[test]
    fn test_failure_at_each_exchange_stops_the_sequence() {
        let steps = [
            Step::SelectApplication,
            Step::SelectPinFile,
            Step::VerifyPin,
            Step::SelectDataFile,
            Step::ReadData,
        ];
        for (k, step) in steps.iter().enumerate() {
            let mut responses: Vec<Vec<u8>> = vec![ok(); k];
            responses.push(vec![0x6A, 0x82]);
            responses.extend(std::iter::repeat(ok()).take(5));
            let mut transport = ScriptedTransport::new(responses);

            let mut session = Session::new(&mut transport);
            let err = session
                .read_basic_info(pin())
                .expect_err("sequence should fail");
            assert_eq!(session.state(), State::Failed(*step));
            assert_eq!(err.status(), Some((0x6A, 0x82)));
            if *step != Step::VerifyPin {
                match err {
                    Error::ProtocolFailure {
                        step: s,
                        category: StatusOutcome::FileNotFound,
                        ..
                    } => assert_eq!(s, *step),
                    v => panic!("wrong error at {}: {:?}", step, v),
                }
            }
            assert_eq!(transport.sent.len(), k + 1, "at {}", step);
        }
    }

    #[test]
    fn test_disconnected_transport() {
        let mut transport = ScriptedTransport {
            disconnected: true,
            ..ScriptedTransport::happy(sample_record(NAME, ADDRESS, "19850123", "2"))
        };
        let mut session = Session::new(&mut transport);
        assert!(matches!(
            session.read_basic_info(pin()),
            Err(Error::TransportUnavailable)
        ));
        assert_eq!(session.state(), State::Idle);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_empty_pin_is_never_sent() {
        let mut transport = ScriptedTransport::new(std::iter::repeat(ok()).take(5));
        let mut observer = RecordingObserver::default();
        let mut session = Session::new(&mut transport).with_observer(&mut observer);
        assert!(matches!(
            session.read_basic_info(Pin::from_bytes(vec![])),
            Err(Error::EmptyPin)
        ));
        assert_eq!(session.state(), State::Idle);
        drop(session);
        assert!(transport.sent.is_empty());
        assert!(observer.events.is_empty());
    }

    #[test]
    fn test_disconnected_transport_is_not_a_step() {
        let mut transport = ScriptedTransport {
            disconnected: true,
            ..Default::default()
        };
        let mut observer = RecordingObserver::default();
        let _ = Session::new(&mut transport)
            .with_observer(&mut observer)
            .read_basic_info(pin());
        assert!(observer.events.is_empty());
    }

    #[test]
    fn test_truncated_response() {
        let mut transport = ScriptedTransport::new([ok(), vec![0x90]]);
        let mut session = Session::new(&mut transport);
        assert!(matches!(
            session.read_basic_info(pin()),
            Err(Error::TruncatedResponse(1))
        ));
        assert_eq!(session.state(), State::Failed(Step::SelectPinFile));
    }

    #[test]
    fn test_malformed_record() {
        let mut record = sample_record(NAME, ADDRESS, "19850123", "2");
        record[7] = 0xFE; // Name now starts 2 bytes before the end.
        let mut transport = ScriptedTransport::happy(record);
        let mut session = Session::new(&mut transport);
        match session.read_basic_info(pin()) {
            Err(Error::MalformedRecord {
                field: Field::Name,
                fault: RecordFault::SegmentOutOfBounds { start: 0xFE, .. },
            }) => {}
            v => panic!("wrong result: {:?}", v),
        }
        assert_eq!(session.state(), State::Failed(Step::ParseRecord));
        assert_eq!(transport.sent.len(), 5);
    }

    #[test]
    fn test_observer_never_sees_pin() {
        let mut transport =
            ScriptedTransport::happy(sample_record(NAME, ADDRESS, "19850123", "2"));
        let mut observer = RecordingObserver::default();
        Session::new(&mut transport)
            .with_observer(&mut observer)
            .read_basic_info(pin())
            .expect("read should succeed");

        assert_eq!(observer.events.len(), 10);
        assert!(observer.events[4].starts_with("tx VERIFY profile PIN"));
        assert!(observer.events.iter().all(|e| !e.contains("31323334")));
        assert_eq!(observer.events[9], "rx READ BINARY basic four info 9000");
    }

    #[test]
    fn test_observer_sees_failure() {
        let mut transport = ScriptedTransport::new([vec![0x6A, 0x82]]);
        let mut observer = RecordingObserver::default();
        let _ = Session::new(&mut transport)
            .with_observer(&mut observer)
            .read_basic_info(pin());
        assert_eq!(
            observer.events.last().map(String::as_str),
            Some("fail SELECT profile AP: SELECT profile AP: card returned 6A82 (file not found)")
        );
    }

    #[test]
    fn test_custom_profile() -> Result<()> {
        let mut record = vec![0x00; 4];
        record.extend_from_slice(&[0xDF, 0x22, 0x01, b'N']);
        record.extend_from_slice(&[0xDF, 0x23, 0x01, b'A']);
        record.extend_from_slice(&[0xDF, 0x24, 0x01, b'B']);
        record.extend_from_slice(&[0xDF, 0x25, 0x01, b'G']);
        record[0..4].copy_from_slice(&[4, 8, 12, 16]);

        let mut transport = ScriptedTransport::happy(record);
        let profile = Profile {
            application: vec![0xA0, 0x00],
            pin_file: vec![0x00, 0x01],
            data_file: vec![0x00, 0x03],
            manifest: Manifest {
                name: 0,
                address: 1,
                birth_date: 2,
                gender: 3,
            },
        };
        let info = Session::new(&mut transport)
            .with_observer(())
            .with_profile(profile)
            .read_basic_info(pin())?;
        assert_eq!(info.get(Field::Name), "N");
        assert_eq!(info.get(Field::Gender), "G");
        assert_eq!(transport.sent[0], vec![0x00, 0xA4, 0x04, 0x0C, 0x02, 0xA0, 0x00]);
        assert_eq!(transport.sent[3], vec![0x00, 0xA4, 0x02, 0x0C, 0x02, 0x00, 0x03]);
        Ok(())
    }

    #[test]
    fn test_session_can_run_again() -> Result<()> {
        let mut transport = ScriptedTransport::new([vec![0x6A, 0x82]]);
        let mut read = sample_record(NAME, ADDRESS, "19850123", "2");
        read.extend_from_slice(&[0x90, 0x00]);
        transport
            .responses
            .extend([ok(), ok(), ok(), ok(), read]);

        let mut session = Session::new(&mut transport);
        assert!(session.read_basic_info(pin()).is_err());
        assert_eq!(session.state(), State::Failed(Step::SelectApplication));
        assert_eq!(session.read_basic_info(pin())?.name, NAME);
        assert_eq!(session.state(), State::Parsed);
        Ok(())
    }
}
