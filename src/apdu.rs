//! ISO 7816-4 short APDUs: the four commands the profile application needs, and positional
//! decoding of responses.

use crate::errors::{Error, Result};
use crate::pin::Pin;
use crate::status::StatusWord;
use byteorder::{BigEndian, ByteOrder};
use nom::bytes::complete::take;
use nom::combinator::{eof, opt};
use nom::number::complete::be_u8;
use nom::sequence::tuple;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

type IResult<'a, T> = nom::IResult<&'a [u8], T>;

/// Interindustry class, no secure messaging, basic logical channel.
pub const CLA: u8 = 0x00;

pub const INS_SELECT: u8 = 0xA4;
pub const INS_VERIFY: u8 = 0x20;
pub const INS_READ_BINARY: u8 = 0xB0;

/// Lc is a single byte in a short APDU.
pub const MAX_BODY_LEN: usize = 255;

/// A command APDU.
///
/// The body may be a PIN, so it's wiped on drop and never printed for VERIFY.
#[derive(Default, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Command {
    /// Class- and instruction bytes.
    pub cla: u8,
    pub ins: u8,

    /// Arguments to the command.
    pub p1: u8,
    pub p2: u8,

    /// Command data. Lc is derived from its length.
    pub data: Vec<u8>,

    /// Expected response length, where 0 = 256. None omits Le entirely.
    pub le: Option<u8>,
}

impl Command {
    pub fn new<D: Into<Vec<u8>>>(cla: u8, ins: u8, p1: u8, p2: u8, data: D) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: data.into(),
            le: None,
        }
    }

    pub fn expect(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Length of the encoded frame.
    pub fn encoded_len(&self) -> usize {
        let body = if self.data.is_empty() {
            0
        } else {
            1 + self.data.len()
        };
        4 + body + self.le.map_or(0, |_| 1)
    }

    /// Encodes the command as CLA INS P1 P2 [Lc data] [Le].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let lc = u8::try_from(self.data.len())
            .map_err(|_| Error::CommandTooLong(self.data.len(), MAX_BODY_LEN))?;

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);
        if lc > 0 {
            buf.push(lc);
            buf.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            buf.push(le);
        }
        Ok(buf)
    }

    /// Decodes a short command APDU (cases 1 through 4).
    pub fn parse(frame: &[u8]) -> Result<Self> {
        let (rest, (cla, ins, p1, p2)) = header(frame)
            .map_err(|_| Error::MalformedCommand("header is shorter than 4 bytes"))?;

        let (data, le) = match rest.len() {
            0 => (&[][..], None),
            1 => (&[][..], Some(rest[0])),
            _ => body(rest)
                .map(|(_, v)| v)
                .map_err(|_| Error::MalformedCommand("Lc doesn't match the body length"))?,
        };
        Ok(Self {
            cla,
            ins,
            p1,
            p2,
            data: data.to_vec(),
            le,
        })
    }
}

fn header(input: &[u8]) -> IResult<(u8, u8, u8, u8)> {
    tuple((be_u8, be_u8, be_u8, be_u8))(input)
}

/// Lc, data, optional Le, and nothing after. Lc = 0 would be an extended APDU.
fn body(input: &[u8]) -> IResult<(&[u8], Option<u8>)> {
    let (input, lc) = be_u8(input)?;
    if lc == 0 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    let (input, data) = take(lc)(input)?;
    let (input, le) = opt(be_u8)(input)?;
    let (input, _) = eof(input)?;
    Ok((input, (data, le)))
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("cla", &format_args!("{:02X}", self.cla))
            .field("ins", &format_args!("{:02X}", self.ins))
            .field("p1", &format_args!("{:02X}", self.p1))
            .field("p2", &format_args!("{:02X}", self.p2))
            .field("data", &format_args!("{}", self.data_hex()))
            .field("le", &self.le)
            .finish()
    }
}

impl Command {
    /// Hex-encoded body, or a mask of the same length for VERIFY.
    pub fn data_hex(&self) -> String {
        if self.ins == INS_VERIFY {
            "**".repeat(self.data.len())
        } else {
            hex::encode_upper(&self.data)
        }
    }
}

/// How SELECT identifies its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A DF name, eg. an application identifier.
    Name(Vec<u8>),
    /// An EF identifier under the current DF.
    Id(Vec<u8>),
}

impl Target {
    fn p1(&self) -> u8 {
        match self {
            Self::Name(_) => 0x04,
            Self::Id(_) => 0x02,
        }
    }
}

/// SELECT FILE. Never asks for FCI (P2 = 0x0C), the profile application doesn't need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub target: Target,
}

impl Select {
    pub const P2_NO_RESPONSE: u8 = 0x0C;

    pub fn name<T: Into<Vec<u8>>>(name: T) -> Self {
        Self {
            target: Target::Name(name.into()),
        }
    }

    pub fn id<T: Into<Vec<u8>>>(id: T) -> Self {
        Self {
            target: Target::Id(id.into()),
        }
    }
}

impl From<Select> for Command {
    fn from(sel: Select) -> Self {
        let p1 = sel.target.p1();
        let data = match sel.target {
            Target::Name(v) | Target::Id(v) => v,
        };
        Command::new(CLA, INS_SELECT, p1, Select::P2_NO_RESPONSE, data)
    }
}

/// VERIFY against the PIN of the currently selected DF. The PIN is passed through as-is.
pub struct Verify<'a> {
    pub pin: &'a Pin,
}

impl<'a> Verify<'a> {
    /// Reference data qualifier: specific (DF-local) reference data, number 0.
    pub const P2_LOCAL: u8 = 0x80;

    pub fn new(pin: &'a Pin) -> Self {
        Self { pin }
    }
}

impl<'a> From<Verify<'a>> for Command {
    fn from(v: Verify<'a>) -> Self {
        Command::new(CLA, INS_VERIFY, 0x00, Verify::P2_LOCAL, v.pin.as_bytes())
    }
}

/// READ BINARY from the currently selected EF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBinary {
    /// Offset into the EF. Bit 16 would select by SFI instead, so only 15 bits are usable.
    pub offset: u16,
    /// Le, where 0 = 256.
    pub le: u8,
}

impl ReadBinary {
    pub const MAX_OFFSET: u16 = 0x7FFF;
    pub const MAX_LEN: usize = 256;

    pub fn new(offset: u16, len: usize) -> Result<Self> {
        if offset > Self::MAX_OFFSET {
            return Err(Error::MalformedCommand("READ BINARY offset exceeds 15 bits"));
        }
        let le = match len {
            1..=255 => len as u8,
            256 => 0,
            _ => return Err(Error::MalformedCommand("READ BINARY length must be 1-256")),
        };
        Ok(Self { offset, le })
    }

    /// A full 256 byte read from the start of the EF.
    pub fn full() -> Self {
        Self { offset: 0, le: 0 }
    }

    /// Requested length in bytes.
    pub fn read_len(&self) -> usize {
        match self.le {
            0 => Self::MAX_LEN,
            n => n as usize,
        }
    }
}

impl From<ReadBinary> for Command {
    fn from(rb: ReadBinary) -> Self {
        let mut p = [0; 2];
        BigEndian::write_u16(&mut p, rb.offset);
        Command::new(CLA, INS_READ_BINARY, p[0], p[1], vec![]).expect(rb.le)
    }
}

impl TryFrom<&Command> for ReadBinary {
    type Error = Error;

    fn try_from(cmd: &Command) -> Result<Self> {
        if cmd.ins != INS_READ_BINARY {
            return Err(Error::MalformedCommand("not a READ BINARY command"));
        }
        if cmd.p1 & 0x80 != 0 {
            return Err(Error::MalformedCommand("READ BINARY by SFI is not supported"));
        }
        let le = cmd
            .le
            .ok_or(Error::MalformedCommand("READ BINARY without Le"))?;
        Ok(Self {
            offset: BigEndian::read_u16(&[cmd.p1, cmd.p2]),
            le,
        })
    }
}

/// A response APDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    data: Vec<u8>,
    status: StatusWord,
}

impl Response {
    pub fn new<D: Into<Vec<u8>>>(data: D, status: StatusWord) -> Self {
        Self {
            data: data.into(),
            status,
        }
    }

    /// Splits a raw response into data and the trailing status word.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let (sw2, rest) = raw
            .split_last()
            .ok_or(Error::TruncatedResponse(raw.len()))?;
        let (sw1, data) = rest
            .split_last()
            .ok_or(Error::TruncatedResponse(raw.len()))?;
        Ok(Self::new(data, StatusWord(*sw1, *sw2)))
    }

    pub fn status(&self) -> StatusWord {
        self.status
    }

    /// Response data; only meaningful if the status word is 0x9000.
    pub fn payload(&self) -> Option<&[u8]> {
        self.status.is_ok().then_some(&self.data[..])
    }

    pub fn into_payload(self) -> Option<Vec<u8>> {
        self.status.is_ok().then_some(self.data)
    }

    /// Number of response data bytes, regardless of status.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}
