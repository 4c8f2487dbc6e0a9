//! The basic four info EF.
//!
//! The EF is a single constructed object with a fixed header:
//!
//! ```text
//! FF 20 LL                      -- wrapper
//! DF 21 08 00 SS 00 SS 00 SS 00 SS  -- header: where each segment starts
//! DF 22 LL ...                  -- name
//! DF 23 LL ...                  -- address
//! DF 24 LL ...                  -- birth date
//! DF 25 LL ...                  -- gender
//! ```
//!
//! Rather than walking it as BER-TLV, segments are found through the header: the
//! [`Manifest`] says which header byte holds each segment's start offset, and the segment
//! at that offset carries its own length.

use crate::errors::{Error, Result};
use chrono::NaiveDate;
use nom::combinator::map;
use nom::multi::length_data;
use nom::number::complete::be_u8;
use nom::sequence::tuple;
use num_enum::FromPrimitive;
use std::fmt;
use tracing::{trace, trace_span, warn};

type IResult<'a, T> = nom::IResult<&'a [u8], T>;

/// One of the four fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Address,
    BirthDate,
    Gender,
}

impl Field {
    /// In record order.
    pub const ALL: [Field; 4] = [Self::Name, Self::Address, Self::BirthDate, Self::Gender];

    /// The format byte a well-formed segment for this field carries.
    pub fn kind(&self) -> SegmentKind {
        match self {
            Self::Name => SegmentKind::Name,
            Self::Address => SegmentKind::Address,
            Self::BirthDate => SegmentKind::BirthDate,
            Self::Gender => SegmentKind::Gender,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Address => "address",
            Self::BirthDate => "birth date",
            Self::Gender => "gender",
        })
    }
}

/// Second byte of a segment's tag (DF 2x).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum SegmentKind {
    Header = 0x21,
    Name = 0x22,
    Address = 0x23,
    BirthDate = 0x24,
    Gender = 0x25,
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Positions in the record holding each segment's start offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Manifest {
    pub name: usize,
    pub address: usize,
    pub birth_date: usize,
    pub gender: usize,
}

impl Manifest {
    pub fn offset(&self, field: Field) -> usize {
        match field {
            Field::Name => self.name,
            Field::Address => self.address,
            Field::BirthDate => self.birth_date,
            Field::Gender => self.gender,
        }
    }
}

impl Default for Manifest {
    /// Low bytes of the four big-endian offsets in the DF21 header.
    fn default() -> Self {
        Self {
            name: 7,
            address: 9,
            birth_date: 11,
            gender: 13,
        }
    }
}

/// Why a segment couldn't be extracted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordFault {
    #[error("manifest offset {offset} is outside the {len} byte record")]
    ManifestOutOfBounds { offset: usize, len: usize },
    #[error("segment at {start} (length {declared:?}) runs past the {len} byte record")]
    SegmentOutOfBounds {
        start: usize,
        declared: Option<u8>,
        len: usize,
    },
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// First level of indirection: manifest offset to segment start.
#[derive(Debug, Clone, Copy)]
pub struct SegmentLocator<'a> {
    record: &'a [u8],
    manifest: &'a Manifest,
}

impl<'a> SegmentLocator<'a> {
    pub fn new(record: &'a [u8], manifest: &'a Manifest) -> Self {
        Self { record, manifest }
    }

    /// Returns where `field`'s segment starts.
    pub fn locate(&self, field: Field) -> Result<usize, RecordFault> {
        let offset = self.manifest.offset(field);
        self.record
            .get(offset)
            .map(|start| *start as usize)
            .ok_or(RecordFault::ManifestOutOfBounds {
                offset,
                len: self.record.len(),
            })
    }
}

/// Second level of indirection: a segment, borrowed from the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Always 0xDF in practice.
    pub tag: u8,
    pub kind: SegmentKind,
    pub value: &'a [u8],
}

fn segment(input: &[u8]) -> IResult<(u8, SegmentKind, &[u8])> {
    tuple((be_u8, map(be_u8, SegmentKind::from), length_data(be_u8)))(input)
}

impl<'a> Segment<'a> {
    /// Decodes the segment at `start`: tag, format, length L, then L bytes of value.
    pub fn decode(record: &'a [u8], start: usize) -> Result<Self, RecordFault> {
        let out_of_bounds = || RecordFault::SegmentOutOfBounds {
            start,
            declared: record.get(start + 2).copied(),
            len: record.len(),
        };
        let tail = record.get(start..).ok_or_else(out_of_bounds)?;
        let (_, (tag, kind, value)) = segment(tail).map_err(|_| out_of_bounds())?;
        Ok(Self { tag, kind, value })
    }

    pub fn text(&self) -> Result<&'a str, RecordFault> {
        Ok(std::str::from_utf8(self.value)?)
    }
}

/// The basic four info: name, address, birth date and gender, as printed on the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicInfo {
    pub name: String,
    pub address: String,
    pub birth_date: String,
    pub gender: String,
}

impl BasicInfo {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Address => &self.address,
            Field::BirthDate => &self.birth_date,
            Field::Gender => &self.gender,
        }
    }

    /// (name, address, birth date, gender)
    pub fn into_tuple(self) -> (String, String, String, String) {
        (self.name, self.address, self.birth_date, self.gender)
    }

    /// The birth date as a calendar date, if it's in YYYYMMDD form.
    pub fn birth_date_ymd(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.birth_date, "%Y%m%d").ok()
    }
}

impl From<BasicInfo> for (String, String, String, String) {
    fn from(info: BasicInfo) -> Self {
        info.into_tuple()
    }
}

/// Extracts one field's text.
pub fn parse_field(record: &[u8], manifest: &Manifest, field: Field) -> Result<String> {
    let fault = |fault| Error::MalformedRecord { field, fault };

    let start = SegmentLocator::new(record, manifest)
        .locate(field)
        .map_err(fault)?;
    let seg = Segment::decode(record, start).map_err(fault)?;
    trace!(%field, start, len = seg.value.len(), "Segment");
    if seg.kind != field.kind() {
        warn!(%field, kind = ?seg.kind, "Segment has an unexpected format byte");
    }
    Ok(seg.text().map_err(fault)?.to_owned())
}

/// Parses a basic four info record.
pub fn parse(record: &[u8], manifest: &Manifest) -> Result<BasicInfo> {
    let span = trace_span!("parse_basic_info", len = record.len());
    let _enter = span.enter();

    Ok(BasicInfo {
        name: parse_field(record, manifest, Field::Name)?,
        address: parse_field(record, manifest, Field::Address)?,
        birth_date: parse_field(record, manifest, Field::BirthDate)?,
        gender: parse_field(record, manifest, Field::Gender)?,
    })
}

/// Builds a 256 byte record in the card's layout, padded with 0xFF.
#[cfg(test)]
pub(crate) fn sample_record(name: &str, address: &str, birth_date: &str, gender: &str) -> Vec<u8> {
    let mut segments = Vec::new();
    let mut starts = Vec::new();
    for (kind, value) in [(0x22, name), (0x23, address), (0x24, birth_date), (0x25, gender)] {
        starts.push(14 + segments.len());
        segments.extend_from_slice(&[0xDF, kind, value.len() as u8]);
        segments.extend_from_slice(value.as_bytes());
    }

    let mut rec = vec![0xFF, 0x20, (11 + segments.len()) as u8, 0xDF, 0x21, 0x08];
    for start in starts {
        rec.extend_from_slice(&[0x00, start as u8]);
    }
    rec.extend(segments);
    rec.resize(256, 0xFF);
    rec
}
