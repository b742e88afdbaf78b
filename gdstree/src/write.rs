//!
//! # gdstree Byte-Encoding and Writing
//!

// Std-Lib Imports
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// Crates.io
use byteorder::{BigEndian, WriteBytesExt};
use log::debug;

// Local Imports
use crate::data::*;

/// Gds Writing Helper
pub struct GdsWriter<'wr> {
    /// Write Destination
    dest: Box<dyn Write + 'wr>,
}
impl<'wr> GdsWriter<'wr> {
    /// Create new [GdsWriter] with destination file `fname`
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<Self> {
        let file = BufWriter::new(File::create(fname)?);
        Ok(Self::new(file))
    }
    /// Create a new [GdsWriter] to destination `dest`
    pub fn new(dest: impl Write + 'wr) -> Self {
        Self {
            dest: Box::new(dest),
        }
    }
    /// Write a [GdsLibrary] to the destination.
    /// Resolved links are not written; references are written by name.
    pub fn write_lib(&mut self, lib: &GdsLibrary) -> GdsResult<()> {
        debug!("Writing library `{}`: {} structs", lib.name, lib.structs.len());
        self.write_records(&[
            GdsRecord::Header {
                version: lib.version,
            },
            GdsRecord::BgnLib {
                dates: lib.dates.encode(),
            },
            GdsRecord::LibName(lib.name.clone()),
            GdsRecord::Units(lib.units.0, lib.units.1),
        ])?;
        for strukt in lib.structs.iter() {
            self.write_struct(strukt)?;
        }
        self.write_record(&GdsRecord::EndLib)?;
        self.dest.flush()?;
        Ok(())
    }
    /// Write [GdsStruct] `strukt` to the destination
    pub fn write_struct(&mut self, strukt: &GdsStruct) -> GdsResult<()> {
        self.write_records(&[
            GdsRecord::BgnStruct {
                dates: strukt.dates.encode(),
            },
            GdsRecord::StructName(strukt.name.clone()),
        ])?;
        for elem in strukt.elems.iter() {
            self.write_records(&elem.to_records()?)?;
        }
        self.write_record(&GdsRecord::EndStruct)?;
        Ok(())
    }
    /// Helper to write a sequence of [GdsRecord]s
    fn write_records(&mut self, records: &[GdsRecord]) -> GdsResult<()> {
        for r in records {
            self.write_record(r)?;
        }
        Ok(())
    }
    /// Encode into bytes and write onto `dest`
    pub fn write_record(&mut self, record: &GdsRecord) -> GdsResult<()> {
        // GDSII strings are padded to even lengths
        let gds_strlen = |s: &str| -> usize { s.len() + s.len() % 2 };
        use GdsDataType::{BitArray, NoData, Str, F64, I16, I32};
        let (dtype, len) = match record {
            GdsRecord::Header { .. } => (I16, 2),
            GdsRecord::BgnLib { .. } | GdsRecord::BgnStruct { .. } => (I16, 24),
            GdsRecord::Units(..) => (F64, 16),
            GdsRecord::EndLib
            | GdsRecord::EndStruct
            | GdsRecord::Boundary
            | GdsRecord::Path
            | GdsRecord::StructRef
            | GdsRecord::ArrayRef
            | GdsRecord::Text
            | GdsRecord::Node
            | GdsRecord::EndElement => (NoData, 0),
            GdsRecord::LibName(s)
            | GdsRecord::StructName(s)
            | GdsRecord::StructRefName(s)
            | GdsRecord::String(s) => (Str, gds_strlen(s)),
            GdsRecord::Layer(_)
            | GdsRecord::DataType(_)
            | GdsRecord::TextType(_)
            | GdsRecord::Nodetype(_)
            | GdsRecord::PathType(_) => (I16, 2),
            GdsRecord::ColRow { .. } => (I16, 4),
            GdsRecord::Width(_) => (I32, 4),
            GdsRecord::Xy(d) => (I32, 4 * d.len()),
            GdsRecord::ElemFlags(..) | GdsRecord::Strans(..) | GdsRecord::Presentation(..) => {
                (BitArray, 2)
            }
            GdsRecord::Mag(_) | GdsRecord::Angle(_) => (F64, 8),
            GdsRecord::Other { dtype, data, .. } => {
                return self.write_raw(record.rtype(), *dtype, data);
            }
        };
        self.write_header(record.rtype(), dtype as u8, len)?;

        // Now write the data portion, organized by DataType
        match record {
            GdsRecord::EndLib
            | GdsRecord::EndStruct
            | GdsRecord::Boundary
            | GdsRecord::Path
            | GdsRecord::StructRef
            | GdsRecord::ArrayRef
            | GdsRecord::Text
            | GdsRecord::Node
            | GdsRecord::EndElement
            | GdsRecord::Other { .. } => (),

            // BitArrays
            GdsRecord::Presentation(d0, d1)
            | GdsRecord::Strans(d0, d1)
            | GdsRecord::ElemFlags(d0, d1) => {
                self.dest.write_u8(*d0)?;
                self.dest.write_u8(*d1)?;
            }
            // Single I16s
            GdsRecord::Header { version: d }
            | GdsRecord::Layer(d)
            | GdsRecord::DataType(d)
            | GdsRecord::TextType(d)
            | GdsRecord::PathType(d)
            | GdsRecord::Nodetype(d) => self.dest.write_i16::<BigEndian>(*d)?,
            GdsRecord::ColRow { cols, rows } => {
                self.dest.write_i16::<BigEndian>(*cols)?;
                self.dest.write_i16::<BigEndian>(*rows)?;
            }
            GdsRecord::BgnLib { dates: d } | GdsRecord::BgnStruct { dates: d } => {
                for val in d.iter() {
                    self.dest.write_i16::<BigEndian>(*val)?;
                }
            }
            // I32s
            GdsRecord::Width(d) => self.dest.write_i32::<BigEndian>(*d)?,
            GdsRecord::Xy(d) => {
                for val in d.iter() {
                    self.dest.write_i32::<BigEndian>(*val)?;
                }
            }
            // F64s
            GdsRecord::Mag(d) | GdsRecord::Angle(d) => {
                self.dest.write_u64::<BigEndian>(GdsFloat64::encode(*d)?)?
            }
            GdsRecord::Units(d0, d1) => {
                self.dest.write_u64::<BigEndian>(GdsFloat64::encode(*d0)?)?;
                self.dest.write_u64::<BigEndian>(GdsFloat64::encode(*d1)?)?;
            }
            // Strings
            GdsRecord::LibName(s)
            | GdsRecord::StructName(s)
            | GdsRecord::StructRefName(s)
            | GdsRecord::String(s) => {
                self.dest.write_all(s.as_bytes())?;
                if s.len() % 2 != 0 {
                    self.dest.write_u8(0x00)?;
                }
            }
        };
        Ok(())
    }
    /// Write a record of raw, undecoded content
    fn write_raw(&mut self, rtype: u8, dtype: u8, data: &[u8]) -> GdsResult<()> {
        self.write_header(rtype, dtype, data.len())?;
        self.dest.write_all(data)?;
        Ok(())
    }
    /// Write a record header, for a payload of `len` bytes.
    /// Fails if the total exceeds the 16-bit size field.
    fn write_header(&mut self, rtype: u8, dtype: u8, len: usize) -> GdsResult<()> {
        let size = match u16::try_from(len + 4) {
            Ok(size) => size,
            Err(_) => {
                return Err(GdsError::format(format!(
                    "{} record too long: size {} exceeds {}",
                    GdsRecordType::mnemonic_of(rtype),
                    len + 4,
                    u16::MAX
                )))
            }
        };
        self.dest.write_u16::<BigEndian>(size)?;
        self.dest.write_u8(rtype)?;
        self.dest.write_u8(dtype)?;
        Ok(())
    }
}

/// # Record Conversion
/// Flattening of an element into its canonical record sequence.
/// Every field is written, including those optional in the format.
pub trait ToRecords {
    fn to_records(&self) -> GdsResult<Vec<GdsRecord>>;
}

impl ToRecords for GdsElement {
    fn to_records(&self) -> GdsResult<Vec<GdsRecord>> {
        match self {
            GdsElement::GdsBoundary(e) => e.to_records(),
            GdsElement::GdsPath(e) => e.to_records(),
            GdsElement::GdsStructRef(e) => e.to_records(),
            GdsElement::GdsArrayRef(e) => e.to_records(),
            GdsElement::GdsTextElem(e) => e.to_records(),
            GdsElement::GdsNode(e) => e.to_records(),
        }
    }
}

impl ToRecords for GdsBoundary {
    fn to_records(&self) -> GdsResult<Vec<GdsRecord>> {
        check_points("BOUNDARY", &self.xy, 4)?;
        Ok(vec![
            GdsRecord::Boundary,
            GdsRecord::ElemFlags(self.elflags.0, self.elflags.1),
            GdsRecord::Layer(self.layer),
            GdsRecord::DataType(self.datatype),
            GdsRecord::Xy(GdsPoint::flatten_vec(&self.xy)),
            GdsRecord::EndElement,
        ])
    }
}

impl ToRecords for GdsPath {
    fn to_records(&self) -> GdsResult<Vec<GdsRecord>> {
        check_points("PATH", &self.xy, 2)?;
        Ok(vec![
            GdsRecord::Path,
            GdsRecord::ElemFlags(self.elflags.0, self.elflags.1),
            GdsRecord::Layer(self.layer),
            GdsRecord::DataType(self.datatype),
            GdsRecord::PathType(self.path_type),
            GdsRecord::Width(self.width),
            GdsRecord::Xy(GdsPoint::flatten_vec(&self.xy)),
            GdsRecord::EndElement,
        ])
    }
}

impl ToRecords for GdsStructRef {
    fn to_records(&self) -> GdsResult<Vec<GdsRecord>> {
        let (s0, s1) = self.strans.encode();
        Ok(vec![
            GdsRecord::StructRef,
            GdsRecord::ElemFlags(self.elflags.0, self.elflags.1),
            GdsRecord::StructRefName(self.name.clone()),
            GdsRecord::Strans(s0, s1),
            GdsRecord::Mag(self.mag),
            GdsRecord::Angle(self.angle),
            GdsRecord::Xy(vec![self.xy.x, self.xy.y]),
            GdsRecord::EndElement,
        ])
    }
}

impl ToRecords for GdsArrayRef {
    fn to_records(&self) -> GdsResult<Vec<GdsRecord>> {
        let (s0, s1) = self.strans.encode();
        Ok(vec![
            GdsRecord::ArrayRef,
            GdsRecord::ElemFlags(self.elflags.0, self.elflags.1),
            GdsRecord::StructRefName(self.name.clone()),
            GdsRecord::Strans(s0, s1),
            GdsRecord::Mag(self.mag),
            GdsRecord::Angle(self.angle),
            GdsRecord::ColRow {
                cols: self.cols,
                rows: self.rows,
            },
            GdsRecord::Xy(GdsPoint::flatten_vec(&self.xy)),
            GdsRecord::EndElement,
        ])
    }
}

impl ToRecords for GdsTextElem {
    fn to_records(&self) -> GdsResult<Vec<GdsRecord>> {
        let (s0, s1) = self.strans.encode();
        Ok(vec![
            GdsRecord::Text,
            GdsRecord::ElemFlags(self.elflags.0, self.elflags.1),
            GdsRecord::Layer(self.layer),
            GdsRecord::TextType(self.texttype),
            GdsRecord::Presentation(self.presentation.0, self.presentation.1),
            GdsRecord::Strans(s0, s1),
            GdsRecord::Xy(vec![self.xy.x, self.xy.y]),
            GdsRecord::String(self.string.clone()),
            GdsRecord::EndElement,
        ])
    }
}

impl ToRecords for GdsNode {
    fn to_records(&self) -> GdsResult<Vec<GdsRecord>> {
        Ok(vec![
            GdsRecord::Node,
            GdsRecord::ElemFlags(self.elflags.0, self.elflags.1),
            GdsRecord::Layer(self.layer),
            GdsRecord::Nodetype(self.nodetype),
            GdsRecord::Xy(GdsPoint::flatten_vec(&self.xy)),
            GdsRecord::EndElement,
        ])
    }
}

/// Check `xy` has at least `min` points, as readers will require
fn check_points(elem: &str, xy: &[GdsPoint], min: usize) -> GdsResult<()> {
    if xy.len() < min {
        return Err(GdsError::format(format!(
            "{} requires at least {} points, has {}",
            elem,
            min,
            xy.len()
        )));
    }
    Ok(())
}
