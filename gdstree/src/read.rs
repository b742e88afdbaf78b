//!
//! # gdstree Reading & Parsing
//!

// Std-Lib Imports
use std::collections::HashSet;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

// Crates.io
use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, trace, warn};

// Workspace Imports
use gdstreeutils::{ErrorHelper, Unwrapper};

// Local Imports
use crate::data::*;

/// # GdsReader
///
/// Record-level decoder over any byte source.
/// Tracks its own byte position, so sources need not implement [std::io::Seek].
pub struct GdsReader<R: Read> {
    /// Byte source
    src: R,
    /// Bytes consumed so far
    pos: u64,
}
impl GdsReader<BufReader<File>> {
    /// Create a [GdsReader], opening [File] at path `fname`
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<Self> {
        let file = File::open(fname)?;
        Ok(Self::new(BufReader::new(file)))
    }
}
impl<R: Read> GdsReader<R> {
    /// Create a [GdsReader] of `src`
    pub fn new(src: R) -> Self {
        Self { src, pos: 0 }
    }
    /// Get the current stream position
    pub fn pos(&self) -> u64 {
        self.pos
    }
    /// Read the next record-header.
    /// Fails on short reads, and on sizes which cannot hold a header or are odd.
    pub fn read_record_header(&mut self) -> GdsResult<GdsRecordHeader> {
        let start = self.pos;
        let len = self.src.read_u16::<BigEndian>()?;
        let rtype = self.src.read_u8()?;
        let dtype = self.src.read_u8()?;
        self.pos += 4;
        let header = GdsRecordHeader { rtype, dtype, len };
        if len < 4 {
            return Err(self.invalid_len(&header, start, "at least 4"));
        }
        if len % 2 != 0 {
            return Err(self.invalid_len(&header, start, "an even number"));
        }
        Ok(header)
    }
    /// Read the next binary-encoded [GdsRecord].
    /// Returns a [GdsError] if the stream is not on a record-boundary,
    /// or if its declared size does not match its record-type.
    pub fn read_record(&mut self) -> GdsResult<GdsRecord> {
        let start = self.pos;
        let header = self.read_record_header()?;
        self.read_record_content(&header, start)
    }
    /// Decode the payload following `header`, which began at stream position `start`.
    /// Datatype bytes are not checked; producers disagree on them.
    fn read_record_content(
        &mut self,
        header: &GdsRecordHeader,
        start: u64,
    ) -> GdsResult<GdsRecord> {
        use GdsRecordType as T;
        let len = header.payload_len();
        let rtype = match header.record_type() {
            Some(t) => t,
            None => return self.read_other(header),
        };
        // Check fixed sizes first. `None` for variable-sized and unmodeled records.
        let expected: Option<usize> = match rtype {
            T::EndLib
            | T::EndStruct
            | T::Boundary
            | T::Path
            | T::StructRef
            | T::ArrayRef
            | T::Text
            | T::Node
            | T::EndElement => Some(0),
            T::Header
            | T::Layer
            | T::DataType
            | T::TextType
            | T::Nodetype
            | T::PathType
            | T::ElemFlags
            | T::Strans
            | T::Presentation => Some(2),
            T::Width | T::ColRow => Some(4),
            T::Mag | T::Angle => Some(8),
            T::Units => Some(16),
            T::BgnLib | T::BgnStruct => Some(24),
            _ => None,
        };
        if let Some(expected) = expected {
            if len != expected {
                let expected = (expected + 4).to_string();
                return Err(self.invalid_len(header, start, &expected));
            }
        }
        let record = match rtype {
            // Library-Level Records
            T::Header => GdsRecord::Header {
                version: self.read_i16()?,
            },
            T::BgnLib => GdsRecord::BgnLib {
                dates: self.read_dates()?,
            },
            T::LibName => GdsRecord::LibName(self.read_str(len)?),
            T::Units => GdsRecord::Units(self.read_f64()?, self.read_f64()?),
            T::EndLib => GdsRecord::EndLib,

            // Structure (Cell) Level Records
            T::BgnStruct => GdsRecord::BgnStruct {
                dates: self.read_dates()?,
            },
            T::StructName => GdsRecord::StructName(self.read_str(len)?),
            T::EndStruct => GdsRecord::EndStruct,

            // Element-Level Records
            T::Boundary => GdsRecord::Boundary,
            T::Path => GdsRecord::Path,
            T::StructRef => GdsRecord::StructRef,
            T::ArrayRef => GdsRecord::ArrayRef,
            T::Text => GdsRecord::Text,
            T::Node => GdsRecord::Node,
            T::EndElement => GdsRecord::EndElement,
            T::StructRefName => GdsRecord::StructRefName(self.read_str(len)?),
            T::Layer => GdsRecord::Layer(self.read_i16()?),
            T::DataType => GdsRecord::DataType(self.read_i16()?),
            T::TextType => GdsRecord::TextType(self.read_i16()?),
            T::Nodetype => GdsRecord::Nodetype(self.read_i16()?),
            T::PathType => GdsRecord::PathType(self.read_i16()?),
            T::Width => GdsRecord::Width(self.read_i32()?),
            T::Xy => {
                if len % 8 != 0 {
                    return Err(self.invalid_len(header, start, "4 + 8n"));
                }
                let mut d = vec![0; len / 4];
                self.src.read_i32_into::<BigEndian>(&mut d)?;
                self.pos += len as u64;
                GdsRecord::Xy(d)
            }
            T::ColRow => GdsRecord::ColRow {
                cols: self.read_i16()?,
                rows: self.read_i16()?,
            },
            T::ElemFlags => {
                let (d0, d1) = self.read_bits()?;
                GdsRecord::ElemFlags(d0, d1)
            }
            T::Strans => {
                let (d0, d1) = self.read_bits()?;
                GdsRecord::Strans(d0, d1)
            }
            T::Presentation => {
                let (d0, d1) = self.read_bits()?;
                GdsRecord::Presentation(d0, d1)
            }
            T::String => GdsRecord::String(self.read_str(len)?),
            T::Mag => GdsRecord::Mag(self.read_f64()?),
            T::Angle => GdsRecord::Angle(self.read_f64()?),

            // Everything else is carried, undecoded
            _ => return self.read_other(header),
        };
        Ok(record)
    }
    /// Read the payload of an unmodeled record into a [GdsRecord::Other]
    fn read_other(&mut self, header: &GdsRecordHeader) -> GdsResult<GdsRecord> {
        let data = self.read_bytes(header.payload_len())?;
        Ok(GdsRecord::Other {
            rtype: header.rtype,
            dtype: header.dtype,
            data,
        })
    }
    /// Create the error for a record of unexpected size
    fn invalid_len(&self, header: &GdsRecordHeader, start: u64, expected: &str) -> GdsError {
        GdsError::Format {
            msg: format!(
                "Invalid {} record (tag 0x{:02x}, datatype 0x{:02x}): declared size {}, expected {}",
                header.mnemonic(),
                header.rtype,
                header.dtype,
                header.len,
                expected
            ),
            bytepos: start,
            ctx: Vec::new(),
        }
    }
    /// Read `len` bytes and convert to `String`, stripping NUL padding.
    /// Non-UTF8 content is replaced lossily, and logged.
    fn read_str(&mut self, len: usize) -> GdsResult<String> {
        let mut data = self.read_bytes(len)?;
        while data.last() == Some(&0x00) {
            data.pop();
        }
        match String::from_utf8(data) {
            Ok(s) => Ok(s),
            Err(e) => {
                let s = String::from_utf8_lossy(e.as_bytes()).into_owned();
                warn!("Non-UTF8 string replaced lossily: {:?}", s);
                Ok(s)
            }
        }
    }
    /// Read `len` bytes
    fn read_bytes(&mut self, len: usize) -> GdsResult<Vec<u8>> {
        let mut rv = vec![0; len];
        self.src.read_exact(&mut rv)?;
        self.pos += len as u64;
        Ok(rv)
    }
    /// Read the two bytes of a bit-array
    fn read_bits(&mut self) -> GdsResult<(u8, u8)> {
        let d0 = self.src.read_u8()?;
        let d1 = self.src.read_u8()?;
        self.pos += 2;
        Ok((d0, d1))
    }
    fn read_i16(&mut self) -> GdsResult<i16> {
        let rv = self.src.read_i16::<BigEndian>()?;
        self.pos += 2;
        Ok(rv)
    }
    fn read_i32(&mut self) -> GdsResult<i32> {
        let rv = self.src.read_i32::<BigEndian>()?;
        self.pos += 4;
        Ok(rv)
    }
    /// Read eight bytes, decoding GDSII's float-format along the way
    fn read_f64(&mut self) -> GdsResult<f64> {
        let rv = self.src.read_u64::<BigEndian>()?;
        self.pos += 8;
        Ok(GdsFloat64::decode(rv))
    }
    /// Read the twelve words of a date-pair
    fn read_dates(&mut self) -> GdsResult<[i16; 12]> {
        let mut rv = [0; 12];
        self.src.read_i16_into::<BigEndian>(&mut rv)?;
        self.pos += 24;
        Ok(rv)
    }
}

/// # GdsParser
///
/// Builds the [GdsLibrary] tree from a stream of [GdsRecord]s, one record at a time.
/// Records which have no meaning in their context are skipped,
/// having already been consumed (and size-checked) by the underlying [GdsReader].
pub struct GdsParser<R: Read> {
    /// Record reader
    rdr: GdsReader<R>,
    /// Number of records read
    numread: usize,
    /// Context stack, for error reporting
    ctx_stack: Vec<GdsContext>,
}
impl GdsParser<BufReader<File>> {
    /// Create a [GdsParser], opening [File] at path `fname`
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<Self> {
        let file = File::open(fname)?;
        Ok(Self::new(BufReader::new(file)))
    }
}
impl<R: Read> GdsParser<R> {
    /// Create a new [GdsParser] of `src`
    pub fn new(src: R) -> Self {
        Self {
            rdr: GdsReader::new(src),
            numread: 0,
            ctx_stack: Vec::new(),
        }
    }
    /// Number of records read so far
    pub fn numread(&self) -> usize {
        self.numread
    }
    /// Read the next record, attaching our context to any format errors
    fn next(&mut self) -> GdsResult<GdsRecord> {
        match self.rdr.read_record() {
            Ok(r) => {
                self.numread += 1;
                Ok(r)
            }
            Err(GdsError::Format { msg, bytepos, .. }) => Err(GdsError::Format {
                msg,
                bytepos,
                ctx: self.ctx_stack.clone(),
            }),
            Err(e) => Err(e),
        }
    }
    /// Parse a [GdsLibrary]. Generally the start-state when reading a GDS file.
    pub fn parse_lib(&mut self) -> GdsResult<GdsLibrary> {
        self.ctx_stack.push(GdsContext::Library);
        let mut lib = GdsLibraryBuilder::default();
        // HEADER and BGNLIB must come first, in order
        lib = match self.next()? {
            GdsRecord::Header { version } => lib.version(version),
            r => {
                let msg = format!("Invalid library: expected HEADER, found {}", r.mnemonic());
                return self.fail(msg);
            }
        };
        lib = match self.next()? {
            GdsRecord::BgnLib { dates } => lib.dates(GdsDateTimes::decode(&dates)),
            r => {
                let msg = format!("Invalid library: expected BGNLIB, found {}", r.mnemonic());
                return self.fail(msg);
            }
        };
        let mut structs = Vec::<GdsStruct>::new();
        let mut names = HashSet::<String>::new();
        let mut has_units = false;
        loop {
            let r = self.next()?;
            lib = match r {
                GdsRecord::EndLib => break,
                GdsRecord::LibName(d) => lib.name(d),
                GdsRecord::Units(d0, d1) => {
                    has_units = true;
                    lib.units(GdsUnits(d0, d1))
                }
                GdsRecord::BgnStruct { dates } => {
                    let strukt = self.parse_struct(&dates)?;
                    if !names.insert(strukt.name.clone()) {
                        warn!(
                            "Duplicate struct name `{}`; lookups resolve to the first",
                            strukt.name
                        );
                    }
                    structs.push(strukt);
                    lib
                }
                r => {
                    self.skip(&r);
                    lib
                }
            };
        }
        if !has_units {
            warn!("Library has no UNITS record; using the default units");
        }
        lib = lib.structs(structs);
        let lib = self.built(lib.build())?;
        debug!(
            "Read library `{}`: {} structs from {} records",
            lib.name,
            lib.structs.len(),
            self.numread
        );
        self.ctx_stack.pop();
        Ok(lib)
    }
    /// Parse a cell ([GdsStruct]), from just after its `BGNSTR` record
    fn parse_struct(&mut self, dates: &[i16; 12]) -> GdsResult<GdsStruct> {
        self.ctx_stack.push(GdsContext::Struct);
        let mut strukt = GdsStructBuilder::default().dates(GdsDateTimes::decode(dates));
        let mut elems = Vec::<GdsElement>::new();
        loop {
            let r = self.next()?;
            match r {
                GdsRecord::EndStruct => break,
                GdsRecord::StructName(d) => strukt = strukt.name(d),
                GdsRecord::Boundary => elems.push(self.parse_boundary()?.into()),
                GdsRecord::Path => elems.push(self.parse_path()?.into()),
                GdsRecord::StructRef => elems.push(self.parse_struct_ref()?.into()),
                GdsRecord::ArrayRef => elems.push(self.parse_array_ref()?.into()),
                GdsRecord::Text => elems.push(self.parse_text_elem()?.into()),
                GdsRecord::Node => elems.push(self.parse_node()?.into()),
                r => self.skip(&r),
            };
        }
        strukt = strukt.elems(elems);
        let strukt = self.built(strukt.build())?;
        trace!("Read struct `{}`: {} elements", strukt.name, strukt.elems.len());
        self.ctx_stack.pop();
        Ok(strukt)
    }
    /// Parse a [GdsBoundary]
    fn parse_boundary(&mut self) -> GdsResult<GdsBoundary> {
        self.ctx_stack.push(GdsContext::Boundary);
        let mut b = GdsBoundaryBuilder::default();
        loop {
            let r = self.next()?;
            b = match r {
                GdsRecord::EndElement => break,
                GdsRecord::ElemFlags(d0, d1) => b.elflags(GdsElemFlags(d0, d1)),
                GdsRecord::Layer(d) => b.layer(d),
                GdsRecord::DataType(d) => b.datatype(d),
                GdsRecord::Xy(d) => b.xy(self.parse_xy(&d, 4, "BOUNDARY")?),
                r => {
                    self.skip(&r);
                    b
                }
            };
        }
        let b = self.built(b.build())?;
        self.ctx_stack.pop();
        Ok(b)
    }
    /// Parse a [GdsPath]
    fn parse_path(&mut self) -> GdsResult<GdsPath> {
        self.ctx_stack.push(GdsContext::Path);
        let mut b = GdsPathBuilder::default();
        loop {
            let r = self.next()?;
            b = match r {
                GdsRecord::EndElement => break,
                GdsRecord::ElemFlags(d0, d1) => b.elflags(GdsElemFlags(d0, d1)),
                GdsRecord::Layer(d) => b.layer(d),
                GdsRecord::DataType(d) => b.datatype(d),
                GdsRecord::PathType(d) => b.path_type(d),
                GdsRecord::Width(d) => b.width(d),
                GdsRecord::Xy(d) => b.xy(self.parse_xy(&d, 2, "PATH")?),
                r => {
                    self.skip(&r);
                    b
                }
            };
        }
        let b = self.built(b.build())?;
        self.ctx_stack.pop();
        Ok(b)
    }
    /// Parse a [GdsStructRef]
    fn parse_struct_ref(&mut self) -> GdsResult<GdsStructRef> {
        self.ctx_stack.push(GdsContext::StructRef);
        let mut b = GdsStructRefBuilder::default();
        loop {
            let r = self.next()?;
            b = match r {
                GdsRecord::EndElement => break,
                GdsRecord::ElemFlags(d0, d1) => b.elflags(GdsElemFlags(d0, d1)),
                GdsRecord::StructRefName(d) => b.name(d),
                GdsRecord::Strans(d0, d1) => b.strans(GdsStrans::decode(d0, d1)),
                GdsRecord::Mag(d) => b.mag(d),
                GdsRecord::Angle(d) => b.angle(d),
                GdsRecord::Xy(d) => b.xy(self.parse_point(&d, "SREF")?),
                r => {
                    self.skip(&r);
                    b
                }
            };
        }
        let b = self.built(b.build())?;
        self.ctx_stack.pop();
        Ok(b)
    }
    /// Parse a [GdsArrayRef]
    fn parse_array_ref(&mut self) -> GdsResult<GdsArrayRef> {
        self.ctx_stack.push(GdsContext::ArrayRef);
        let mut b = GdsArrayRefBuilder::default();
        loop {
            let r = self.next()?;
            b = match r {
                GdsRecord::EndElement => break,
                GdsRecord::ElemFlags(d0, d1) => b.elflags(GdsElemFlags(d0, d1)),
                GdsRecord::StructRefName(d) => b.name(d),
                GdsRecord::Strans(d0, d1) => b.strans(GdsStrans::decode(d0, d1)),
                GdsRecord::Mag(d) => b.mag(d),
                GdsRecord::Angle(d) => b.angle(d),
                GdsRecord::ColRow { cols, rows } => b.cols(cols).rows(rows),
                GdsRecord::Xy(d) => {
                    if d.len() != 6 {
                        return self.fail(xy_size_msg("AREF", &d, "28"));
                    }
                    let xy: [GdsPoint; 3] = GdsPoint::parse_vec(&d)
                        .try_into()
                        .ok()
                        .unwrapper(&*self, "Invalid XY for AREF")?;
                    b.xy(xy)
                }
                r => {
                    self.skip(&r);
                    b
                }
            };
        }
        let b = self.built(b.build())?;
        self.ctx_stack.pop();
        Ok(b)
    }
    /// Parse a [GdsTextElem]
    fn parse_text_elem(&mut self) -> GdsResult<GdsTextElem> {
        self.ctx_stack.push(GdsContext::Text);
        let mut b = GdsTextElemBuilder::default();
        loop {
            let r = self.next()?;
            b = match r {
                GdsRecord::EndElement => break,
                GdsRecord::ElemFlags(d0, d1) => b.elflags(GdsElemFlags(d0, d1)),
                GdsRecord::Layer(d) => b.layer(d),
                GdsRecord::TextType(d) => b.texttype(d),
                GdsRecord::Presentation(d0, d1) => b.presentation(GdsPresentation(d0, d1)),
                GdsRecord::Strans(d0, d1) => b.strans(GdsStrans::decode(d0, d1)),
                GdsRecord::Xy(d) => b.xy(self.parse_point(&d, "TEXT")?),
                GdsRecord::String(d) => b.string(d),
                r => {
                    self.skip(&r);
                    b
                }
            };
        }
        let b = self.built(b.build())?;
        self.ctx_stack.pop();
        Ok(b)
    }
    /// Parse a [GdsNode]
    fn parse_node(&mut self) -> GdsResult<GdsNode> {
        self.ctx_stack.push(GdsContext::Node);
        let mut b = GdsNodeBuilder::default();
        loop {
            let r = self.next()?;
            b = match r {
                GdsRecord::EndElement => break,
                GdsRecord::ElemFlags(d0, d1) => b.elflags(GdsElemFlags(d0, d1)),
                GdsRecord::Layer(d) => b.layer(d),
                GdsRecord::Nodetype(d) => b.nodetype(d),
                GdsRecord::Xy(d) => b.xy(GdsPoint::parse_vec(&d)),
                r => {
                    self.skip(&r);
                    b
                }
            };
        }
        let b = self.built(b.build())?;
        self.ctx_stack.pop();
        Ok(b)
    }
    /// Convert XY record content `d` to at least `min` points
    fn parse_xy(&self, d: &[i32], min: usize, elem: &str) -> GdsResult<Vec<GdsPoint>> {
        if d.len() < 2 * min {
            let expected = format!("at least {}", 4 + 8 * min);
            return self.fail(xy_size_msg(elem, d, &expected));
        }
        Ok(GdsPoint::parse_vec(d))
    }
    /// Convert XY record content `d` to exactly one point
    fn parse_point(&self, d: &[i32], elem: &str) -> GdsResult<GdsPoint> {
        match d {
            [x, y] => Ok(GdsPoint::new(*x, *y)),
            _ => self.fail(xy_size_msg(elem, d, "12")),
        }
    }
    /// Convert a builder result, failing with the missing-field message
    fn built<T, E: Display>(&self, res: Result<T, E>) -> GdsResult<T> {
        res.map_err(|e| self.err(format!("Incomplete {:?}: {}", self.ctx(), e)))
    }
    /// Log a record with no meaning in our current context
    fn skip(&self, r: &GdsRecord) {
        trace!("Skipping {} record in {:?}", r.mnemonic(), self.ctx());
    }
    /// Our innermost context
    fn ctx(&self) -> Option<GdsContext> {
        self.ctx_stack.last().copied()
    }
}
impl<R: Read> ErrorHelper for GdsParser<R> {
    type Error = GdsError;
    /// Create a [GdsError::Format] at our current position and context
    fn err(&self, msg: impl Into<String>) -> GdsError {
        GdsError::Format {
            msg: msg.into(),
            bytepos: self.rdr.pos(),
            ctx: self.ctx_stack.clone(),
        }
    }
}

/// Error message for an XY record of the wrong size in element `elem`
fn xy_size_msg(elem: &str, d: &[i32], expected: &str) -> String {
    format!(
        "Invalid XY record in {}: declared size {}, expected {}",
        elem,
        4 + 4 * d.len(),
        expected
    )
}
