//!
//! # gdstree Data Model
//!

// Std-Lib Imports
use std::collections::BTreeSet;
use std::error::Error;
use std::io::{Read, Write};
use std::ops::{Index, IndexMut};
use std::path::Path;

// Crates.io
use chrono::{Datelike, NaiveDateTime, SubsecRound, Timelike, Utc};
use derive_builder::Builder;
use derive_more::{self, Add, AddAssign};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Workspace Imports
use gdstreeutils::SerdeFile;

// Local Imports
use crate::read::GdsParser;
use crate::write::GdsWriter;

///
/// # Gds Record Types
///
/// In the numeric-order specified by GDSII, for automatic [FromPrimitive] conversions.
/// Only a subset are decoded into [GdsRecord] variants; the rest are named here for diagnostics.
///
#[derive(FromPrimitive, Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum GdsRecordType {
    Header = 0x00,
    BgnLib,
    LibName,
    Units,
    EndLib,
    BgnStruct,
    StructName, // STRNAME
    EndStruct,
    Boundary,
    Path,
    StructRef,
    ArrayRef,
    Text,
    Layer,
    DataType,
    Width,
    Xy,
    EndElement,
    StructRefName, // SNAME
    ColRow,
    TextNode,
    Node,
    TextType,
    Presentation,
    Spacing,
    String,
    Strans,
    Mag,
    Angle,
    Uinteger,
    Ustring,
    RefLibs,
    Fonts,
    PathType,
    Generations,
    AttrTable,
    StypTable,
    StrType,
    ElemFlags,
    ElemKey,
    LinkType,
    LinkKeys,
    Nodetype,
    PropAttr,
    PropValue,
    Box,
    BoxType,
    Plex,
    BeginExtn,
    EndExtn,
    TapeNum,
    TapeCode,
    StrClass,
    Reserved,
    Format,
    Mask,
    EndMasks,
    LibDirSize,
    SrfName,
    LibSecur,
}
impl GdsRecordType {
    /// The record's mnemonic, as written in the GDSII stream-format manual
    pub fn mnemonic(&self) -> &'static str {
        use GdsRecordType::*;
        match self {
            Header => "HEADER",
            BgnLib => "BGNLIB",
            LibName => "LIBNAME",
            Units => "UNITS",
            EndLib => "ENDLIB",
            BgnStruct => "BGNSTR",
            StructName => "STRNAME",
            EndStruct => "ENDSTR",
            Boundary => "BOUNDARY",
            Path => "PATH",
            StructRef => "SREF",
            ArrayRef => "AREF",
            Text => "TEXT",
            Layer => "LAYER",
            DataType => "DATATYPE",
            Width => "WIDTH",
            Xy => "XY",
            EndElement => "ENDEL",
            StructRefName => "SNAME",
            ColRow => "COLROW",
            TextNode => "TEXTNODE",
            Node => "NODE",
            TextType => "TEXTTYPE",
            Presentation => "PRESENTATION",
            Spacing => "SPACING",
            String => "STRING",
            Strans => "STRANS",
            Mag => "MAG",
            Angle => "ANGLE",
            Uinteger => "UINTEGER",
            Ustring => "USTRING",
            RefLibs => "REFLIBS",
            Fonts => "FONTS",
            PathType => "PATHTYPE",
            Generations => "GENERATIONS",
            AttrTable => "ATTRTABLE",
            StypTable => "STYPTABLE",
            StrType => "STRTYPE",
            ElemFlags => "EFLAGS",
            ElemKey => "ELKEY",
            LinkType => "LINKTYPE",
            LinkKeys => "LINKKEYS",
            Nodetype => "NODETYPE",
            PropAttr => "PROPATTR",
            PropValue => "PROPVALUE",
            Box => "BOX",
            BoxType => "BOXTYPE",
            Plex => "PLEX",
            BeginExtn => "BGNEXTN",
            EndExtn => "ENDEXTN",
            TapeNum => "TAPENUM",
            TapeCode => "TAPECODE",
            StrClass => "STRCLASS",
            Reserved => "RESERVED",
            Format => "FORMAT",
            Mask => "MASK",
            EndMasks => "ENDMASKS",
            LibDirSize => "LIBDIRSIZE",
            SrfName => "SRFNAME",
            LibSecur => "LIBSECUR",
        }
    }
    /// Mnemonic for raw tag byte `tag`, or `"UNKNOWN"`
    pub fn mnemonic_of(tag: u8) -> &'static str {
        match <GdsRecordType as FromPrimitive>::from_u8(tag) {
            Some(t) => t.mnemonic(),
            None => "UNKNOWN",
        }
    }
}

/// # Gds DataType Enumeration
/// In order as decoded from the header's datatype byte
#[derive(FromPrimitive, Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum GdsDataType {
    NoData = 0,
    BitArray = 1,
    I16 = 2,
    I32 = 3,
    F32 = 4,
    F64 = 5,
    Str = 6,
}

/// # Gds Record Header
///
/// Decoded contents of a record's four header bytes.
/// `len` is the *total* record size, including the header itself.
/// Tag and datatype are kept as raw bytes, so that records of unmodeled types can be skipped.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsRecordHeader {
    pub rtype: u8,
    pub dtype: u8,
    pub len: u16,
}
impl GdsRecordHeader {
    /// Payload size in bytes
    pub fn payload_len(&self) -> usize {
        usize::from(self.len).saturating_sub(4)
    }
    /// Decoded record type, if one we know of
    pub fn record_type(&self) -> Option<GdsRecordType> {
        <GdsRecordType as FromPrimitive>::from_u8(self.rtype)
    }
    /// The record-type's mnemonic
    pub fn mnemonic(&self) -> &'static str {
        GdsRecordType::mnemonic_of(self.rtype)
    }
}

///
/// # Gds Record Enumeration
///
/// Keeps each record in relatively "raw" form,
/// other than assuring correct sizes,
/// and converting one-entry arrays into scalars.
/// Records of types not otherwise modeled decode to [GdsRecord::Other],
/// which retains their payload.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GdsRecord {
    Header { version: i16 },
    BgnLib { dates: [i16; 12] },
    LibName(String),
    Units(f64, f64),
    EndLib,
    BgnStruct { dates: [i16; 12] },
    StructName(String),    // STRNAME Record
    StructRefName(String), // SNAME Record
    EndStruct,
    Boundary,
    Path,
    StructRef,
    ArrayRef,
    Text,
    Layer(i16),
    DataType(i16),
    Width(i32),
    Xy(Vec<i32>),
    EndElement,
    ColRow { cols: i16, rows: i16 },
    Node,
    TextType(i16),
    Presentation(u8, u8),
    String(String),
    Strans(u8, u8),
    Mag(f64),
    Angle(f64),
    PathType(i16),
    ElemFlags(u8, u8),
    Nodetype(i16),
    Other { rtype: u8, dtype: u8, data: Vec<u8> },
}
impl GdsRecord {
    /// Raw tag byte
    pub fn rtype(&self) -> u8 {
        use GdsRecordType as T;
        let t = match self {
            Self::Header { .. } => T::Header,
            Self::BgnLib { .. } => T::BgnLib,
            Self::LibName(_) => T::LibName,
            Self::Units(..) => T::Units,
            Self::EndLib => T::EndLib,
            Self::BgnStruct { .. } => T::BgnStruct,
            Self::StructName(_) => T::StructName,
            Self::StructRefName(_) => T::StructRefName,
            Self::EndStruct => T::EndStruct,
            Self::Boundary => T::Boundary,
            Self::Path => T::Path,
            Self::StructRef => T::StructRef,
            Self::ArrayRef => T::ArrayRef,
            Self::Text => T::Text,
            Self::Layer(_) => T::Layer,
            Self::DataType(_) => T::DataType,
            Self::Width(_) => T::Width,
            Self::Xy(_) => T::Xy,
            Self::EndElement => T::EndElement,
            Self::ColRow { .. } => T::ColRow,
            Self::Node => T::Node,
            Self::TextType(_) => T::TextType,
            Self::Presentation(..) => T::Presentation,
            Self::String(_) => T::String,
            Self::Strans(..) => T::Strans,
            Self::Mag(_) => T::Mag,
            Self::Angle(_) => T::Angle,
            Self::PathType(_) => T::PathType,
            Self::ElemFlags(..) => T::ElemFlags,
            Self::Nodetype(_) => T::Nodetype,
            Self::Other { rtype, .. } => return *rtype,
        };
        t as u8
    }
    /// The record-type's mnemonic
    pub fn mnemonic(&self) -> &'static str {
        GdsRecordType::mnemonic_of(self.rtype())
    }
}

/// # Gds Floating Point
/// ## GDSII's Home-Grown Floating-Point Format
///
/// GDSII predates IEEE754, and carries its own eight-byte "excess-64" format:
/// one sign bit, a seven-bit base-16 exponent biased by 64, and a 56-bit mantissa.
/// A value is `(-1)^sign * (mantissa / 2^56) * 16^(exponent - 64)`.
///
/// The [GdsFloat64] struct is not used as a data-store, but largely a namespace
/// for the `encode` and `decode` operations to and from IEEE754 double-precision format.
///
/// Every finite `f64` between [GdsFloat64::min_positive] and [GdsFloat64::max_value] (in magnitude)
/// survives an encode-decode cycle exactly, as its 53-bit significand fits in the 56-bit mantissa.
///
pub struct GdsFloat64;
impl GdsFloat64 {
    /// Decode GDSII's eight-byte representation, stored as a `u64`, to `f64`
    pub fn decode(val: u64) -> f64 {
        let neg = (val & 0x8000_0000_0000_0000) != 0;
        let exp: i32 = ((val >> 56) & 0x7F) as i32 - 64;
        let mantissa = (val & 0x00FF_FFFF_FFFF_FFFF) as f64 / 2f64.powi(56);
        let magnitude = mantissa * 16f64.powi(exp);
        if neg {
            -magnitude
        } else {
            magnitude
        }
    }
    /// Encode `f64` to GDSII's eight bytes, stored as `u64`.
    ///
    /// Zero (of either sign) and values too small to represent encode as all-zero bytes.
    /// Infinite, NaN, and too-large values fail.
    pub fn encode(val: f64) -> GdsResult<u64> {
        if val == 0.0 {
            return Ok(0);
        }
        if !val.is_finite() {
            return Err(GdsError::format(format!("Cannot encode {} as a GDSII real", val)));
        }
        let sign: u64 = if val < 0.0 { 1 << 63 } else { 0 };
        // Normalize into [1/16, 1), tracking the biased exponent
        let mut mag = val.abs();
        let mut exp: i32 = 64;
        while mag >= 1.0 {
            mag /= 16.0;
            exp += 1;
        }
        while mag < 1.0 / 16.0 {
            mag *= 16.0;
            exp -= 1;
        }
        let mut mantissa = (mag * 2f64.powi(56)).round() as u64;
        if mantissa >> 56 != 0 {
            // Rounded up to 1.0
            mantissa >>= 4;
            exp += 1;
        }
        if exp < 0 {
            return Ok(0);
        }
        if exp > 0x7F {
            return Err(GdsError::format(format!(
                "Value {} exceeds the GDSII real range",
                val
            )));
        }
        Ok(sign | (exp as u64) << 56 | mantissa)
    }
    /// Smallest positive value representable in normalized form, `16^-65`
    pub fn min_positive() -> f64 {
        16f64.powi(-65)
    }
    /// Largest finite `f64` which round-trips through the format, `(1 - 2^-53) * 16^63`
    pub fn max_value() -> f64 {
        (1.0 - f64::EPSILON / 2.0) * 16f64.powi(63)
    }
}

/// # Gds Translation Settings
/// Reflection and absolute-setting flags for text-elements and references.
/// As configured by `STRANS` records.
#[derive(Default, Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsStrans {
    /// Reflection, about the x-axis.
    /// Applied before rotation.
    #[serde(default, skip_serializing_if = "is_false")]
    pub reflected: bool,
    /// Absolute Magnification Setting
    #[serde(default, skip_serializing_if = "is_false")]
    pub abs_mag: bool,
    /// Absolute Angle Setting
    #[serde(default, skip_serializing_if = "is_false")]
    pub abs_angle: bool,
}
impl GdsStrans {
    /// Decode from the two bytes of a `STRANS` record
    pub fn decode(d0: u8, d1: u8) -> Self {
        Self {
            reflected: d0 & 0x80 != 0,
            abs_mag: d1 & 0x04 != 0,
            abs_angle: d1 & 0x02 != 0,
        }
    }
    /// Encode to the two bytes of a `STRANS` record
    pub fn encode(&self) -> (u8, u8) {
        (
            (self.reflected as u8) << 7,
            (self.abs_mag as u8) << 2 | (self.abs_angle as u8) << 1,
        )
    }
}

/// # Gds Text-Presentation Flags
/// Sets fonts, text justification, and the like.
/// Stored in raw `u8` form.
#[derive(Default, Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsPresentation(pub u8, pub u8);

/// # Gds Element Flags
/// As configured by `EFLAGS` records.
/// Two bytes of bit-fields stored in raw `u8` form.
#[derive(Default, Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsElemFlags(pub u8, pub u8);

/// # Gds Library Units
///
/// Each GDSII Library has two length-units, referred to as "DB Units" and "User Units" respectively.
/// Essentially all spatial data throughout the Library is denoted in "DB Units".
///
/// From the `UNITS` record-description:
/// ```text
/// Contains two eight-byte real numbers.
/// The first number is the size of a database-unit, in user-units.
/// The second is the size of a database-unit in meters.
/// ```
///
/// These two numbers are stored as-is, and in wire order, in the [GdsUnits] tuple-struct.
///
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct GdsUnits(pub f64, pub f64);
impl GdsUnits {
    /// Create a new [GdsUnits]
    pub fn new(num1: f64, num2: f64) -> Self {
        Self(num1, num2)
    }
    /// Get the database-unit size, in meters. Used for all spatial data.
    pub fn db_unit(&self) -> f64 {
        self.1
    }
    /// Get the user-unit size, in meters. Largely for display/ debug.
    pub fn user_unit(&self) -> f64 {
        self.1 / self.0
    }
}
impl Default for GdsUnits {
    /// Default values for GDS Units:
    /// * DB-Unit = 1nm
    /// * User-Unit = 1µm (1000x the DB-Unit)
    fn default() -> Self {
        Self(1e-3, 1e-9)
    }
}

/// # Gds Spatial Point
/// Coordinate in (x,y) layout-space.
/// Denoted in each [GdsLibrary]'s [GdsUnits].
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct GdsPoint {
    pub x: i32,
    pub y: i32,
}
impl GdsPoint {
    /// Create a new [GdsPoint]
    pub fn new(x: i32, y: i32) -> Self {
        GdsPoint { x, y }
    }
    /// Create a vector of [GdsPoint] from an array of tuples
    pub fn vec(pts: &[(i32, i32)]) -> Vec<Self> {
        pts.iter().map(|pt| Self::new(pt.0, pt.1)).collect()
    }
    /// Convert an n-element slice of `i32` into an n/2-element vector of [GdsPoint]s.
    /// Callers ensure `from` has even length; a trailing odd value is dropped.
    pub(crate) fn parse_vec(from: &[i32]) -> Vec<GdsPoint> {
        from.chunks_exact(2)
            .map(|c| GdsPoint::new(c[0], c[1]))
            .collect()
    }
    /// Convert a slice of [GdsPoint]s to a 2n-element i32 vector.
    pub(crate) fn flatten_vec(src: &[GdsPoint]) -> Vec<i32> {
        src.iter().flat_map(|pt| [pt.x, pt.y]).collect()
    }
}

/// # Structure Handle
///
/// Index of a [GdsStruct] in its [GdsLibrary]'s `structs` arena.
/// Handles are only meaningful for the library that issued them,
/// and only until a struct is removed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, JsonSchema,
)]
pub struct GdsStructId(pub usize);

///
/// # Gds Boundary Element
///
/// The most common type for closed-form shapes in GDSII.
/// Most IC layout is comprised of [GdsBoundary] elements, which represent individual polygons.
/// GDSII dictates that the first and final coordinates in each [GdsBoundary]
/// shall be identical, "closing" the polygon.
/// Hence an N-sided polygon is represented by an (N+1)-point `xy` vector, and at least four points.
///
/// Record sequence:
/// ```text
/// BOUNDARY [EFLAGS] LAYER DATATYPE XY ENDEL
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into))]
pub struct GdsBoundary {
    /// Layer Number
    pub layer: i16,
    /// DataType ID
    pub datatype: i16,
    /// Vector of x,y coordinates
    pub xy: Vec<GdsPoint>,
    #[serde(default)]
    #[builder(default)]
    pub elflags: GdsElemFlags,
}

///
/// # Gds Path Element
///
/// Record sequence:
/// ```text
/// PATH [EFLAGS] LAYER DATATYPE [PATHTYPE] [WIDTH] XY ENDEL
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into))]
pub struct GdsPath {
    /// Layer Number
    pub layer: i16,
    /// DataType ID
    pub datatype: i16,
    /// Vector of x,y coordinates. At least two.
    pub xy: Vec<GdsPoint>,
    /// End-cap style. 0 = flush, 1 = round, 2 = half-width square.
    /// Other values are kept as read.
    #[serde(default)]
    #[builder(default)]
    pub path_type: i16,
    /// Width, in database units
    #[serde(default)]
    #[builder(default)]
    pub width: i32,
    #[serde(default)]
    #[builder(default)]
    pub elflags: GdsElemFlags,
}

///
/// # Gds Struct Reference (Cell Instance)
///
/// Represents an instance of a layout-cell.
/// Coordinate `xy` is the instance's origin.
/// Reflection flags are held in `strans`, while magnification and rotation
/// (in degrees, counter-clockwise) are held in `mag` and `angle`.
///
/// The `target` handle is set by [GdsLibrary::build_cell_links], and is never serialized.
///
/// Record sequence:
/// ```text
/// SREF [EFLAGS] SNAME [STRANS [MAG] [ANGLE]] XY ENDEL
/// ```
///
#[derive(Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into))]
pub struct GdsStructRef {
    /// Struct (Cell) Name
    pub name: String,
    /// Location x,y coordinates
    pub xy: GdsPoint,
    /// Reflection & Absolute Settings
    #[serde(default)]
    #[builder(default)]
    pub strans: GdsStrans,
    /// Magnification
    #[serde(default = "unit_mag")]
    #[builder(default = "1.0")]
    pub mag: f64,
    /// Rotation, in degrees counter-clockwise
    #[serde(default)]
    #[builder(default)]
    pub angle: f64,
    #[serde(default)]
    #[builder(default)]
    pub elflags: GdsElemFlags,
    /// Resolved target struct
    #[serde(skip)]
    #[builder(setter(skip))]
    pub target: Option<GdsStructId>,
}
impl Default for GdsStructRef {
    fn default() -> Self {
        Self {
            name: String::new(),
            xy: GdsPoint::default(),
            strans: GdsStrans::default(),
            mag: 1.0,
            angle: 0.0,
            elflags: GdsElemFlags::default(),
            target: None,
        }
    }
}

///
/// # Gds Array Reference
///
/// A two-dimensional array of struct (cell) instances.
/// `xy` holds, in order, the array origin,
/// the point displaced from it by `cols` column-pitches,
/// and the point displaced from it by `rows` row-pitches.
///
/// Record sequence:
/// ```text
/// AREF [EFLAGS] SNAME [STRANS [MAG] [ANGLE]] COLROW XY ENDEL
/// ```
///
#[derive(Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into))]
pub struct GdsArrayRef {
    /// Struct (Cell) Name
    pub name: String,
    /// Origin, column-axis and row-axis points
    pub xy: [GdsPoint; 3],
    /// Number of columns
    pub cols: i16,
    /// Number of rows
    pub rows: i16,
    /// Reflection & Absolute Settings
    #[serde(default)]
    #[builder(default)]
    pub strans: GdsStrans,
    /// Magnification
    #[serde(default = "unit_mag")]
    #[builder(default = "1.0")]
    pub mag: f64,
    /// Rotation, in degrees counter-clockwise
    #[serde(default)]
    #[builder(default)]
    pub angle: f64,
    #[serde(default)]
    #[builder(default)]
    pub elflags: GdsElemFlags,
    /// Resolved target struct
    #[serde(skip)]
    #[builder(setter(skip))]
    pub target: Option<GdsStructId>,
}
impl Default for GdsArrayRef {
    fn default() -> Self {
        Self {
            name: String::new(),
            xy: [GdsPoint::default(); 3],
            cols: 0,
            rows: 0,
            strans: GdsStrans::default(),
            mag: 1.0,
            angle: 0.0,
            elflags: GdsElemFlags::default(),
            target: None,
        }
    }
}

///
/// # Gds Text Element
///
/// Record sequence:
/// ```text
/// TEXT [EFLAGS] LAYER TEXTTYPE [PRESENTATION] [STRANS] XY STRING ENDEL
/// ```
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into))]
pub struct GdsTextElem {
    /// Text Value
    pub string: String,
    /// Layer Number
    pub layer: i16,
    /// Text-Type ID
    pub texttype: i16,
    /// Location
    pub xy: GdsPoint,
    #[serde(default)]
    #[builder(default)]
    pub presentation: GdsPresentation,
    #[serde(default)]
    #[builder(default)]
    pub strans: GdsStrans,
    #[serde(default)]
    #[builder(default)]
    pub elflags: GdsElemFlags,
}

///
/// # Gds Node Element
///
/// Record sequence:
/// ```text
/// NODE [EFLAGS] LAYER NODETYPE XY ENDEL
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into))]
pub struct GdsNode {
    /// Layer Number
    pub layer: i16,
    /// Node-Type ID
    pub nodetype: i16,
    /// Vector of x,y coordinates. Any number, including none.
    pub xy: Vec<GdsPoint>,
    #[serde(default)]
    #[builder(default)]
    pub elflags: GdsElemFlags,
}

///
/// # Gds Element Enumeration
///
/// Primary union of geometric elements, instances, and arrays which comprise a GDSII struct (cell).
///
#[derive(derive_more::From, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub enum GdsElement {
    GdsBoundary(GdsBoundary),
    GdsPath(GdsPath),
    GdsStructRef(GdsStructRef),
    GdsArrayRef(GdsArrayRef),
    GdsTextElem(GdsTextElem),
    GdsNode(GdsNode),
}
impl GdsElement {
    /// The element-opening record type, fixed by variant
    pub fn tag(&self) -> GdsRecordType {
        match self {
            Self::GdsBoundary(_) => GdsRecordType::Boundary,
            Self::GdsPath(_) => GdsRecordType::Path,
            Self::GdsStructRef(_) => GdsRecordType::StructRef,
            Self::GdsArrayRef(_) => GdsRecordType::ArrayRef,
            Self::GdsTextElem(_) => GdsRecordType::Text,
            Self::GdsNode(_) => GdsRecordType::Node,
        }
    }
    /// Name of the referenced struct, for [GdsStructRef]s and [GdsArrayRef]s
    pub fn ref_name(&self) -> Option<&str> {
        match self {
            Self::GdsStructRef(r) => Some(&r.name),
            Self::GdsArrayRef(r) => Some(&r.name),
            _ => None,
        }
    }
    /// Resolved target of a [GdsStructRef] or [GdsArrayRef]
    pub fn target(&self) -> Option<GdsStructId> {
        match self {
            Self::GdsStructRef(r) => r.target,
            Self::GdsArrayRef(r) => r.target,
            _ => None,
        }
    }
    /// Layer and datatype (or analog), for elements which have them
    pub fn layerspec(&self) -> Option<GdsLayerSpec> {
        match self {
            Self::GdsBoundary(e) => Some(e.layerspec()),
            Self::GdsPath(e) => Some(e.layerspec()),
            Self::GdsTextElem(e) => Some(e.layerspec()),
            Self::GdsNode(e) => Some(e.layerspec()),
            Self::GdsStructRef(_) | Self::GdsArrayRef(_) => None,
        }
    }
}

/// # Gds Summary Stats
///
/// Summary statistics for a [GdsLibrary] or [GdsStruct].
/// Total numbers of elements of each type.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Add, AddAssign)]
pub struct GdsStats {
    pub libraries: usize,
    pub structs: usize,
    pub boundaries: usize,
    pub paths: usize,
    pub struct_refs: usize,
    pub array_refs: usize,
    pub text_elems: usize,
    pub nodes: usize,
}

/// # Gds Date & Time
///
/// Six two-byte integers: year, month, day, hour, minute, and second.
/// Values read from GDSII are stored as-is, with no validation for real dates & times.
/// The default is the creation time, with a full (four-digit) year.
///
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsDateTime {
    pub year: i16,
    pub month: i16,
    pub day: i16,
    pub hour: i16,
    pub minute: i16,
    pub second: i16,
}
impl From<NaiveDateTime> for GdsDateTime {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year() as i16,
            month: dt.month() as i16,
            day: dt.day() as i16,
            hour: dt.hour() as i16,
            minute: dt.minute() as i16,
            second: dt.second() as i16,
        }
    }
}
impl GdsDateTime {
    /// Get the current time, rounded to the second
    pub fn now() -> Self {
        Utc::now().naive_utc().round_subsecs(0).into()
    }
    pub(crate) fn from_words(w: &[i16]) -> Self {
        Self {
            year: w[0],
            month: w[1],
            day: w[2],
            hour: w[3],
            minute: w[4],
            second: w[5],
        }
    }
    pub(crate) fn words(&self) -> [i16; 6] {
        [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }
}
impl Default for GdsDateTime {
    fn default() -> Self {
        Self::now()
    }
}

/// # Gds Modification & Access Dates & Times
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsDateTimes {
    /// Last Modification Date & Time
    pub modified: GdsDateTime,
    /// Last Access Date & Time
    pub accessed: GdsDateTime,
}
impl GdsDateTimes {
    /// Decode from the twelve words of a `BGNLIB` or `BGNSTR` record
    pub fn decode(d: &[i16; 12]) -> Self {
        Self {
            modified: GdsDateTime::from_words(&d[0..6]),
            accessed: GdsDateTime::from_words(&d[6..12]),
        }
    }
    /// Encode in GDSII's twelve-word format
    pub fn encode(&self) -> [i16; 12] {
        let mut rv = [0; 12];
        rv[0..6].copy_from_slice(&self.modified.words());
        rv[6..12].copy_from_slice(&self.accessed.words());
        rv
    }
}
impl Default for GdsDateTimes {
    /// Makes a single call to `Utc::now()`, so the two dates are the same.
    fn default() -> Self {
        let now = GdsDateTime::now();
        Self {
            modified: now,
            accessed: now,
        }
    }
}

///
/// # Gds Struct (Cell) Definition
///
/// GDSII's primary hierarchical layout-definition object is its "struct",
/// which most other layout systems would call a "cell" or "module".
///
/// [GdsStruct]s are principally composed of an ordered vector of [GdsElement]s.
/// Order is preserved through reading and writing.
///
/// The `referenced_by` set lists the structs which instantiate this one.
/// It is populated solely by [GdsLibrary::build_cell_links].
///
/// Record sequence:
/// ```text
/// BGNSTR STRNAME {<element>}* ENDSTR
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into))]
pub struct GdsStruct {
    /// Struct Name
    pub name: String,
    /// Modification & Access Dates & Times
    pub dates: GdsDateTimes,
    /// Elements List
    pub elems: Vec<GdsElement>,
    /// Structs which reference this one
    #[serde(skip)]
    #[builder(setter(skip))]
    pub referenced_by: BTreeSet<GdsStructId>,
}
impl GdsStruct {
    /// Create a new and empty [GdsStruct]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
    /// Count and return our element statistics
    pub fn stats(&self) -> GdsStats {
        let mut stats = GdsStats::default();
        stats.structs += 1;
        for elem in &self.elems {
            use GdsElement::*;
            match elem {
                GdsBoundary(_) => stats.boundaries += 1,
                GdsPath(_) => stats.paths += 1,
                GdsStructRef(_) => stats.struct_refs += 1,
                GdsArrayRef(_) => stats.array_refs += 1,
                GdsTextElem(_) => stats.text_elems += 1,
                GdsNode(_) => stats.nodes += 1,
            };
        }
        stats
    }
}

///
/// # Gds Library
///
/// The Library is GDSII's primary idiom for a suite of layout-cells.
/// A Library generally corresponds one-to-one with a `.gds` file.
/// Libraries consist primarily of cell-definitions ([GdsStruct]s),
/// and secondarily include library-level meta-data, including the distance units, GDS version, and modification dates.
///
/// Structs are held in an arena, the `structs` vector, and addressed by [GdsStructId].
/// Names are expected to be unique; lookups return the first match.
///
/// Record sequence:
/// ```text
/// HEADER BGNLIB [LIBNAME] UNITS {<structure>}* ENDLIB
/// ```
///
#[derive(Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into))]
pub struct GdsLibrary {
    /// Library Name
    #[builder(default)]
    pub name: String,
    /// Gds Version
    pub version: i16,
    /// Modification & Access Dates & Times
    pub dates: GdsDateTimes,
    /// Spatial Units
    #[builder(default)]
    pub units: GdsUnits,
    /// Struct Definitions
    #[builder(default)]
    pub structs: Vec<GdsStruct>,
}
impl Default for GdsLibrary {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: 3,
            dates: GdsDateTimes::default(),
            units: GdsUnits::default(),
            structs: Vec::new(),
        }
    }
}
impl GdsLibrary {
    /// Create a new and empty [GdsLibrary]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
    /// Read a GDS loaded from file at path `fname`
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<GdsLibrary> {
        GdsParser::open(fname)?.parse_lib()
    }
    /// Alias for [`GdsLibrary::open`]
    pub fn load(fname: impl AsRef<Path>) -> GdsResult<GdsLibrary> {
        GdsLibrary::open(fname)
    }
    /// Read a [GdsLibrary] from byte-slice `bytes`
    pub fn from_bytes(bytes: &[u8]) -> GdsResult<GdsLibrary> {
        GdsParser::new(bytes).parse_lib()
    }
    /// Read a [GdsLibrary] from any byte source
    pub fn read(src: impl Read) -> GdsResult<GdsLibrary> {
        GdsParser::new(src).parse_lib()
    }
    /// Save to file `fname`
    pub fn save(&self, fname: impl AsRef<Path>) -> GdsResult<()> {
        let mut wr = GdsWriter::open(fname)?;
        wr.write_lib(self)
    }
    /// Write to destination `dest`
    pub fn write(&self, dest: impl Write) -> GdsResult<()> {
        let mut wr = GdsWriter::new(dest);
        wr.write_lib(self)
    }
    /// Encode to a vector of bytes
    pub fn to_bytes(&self) -> GdsResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write(&mut bytes)?;
        Ok(bytes)
    }
    /// Collect and return the library's aggregate statistics
    /// (numbers of structs, elements by type)
    pub fn stats(&self) -> GdsStats {
        let mut stats = GdsStats::default();
        stats.libraries += 1;
        for strukt in self.structs.iter() {
            stats += strukt.stats();
        }
        stats
    }
    /// Set the library and all its structs' modification and access times
    pub fn set_all_dates(&mut self, time: impl Into<GdsDateTime>) {
        let time: GdsDateTime = time.into();
        let dates = GdsDateTimes {
            modified: time,
            accessed: time,
        };
        self.dates = dates;
        for strukt in &mut self.structs {
            strukt.dates = dates;
        }
    }
    /// Find the first struct named `name`
    pub fn find(&self, name: &str) -> Option<GdsStructId> {
        self.structs
            .iter()
            .position(|s| s.name == name)
            .map(GdsStructId)
    }
    /// Get the first struct named `name`
    pub fn get(&self, name: &str) -> Option<&GdsStruct> {
        self.structs.iter().find(|s| s.name == name)
    }
    /// Get a mutable reference to the first struct named `name`
    pub fn get_mut(&mut self, name: &str) -> Option<&mut GdsStruct> {
        self.structs.iter_mut().find(|s| s.name == name)
    }
    /// Get the struct with handle `id`, if it exists
    pub fn strukt(&self, id: GdsStructId) -> Option<&GdsStruct> {
        self.structs.get(id.0)
    }
    /// Get a mutable reference to the struct with handle `id`, if it exists
    pub fn strukt_mut(&mut self, id: GdsStructId) -> Option<&mut GdsStruct> {
        self.structs.get_mut(id.0)
    }
    /// Get or create the struct named `name`, returning its handle.
    ///
    /// Returns the existing struct's handle if one is already so named;
    /// only otherwise is a new and empty struct appended.
    pub fn add(&mut self, name: impl Into<String>) -> GdsStructId {
        let name = name.into();
        if let Some(id) = self.find(&name) {
            return id;
        }
        self.structs.push(GdsStruct::new(name));
        GdsStructId(self.structs.len() - 1)
    }
    /// Remove and return the first struct named `name`.
    ///
    /// Removal shifts the handles of all later structs,
    /// so all resolved links (targets and referrers) are cleared.
    /// Run [GdsLibrary::build_cell_links] again to restore them.
    pub fn delete(&mut self, name: &str) -> Option<GdsStruct> {
        let id = self.find(name)?;
        self.clear_links();
        let mut removed = self.structs.remove(id.0);
        removed.referenced_by.clear();
        Some(removed)
    }
}
impl Index<GdsStructId> for GdsLibrary {
    type Output = GdsStruct;
    fn index(&self, id: GdsStructId) -> &GdsStruct {
        &self.structs[id.0]
    }
}
impl IndexMut<GdsStructId> for GdsLibrary {
    fn index_mut(&mut self, id: GdsStructId) -> &mut GdsStruct {
        &mut self.structs[id.0]
    }
}
// Enable [GdsLibrary] and [GdsStruct] serialization to file, in each of `utils` supported formats.
impl SerdeFile for GdsLibrary {}
impl SerdeFile for GdsStruct {}

/// # Gds Layer Spec
///
/// Each GDSII element's layer is specified by a set of two numbers,
/// commonly referred to as `layer` and `datatype`.
/// Several element-types refer to their analog of `datatype` by different names,
/// e.g. `texttype` and `nodetype`.
///
/// `GdsLayerSpecs` generalize across these via the `xtype` field,
/// which holds whichever is appropriate for the given element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GdsLayerSpec {
    /// Layer ID Number
    pub layer: i16,
    /// DataType (or TextType, NodeType) ID Number
    pub xtype: i16,
}
impl GdsLayerSpec {
    /// Create a new [GdsLayerSpec]
    pub fn new(layer: i16, xtype: i16) -> GdsLayerSpec {
        GdsLayerSpec { layer, xtype }
    }
}
/// # Has-Layer Trait
/// Sole function `layerspec` returns a [GdsLayerSpec] including the two numbers `layer` and `xtype`.
pub trait HasLayer {
    fn layerspec(&self) -> GdsLayerSpec;
}
impl HasLayer for GdsBoundary {
    fn layerspec(&self) -> GdsLayerSpec {
        GdsLayerSpec::new(self.layer, self.datatype)
    }
}
impl HasLayer for GdsPath {
    fn layerspec(&self) -> GdsLayerSpec {
        GdsLayerSpec::new(self.layer, self.datatype)
    }
}
impl HasLayer for GdsTextElem {
    fn layerspec(&self) -> GdsLayerSpec {
        GdsLayerSpec::new(self.layer, self.texttype)
    }
}
impl HasLayer for GdsNode {
    fn layerspec(&self) -> GdsLayerSpec {
        GdsLayerSpec::new(self.layer, self.nodetype)
    }
}

/// # Gds Context
/// Enumeration of each context in which a record can be parsed, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdsContext {
    Library,
    Struct,
    StructRef,
    ArrayRef,
    Boundary,
    Path,
    Text,
    Node,
}

/// # GdsResult Type-Alias
pub type GdsResult<T> = Result<T, GdsError>;

/// # Gds Error Enumeration
///
/// Reading and writing fail in one of two ways:
/// the underlying stream fails ([GdsError::Io]),
/// or the data violates the format ([GdsError::Format]).
/// Traversals of the reference graph can additionally find cycles ([GdsError::Cycle]).
#[derive(Debug)]
pub enum GdsError {
    /// Stream exhausted, unreadable or unwritable
    Io(std::io::Error),
    /// Format violation
    Format {
        /// Description, naming the offending record with its declared and expected sizes
        msg: String,
        /// Stream position at detection, in bytes
        bytepos: u64,
        /// Parse-context stack, outermost first
        ctx: Vec<GdsContext>,
    },
    /// Reference cycle through the named struct
    Cycle(String),
    /// Boxed (External) Errors
    Boxed(Box<dyn Error + Send + Sync>),
}
impl GdsError {
    /// Create a [GdsError::Format] without position or context
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format {
            msg: msg.into(),
            bytepos: 0,
            ctx: Vec::new(),
        }
    }
    /// Boolean indication of I/O failures
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
    /// Boolean indication of format violations
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}
impl std::fmt::Display for GdsError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "GDSII I/O error: {}", e),
            Self::Format { msg, bytepos, ctx } => {
                write!(f, "GDSII format error: {} (at byte {}", msg, bytepos)?;
                if !ctx.is_empty() {
                    write!(f, ", in {:?}", ctx)?;
                }
                write!(f, ")")
            }
            Self::Cycle(name) => write!(f, "Reference cycle through struct `{}`", name),
            Self::Boxed(e) => write!(f, "{}", e),
        }
    }
}
impl std::error::Error for GdsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl From<std::io::Error> for GdsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
impl From<gdstreeutils::ser::Error> for GdsError {
    fn from(e: gdstreeutils::ser::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}

/// Our helper for "do not serialize default `false` boolean values".
fn is_false(b: &bool) -> bool {
    !b
}
/// Default magnification, for `#[serde(default)]`
fn unit_mag() -> f64 {
    1.0
}

#[cfg(any(test, feature = "selftest"))]
/// Check `lib` matches across a write-read round-trip cycle, through a temporary file.
/// Resolved links are not serialized, and are excluded from the comparison.
pub fn roundtrip(lib: &GdsLibrary) -> GdsResult<()> {
    use std::io::{Seek, SeekFrom};
    use tempfile::tempfile;

    let mut file = tempfile()?;
    lib.write(&mut file)?;

    file.seek(SeekFrom::Start(0))?;
    let lib2 = GdsLibrary::read(std::io::BufReader::new(file))?;

    let mut expected = lib.clone();
    expected.clear_links();
    if expected != lib2 {
        return Err(GdsError::format(format!(
            "Round-trip mismatch for library `{}`",
            lib.name
        )));
    }
    Ok(())
}
