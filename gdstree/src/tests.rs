//!
//! # gdstree Unit Tests
//!

// Std-Lib Imports
use std::collections::BTreeSet;

// Crates.io
use chrono::NaiveDate;

// Workspace Imports
use gdstreeutils::SerdeFile;

// Local Imports
use crate::bbox::*;
use crate::data::*;
use crate::links::GdsLinkReport;
use crate::read::*;
use crate::write::*;

/// Install a test logger, once
fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}
/// Specified creation date for test cases
fn test_dates() -> GdsDateTimes {
    let test_date: GdsDateTime = NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 1)
        .unwrap()
        .into();
    GdsDateTimes {
        modified: test_date,
        accessed: test_date,
    }
}
/// Encode a raw record, with arbitrary (and potentially invalid) size and content
fn raw(rtype: GdsRecordType, dtype: u8, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 4) as u16;
    let mut bytes = len.to_be_bytes().to_vec();
    bytes.push(rtype as u8);
    bytes.push(dtype);
    bytes.extend_from_slice(payload);
    bytes
}
/// Encode a sequence of valid records
fn encode(records: &[GdsRecord]) -> GdsResult<Vec<u8>> {
    let mut bytes = Vec::new();
    {
        let mut wr = GdsWriter::new(&mut bytes);
        for r in records {
            wr.write_record(r)?;
        }
    }
    Ok(bytes)
}
/// Records opening a library named `LIB`, and within it a struct named `CELL`
fn lib_prefix() -> GdsResult<Vec<u8>> {
    encode(&[
        GdsRecord::Header { version: 5 },
        GdsRecord::BgnLib { dates: [0; 12] },
        GdsRecord::LibName("LIB".into()),
        GdsRecord::Units(1e-3, 1e-9),
        GdsRecord::BgnStruct { dates: [0; 12] },
        GdsRecord::StructName("CELL".into()),
    ])
}
/// Records closing the struct and library opened by [lib_prefix]
fn lib_suffix() -> GdsResult<Vec<u8>> {
    encode(&[GdsRecord::EndStruct, GdsRecord::EndLib])
}
/// Extract the message of a format error, panicking on anything else
fn format_msg<T: std::fmt::Debug>(res: GdsResult<T>) -> String {
    match res {
        Err(GdsError::Format { msg, .. }) => msg,
        other => panic!("Expected a format error, got {:?}", other),
    }
}
/// Square boundary of side `size`, with lower-left corner at the origin
fn square(size: i32) -> GdsBoundary {
    GdsBoundary {
        layer: 1,
        datatype: 0,
        xy: GdsPoint::vec(&[(0, 0), (size, 0), (size, size), (0, size), (0, 0)]),
        ..Default::default()
    }
}
/// Reference to struct `name` at (`x`, `y`)
fn sref(name: &str, x: i32, y: i32) -> GdsStructRef {
    GdsStructRef {
        name: name.into(),
        xy: GdsPoint::new(x, y),
        ..Default::default()
    }
}

#[test]
fn floats() -> GdsResult<()> {
    // Test conversions between normal-human and GDSII floating-point formats
    assert_eq!(GdsFloat64::encode(0.0)?, 0);
    assert_eq!(GdsFloat64::encode(-0.0)?, 0);
    assert_eq!(GdsFloat64::decode(0), 0.0);
    assert_eq!(GdsFloat64::encode(1.0)?, 0x4110_0000_0000_0000);
    assert_eq!(GdsFloat64::encode(-1.0)?, 0xC110_0000_0000_0000);
    assert_eq!(GdsFloat64::encode(0.5)?, 0x4080_0000_0000_0000);
    for val in [
        1.0,
        -1.0,
        0.5,
        1e-9,
        1e9,
        1e-3,
        1e-11,
        -0.69,
        -33.33e-33,
        90.0,
        GdsFloat64::min_positive(),
        GdsFloat64::max_value(),
        -GdsFloat64::max_value(),
    ] {
        let d = GdsFloat64::decode(GdsFloat64::encode(val)?);
        assert_eq!(d, val);
    }
    Ok(())
}
#[test]
fn float_range() -> GdsResult<()> {
    // Too-small values flush to zero; too-large and non-finite values fail
    assert_eq!(GdsFloat64::encode(1e-300)?, 0);
    assert!(GdsFloat64::encode(1e300).is_err());
    assert!(GdsFloat64::encode(f64::NAN).is_err());
    assert!(GdsFloat64::encode(f64::INFINITY).is_err());
    assert!(GdsFloat64::encode(f64::NEG_INFINITY).unwrap_err().is_format());
    Ok(())
}
#[test]
fn strans_bits() {
    let s = GdsStrans {
        reflected: true,
        abs_mag: true,
        abs_angle: false,
    };
    assert_eq!(s.encode(), (0x80, 0x04));
    assert_eq!(GdsStrans::decode(0x80, 0x04), s);
    assert_eq!(GdsStrans::decode(0x00, 0x02).abs_angle, true);
    assert_eq!(GdsStrans::default().encode(), (0, 0));
}
#[test]
fn it_reads_records() -> GdsResult<()> {
    let bytes = encode(&[
        GdsRecord::Header { version: 600 },
        GdsRecord::LibName("ODD".into()),
        GdsRecord::Xy(vec![1, -2, 3, -4]),
    ])?;
    // Odd-length strings are padded
    assert_eq!(bytes[6..8], [0, 8]);
    let mut rdr = GdsReader::new(bytes.as_slice());
    assert_eq!(rdr.read_record()?, GdsRecord::Header { version: 600 });
    assert_eq!(rdr.read_record()?, GdsRecord::LibName("ODD".into()));
    assert_eq!(rdr.read_record()?, GdsRecord::Xy(vec![1, -2, 3, -4]));
    assert_eq!(rdr.pos(), bytes.len() as u64);
    // And the stream is exhausted
    assert!(rdr.read_record().unwrap_err().is_io());
    Ok(())
}
#[test]
fn it_checks_record_sizes() -> GdsResult<()> {
    init_log();
    // EFLAGS must be six bytes
    let mut bytes = lib_prefix()?;
    bytes.extend(raw(GdsRecordType::Boundary, 0, &[]));
    bytes.extend(raw(GdsRecordType::ElemFlags, 1, &[0; 4]));
    let res = GdsLibrary::from_bytes(&bytes);
    match res {
        Err(GdsError::Format { ref msg, ref ctx, .. }) => {
            assert!(msg.contains("EFLAGS"), "{}", msg);
            assert!(msg.contains("declared size 8, expected 6"), "{}", msg);
            assert_eq!(
                ctx,
                &vec![GdsContext::Library, GdsContext::Struct, GdsContext::Boundary]
            );
        }
        other => panic!("Expected a format error, got {:?}", other),
    }

    // COLROW must be eight bytes
    let mut bytes = lib_prefix()?;
    bytes.extend(raw(GdsRecordType::ArrayRef, 0, &[]));
    bytes.extend(raw(GdsRecordType::ColRow, 2, &[0; 6]));
    let msg = format_msg(GdsLibrary::from_bytes(&bytes));
    assert!(msg.contains("COLROW"), "{}", msg);
    assert!(msg.contains("expected 8"), "{}", msg);

    // AREF XY must be 28 bytes
    let mut bytes = lib_prefix()?;
    bytes.extend(raw(GdsRecordType::ArrayRef, 0, &[]));
    bytes.extend(raw(GdsRecordType::Xy, 3, &[0; 16]));
    let msg = format_msg(GdsLibrary::from_bytes(&bytes));
    assert!(msg.contains("XY"), "{}", msg);
    assert!(msg.contains("AREF"), "{}", msg);
    assert!(msg.contains("expected 28"), "{}", msg);

    // SREF XY must be 12 bytes
    let mut bytes = lib_prefix()?;
    bytes.extend(raw(GdsRecordType::StructRef, 0, &[]));
    bytes.extend(raw(GdsRecordType::Xy, 3, &[0; 16]));
    let msg = format_msg(GdsLibrary::from_bytes(&bytes));
    assert!(msg.contains("SREF") && msg.contains("expected 12"), "{}", msg);

    // Boundaries require at least four points
    let mut bytes = lib_prefix()?;
    bytes.extend(encode(&[GdsRecord::Boundary, GdsRecord::Xy(vec![0; 6])])?);
    let msg = format_msg(GdsLibrary::from_bytes(&bytes));
    assert!(msg.contains("BOUNDARY") && msg.contains("at least 36"), "{}", msg);

    // XY content must be whole points
    let mut bytes = lib_prefix()?;
    bytes.extend(raw(GdsRecordType::Node, 0, &[]));
    bytes.extend(raw(GdsRecordType::Xy, 3, &[0; 12]));
    let msg = format_msg(GdsLibrary::from_bytes(&bytes));
    assert!(msg.contains("XY") && msg.contains("4 + 8n"), "{}", msg);

    // Odd and header-less sizes
    let msg = format_msg(GdsReader::new(&[0u8, 5, 0x0D, 2, 0][..]).read_record());
    assert!(msg.contains("LAYER") && msg.contains("even"), "{}", msg);
    let msg = format_msg(GdsReader::new(&[0u8, 2, 0x00, 2][..]).read_record());
    assert!(msg.contains("HEADER") && msg.contains("at least 4"), "{}", msg);
    Ok(())
}
#[test]
fn it_requires_header_first() -> GdsResult<()> {
    let bytes = encode(&[
        GdsRecord::BgnLib { dates: [0; 12] },
        GdsRecord::Header { version: 5 },
        GdsRecord::EndLib,
    ])?;
    let msg = format_msg(GdsLibrary::from_bytes(&bytes));
    assert!(msg.contains("expected HEADER, found BGNLIB"), "{}", msg);

    let bytes = encode(&[GdsRecord::Header { version: 5 }, GdsRecord::EndLib])?;
    let msg = format_msg(GdsLibrary::from_bytes(&bytes));
    assert!(msg.contains("expected BGNLIB, found ENDLIB"), "{}", msg);
    Ok(())
}
#[test]
fn it_defaults_missing_units() -> GdsResult<()> {
    // A library without UNITS is accepted, with a warning, and the default units
    init_log();
    let bytes = encode(&[
        GdsRecord::Header { version: 5 },
        GdsRecord::BgnLib { dates: [0; 12] },
        GdsRecord::LibName("NOUNITS".into()),
        GdsRecord::EndLib,
    ])?;
    let lib = GdsLibrary::from_bytes(&bytes)?;
    assert_eq!(lib.name, "NOUNITS");
    assert_eq!(lib.units, GdsUnits::default());
    Ok(())
}
#[test]
fn it_requires_fields() -> GdsResult<()> {
    // Boundary without XY
    let mut bytes = lib_prefix()?;
    bytes.extend(encode(&[
        GdsRecord::Boundary,
        GdsRecord::Layer(1),
        GdsRecord::DataType(0),
        GdsRecord::EndElement,
    ])?);
    bytes.extend(lib_suffix()?);
    let msg = format_msg(GdsLibrary::from_bytes(&bytes));
    assert!(msg.contains("xy"), "{}", msg);
    Ok(())
}
#[test]
fn it_fails_on_truncation() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("trunc");
    let cell = lib.add("cell");
    lib[cell].elems.push(square(10).into());
    let bytes = lib.to_bytes()?;
    let err = GdsLibrary::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
    assert!(err.is_io());
    let err = GdsLibrary::from_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(err.is_io());
    Ok(())
}
#[test]
fn it_skips_unmodeled_records() -> GdsResult<()> {
    init_log();
    let mut bytes = encode(&[
        GdsRecord::Header { version: 5 },
        GdsRecord::BgnLib { dates: [0; 12] },
    ])?;
    // Unknown tag at library level
    bytes.extend(raw(GdsRecordType::RefLibs, 6, b"other.gds\0"));
    bytes.extend(encode(&[
        GdsRecord::LibName("LIB".into()),
        GdsRecord::Units(1e-3, 1e-9),
        GdsRecord::BgnStruct { dates: [0; 12] },
        GdsRecord::StructName("CELL".into()),
        GdsRecord::Boundary,
        GdsRecord::Layer(2),
        GdsRecord::DataType(3),
        GdsRecord::Xy(GdsPoint::flatten_vec(&square(4).xy)),
    ])?);
    // Properties inside an element
    bytes.extend(raw(GdsRecordType::PropAttr, 2, &[0, 1]));
    bytes.extend(raw(GdsRecordType::PropValue, 6, b"hi"));
    bytes.extend(encode(&[GdsRecord::EndElement])?);
    // And a BOX element, skipped record by record
    bytes.extend(raw(GdsRecordType::Box, 0, &[]));
    bytes.extend(encode(&[GdsRecord::Layer(5)])?);
    bytes.extend(raw(GdsRecordType::BoxType, 2, &[0, 0]));
    bytes.extend(encode(&[
        GdsRecord::Xy(GdsPoint::flatten_vec(&square(4).xy)),
        GdsRecord::EndElement,
    ])?);
    bytes.extend(lib_suffix()?);
    // Trailing content after ENDLIB is ignored
    bytes.extend([0xFF; 7]);

    let lib = GdsLibrary::from_bytes(&bytes)?;
    assert_eq!(lib.version, 5);
    assert_eq!(lib.structs.len(), 1);
    assert_eq!(
        lib.structs[0].elems,
        vec![GdsElement::GdsBoundary(GdsBoundary {
            layer: 2,
            datatype: 3,
            ..square(4)
        })]
    );
    // Unmodeled records are also retained at the record-level
    let bytes = raw(GdsRecordType::PropValue, 6, b"hi");
    let mut rdr = GdsReader::new(bytes.as_slice());
    assert_eq!(
        rdr.read_record()?,
        GdsRecord::Other {
            rtype: 0x2C,
            dtype: 6,
            data: b"hi".to_vec()
        }
    );
    Ok(())
}
#[test]
fn it_round_trips_elements() -> GdsResult<()> {
    init_log();
    let mut lib = GdsLibrary::new("elems");
    lib.dates = test_dates();
    lib.units = GdsUnits::new(1e-3, 1e-9);
    let mut strukt = GdsStruct::new("has_everything");
    strukt.dates = test_dates();
    strukt.elems = vec![
        GdsBoundary {
            elflags: GdsElemFlags(0x00, 0x01),
            ..square(10)
        }
        .into(),
        GdsPathBuilder::default()
            .layer(3i16)
            .datatype(1i16)
            .path_type(2i16)
            .width(20)
            .xy(GdsPoint::vec(&[(0, 0), (0, 100), (50, 100)]))
            .build()
            .unwrap()
            .into(),
        GdsStructRef {
            name: "odd".into(),
            xy: GdsPoint::new(-5, 7),
            strans: GdsStrans {
                reflected: true,
                abs_mag: false,
                abs_angle: true,
            },
            mag: 0.0,
            angle: 0.0,
            ..Default::default()
        }
        .into(),
        GdsArrayRef {
            name: "arrayed".into(),
            xy: [
                GdsPoint::new(0, 0),
                GdsPoint::new(300, 0),
                GdsPoint::new(0, 200),
            ],
            cols: 3,
            rows: 2,
            mag: 1.5,
            angle: 270.0,
            ..Default::default()
        }
        .into(),
        GdsTextElem {
            string: "abc".into(),
            layer: 63,
            texttype: 5,
            xy: GdsPoint::new(1, 2),
            presentation: GdsPresentation(0x00, 0x05),
            ..Default::default()
        }
        .into(),
        GdsTextElem {
            string: "".into(),
            ..Default::default()
        }
        .into(),
        GdsNode {
            layer: 4,
            nodetype: 2,
            xy: vec![],
            ..Default::default()
        }
        .into(),
        GdsNode {
            layer: 4,
            nodetype: 2,
            xy: GdsPoint::vec(&[(1, 1), (2, 2), (3, 3)]),
            ..Default::default()
        }
        .into(),
    ];
    lib.structs.push(strukt);
    let mut odd = GdsStruct::new("odd");
    odd.dates = test_dates();
    lib.structs.push(odd);

    // Through a file
    roundtrip(&lib)?;
    // And through memory
    let lib2 = GdsLibrary::from_bytes(&lib.to_bytes()?)?;
    assert_eq!(lib2, lib);
    Ok(())
}
#[test]
fn it_writes_canonical_records() -> GdsResult<()> {
    // Optional fields are always written, in order
    let r = GdsStructRef {
        name: "x".into(),
        ..Default::default()
    };
    let records = GdsElement::from(r).to_records()?;
    let names: Vec<&str> = records.iter().map(|r| r.mnemonic()).collect();
    assert_eq!(
        names,
        vec!["SREF", "EFLAGS", "SNAME", "STRANS", "MAG", "ANGLE", "XY", "ENDEL"]
    );
    let t = GdsTextElem::default();
    let records = t.to_records()?;
    let names: Vec<&str> = records.iter().map(|r| r.mnemonic()).collect();
    assert_eq!(
        names,
        vec![
            "TEXT",
            "EFLAGS",
            "LAYER",
            "TEXTTYPE",
            "PRESENTATION",
            "STRANS",
            "XY",
            "STRING",
            "ENDEL",
        ]
    );
    Ok(())
}
#[test]
fn it_validates_writes() -> GdsResult<()> {
    // Too few points
    let b = GdsBoundary {
        xy: GdsPoint::vec(&[(0, 0), (1, 0), (0, 0)]),
        ..Default::default()
    };
    assert!(b.to_records().unwrap_err().is_format());
    let p = GdsPath {
        xy: GdsPoint::vec(&[(0, 0)]),
        ..Default::default()
    };
    assert!(p.to_records().unwrap_err().is_format());

    // Too long for a single record
    let mut lib = GdsLibrary::new("big");
    let cell = lib.add("big");
    let xy = (0..8200).map(|i| GdsPoint::new(i, i % 2)).collect();
    lib[cell].elems.push(
        GdsBoundary {
            xy,
            ..Default::default()
        }
        .into(),
    );
    let msg = format_msg(lib.to_bytes());
    assert!(msg.contains("XY record too long"), "{}", msg);
    Ok(())
}
#[test]
fn it_builds() {
    let b = GdsBoundaryBuilder::default()
        .layer(1i16)
        .datatype(0i16)
        .xy(square(2).xy)
        .build()
        .unwrap();
    assert_eq!(b, square(2));
    // Missing required fields
    assert!(GdsBoundaryBuilder::default().layer(1i16).build().is_err());
    // Optional fields default, including unit magnification
    let r = GdsStructRefBuilder::default()
        .name("x")
        .xy(GdsPoint::new(0, 0))
        .build()
        .unwrap();
    assert_eq!(r.mag, 1.0);
    assert_eq!(r.target, None);
}
#[test]
fn element_tags() {
    let elems: Vec<GdsElement> = vec![
        square(1).into(),
        GdsPath::default().into(),
        GdsStructRef::default().into(),
        GdsArrayRef::default().into(),
        GdsTextElem::default().into(),
        GdsNode::default().into(),
    ];
    let tags: Vec<GdsRecordType> = elems.iter().map(|e| e.tag()).collect();
    use GdsRecordType::*;
    assert_eq!(tags, vec![Boundary, Path, StructRef, ArrayRef, Text, Node]);
    assert_eq!(elems[0].layerspec(), Some(GdsLayerSpec::new(1, 0)));
    assert_eq!(elems[2].layerspec(), None);
    assert_eq!(elems[2].ref_name(), Some(""));
    assert_eq!(elems[4].ref_name(), None);
}
#[test]
fn library_ops() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("ops");
    assert!(lib.get("X").is_none());
    assert!(lib.find("X").is_none());
    let x = lib.add("X");
    assert_eq!(lib.add("X"), x);
    assert_eq!(lib.structs.len(), 1);
    let y = lib.add("Y");
    assert_ne!(x, y);
    assert_eq!(lib.find("Y"), Some(y));
    assert_eq!(lib.get("Y").map(|s| s.name.as_str()), Some("Y"));
    lib.get_mut("Y").unwrap().elems.push(square(3).into());
    assert_eq!(lib.strukt(y).map(|s| s.elems.len()), Some(1));

    let removed = lib.delete("X").unwrap();
    assert_eq!(removed.name, "X");
    assert!(lib.get("X").is_none());
    assert!(lib.delete("X").is_none());
    // Later handles shift down
    assert_eq!(lib.find("Y"), Some(GdsStructId(0)));
    Ok(())
}
#[test]
fn duplicate_names() -> GdsResult<()> {
    init_log();
    let mut lib = GdsLibrary::new("dups");
    lib.structs.push(GdsStruct::new("DUP"));
    let mut second = GdsStruct::new("DUP");
    second.elems.push(square(1).into());
    lib.structs.push(second);
    let lib2 = GdsLibrary::from_bytes(&lib.to_bytes()?)?;
    // Both are kept, and lookups find the first
    assert_eq!(lib2.structs.len(), 2);
    assert_eq!(lib2.find("DUP"), Some(GdsStructId(0)));
    assert!(lib2.get("DUP").unwrap().elems.is_empty());
    Ok(())
}
#[test]
fn it_links() -> GdsResult<()> {
    init_log();
    let mut lib = GdsLibrary::new("links");
    let a = lib.add("A");
    let b = lib.add("B");
    lib[a].elems.push(sref("B", 0, 0).into());
    lib[b].elems.push(square(10).into());

    for _ in 0..2 {
        let report = lib.build_cell_links(false);
        assert_eq!(
            report,
            GdsLinkReport {
                resolved: 1,
                unresolved: 0,
                removed: 0
            }
        );
        assert_eq!(lib[a].elems[0].target(), Some(b));
        assert_eq!(lib[b].referenced_by, BTreeSet::from([a]));
        assert!(lib[a].referenced_by.is_empty());
    }
    assert_eq!(lib.top_structs(), vec![a]);

    lib.clear_links();
    assert_eq!(lib[a].elems[0].target(), None);
    assert!(lib[b].referenced_by.is_empty());
    Ok(())
}
#[test]
fn it_removes_dirty_links() -> GdsResult<()> {
    init_log();
    let mut lib = GdsLibrary::new("dirty");
    let a = lib.add("A");
    lib[a].elems = vec![
        sref("missing", 0, 0).into(),
        square(1).into(),
        GdsArrayRef {
            name: "also_missing".into(),
            cols: 1,
            rows: 1,
            ..Default::default()
        }
        .into(),
        sref("A", 0, 0).into(),
    ];
    let report = lib.build_cell_links(false);
    assert_eq!(report.unresolved, 2);
    assert_eq!(report.resolved, 1);
    assert_eq!(lib[a].elems.len(), 4);
    assert_eq!(lib[a].elems[0].target(), None);

    let report = lib.build_cell_links(true);
    assert_eq!(report.removed, 2);
    assert_eq!(report.unresolved, 0);
    assert_eq!(lib[a].elems.len(), 2);
    assert_eq!(lib[a].elems[1].ref_name(), Some("A"));
    // Self-reference
    assert_eq!(lib[a].referenced_by, BTreeSet::from([a]));
    Ok(())
}
#[test]
fn delete_clears_links() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("del");
    let a = lib.add("A");
    lib.add("B");
    lib.add("C");
    lib[a].elems.push(sref("C", 0, 0).into());
    lib.build_cell_links(false);
    assert_eq!(lib[a].elems[0].target(), Some(GdsStructId(2)));

    lib.delete("B");
    assert_eq!(lib[a].elems[0].target(), None);
    assert!(lib.get("C").unwrap().referenced_by.is_empty());
    // Until re-linked
    lib.build_cell_links(false);
    assert_eq!(lib[a].elems[0].target(), Some(GdsStructId(1)));
    Ok(())
}
#[test]
fn dep_order() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("deps");
    let top = lib.add("TOP");
    let mid = lib.add("MID");
    let leaf = lib.add("LEAF");
    lib[top].elems.push(sref("MID", 0, 0).into());
    lib[top].elems.push(sref("LEAF", 0, 0).into());
    lib[mid].elems.push(sref("LEAF", 0, 0).into());
    lib.build_cell_links(false);

    let order = lib.dep_order()?;
    assert_eq!(order, vec![leaf, mid, top]);
    assert_eq!(lib.top_structs(), vec![top]);
    Ok(())
}
#[test]
fn it_detects_cycles() -> GdsResult<()> {
    init_log();
    let mut lib = GdsLibrary::new("cycles");
    let a = lib.add("A");
    let b = lib.add("B");
    lib[a].elems.push(square(1).into());
    lib[a].elems.push(sref("B", 0, 0).into());
    lib[b].elems.push(sref("A", 0, 0).into());
    // Without links, nothing is followed
    assert!(lib.bbox("A")?.is_some());

    lib.build_cell_links(false);
    match lib.bbox("A") {
        Err(GdsError::Cycle(name)) => assert_eq!(name, "A"),
        other => panic!("Expected a cycle error, got {:?}", other),
    }
    assert!(matches!(lib.dep_order(), Err(GdsError::Cycle(_))));
    assert!(lib.top_structs().is_empty());
    Ok(())
}
#[test]
fn sref_bbox() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("srefs");
    let parent = lib.add("parent");
    let child = lib.add("child");
    lib[child].elems.push(square(10).into());
    lib[parent].elems.push(
        GdsStructRef {
            mag: 2.0,
            ..sref("child", 100, 50)
        }
        .into(),
    );
    lib.build_cell_links(false);
    let bbox = lib.bbox("parent")?.unwrap();
    assert_eq!(
        bbox,
        BoundBox {
            p0: GdsPoint::new(100, 50),
            p1: GdsPoint::new(120, 70),
        }
    );
    assert_eq!((bbox.width(), bbox.height()), (20, 20));

    // Rotated and reflected
    lib[parent].elems[0] = GdsStructRef {
        angle: 90.0,
        strans: GdsStrans {
            reflected: true,
            ..Default::default()
        },
        ..sref("child", 0, 0)
    }
    .into();
    lib.build_cell_links(false);
    // Reflection maps the square to (0,-10)..(10,0); rotation then to (0,0)..(10,10)
    let bbox = lib.bbox("parent")?.unwrap();
    assert_eq!(bbox, BoundBox::from_corners(&GdsPoint::new(0, 0), &GdsPoint::new(10, 10)));

    lib[parent].elems[0] = GdsStructRef {
        angle: 90.0,
        ..sref("child", 0, 0)
    }
    .into();
    lib.build_cell_links(false);
    let bbox = lib.bbox("parent")?.unwrap();
    assert_eq!(bbox, BoundBox::from_corners(&GdsPoint::new(-10, 0), &GdsPoint::new(0, 10)));
    Ok(())
}
#[test]
fn aref_bbox() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("arefs");
    let parent = lib.add("parent");
    let unit = lib.add("unit");
    lib[unit].elems.push(square(1).into());
    lib[parent].elems.push(
        GdsArrayRef {
            name: "unit".into(),
            xy: [
                GdsPoint::new(0, 0),
                GdsPoint::new(3, 0),
                GdsPoint::new(0, 2),
            ],
            cols: 3,
            rows: 2,
            ..Default::default()
        }
        .into(),
    );
    lib.build_cell_links(false);
    let bbox = lib.bbox("parent")?.unwrap();
    assert_eq!(bbox, BoundBox::from_corners(&GdsPoint::new(0, 0), &GdsPoint::new(3, 2)));

    // Offset, magnified instances, with translation applied last
    lib[parent].elems[0] = GdsArrayRef {
        name: "unit".into(),
        xy: [
            GdsPoint::new(10, 10),
            GdsPoint::new(16, 10),
            GdsPoint::new(10, 14),
        ],
        cols: 3,
        rows: 2,
        mag: 2.0,
        ..Default::default()
    }
    .into();
    lib.build_cell_links(false);
    let bbox = lib.bbox("parent")?.unwrap();
    assert_eq!(bbox, BoundBox::from_corners(&GdsPoint::new(10, 10), &GdsPoint::new(16, 14)));

    // Reflected and rotated instances of a non-square cell.
    // Reflection maps (0,0)..(4,2) to (0,-2)..(4,0), rotation to (0,0)..(2,4),
    // and the origin moves it to (10,20)..(12,24).
    lib[unit].elems = vec![GdsBoundary {
        xy: GdsPoint::vec(&[(0, 0), (4, 0), (4, 2), (0, 2), (0, 0)]),
        ..square(0)
    }
    .into()];
    lib[parent].elems[0] = GdsArrayRef {
        name: "unit".into(),
        xy: [
            GdsPoint::new(10, 20),
            GdsPoint::new(20, 20),
            GdsPoint::new(10, 38),
        ],
        cols: 2,
        rows: 3,
        angle: 90.0,
        strans: GdsStrans {
            reflected: true,
            ..Default::default()
        },
        ..Default::default()
    }
    .into();
    lib.build_cell_links(false);
    let bbox = lib.bbox("parent")?.unwrap();
    assert_eq!(bbox, BoundBox::from_corners(&GdsPoint::new(10, 20), &GdsPoint::new(17, 36)));

    // Empty arrays have no extent
    if let GdsElement::GdsArrayRef(a) = &mut lib[parent].elems[0] {
        a.rows = 0;
    }
    assert_eq!(lib.bbox("parent")?, None);
    Ok(())
}
#[test]
fn path_bbox() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("paths");
    let cell = lib.add("cell");
    let path = GdsPath {
        layer: 1,
        datatype: 0,
        width: 2,
        xy: GdsPoint::vec(&[(0, 0), (10, 0)]),
        ..Default::default()
    };
    lib[cell].elems = vec![path.clone().into()];
    assert_eq!(
        lib.bbox("cell")?,
        Some(BoundBox::from_corners(&GdsPoint::new(0, -1), &GdsPoint::new(10, 1)))
    );
    // Extended ends
    lib[cell].elems = vec![GdsPath {
        path_type: 2,
        ..path.clone()
    }
    .into()];
    assert_eq!(
        lib.bbox("cell")?,
        Some(BoundBox::from_corners(&GdsPoint::new(-1, -1), &GdsPoint::new(11, 1)))
    );
    // Vertical, then diagonal
    lib[cell].elems = vec![GdsPath {
        width: 4,
        path_type: 1,
        xy: GdsPoint::vec(&[(0, 0), (0, 10), (5, 15)]),
        ..path
    }
    .into()];
    assert_eq!(
        lib.bbox("cell")?,
        Some(BoundBox::from_corners(&GdsPoint::new(-2, -2), &GdsPoint::new(5, 15)))
    );
    // Odd widths round outward
    lib[cell].elems = vec![GdsPath { width: 3, ..path }.into()];
    assert_eq!(
        lib.bbox("cell")?,
        Some(BoundBox::from_corners(&GdsPoint::new(0, -2), &GdsPoint::new(10, 2)))
    );
    Ok(())
}
#[test]
fn wide_bboxes() -> GdsResult<()> {
    // Coordinates spanning most of the i32 range
    let mut lib = GdsLibrary::new("wide");
    let cell = lib.add("cell");
    let unit = lib.add("unit");
    lib[unit].elems.push(square(1).into());
    lib[cell].elems = vec![GdsBoundary {
        xy: GdsPoint::vec(&[
            (-2_000_000_000, 0),
            (2_000_000_000, 0),
            (2_000_000_000, 10),
            (-2_000_000_000, 0),
        ]),
        ..square(0)
    }
    .into()];
    let bbox = lib.bbox("cell")?.unwrap();
    assert_eq!((bbox.width(), bbox.height()), (4_000_000_000, 10));
    assert_eq!(
        bbox.translate(i64::from(i32::MAX), 0),
        BoundBox::from_corners(
            &GdsPoint::new(147_483_647, 0),
            &GdsPoint::new(i32::MAX, 10)
        )
    );

    // Extended path ends
    let path = GdsPath {
        width: 10,
        path_type: 2,
        xy: GdsPoint::vec(&[(-2_000_000_000, 0), (2_000_000_000, 0)]),
        ..Default::default()
    };
    lib[cell].elems = vec![path.clone().into()];
    assert_eq!(
        lib.bbox("cell")?,
        Some(BoundBox::from_corners(
            &GdsPoint::new(-2_000_000_005, -5),
            &GdsPoint::new(2_000_000_005, 5)
        ))
    );
    // Which saturate at the limits of the coordinate range
    lib[cell].elems = vec![GdsPath {
        xy: GdsPoint::vec(&[(i32::MIN, 0), (i32::MAX, 0)]),
        ..path
    }
    .into()];
    assert_eq!(
        lib.bbox("cell")?,
        Some(BoundBox::from_corners(
            &GdsPoint::new(i32::MIN, -5),
            &GdsPoint::new(i32::MAX, 5)
        ))
    );

    // Array pitches
    lib[cell].elems = vec![GdsArrayRef {
        name: "unit".into(),
        xy: [
            GdsPoint::new(-2_000_000_000, 0),
            GdsPoint::new(2_000_000_000, 0),
            GdsPoint::new(-2_000_000_000, 10),
        ],
        cols: 2,
        rows: 1,
        ..Default::default()
    }
    .into()];
    lib.build_cell_links(false);
    assert_eq!(
        lib.bbox("cell")?,
        Some(BoundBox::from_corners(
            &GdsPoint::new(-2_000_000_000, 0),
            &GdsPoint::new(1, 1)
        ))
    );
    Ok(())
}
#[test]
fn empty_bboxes() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("empty");
    let cell = lib.add("cell");
    lib[cell].elems.push(GdsTextElem::default().into());
    lib[cell].elems.push(GdsNode::default().into());
    lib[cell].elems.push(sref("nowhere", 0, 0).into());
    lib.build_cell_links(false);
    assert_eq!(lib.bbox("cell")?, None);
    assert_eq!(lib.bbox("not_a_cell")?, None);
    Ok(())
}
#[test]
fn cell1() -> GdsResult<()> {
    // Write, read, and measure a single-cell library
    init_log();
    let mut lib = GdsLibrary {
        name: "LIB".into(),
        version: 5,
        ..Default::default()
    };
    let cell = lib.add("CELL1");
    lib[cell].elems.push(square(10).into());
    let bytes = lib.to_bytes()?;
    // HEADER, version 5
    assert_eq!(bytes[0..6], [0x00, 0x06, 0x00, 0x02, 0x00, 0x05]);

    let mut lib2 = GdsLibrary::from_bytes(&bytes)?;
    assert_eq!(lib2.version, 5);
    assert_eq!(lib2.name, "LIB");
    assert_eq!(lib2.structs.len(), 1);
    assert_eq!(lib2.structs[0].name, "CELL1");
    lib2.build_cell_links(false);
    let bbox = lib2.bbox("CELL1")?.unwrap();
    assert_eq!((bbox.x(), bbox.y(), bbox.width(), bbox.height()), (0, 0, 10, 10));
    Ok(())
}
#[test]
fn stats() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("stats");
    let a = lib.add("a");
    lib.add("b");
    lib[a].elems = vec![
        square(1).into(),
        square(2).into(),
        sref("b", 0, 0).into(),
        GdsTextElem::default().into(),
    ];
    assert_eq!(
        lib.stats(),
        GdsStats {
            libraries: 1,
            structs: 2,
            boundaries: 2,
            paths: 0,
            struct_refs: 1,
            array_refs: 0,
            text_elems: 1,
            nodes: 0,
        }
    );
    Ok(())
}
#[test]
fn set_dates() -> GdsResult<()> {
    let mut lib = GdsLibrary::new("dates");
    lib.add("a");
    let t = test_dates().modified;
    lib.set_all_dates(t);
    assert_eq!(lib.dates, test_dates());
    assert_eq!(lib.structs[0].dates, test_dates());
    assert_eq!(
        GdsDateTimes::decode(&lib.dates.encode()),
        lib.dates
    );
    assert_eq!(lib.dates.encode()[0..6], [1970, 1, 1, 0, 0, 1]);
    Ok(())
}
#[test]
fn it_saves_files() -> GdsResult<()> {
    let dir = tempfile::tempdir()?;
    let mut lib = GdsLibrary::new("files");
    let cell = lib.add("cell");
    lib[cell].elems.push(square(5).into());
    lib[cell].elems.push(sref("cell2", 1, 1).into());
    lib.add("cell2");

    let path = dir.path().join("files.gds");
    lib.save(&path)?;
    assert_eq!(GdsLibrary::load(&path)?, lib);

    // Text formats, which also drop resolved links
    for ext in ["json", "yaml"] {
        let path = dir.path().join(format!("files.{}", ext));
        lib.save_as(&path)?;
        let lib2 = <GdsLibrary as SerdeFile>::open_as(&path)?;
        assert_eq!(lib2, lib);
    }
    let json = serde_json::to_string(&lib.structs[0]).unwrap();
    assert!(!json.contains("referenced_by"));
    assert!(!json.contains("target"));
    Ok(())
}
#[test]
fn it_has_a_schema() {
    let schema = schemars::schema_for!(GdsLibrary);
    let s = serde_json::to_string(&schema).unwrap();
    assert!(s.contains("GdsBoundary"));
    assert!(s.contains("GdsArrayRef"));
}
