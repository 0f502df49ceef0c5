//! End-to-end tests: streams produced by [`Writer`], decoded by [`Decoder`],
//! and read back value-by-value through the offsets the index records.

use jaguar::{
    path_id, view, Decoder, Error, Frame, Header, Reader, Shape, TypeTag, Writer, MAX_STRING_LEN,
};
use proptest::prelude::*;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::io::{Cursor, Read};

fn parse(bytes: Vec<u8>) -> Decoder<Cursor<Vec<u8>>> {
    let mut decoder = Decoder::new(Reader::new(Cursor::new(bytes)));
    decoder.parse().unwrap();
    decoder
}

#[test]
fn test_boolean_record_bytes() {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_header(
            &Header::new("r", Shape::UnstructuredObj { field_count: 1 }),
            false,
        )
        .unwrap();
    writer
        .write_header(&Header::new("b", Shape::Scalar(TypeTag::Boolean)), false)
        .unwrap();
    writer.write_bool(true).unwrap();
    writer.write_scope_boundary().unwrap();
    let bytes = writer.into_sink();
    assert_eq!(
        bytes,
        [0x3B, 0x01, 0x72, 0x01, 0x00, 0x0D, 0x01, 0x62, 0x01, 0x3E]
    );

    let decoder = parse(bytes);
    let index = decoder.index().unwrap();
    let record = index.root.subscope("r").unwrap();
    assert_eq!(record.subvalues.len(), 1);
    assert_eq!(record.subvalues[0].name, "b");
    assert_eq!(record.subvalues[0].shape, Shape::Scalar(TypeTag::Boolean));
}

#[test]
fn test_vector_round_trip() {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_header(
            &Header::new(
                "v",
                Shape::Vector {
                    element: TypeTag::Float32,
                    width: 3,
                },
            ),
            false,
        )
        .unwrap();
    for component in [1.0f32, 2.0, 3.0] {
        writer.write_f32(component).unwrap();
    }
    let bytes = writer.into_sink();
    assert_eq!(&bytes[..5], [0x4A, 0x01, 0x76, 0x0E, 0x03]);

    let mut decoder = parse(bytes);
    let offset = decoder.index().unwrap().root.subvalue("v").unwrap().offset;
    let mut reader = decoder.release_reader().unwrap();
    reader.seek(offset).unwrap();
    for expected in [1.0f32, 2.0, 3.0] {
        assert_eq!(reader.read_f32().unwrap().to_bits(), expected.to_bits());
    }
}

#[test]
fn test_structured_object_scenario() {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_header(
            &Header::new(
                "P",
                Shape::StructuredObjTypeDecl {
                    type_id: "P".into(),
                    field_count: 2,
                },
            ),
            false,
        )
        .unwrap();
    writer
        .write_header(&Header::new("x", Shape::Scalar(TypeTag::UInt32)), false)
        .unwrap();
    writer
        .write_header(&Header::new("y", Shape::Scalar(TypeTag::UInt32)), false)
        .unwrap();
    writer.write_scope_boundary().unwrap();
    writer
        .write_header(
            &Header::new(
                "p",
                Shape::StructuredObj {
                    type_id: "P".into(),
                },
            ),
            false,
        )
        .unwrap();
    writer.write_u32(7).unwrap();
    writer.write_u32(9).unwrap();
    writer.write_scope_boundary().unwrap();

    let mut decoder = parse(writer.into_sink());
    let index = decoder.index().unwrap();
    let layout = &index.types["P"];
    assert_eq!(layout.fields[0].name, "x");
    assert_eq!(layout.fields[1].name, "y");
    let p = index.root.subscope("p").unwrap();
    assert_eq!(p.subvalues[0].name, "x");
    assert_eq!(p.subvalues[1].name, "y");
    let offsets: Vec<u64> = p.subvalues.iter().map(|v| v.offset).collect();

    let mut reader = decoder.release_reader().unwrap();
    reader.seek(offsets[0]).unwrap();
    assert_eq!(reader.read_u32().unwrap(), 7);
    reader.seek(offsets[1]).unwrap();
    assert_eq!(reader.read_u32().unwrap(), 9);
}

#[test]
fn test_document_round_trip() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut blob = vec![0u8; 70_000];
    rng.fill_bytes(&mut blob);

    // The embedded sub-stream is itself a complete stream.
    let mut nested = Writer::new(Vec::new());
    nested
        .write_header(
            &Header::new("r", Shape::UnstructuredObj { field_count: 1 }),
            false,
        )
        .unwrap();
    nested
        .write_header(&Header::new("b", Shape::Scalar(TypeTag::Boolean)), false)
        .unwrap();
    nested.write_bool(true).unwrap();
    nested.write_scope_boundary().unwrap();
    let nested = nested.into_sink();

    let mut w = Writer::new(Vec::new());

    // Point layout used by the list and the anchor below.
    w.write_header(
        &Header::new(
            "P",
            Shape::StructuredObjTypeDecl {
                type_id: "P".into(),
                field_count: 2,
            },
        ),
        false,
    )
    .unwrap();
    w.write_header(&Header::new("x", Shape::Scalar(TypeTag::UInt32)), false)
        .unwrap();
    w.write_header(&Header::new("y", Shape::Scalar(TypeTag::UInt32)), false)
        .unwrap();
    w.write_scope_boundary().unwrap();

    w.write_header(
        &Header::new("scene", Shape::UnstructuredObj { field_count: 6 }),
        false,
    )
    .unwrap();
    {
        w.write_header(&Header::new("title", Shape::String { size: 4 }), false)
            .unwrap();
        w.write_string("demo").unwrap();

        w.write_header(
            &Header::new(
                "origin",
                Shape::Vector {
                    element: TypeTag::Float32,
                    width: 3,
                },
            ),
            false,
        )
        .unwrap();
        for component in [1.5f32, -2.5, 0.25] {
            w.write_f32(component).unwrap();
        }

        w.write_header(
            &Header::new(
                "points",
                Shape::List {
                    element: TypeTag::StructuredObj,
                    count: 2,
                    type_id: Some("P".into()),
                },
            ),
            false,
        )
        .unwrap();
        for (x, y) in [(1u32, 2u32), (3, 4)] {
            w.write_u32(x).unwrap();
            w.write_u32(y).unwrap();
        }

        w.write_header(
            &Header::new(
                "anchor",
                Shape::StructuredObj {
                    type_id: "P".into(),
                },
            ),
            false,
        )
        .unwrap();
        w.write_u32(7).unwrap();
        w.write_u32(9).unwrap();
        w.write_scope_boundary().unwrap();

        w.write_header(
            &Header::new(
                "blob",
                Shape::ByteBuffer {
                    size: blob.len() as u32,
                },
            ),
            false,
        )
        .unwrap();
        w.copy_from(&mut Cursor::new(blob.clone()), blob.len() as u64)
            .unwrap();

        w.write_header(
            &Header::new("meta", Shape::UnstructuredObj { field_count: 2 }),
            false,
        )
        .unwrap();
        w.write_header(&Header::new("ok", Shape::Scalar(TypeTag::Boolean)), false)
            .unwrap();
        w.write_bool(true).unwrap();
        w.write_header(&Header::new("delta", Shape::Scalar(TypeTag::SInt64)), false)
            .unwrap();
        w.write_i64(-5).unwrap();
        w.write_scope_boundary().unwrap();
    }
    w.write_scope_boundary().unwrap();

    w.write_header(
        &Header::new(
            "embedded",
            Shape::Substream {
                size: nested.len() as u32,
            },
        ),
        false,
    )
    .unwrap();
    w.copy_from(&mut Cursor::new(nested.clone()), nested.len() as u64)
        .unwrap();

    w.write_header(
        &Header::new(
            "m",
            Shape::Matrix {
                element: TypeTag::Float64,
                width: 2,
                height: 3,
            },
        ),
        false,
    )
    .unwrap();
    for value in [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0] {
        w.write_f64(value).unwrap();
    }

    let mut decoder = parse(w.into_sink());
    let index = decoder.index().unwrap().clone();

    // Structure.
    let scene = index.root.subscope("scene").unwrap();
    assert_eq!(scene.id, path_id("scene"));
    assert_eq!(scene.subscopes.len() + scene.subvalues.len(), 6);
    let anchor = scene.subscope("anchor").unwrap();
    assert_eq!(anchor.type_id.as_deref(), Some("P"));
    assert_eq!(anchor.subvalues[0].id, path_id("scene.anchor.x"));
    let meta = scene.subscope("meta").unwrap();
    assert_eq!(meta.subvalue("delta").unwrap().id, path_id("scene.meta.delta"));
    assert_eq!(
        index.root.subvalue("m").unwrap().shape,
        Shape::Matrix {
            element: TypeTag::Float64,
            width: 2,
            height: 3
        }
    );

    // Values, re-read through recorded offsets.
    let mut reader = decoder.release_reader().unwrap();

    let title = scene.subvalue("title").unwrap();
    reader.seek(title.offset).unwrap();
    assert_eq!(reader.read_string(4).unwrap(), "demo");

    let origin = scene.subvalue("origin").unwrap();
    reader.seek(origin.offset).unwrap();
    for expected in [1.5f32, -2.5, 0.25] {
        assert_eq!(reader.read_f32().unwrap().to_bits(), expected.to_bits());
    }

    let points = scene.subvalue("points").unwrap();
    reader.seek(points.offset).unwrap();
    for expected in [1u32, 2, 3, 4] {
        assert_eq!(reader.read_u32().unwrap(), expected);
    }

    reader.seek(anchor.subvalues[1].offset).unwrap();
    assert_eq!(reader.read_u32().unwrap(), 9);

    reader.seek(meta.subvalue("ok").unwrap().offset).unwrap();
    assert!(reader.read_bool().unwrap());
    reader.seek(meta.subvalue("delta").unwrap().offset).unwrap();
    assert_eq!(reader.read_i64().unwrap(), -5);

    // The blob comes back byte-for-byte through a chunked scoped view.
    let entry = scene.subvalue("blob").unwrap();
    let Shape::ByteBuffer { size } = entry.shape.clone() else {
        panic!("blob is not a byte buffer");
    };
    reader.seek(entry.offset).unwrap();
    let handle = reader.read_buffer(size).unwrap();
    let mut adapter = view::Adapter::new(handle);
    let mut out = Vec::new();
    adapter.read_to_end(&mut out).unwrap();
    assert_eq!(out, blob);

    // The sub-stream parses as an independent stream.
    let entry = index.root.subvalue("embedded").unwrap();
    let Shape::Substream { size } = entry.shape.clone() else {
        panic!("embedded is not a sub-stream");
    };
    reader.seek(entry.offset).unwrap();
    let handle = reader.read_buffer(size).unwrap();
    let mut adapter = view::Adapter::new(handle);
    let mut inner = Vec::new();
    adapter.read_to_end(&mut inner).unwrap();
    assert_eq!(inner, nested);
    let inner = parse(inner);
    assert!(inner.index().unwrap().root.subscope("r").is_some());
}

#[test]
fn test_view_exclusivity_end_to_end() {
    let mut w = Writer::new(Vec::new());
    w.write_header(&Header::new("d", Shape::ByteBuffer { size: 4 }), false)
        .unwrap();
    w.write_buffer(&[0xAA, 0xBB, 0xCC, 0xDD][..]).unwrap();
    w.write_header(&Header::new("b", Shape::Scalar(TypeTag::Boolean)), false)
        .unwrap();
    w.write_bool(true).unwrap();

    let mut reader = Reader::new(Cursor::new(w.into_sink()));
    let Frame::Header(header) = reader.read_header().unwrap() else {
        panic!("expected a header");
    };
    let Shape::ByteBuffer { size } = header.shape else {
        panic!("expected a byte buffer");
    };

    let mut handle = reader.read_buffer(size).unwrap();
    assert!(matches!(reader.read_header(), Err(Error::ViewActive)));
    handle.discard_all().unwrap();

    let Frame::Header(header) = reader.read_header().unwrap() else {
        panic!("expected a header");
    };
    assert_eq!(header.name, "b");
    assert!(reader.read_bool().unwrap());
}

#[test]
fn test_list_elements_written_bare() {
    // List of strings: each element is its trailer (the size) and payload,
    // written with the identifier suppressed.
    let mut w = Writer::new(Vec::new());
    w.write_header(
        &Header::new(
            "l",
            Shape::List {
                element: TypeTag::String,
                count: 2,
                type_id: None,
            },
        ),
        false,
    )
    .unwrap();
    for element in ["hi", "x"] {
        w.write_header(
            &Header::new(
                "e",
                Shape::String {
                    size: element.len() as u32,
                },
            ),
            true,
        )
        .unwrap();
        w.write_string(element).unwrap();
    }
    w.write_header(&Header::new("b", Shape::Scalar(TypeTag::Boolean)), false)
        .unwrap();
    w.write_bool(false).unwrap();

    let decoder = parse(w.into_sink());
    let index = decoder.index().unwrap();
    assert!(index.root.subvalue("l").is_some());
    assert!(index.root.subvalue("b").is_some());
}

#[test]
fn test_nan_preserves_bits() {
    let pattern = f64::NAN.to_bits() | 0xDEAD;
    let mut w = Writer::new(Vec::new());
    w.write_f64(f64::from_bits(pattern)).unwrap();
    let mut reader = Reader::new(Cursor::new(w.into_sink()));
    assert_eq!(reader.read_f64().unwrap().to_bits(), pattern);
}

macro_rules! int_round_trip {
    ($($t:ty),+) => {
        paste::paste! {
            proptest! {
                $(
                    #[test]
                    fn [<test_round_trip_ $t>](value: $t) {
                        let mut writer = Writer::new(Vec::new());
                        writer.[<write_ $t>](value).unwrap();
                        let bytes = writer.into_sink();
                        prop_assert_eq!(bytes.len(), std::mem::size_of::<$t>());
                        let mut reader = Reader::new(Cursor::new(bytes));
                        prop_assert_eq!(reader.[<read_ $t>]().unwrap(), value);
                    }
                )+
            }
        }
    };
}
int_round_trip!(u8, u16, u32, u64, i8, i16, i32, i64);

proptest! {
    #[test]
    fn test_round_trip_f32(value: f32) {
        let mut writer = Writer::new(Vec::new());
        writer.write_f32(value).unwrap();
        let mut reader = Reader::new(Cursor::new(writer.into_sink()));
        prop_assert_eq!(reader.read_f32().unwrap().to_bits(), value.to_bits());
    }

    #[test]
    fn test_round_trip_f64(value: f64) {
        let mut writer = Writer::new(Vec::new());
        writer.write_f64(value).unwrap();
        let mut reader = Reader::new(Cursor::new(writer.into_sink()));
        prop_assert_eq!(reader.read_f64().unwrap().to_bits(), value.to_bits());
    }

    #[test]
    fn test_round_trip_string(value: String) {
        let mut writer = Writer::new(Vec::new());
        writer.write_string(&value).unwrap();
        let bytes = writer.into_sink();
        prop_assert_eq!(bytes.as_slice(), value.as_bytes());
        let mut reader = Reader::new(Cursor::new(bytes));
        prop_assert_eq!(reader.read_string(value.len() as u32).unwrap(), value);
    }

    #[test]
    fn test_header_round_trip(name in name_strategy(), shape in shape_strategy()) {
        let header = Header::new(name, shape);
        let mut writer = Writer::new(Vec::new());
        writer.write_header(&header, false).unwrap();
        let bytes = writer.into_sink();
        let mut reader = Reader::new(Cursor::new(bytes.clone()));
        let frame = reader.read_header().unwrap();
        prop_assert_eq!(frame, Frame::Header(header));
        // The whole header was consumed, nothing more.
        prop_assert_eq!(reader.position().unwrap(), bytes.len() as u64);
    }
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,30}"
}

static SCALAR_TAGS: [TypeTag; 11] = [
    TypeTag::Boolean,
    TypeTag::Float32,
    TypeTag::Float64,
    TypeTag::SInt8,
    TypeTag::SInt16,
    TypeTag::SInt32,
    TypeTag::SInt64,
    TypeTag::UInt8,
    TypeTag::UInt16,
    TypeTag::UInt32,
    TypeTag::UInt64,
];

static NUMERIC_TAGS: [TypeTag; 10] = [
    TypeTag::Float32,
    TypeTag::Float64,
    TypeTag::SInt8,
    TypeTag::SInt16,
    TypeTag::SInt32,
    TypeTag::SInt64,
    TypeTag::UInt8,
    TypeTag::UInt16,
    TypeTag::UInt32,
    TypeTag::UInt64,
];

static PLAIN_LIST_ELEMENTS: [TypeTag; 14] = [
    TypeTag::Boolean,
    TypeTag::Float32,
    TypeTag::Float64,
    TypeTag::SInt8,
    TypeTag::SInt16,
    TypeTag::SInt32,
    TypeTag::SInt64,
    TypeTag::UInt8,
    TypeTag::UInt16,
    TypeTag::UInt32,
    TypeTag::UInt64,
    TypeTag::String,
    TypeTag::ByteBuffer,
    TypeTag::Substream,
];

fn shape_strategy() -> impl Strategy<Value = Shape> {
    let lists = prop_oneof![
        (proptest::sample::select(&PLAIN_LIST_ELEMENTS[..]), any::<u32>()).prop_map(
            |(element, count)| Shape::List {
                element,
                count,
                type_id: None,
            }
        ),
        (any::<u32>(), name_strategy()).prop_map(|(count, type_id)| Shape::List {
            element: TypeTag::StructuredObj,
            count,
            type_id: Some(type_id),
        }),
    ];
    prop_oneof![
        proptest::sample::select(&SCALAR_TAGS[..]).prop_map(Shape::Scalar),
        (0..=MAX_STRING_LEN).prop_map(|size| Shape::String { size }),
        any::<u32>().prop_map(|size| Shape::ByteBuffer { size }),
        any::<u32>().prop_map(|size| Shape::Substream { size }),
        lists,
        (proptest::sample::select(&NUMERIC_TAGS[..]), 2..=4u8)
            .prop_map(|(element, width)| Shape::Vector { element, width }),
        (proptest::sample::select(&NUMERIC_TAGS[..]), 2..=4u8, 2..=4u8).prop_map(
            |(element, width, height)| Shape::Matrix {
                element,
                width,
                height,
            }
        ),
        any::<u16>().prop_map(|field_count| Shape::UnstructuredObj { field_count }),
        name_strategy().prop_map(|type_id| Shape::StructuredObj { type_id }),
        (name_strategy(), any::<u16>()).prop_map(|(type_id, field_count)| {
            Shape::StructuredObjTypeDecl {
                type_id,
                field_count,
            }
        }),
    ]
}
