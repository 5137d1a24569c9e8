//! Round-trip and size self-consistency properties.

use bson_io::{BinaryData, BsonError, BsonReader, BsonType, BsonWriter};
use bson_io_buffers::{
    ByteBuffer, ByteBufferStream, ByteSink, ByteSource, ChunkPool, MultiChunkBuffer, SliceSource,
};
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Double(u64),
    String(String),
    Int32(i32),
    Int64(i64),
    Boolean(bool),
    Null,
    Binary(Vec<u8>),
    Document(Vec<(String, Item)>),
    Array(Vec<Item>),
}

fn value_strategy() -> impl Strategy<Value = Item> {
    let leaf = prop_oneof![
        any::<f64>().prop_map(|v| Item::Double(v.to_bits())),
        any::<String>().prop_map(Item::String),
        any::<i32>().prop_map(Item::Int32),
        any::<i64>().prop_map(Item::Int64),
        any::<bool>().prop_map(Item::Boolean),
        Just(Item::Null),
        proptest::collection::vec(any::<u8>(), 0..24).prop_map(Item::Binary),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(("[a-z$._]{0,6}", inner.clone()), 0..6)
                .prop_map(Item::Document),
            proptest::collection::vec(inner, 0..6).prop_map(Item::Array),
        ]
    })
}

fn document_strategy() -> impl Strategy<Value = Vec<(String, Item)>> {
    proptest::collection::vec(("[a-zA-Z0-9]{0,10}", value_strategy()), 0..8)
}

fn write_value<W: ByteSink>(w: &mut BsonWriter<W>, value: &Item) -> Result<(), BsonError> {
    match value {
        Item::Double(bits) => w.write_double(f64::from_bits(*bits)),
        Item::String(s) => w.write_string(s),
        Item::Int32(v) => w.write_int32(*v),
        Item::Int64(v) => w.write_int64(*v),
        Item::Boolean(v) => w.write_boolean(*v),
        Item::Null => w.write_null(),
        Item::Binary(bytes) => w.write_binary_data(&BinaryData::generic(bytes.clone())),
        Item::Document(fields) => write_document(w, fields),
        Item::Array(items) => {
            w.write_start_array()?;
            for item in items {
                write_value(w, item)?;
            }
            w.write_end_array()
        }
    }
}

fn write_document<W: ByteSink>(
    w: &mut BsonWriter<W>,
    fields: &[(String, Item)],
) -> Result<(), BsonError> {
    w.write_start_document()?;
    for (name, value) in fields {
        w.write_name(name)?;
        write_value(w, value)?;
    }
    w.write_end_document()
}

/// Declared length of the document or array at the reader's position,
/// checked against the span the reader actually consumes.
fn raw_len<S: ByteSource>(r: &mut BsonReader<S>, array: bool) -> usize {
    let bookmark = r.get_bookmark();
    let raw = if array {
        r.read_raw_array().unwrap()
    } else {
        r.read_raw_document().unwrap()
    };
    let mut prefix = [0u8; 4];
    raw.get_bytes(0, &mut prefix).unwrap();
    assert_eq!(i32::from_le_bytes(prefix) as usize, raw.len());
    r.return_to_bookmark(&bookmark).unwrap();
    raw.len()
}

fn read_value<S: ByteSource>(r: &mut BsonReader<S>, bson_type: BsonType) -> Item {
    match bson_type {
        BsonType::Double => Item::Double(r.read_double().unwrap().to_bits()),
        BsonType::String => Item::String(r.read_string().unwrap()),
        BsonType::Int32 => Item::Int32(r.read_int32().unwrap()),
        BsonType::Int64 => Item::Int64(r.read_int64().unwrap()),
        BsonType::Boolean => Item::Boolean(r.read_boolean().unwrap()),
        BsonType::Null => {
            r.read_null().unwrap();
            Item::Null
        }
        BsonType::Binary => Item::Binary(r.read_bytes().unwrap()),
        BsonType::Document => Item::Document(read_document(r)),
        BsonType::Array => {
            let start = r.position();
            let declared = raw_len(r, true);
            r.read_start_array().unwrap();
            let mut items = Vec::new();
            loop {
                let bson_type = r.read_bson_type().unwrap();
                if bson_type == BsonType::EndOfDocument {
                    break;
                }
                items.push(read_value(r, bson_type));
            }
            r.read_end_array().unwrap();
            assert_eq!(r.position() - start, declared);
            Item::Array(items)
        }
        other => panic!("unexpected type {other}"),
    }
}

fn read_document<S: ByteSource>(r: &mut BsonReader<S>) -> Vec<(String, Item)> {
    let start = r.position();
    let declared = raw_len(r, false);
    r.read_start_document().unwrap();
    let mut fields = Vec::new();
    loop {
        let bson_type = r.read_bson_type().unwrap();
        if bson_type == BsonType::EndOfDocument {
            break;
        }
        let name = r.read_name().unwrap();
        fields.push((name, read_value(r, bson_type)));
    }
    r.read_end_document().unwrap();
    assert_eq!(r.position() - start, declared);
    fields
}

fn encode(fields: &[(String, Item)], chunk_size: usize) -> ByteBufferStream<MultiChunkBuffer> {
    let stream = ByteBufferStream::new(MultiChunkBuffer::with_source(ChunkPool::new(
        256, chunk_size,
    )));
    let mut w = BsonWriter::new(stream);
    write_document(&mut w, fields).unwrap();
    w.into_inner()
}

// ---------------------------------------------------------------------------
// Edge values
// ---------------------------------------------------------------------------

#[test]
fn edge_values_round_trip() {
    let fields = vec![
        ("min".to_string(), Item::Int32(i32::MIN)),
        ("nan".to_string(), Item::Double(f64::NAN.to_bits())),
        ("inf".to_string(), Item::Double(f64::NEG_INFINITY.to_bits())),
        ("empty".to_string(), Item::String(String::new())),
        ("bin".to_string(), Item::Binary(Vec::new())),
        ("arr".to_string(), Item::Array(Vec::new())),
        ("doc".to_string(), Item::Document(Vec::new())),
        ("k".repeat(1000), Item::Null),
    ];
    let bytes = encode(&fields, 7).buffer().to_vec().unwrap();
    let mut r = BsonReader::new(SliceSource::new(&bytes));
    assert_eq!(read_document(&mut r), fields);
    assert!(r.is_at_end_of_file());
}

proptest! {
    #[test]
    fn documents_round_trip(fields in document_strategy(), chunk_size in 1usize..40) {
        let mut stream = encode(&fields, chunk_size);
        let bytes = stream.buffer().to_vec().unwrap();

        let mut r = BsonReader::new(SliceSource::new(&bytes));
        prop_assert_eq!(read_document(&mut r), fields.clone());
        prop_assert!(r.is_at_end_of_file());

        // Same bytes read back through the chunked buffer they were written to.
        stream.buffer_mut().make_read_only();
        stream.set_position(0);
        let mut r = BsonReader::new(stream);
        prop_assert_eq!(read_document(&mut r), fields);
    }

    #[test]
    fn re_encoding_is_stable(fields in document_strategy()) {
        let first = encode(&fields, 64).buffer().to_vec().unwrap();
        let mut r = BsonReader::new(SliceSource::new(&first));
        let decoded = read_document(&mut r);
        let second = encode(&decoded, 5).buffer().to_vec().unwrap();
        prop_assert_eq!(first, second);
    }
}
