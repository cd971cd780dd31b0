//! JSON encoding over shared containers.
//!
//! `encode` traverses its argument exclusively through the containers'
//! snapshot APIs, so each referenced container is read under its own short
//! internal critical section and then written out from the copy. A composite
//! value snapshots its two containers independently: the pair need not be
//! mutually consistent, only individually well-formed.
//!
//! Output bytes are unconstrained while another thread is mutating the
//! argument; callers that race mutations against `encode` may only rely on
//! the call returning without panicking.

use std::collections::BTreeMap;

use crate::engine;
use crate::shared::{SharedMap, SharedSeq};

/// A value the encoder accepts.
#[derive(Debug, Clone, Copy)]
pub enum JsonValue<'a> {
    /// The shared sequence alone, encoded as a JSON array.
    Seq(&'a SharedSeq),
    /// The shared mapping alone, encoded as a JSON object with sorted keys.
    Map(&'a SharedMap),
    /// A fresh wrapper referencing both containers, encoded as
    /// `{"seq": [...], "map": {...}}`.
    Composite {
        seq: &'a SharedSeq,
        map: &'a SharedMap,
    },
}

/// Encode a value to JSON bytes.
#[must_use]
pub fn encode(value: &JsonValue<'_>) -> Vec<u8> {
    engine::initialize();
    let mut out = Vec::with_capacity(64);
    match value {
        JsonValue::Seq(seq) => write_seq(&mut out, &seq.snapshot()),
        JsonValue::Map(map) => write_map(&mut out, &map.snapshot()),
        JsonValue::Composite { seq, map } => {
            out.extend_from_slice(b"{\"seq\":");
            write_seq(&mut out, &seq.snapshot());
            out.extend_from_slice(b",\"map\":");
            write_map(&mut out, &map.snapshot());
            out.push(b'}');
        }
    }
    out
}

fn write_seq(out: &mut Vec<u8>, values: &[i64]) {
    out.push(b'[');
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            out.push(b',');
        }
        write_int(out, *value);
    }
    out.push(b']');
}

fn write_map(out: &mut Vec<u8>, entries: &BTreeMap<String, i64>) {
    out.push(b'{');
    for (index, (key, value)) in entries.iter().enumerate() {
        if index > 0 {
            out.push(b',');
        }
        write_key(out, key);
        out.push(b':');
        write_int(out, *value);
    }
    out.push(b'}');
}

fn write_int(out: &mut Vec<u8>, value: i64) {
    let mut buffer = [0_u8; 20];
    let digits = format_int(&mut buffer, value);
    out.extend_from_slice(digits);
}

// i64::MIN is -9223372036854775808: 19 digits plus sign fit in 20 bytes.
fn format_int(buffer: &mut [u8; 20], value: i64) -> &[u8] {
    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut cursor = buffer.len();
    loop {
        cursor -= 1;
        buffer[cursor] = b'0' + (magnitude % 10) as u8;
        magnitude /= 10;
        if magnitude == 0 {
            break;
        }
    }
    if negative {
        cursor -= 1;
        buffer[cursor] = b'-';
    }
    &buffer[cursor..]
}

/// Quote a map key.
///
/// Keys produced by the harness workload are short decimal strings, so the
/// common case copies bytes verbatim through the engine's escape table and
/// anything else falls back to `serde_json` quoting.
fn write_key(out: &mut Vec<u8>, key: &str) {
    let table = engine::escape_table();
    if key.bytes().all(|byte| table.is_plain(byte)) {
        out.push(b'"');
        out.extend_from_slice(key.as_bytes());
        out.push(b'"');
    } else {
        let quoted = serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_owned());
        out.extend_from_slice(quoted.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{JsonValue, encode};
    use crate::shared::{SharedMap, SharedSeq};

    fn encode_str(value: &JsonValue<'_>) -> String {
        String::from_utf8(encode(value)).expect("encoder emits UTF-8")
    }

    #[test]
    fn empty_containers() {
        let seq = SharedSeq::new();
        let map = SharedMap::new();
        assert_eq!(encode_str(&JsonValue::Seq(&seq)), "[]");
        assert_eq!(encode_str(&JsonValue::Map(&map)), "{}");
        assert_eq!(
            encode_str(&JsonValue::Composite {
                seq: &seq,
                map: &map
            }),
            r#"{"seq":[],"map":{}}"#
        );
    }

    #[test]
    fn seq_shape() {
        let seq = SharedSeq::seeded(3);
        seq.push(-7);
        assert_eq!(encode_str(&JsonValue::Seq(&seq)), "[0,1,2,-7]");
    }

    #[test]
    fn map_keys_sorted_lexicographically() {
        let map = SharedMap::new();
        map.insert("10".to_owned(), 10);
        map.insert("2".to_owned(), 2);
        map.insert("1".to_owned(), 1);
        assert_eq!(encode_str(&JsonValue::Map(&map)), r#"{"1":1,"10":10,"2":2}"#);
    }

    #[test]
    fn extreme_integers_round_trip_textually() {
        let seq = SharedSeq::new();
        seq.push(i64::MIN);
        seq.push(i64::MAX);
        seq.push(0);
        assert_eq!(
            encode_str(&JsonValue::Seq(&seq)),
            "[-9223372036854775808,9223372036854775807,0]"
        );
    }

    #[test]
    fn non_plain_keys_fall_back_to_serde_quoting() {
        let map = SharedMap::new();
        map.insert("a\"b".to_owned(), 1);
        map.insert("tab\there".to_owned(), 2);
        assert_eq!(
            encode_str(&JsonValue::Map(&map)),
            r#"{"a\"b":1,"tab\there":2}"#
        );
    }

    #[test]
    fn composite_output_parses_as_json() {
        let seq = SharedSeq::seeded(4);
        let map = SharedMap::seeded(4);
        let bytes = encode(&JsonValue::Composite {
            seq: &seq,
            map: &map,
        });
        let parsed: serde_json::Value =
            serde_json::from_slice(&bytes).expect("composite output is valid JSON");
        assert_eq!(parsed["seq"].as_array().map(Vec::len), Some(4));
        assert_eq!(parsed["map"]["3"].as_i64(), Some(3));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn arbitrary_keys_always_encode_to_valid_json(
            entries in proptest::collection::btree_map(".{0,12}", any::<i64>(), 0..16)
        ) {
            let map = SharedMap::new();
            for (key, value) in &entries {
                map.insert(key.clone(), *value);
            }
            let bytes = encode(&JsonValue::Map(&map));
            let parsed: serde_json::Value = serde_json::from_slice(&bytes)
                .expect("encoder output must parse");
            let object = parsed.as_object().expect("map encodes to an object");
            prop_assert_eq!(object.len(), entries.len());
        }
    }
}
