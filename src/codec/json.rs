//! Default `application/json` codec.

use serde_json::Value;

use crate::codec::CodecError;

/// Parse the whole body as a JSON document.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Parse)
}

/// Serialize a value as compact JSON.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(CodecError::Serialize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_encode() {
        let value = decode(br#"{"message":"hi","count":2}"#).unwrap();
        assert_eq!(value, json!({ "message": "hi", "count": 2 }));

        // Field order survives the round trip.
        let bytes = encode(&value).unwrap();
        assert_eq!(bytes, br#"{"message":"hi","count":2}"#.to_vec());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode(b"{not json").unwrap_err();
        assert!(matches!(err, CodecError::Parse(_)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_json() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::from),
                any::<u64>().prop_map(Value::from),
                ".*".prop_map(Value::String),
            ];
            leaf.prop_recursive(4, 32, 6, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                    prop::collection::vec(("[a-z_]{0,8}", inner), 0..6)
                        .prop_map(|pairs| Value::Object(pairs.into_iter().collect())),
                ]
            })
        }

        proptest! {
            #[test]
            fn test_encode_decode_round_trip(value in arb_json()) {
                let bytes = encode(&value).unwrap();
                prop_assert_eq!(decode(&bytes).unwrap(), value);
            }
        }
    }
}
