//! MsgPack codec using `rmp-serde`.
//!
//! Message bodies are serialized with `to_vec_named`, so structs travel as
//! maps keyed by field name rather than positional arrays. A peer can add
//! or reorder fields without breaking older clients.
//!
//! # Example
//!
//! ```
//! use tickwire::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Move {
//!     x: f32,
//!     y: f32,
//! }
//!
//! let msg = Move { x: 1.0, y: 2.0 };
//! let encoded = MsgPackCodec::encode(&msg).unwrap();
//! let decoded: Move = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use crate::error::Result;

/// MessagePack codec for message bodies.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Move {
        x: f32,
        y: f32,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    enum Command {
        Jump,
        Say(String),
        Teleport { x: i32, y: i32 },
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = Move { x: 1.5, y: -2.25 };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: Move = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_encode_decode_enum() {
        for original in [
            Command::Jump,
            Command::Say("hi".to_string()),
            Command::Teleport { x: -3, y: 9 },
        ] {
            let encoded = MsgPackCodec::encode(&original).unwrap();
            let decoded: Command = MsgPackCodec::decode(&encoded).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn test_to_vec_named_produces_map_format() {
        let encoded = MsgPackCodec::encode(&Move { x: 0.0, y: 0.0 }).unwrap();

        // 0x82 = fixmap with 2 elements (an array would be 0x92)
        assert_eq!(encoded[0], 0x82, "Expected map format, got {:02X}", encoded[0]);
    }

    #[test]
    fn test_empty_struct_is_empty_map() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Empty {}

        let encoded = MsgPackCodec::encode(&Empty {}).unwrap();
        assert_eq!(encoded, vec![0x80]);

        let decoded: Empty = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, Empty {});
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Move> = MsgPackCodec::decode(b"not valid msgpack");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_error_on_wrong_shape() {
        let encoded = MsgPackCodec::encode(&"just a string").unwrap();
        let result: Result<Move> = MsgPackCodec::decode(&encoded);
        assert!(result.is_err());
    }
}
