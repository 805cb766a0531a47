use std::fmt::Debug;

use crate::types::{BTreeError, Result};

/// Trait implemented by key types that can be stored as internal-page separators.
///
/// The `Ord` implementation is the tree's key comparator.
pub trait KeyCodec: Ord + Clone + Debug {
    /// Width of every encoded key when it is fixed, used to check page fan-out.
    const ENCODED_LEN: Option<usize> = None;

    /// Append the encoded form of `self` to `out`.
    fn encode_key(&self, out: &mut Vec<u8>);

    /// Decode a key from its encoded representation.
    fn decode_key(bytes: &[u8]) -> Result<Self>;
}

/// Fixed-size record codec plus key extractor supplied by the table layer.
///
/// The engine never looks inside a record; it only packs, unpacks and asks
/// for its key.
pub trait RecordCodec {
    /// In-memory record type.
    type Record: Clone + Debug;
    /// Clustering key extracted from a record.
    type Key: KeyCodec;

    /// Packed width of every record in bytes.
    fn record_size(&self) -> usize;

    /// Pack `record` into `out`, which is exactly [`Self::record_size`] bytes long.
    fn pack(&self, record: &Self::Record, out: &mut [u8]) -> Result<()>;

    /// Unpack a record from exactly [`Self::record_size`] bytes.
    fn unpack(&self, bytes: &[u8]) -> Result<Self::Record>;

    /// Extract the clustering key of `record`.
    fn key_of(&self, record: &Self::Record) -> Result<Self::Key>;

    /// Upper bound on the encoded length of every key this codec extracts.
    ///
    /// Defaults to the key type's fixed width. With a bound the tree lowers its
    /// order until that many separators fit a page; without one it limits each
    /// inserted key to the room `order` separators leave.
    fn max_key_len(&self) -> Option<usize> {
        <Self::Key as KeyCodec>::ENCODED_LEN
    }
}

macro_rules! fixed_width_key {
    ($ty:ty, $len:expr, $msg:expr) => {
        impl KeyCodec for $ty {
            const ENCODED_LEN: Option<usize> = Some($len);

            fn encode_key(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn decode_key(bytes: &[u8]) -> Result<Self> {
                let arr: [u8; $len] = bytes
                    .try_into()
                    .map_err(|_| BTreeError::InvalidPage($msg))?;
                Ok(<$ty>::from_le_bytes(arr))
            }
        }
    };
}

fixed_width_key!(i32, 4, "i32 key length mismatch");
fixed_width_key!(u32, 4, "u32 key length mismatch");
fixed_width_key!(i64, 8, "i64 key length mismatch");
fixed_width_key!(u64, 8, "u64 key length mismatch");

impl KeyCodec for Vec<u8> {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl KeyCodec for String {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    fn decode_key(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| BTreeError::InvalidPage("string key is not UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded<K: KeyCodec>(key: &K) -> Vec<u8> {
        let mut out = Vec::new();
        key.encode_key(&mut out);
        out
    }

    #[test]
    fn fixed_width_keys_decode_their_encoding() {
        assert_eq!(i64::decode_key(&encoded(&-42i64)).unwrap(), -42);
        assert_eq!(u32::decode_key(&encoded(&7u32)).unwrap(), 7);
        assert_eq!(encoded(&1u64).len(), 8);
        assert_eq!(<i32 as KeyCodec>::ENCODED_LEN, Some(4));
    }

    #[test]
    fn wrong_width_is_invalid_page() {
        assert!(matches!(
            i64::decode_key(&[1, 2, 3]),
            Err(BTreeError::InvalidPage(_))
        ));
    }

    #[test]
    fn string_keys_reject_invalid_utf8() {
        assert_eq!(String::decode_key(b"abc").unwrap(), "abc");
        assert!(String::decode_key(&[0xFF, 0xFE]).is_err());
        assert_eq!(<String as KeyCodec>::ENCODED_LEN, None);
    }
}
