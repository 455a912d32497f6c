//! Unambiguous byte encoding of set keys.
//!
//! Every component is written as a type tag followed either by a fixed-width
//! value or by a length prefix and its bytes, so concatenated components can
//! never collide: `("a,b", "c")` and `("a", "b,c")` encode differently.
use arrow::row::Row;

const TAG_STR: u8 = 0x01;
const TAG_I64: u8 = 0x02;
const TAG_U64: u8 = 0x03;
const TAG_F64: u8 = 0x04;
const TAG_BOOL: u8 = 0x05;
const TAG_NONE: u8 = 0x06;
const TAG_SOME: u8 = 0x07;
const TAG_SEQ: u8 = 0x08;
const TAG_ROW: u8 = 0x09;

/// A value usable as a key of `MemoryBoundedKeySet`.
pub trait SpillKey {
    /// Append the encoding of `self` to `out`.
    fn encode_key(&self, out: &mut Vec<u8>);

    fn to_key_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_key(&mut out);
        out
    }
}

#[inline]
fn put_len_prefixed(out: &mut Vec<u8>, tag: u8, bytes: &[u8]) {
    out.push(tag);
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(bytes);
}

impl SpillKey for str {
    fn encode_key(&self, out: &mut Vec<u8>) {
        put_len_prefixed(out, TAG_STR, self.as_bytes());
    }
}

impl SpillKey for String {
    fn encode_key(&self, out: &mut Vec<u8>) {
        self.as_str().encode_key(out);
    }
}

impl SpillKey for i64 {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.push(TAG_I64);
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl SpillKey for i32 {
    fn encode_key(&self, out: &mut Vec<u8>) {
        i64::from(*self).encode_key(out);
    }
}

impl SpillKey for u64 {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.push(TAG_U64);
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl SpillKey for f64 {
    fn encode_key(&self, out: &mut Vec<u8>) {
        // -0.0 == 0.0 and all NaN payloads are one value for set semantics.
        let canonical = if *self == 0.0 {
            0.0f64
        } else if self.is_nan() {
            f64::NAN
        } else {
            *self
        };
        out.push(TAG_F64);
        out.extend_from_slice(&canonical.to_bits().to_le_bytes());
    }
}

impl SpillKey for bool {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.push(TAG_BOOL);
        out.push(u8::from(*self));
    }
}

impl<T: SpillKey> SpillKey for Option<T> {
    fn encode_key(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(TAG_NONE),
            Some(value) => {
                out.push(TAG_SOME);
                value.encode_key(out);
            }
        }
    }
}

impl<T: SpillKey + ?Sized> SpillKey for &T {
    fn encode_key(&self, out: &mut Vec<u8>) {
        (**self).encode_key(out);
    }
}

impl<T: SpillKey> SpillKey for [T] {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.push(TAG_SEQ);
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for item in self {
            item.encode_key(out);
        }
    }
}

impl<T: SpillKey> SpillKey for Vec<T> {
    fn encode_key(&self, out: &mut Vec<u8>) {
        self.as_slice().encode_key(out);
    }
}

impl<A: SpillKey, B: SpillKey> SpillKey for (A, B) {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.push(TAG_SEQ);
        out.extend_from_slice(&2u64.to_le_bytes());
        self.0.encode_key(out);
        self.1.encode_key(out);
    }
}

impl<A: SpillKey, B: SpillKey, C: SpillKey> SpillKey for (A, B, C) {
    fn encode_key(&self, out: &mut Vec<u8>) {
        out.push(TAG_SEQ);
        out.extend_from_slice(&3u64.to_le_bytes());
        self.0.encode_key(out);
        self.1.encode_key(out);
        self.2.encode_key(out);
    }
}

/// Arrow row-format keys are already typed and prefix-free; they only need
/// framing so they cannot collide with other key kinds.
impl SpillKey for Row<'_> {
    fn encode_key(&self, out: &mut Vec<u8>) {
        put_len_prefixed(out, TAG_ROW, self.as_ref());
    }
}
