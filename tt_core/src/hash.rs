//! 32-bit content hashes used as asset cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Hash32(pub u32);

impl Hash32 {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        fnv1a(bytes.iter().copied())
    }

    /// Hashes an asset filename. Backslashes count as forward slashes so the
    /// same file gets the same key on every platform.
    pub fn from_filename(name: &str) -> Self {
        fnv1a(name.bytes().map(|b| if b == b'\\' { b'/' } else { b }))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

fn fnv1a(bytes: impl Iterator<Item = u8>) -> Hash32 {
    Hash32(bytes.fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    }))
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_fnv1a_vectors() {
        assert_eq!(Hash32::from_bytes(b""), Hash32(0x811c_9dc5));
        assert_eq!(Hash32::from_bytes(b"a"), Hash32(0xe40c_292c));
        assert_eq!(Hash32::from_bytes(b"foobar"), Hash32(0xbf9c_f968));
    }

    #[test]
    fn filename_separators_are_normalised() {
        assert_eq!(
            Hash32::from_filename("levels\\forest\\tiles.png"),
            Hash32::from_filename("levels/forest/tiles.png")
        );
        assert_eq!(
            Hash32::from_filename("tiles.png"),
            Hash32::from_bytes(b"tiles.png")
        );
        assert_ne!(Hash32::from_filename("a.png"), Hash32::from_filename("b.png"));
    }

    #[test]
    fn displays_as_hex() {
        assert_eq!(Hash32(0xbeef).to_string(), "0000beef");
    }
}
