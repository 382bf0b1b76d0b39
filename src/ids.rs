//! Identity model: composite symbol identifiers and their short textual form.
//!
//! Every symbol in the index is addressed internally by a [`SymbolId`], a
//! `(FileId, LocalSymbolId)` pair packed into a `u64`. Externally, tool
//! responses hand out an [`ObjectId`]: a base-63 encoding of that same `u64`,
//! short enough to paste into a follow-up call and lossless to decode back.
//!
//! `SymbolId` zero (file 0, local 0) is the unresolved sentinel: callees that
//! cannot be matched to a definition point here instead of being dropped.

use std::fmt;

/// Identifies a file within a single indexing session. Never reused across a
/// `reset()`; file id 0 is reserved and never assigned to a real file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// Identifies a symbol within its defining file. Assigned sequentially as the
/// parser walks the file; local id 0 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalSymbolId(pub u32);

/// Composite identifier for a symbol, unique for the life of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId {
    pub file: FileId,
    pub local: LocalSymbolId,
}

impl SymbolId {
    /// The sentinel used for call/reference targets that didn't resolve to a
    /// known definition. Never returned for a real symbol.
    pub const UNRESOLVED: SymbolId = SymbolId {
        file: FileId(0),
        local: LocalSymbolId(0),
    };

    pub fn new(file: FileId, local: LocalSymbolId) -> Self {
        Self { file, local }
    }

    pub fn is_resolved(&self) -> bool {
        *self != Self::UNRESOLVED
    }

    pub fn pack(&self) -> u64 {
        ((self.file.0 as u64) << 32) | self.local.0 as u64
    }

    pub fn unpack(bits: u64) -> Self {
        Self {
            file: FileId((bits >> 32) as u32),
            local: LocalSymbolId(bits as u32),
        }
    }

    pub fn to_object_id(&self) -> ObjectId {
        ObjectId::from_u64(self.pack())
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_object_id())
    }
}

/// 63-character alphabet used for the short textual id. Digits, then
/// uppercase, then lowercase, then `_` — chosen so the encoding sorts roughly
/// by magnitude and never needs escaping in JSON or shell arguments.
const ALPHABET: &[u8; 63] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_";
const BASE: u64 = 63;

/// Short, collision-free textual form of a [`SymbolId`], handed out in tool
/// responses and round-tripped back through [`ObjectId::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn from_u64(bits: u64) -> Self {
        Self(bits)
    }

    pub fn from_symbol(id: SymbolId) -> Self {
        Self(id.pack())
    }

    pub fn to_symbol_id(&self) -> SymbolId {
        SymbolId::unpack(self.0)
    }

    /// Parse a previously-issued textual id. Returns `None` for malformed
    /// input (unknown character, empty string) rather than panicking, since
    /// the caller may be echoing back an id the client hand-edited.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        let mut value: u64 = 0;
        for ch in s.bytes() {
            let digit = ALPHABET.iter().position(|&c| c == ch)? as u64;
            value = value.checked_mul(BASE)?.checked_add(digit)?;
        }
        Some(Self(value))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "{}", ALPHABET[0] as char);
        }
        let mut digits = Vec::new();
        let mut value = self.0;
        while value > 0 {
            digits.push(ALPHABET[(value % BASE) as usize]);
            value /= BASE;
        }
        digits.reverse();
        write!(f, "{}", String::from_utf8_lossy(&digits))
    }
}
