// Copyright 2024-present The Pregel Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The identifier of a graph partition.
///
/// On the wire a shard is a plain `u16`, and `u16::MAX` encodes the invalid
/// shard. In memory the invalid shard is a dedicated variant, so there is only
/// one way to spell it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub struct PregelShard(Repr);

// Variant order matters: valid shards sort before the invalid one, which
// matches the order of the wire encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Repr {
    Shard(u16),
    Invalid,
}

impl PregelShard {
    /// The wire value of the invalid shard.
    pub const INVALID_SENTINEL: u16 = u16::MAX;

    /// The number of distinct valid shards.
    pub const MAX_SHARDS: usize = Self::INVALID_SENTINEL as usize;

    pub const INVALID: PregelShard = PregelShard(Repr::Invalid);

    #[inline]
    pub const fn new(value: u16) -> Self {
        if value == Self::INVALID_SENTINEL {
            PregelShard(Repr::Invalid)
        } else {
            PregelShard(Repr::Shard(value))
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self.0, Repr::Shard(_))
    }

    /// Returns the shard number, `None` for the invalid shard.
    #[inline]
    pub fn value(&self) -> Option<u16> {
        match self.0 {
            Repr::Shard(v) => Some(v),
            Repr::Invalid => None,
        }
    }

    /// Returns the shard number as an index, `None` for the invalid shard.
    #[inline]
    pub fn index(&self) -> Option<usize> {
        self.value().map(usize::from)
    }
}

impl Default for PregelShard {
    fn default() -> Self {
        PregelShard::INVALID
    }
}

impl From<u16> for PregelShard {
    #[inline]
    fn from(value: u16) -> Self {
        PregelShard::new(value)
    }
}

impl From<PregelShard> for u16 {
    #[inline]
    fn from(shard: PregelShard) -> Self {
        shard.value().unwrap_or(PregelShard::INVALID_SENTINEL)
    }
}

impl fmt::Display for PregelShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Shard(v) => write!(f, "{v}"),
            Repr::Invalid => f.write_str("invalid"),
        }
    }
}

impl fmt::Debug for PregelShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PregelShard({self})")
    }
}

/// The global identity of a vertex: its home shard and its key.
///
/// Ordering is lexicographic by `(shard, key)`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct PregelId {
    pub shard: PregelShard,
    pub key: String,
}

impl PregelId {
    #[inline]
    pub fn new(shard: PregelShard, key: impl Into<String>) -> Self {
        PregelId { shard, key: key.into() }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.shard.is_valid() && !self.key.is_empty()
    }

    /// Returns `Error::InvalidId` unless the id is valid.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::InvalidId(self.to_string()))
        }
    }
}

impl fmt::Display for PregelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.shard, self.key)
    }
}

impl fmt::Debug for PregelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PregelId({self})")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn shard_validity() {
        assert!(PregelShard::new(0).is_valid());
        assert!(PregelShard::new(u16::MAX - 1).is_valid());
        assert!(!PregelShard::new(u16::MAX).is_valid());
        assert_eq!(PregelShard::new(u16::MAX), PregelShard::INVALID);
        assert_eq!(PregelShard::default(), PregelShard::INVALID);
        assert_eq!(PregelShard::new(7).value(), Some(7));
        assert_eq!(PregelShard::INVALID.value(), None);
    }

    #[test]
    fn shard_order_matches_wire_order() {
        let mut shards = vec![
            PregelShard::INVALID,
            PregelShard::new(3),
            PregelShard::new(0),
            PregelShard::new(u16::MAX - 1),
        ];
        shards.sort();
        let raw = shards.iter().map(|s| u16::from(*s)).collect::<Vec<_>>();
        assert_eq!(raw, vec![0, 3, u16::MAX - 1, u16::MAX]);
    }

    #[test]
    fn shard_wire_encoding() {
        assert_eq!(serde_json::to_string(&PregelShard::new(12)).unwrap(), "12");
        assert_eq!(serde_json::to_string(&PregelShard::INVALID).unwrap(), "65535");
        let shard: PregelShard = serde_json::from_str("65535").unwrap();
        assert!(!shard.is_valid());
    }

    #[test]
    fn id_validity() {
        let cases = vec![
            (PregelShard::new(0), "a", true),
            (PregelShard::new(0), "", false),
            (PregelShard::INVALID, "a", false),
            (PregelShard::INVALID, "", false),
            (PregelShard::new(u16::MAX - 1), "key", true),
        ];
        for (shard, key, expect) in cases {
            let id = PregelId::new(shard, key);
            assert_eq!(id.is_valid(), expect, "{id}");
            assert_eq!(id.is_valid(), shard.is_valid() && !key.is_empty());
            assert_eq!(id.validate().is_ok(), expect);
        }
    }

    #[test]
    fn id_ordering_and_hashing() {
        let a = PregelId::new(PregelShard::new(1), "b");
        let b = PregelId::new(PregelShard::new(2), "a");
        let c = PregelId::new(PregelShard::new(2), "b");
        assert!(a < b);
        assert!(b < c);

        let set = [a.clone(), b.clone(), c.clone(), a.clone()].into_iter().collect::<HashSet<_>>();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn id_field_names() {
        let id = PregelId::new(PregelShard::new(4), "alice");
        let value = serde_json::to_value(&id).unwrap();
        assert_eq!(value, serde_json::json!({ "shard": 4, "key": "alice" }));
        let back: PregelId = serde_json::from_value(value).unwrap();
        assert_eq!(back, id);
    }
}
