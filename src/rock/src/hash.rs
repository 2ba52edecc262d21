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

/// Hash a key into one of `buckets` buckets.
///
/// The result only depends on the key bytes, so every worker computes the
/// same bucket for the same key regardless of platform or process.
#[inline]
pub fn stable_bucket(key: &[u8], buckets: u32) -> u32 {
    debug_assert!(buckets > 0, "the number of buckets must be positive");
    crc32fast::hash(key) % buckets
}
