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

use serde_json::Value;

/// A raw document as handed out by the document store.
pub type Document = serde_json::Map<String, Value>;

pub const KEY_ATTRIBUTE: &str = "_key";
pub const FROM_ATTRIBUTE: &str = "_from";
pub const TO_ATTRIBUTE: &str = "_to";

/// Read an attribute usable as a vertex key.
///
/// Strings are taken as is, integers are formatted; other types are not keys.
pub fn key_attribute(doc: &Document, attribute: &str) -> Option<String> {
    match doc.get(attribute)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Read a `collection/key` handle stored in `attribute`.
pub fn handle_attribute<'a>(doc: &'a Document, attribute: &str) -> Option<(&'a str, &'a str)> {
    doc.get(attribute).and_then(Value::as_str).and_then(pregel_rock::lang::split_handle)
}

/// Read a numeric attribute, integers are widened.
pub fn number_attribute(doc: &Document, attribute: &str) -> Option<f64> {
    doc.get(attribute).and_then(Value::as_f64)
}
