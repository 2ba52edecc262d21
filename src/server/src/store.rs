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

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use log::debug;
use pregel_api::{key_attribute, Document, KEY_ATTRIBUTE};
use serde_json::Value;

use crate::{Error, Result};

pub type DocumentIter<'a> = Box<dyn Iterator<Item = Document> + Send + 'a>;

/// The document storage a job reads its graph from and writes results to.
pub trait GraphStore: Send + Sync + 'static {
    /// Iterate all documents of `collection`.
    fn scan(&self, collection: &str) -> Result<DocumentIter<'_>>;

    /// Merge the top level attributes of `patch` into a document.
    fn update(&self, collection: &str, key: &str, patch: Document) -> Result<()>;
}

/// A [`GraphStore`] keeping collections in memory, keyed by `_key`.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    /// Build a store from a JSON object of the form
    /// `{ "collection": [document, ...], ... }`.
    ///
    /// Documents without `_key` get a generated one which is not used by any
    /// other document of the collection. Duplicated keys are rejected.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(collections) = value else {
            return Err(Error::InvalidData("graph json, an object is expected".into()));
        };
        let store = MemoryStore::default();
        for (collection, docs) in collections {
            let Value::Array(docs) = docs else {
                return Err(Error::InvalidData(format!("collection {collection}, not an array")));
            };
            store.create_collection(&collection);
            // Explicit keys first, so a generated key never takes one of them.
            let (keyed, keyless): (Vec<_>, Vec<_>) =
                docs.into_iter().partition(|doc| doc.get(KEY_ATTRIBUTE).is_some());
            for doc in keyed {
                if let Some(key) = doc.as_object().and_then(|d| key_attribute(d, KEY_ATTRIBUTE)) {
                    if store.get(&collection, &key).is_some() {
                        return Err(Error::InvalidData(format!(
                            "duplicated key {key} in collection {collection}"
                        )));
                    }
                }
                store.insert(&collection, doc)?;
            }
            for doc in keyless {
                store.insert(&collection, doc)?;
            }
        }
        Ok(store)
    }

    pub fn create_collection(&self, collection: &str) {
        let mut collections = self.collections.write().expect("poisoned");
        collections.entry(collection.to_owned()).or_default();
    }

    /// Insert or replace a document, returns its key.
    pub fn insert(&self, collection: &str, doc: Value) -> Result<String> {
        let Value::Object(mut doc) = doc else {
            return Err(Error::InvalidData(format!("document of {collection}, not an object")));
        };
        let mut collections = self.collections.write().expect("poisoned");
        let docs = collections.entry(collection.to_owned()).or_default();
        let key = match key_attribute(&doc, KEY_ATTRIBUTE) {
            Some(key) => key,
            None if doc.contains_key(KEY_ATTRIBUTE) => {
                return Err(Error::InvalidData(format!("_key of document in {collection}")));
            }
            None => {
                let mut next = docs.len() + 1;
                while docs.contains_key(&next.to_string()) {
                    next += 1;
                }
                let key = next.to_string();
                doc.insert(KEY_ATTRIBUTE.to_owned(), Value::String(key.clone()));
                key
            }
        };
        docs.insert(key.clone(), doc);
        Ok(key)
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<Document> {
        let collections = self.collections.read().expect("poisoned");
        collections.get(collection).and_then(|docs| docs.get(key)).cloned()
    }

    pub fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().expect("poisoned");
        collections.get(collection).map(BTreeMap::len).unwrap_or_default()
    }

    /// The inverse of [`MemoryStore::from_json`], documents are ordered by
    /// key.
    pub fn to_json(&self) -> Value {
        let collections = self.collections.read().expect("poisoned");
        let object = collections
            .iter()
            .map(|(name, docs)| {
                let docs = docs.values().cloned().map(Value::Object).collect();
                (name.clone(), Value::Array(docs))
            })
            .collect::<serde_json::Map<_, _>>();
        Value::Object(object)
    }
}

impl GraphStore for MemoryStore {
    fn scan(&self, collection: &str) -> Result<DocumentIter<'_>> {
        // Take a snapshot, so the lock is not held while the caller iterates.
        let docs = {
            let collections = self.collections.read().expect("poisoned");
            let docs = collections
                .get(collection)
                .ok_or_else(|| Error::Load(format!("collection {collection} not found")))?;
            docs.values().cloned().collect::<Vec<_>>()
        };
        debug!("scan collection. collection={collection}, documents={}", docs.len());
        Ok(Box::new(docs.into_iter()))
    }

    fn update(&self, collection: &str, key: &str, patch: Document) -> Result<()> {
        let mut collections = self.collections.write().expect("poisoned");
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| Error::InvalidArgument(format!("document {collection}/{key} not found")))?;
        for (name, value) in patch {
            doc.insert(name, value);
        }
        Ok(())
    }
}
