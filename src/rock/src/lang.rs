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

//! A mod to extend the language standard library.

/// A macro to return the function name of invoker.
///
/// Tests use it to give each job a distinguishable name in the logs.
#[macro_export]
macro_rules! fn_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .expect("Function name should always exists")
    }};
}

/// Split a document handle of the form `collection/key`.
///
/// Returns `None` if the separator is missing or either side is empty.
pub fn split_handle(handle: &str) -> Option<(&str, &str)> {
    let (collection, key) = handle.split_once('/')?;
    if collection.is_empty() || key.is_empty() {
        return None;
    }
    Some((collection, key))
}
