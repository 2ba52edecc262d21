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

//! Reusable aggregator primitives.

use std::fmt::Debug;
use std::ops::AddAssign;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A value reduced from the contributions of all vertices of a superstep.
///
/// `merge` must be associative and commutative, the conductor merges the
/// contributions of workers in an arbitrary grouping.
pub trait Aggregate:
    Default + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn merge(&mut self, other: &Self);
}

impl Aggregate for () {
    fn merge(&mut self, _: &Self) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sum<T>(pub T);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Max<T>(pub Option<T>);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Min<T>(pub Option<T>);

/// Whether any vertex contributed `true`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Any(pub bool);

/// Whether all vertices contributed `true`, holds for no contribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct All(pub bool);

impl<T> Aggregate for Sum<T>
where
    T: AddAssign + Copy + Default + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn merge(&mut self, other: &Self) {
        self.0 += other.0;
    }
}

impl<T> Sum<T>
where
    T: AddAssign,
{
    pub fn add(&mut self, value: T) {
        self.0 += value;
    }
}

impl<T> Default for Max<T> {
    fn default() -> Self {
        Max(None)
    }
}

impl<T: PartialOrd + Copy> Max<T> {
    pub fn add(&mut self, value: T) {
        match self.0 {
            Some(current) if value <= current => {}
            _ => self.0 = Some(value),
        }
    }
}

impl<T> Aggregate for Max<T>
where
    T: PartialOrd + Copy + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn merge(&mut self, other: &Self) {
        if let Some(value) = other.0 {
            self.add(value);
        }
    }
}

impl<T> Default for Min<T> {
    fn default() -> Self {
        Min(None)
    }
}

impl<T: PartialOrd + Copy> Min<T> {
    pub fn add(&mut self, value: T) {
        match self.0 {
            Some(current) if value >= current => {}
            _ => self.0 = Some(value),
        }
    }
}

impl<T> Aggregate for Min<T>
where
    T: PartialOrd + Copy + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn merge(&mut self, other: &Self) {
        if let Some(value) = other.0 {
            self.add(value);
        }
    }
}

impl Any {
    pub fn add(&mut self, value: bool) {
        self.0 |= value;
    }
}

impl Aggregate for Any {
    fn merge(&mut self, other: &Self) {
        self.0 |= other.0;
    }
}

impl Default for All {
    fn default() -> Self {
        All(true)
    }
}

impl All {
    pub fn add(&mut self, value: bool) {
        self.0 &= value;
    }
}

impl Aggregate for All {
    fn merge(&mut self, other: &Self) {
        self.0 &= other.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives() {
        let mut sum = Sum(1u64);
        sum.merge(&Sum(2));
        sum.add(3);
        assert_eq!(sum, Sum(6));

        let mut max = Max::<f64>::default();
        max.merge(&Max(None));
        assert_eq!(max, Max(None));
        max.add(1.0);
        max.merge(&Max(Some(0.5)));
        assert_eq!(max, Max(Some(1.0)));

        let mut min = Min::default();
        min.add(3i64);
        min.merge(&Min(Some(-1)));
        assert_eq!(min, Min(Some(-1)));

        let mut any = Any::default();
        any.merge(&Any(false));
        assert!(!any.0);
        any.add(true);
        assert!(any.0);

        let mut all = All::default();
        assert!(all.0);
        all.merge(&All(true));
        all.add(false);
        assert!(!all.0);
    }

    #[test]
    fn serialized_as_inner_value() {
        assert_eq!(serde_json::to_value(Max(Some(2.5))).unwrap(), serde_json::json!(2.5));
        assert_eq!(serde_json::to_value(Min::<i32>(None)).unwrap(), serde_json::Value::Null);
        let sum: Sum<u64> = serde_json::from_value(serde_json::json!(4)).unwrap();
        assert_eq!(sum, Sum(4));
    }
}
