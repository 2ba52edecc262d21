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

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::debug;
use pregel_api::{DeliverReport, PregelId, PregelShard, WorkerId};

use crate::algorithm::Combiner;

/// Messages grouped by target vertex, folded by the combiner if any.
pub struct MessageBuffer<M> {
    combiner: Option<Combiner<M>>,
    messages: HashMap<PregelId, Vec<M>>,
    len: usize,
}

/// Holds the messages of the supersteps which have not been computed yet.
///
/// Messages sent during superstep `N` are filed under `N + 1` and only handed
/// out by [`MessageChannel::take`], so they are never visible during `N`.
pub struct MessageChannel<M> {
    combiner: Option<Combiner<M>>,
    shards: BTreeSet<PregelShard>,
    pending: BTreeMap<u64, Pending<M>>,
    /// Supersteps up to this one are consumed, late deliveries are dropped.
    consumed: Option<u64>,
}

struct Pending<M> {
    inboxes: HashMap<PregelShard, MessageBuffer<M>>,
    delivered: HashSet<(WorkerId, u64)>,
}

impl<M> Default for Pending<M> {
    fn default() -> Self {
        Pending { inboxes: HashMap::default(), delivered: HashSet::default() }
    }
}

impl<M> MessageBuffer<M> {
    pub fn new(combiner: Option<Combiner<M>>) -> Self {
        MessageBuffer { combiner, messages: HashMap::default(), len: 0 }
    }

    pub fn push(&mut self, target: PregelId, message: M) {
        let slot = self.messages.entry(target).or_default();
        match (self.combiner, slot.last_mut()) {
            (Some(combine), Some(acc)) => combine(acc, message),
            _ => {
                slot.push(message);
                self.len += 1;
            }
        }
    }

    pub fn extend(&mut self, other: MessageBuffer<M>) {
        for (target, messages) in other.messages {
            for message in messages {
                self.push(target.clone(), message);
            }
        }
    }

    /// The number of messages kept, after combining.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, target: &PregelId) -> &[M] {
        self.messages.get(target).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn remove(&mut self, target: &PregelId) -> Vec<M> {
        let messages = self.messages.remove(target).unwrap_or_default();
        self.len -= messages.len();
        messages
    }

    /// The targets which still have messages.
    pub fn targets(&self) -> impl Iterator<Item = &PregelId> {
        self.messages.keys()
    }

    /// Split into one buffer per target shard.
    pub fn split_by_shard(self) -> HashMap<PregelShard, MessageBuffer<M>> {
        let combiner = self.combiner;
        let mut buffers: HashMap<PregelShard, MessageBuffer<M>> = HashMap::default();
        for (target, messages) in self.messages {
            let buffer =
                buffers.entry(target.shard).or_insert_with(|| MessageBuffer::new(combiner));
            buffer.len += messages.len();
            buffer.messages.insert(target, messages);
        }
        buffers
    }

    pub fn into_messages(self) -> impl Iterator<Item = (PregelId, M)> {
        self.messages
            .into_iter()
            .flat_map(|(target, messages)| messages.into_iter().map(move |m| (target.clone(), m)))
    }
}

impl<M> MessageChannel<M> {
    pub fn new<I>(combiner: Option<Combiner<M>>, shards: I) -> Self
    where
        I: IntoIterator<Item = PregelShard>,
    {
        MessageChannel {
            combiner,
            shards: shards.into_iter().collect(),
            pending: BTreeMap::default(),
            consumed: None,
        }
    }

    fn is_stale(&self, superstep: u64) -> bool {
        self.consumed.map(|c| superstep <= c).unwrap_or_default()
    }

    /// File messages produced by this worker, returns the number of messages
    /// targeting shards this worker does not serve.
    pub fn deliver_local(&mut self, superstep: u64, messages: MessageBuffer<M>) -> u64 {
        if self.is_stale(superstep) {
            debug!("drop local messages of a consumed superstep. superstep={superstep}");
            return messages.len() as u64;
        }
        let mut routing_errors = 0;
        for (shard, buffer) in messages.split_by_shard() {
            if !self.shards.contains(&shard) {
                routing_errors += buffer.len() as u64;
                continue;
            }
            let combiner = self.combiner;
            self.pending
                .entry(superstep)
                .or_default()
                .inboxes
                .entry(shard)
                .or_insert_with(|| MessageBuffer::new(combiner))
                .extend(buffer);
        }
        routing_errors
    }

    /// File a batch received from `sender`. A batch is applied at most once
    /// per `(superstep, sender, sequence)`.
    pub fn deliver_batch<I>(
        &mut self,
        superstep: u64,
        sender: WorkerId,
        sequence: u64,
        messages: I,
    ) -> DeliverReport
    where
        I: IntoIterator<Item = (PregelId, M)>,
    {
        if self.is_stale(superstep)
            || self.pending.get(&superstep).map(|p| p.delivered.contains(&(sender, sequence)))
                == Some(true)
        {
            debug!(
                "drop duplicated message batch. superstep={superstep}, sender={sender}, sequence={sequence}"
            );
            return DeliverReport { duplicated: true, ..Default::default() };
        }

        let combiner = self.combiner;
        let shards = &self.shards;
        let pending = self.pending.entry(superstep).or_default();
        pending.delivered.insert((sender, sequence));
        let mut report = DeliverReport::default();
        for (target, message) in messages {
            if !target.is_valid() || !shards.contains(&target.shard) {
                report.routing_errors += 1;
                continue;
            }
            pending
                .inboxes
                .entry(target.shard)
                .or_insert_with(|| MessageBuffer::new(combiner))
                .push(target, message);
            report.accepted += 1;
        }
        report
    }

    /// Hand out the inboxes of `superstep`, later deliveries for it are
    /// dropped.
    pub fn take(&mut self, superstep: u64) -> HashMap<PregelShard, MessageBuffer<M>> {
        self.consumed = Some(superstep);
        let pending = self.pending.split_off(&(superstep + 1));
        let current = std::mem::replace(&mut self.pending, pending);
        current
            .into_iter()
            .filter(|(s, _)| *s == superstep)
            .flat_map(|(_, p)| p.inboxes)
            .collect()
    }

    /// The number of messages waiting for their superstep.
    pub fn in_flight(&self) -> usize {
        self.pending.values().flat_map(|p| p.inboxes.values()).map(MessageBuffer::len).sum()
    }
}
