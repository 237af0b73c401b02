//! Minimal change sets between two ordered views.

use chanlist_types::{Channel, ChannelKey};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The change between two successive views, by channel key.
///
/// `moved` holds the fewest channels whose relocation turns the old order
/// into the new one; every other surviving channel keeps its relative order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDiff {
    pub inserted: Vec<ChannelKey>,
    pub removed: Vec<ChannelKey>,
    pub updated: Vec<ChannelKey>,
    pub moved: Vec<ChannelKey>,
}

impl ViewDiff {
    /// Computes the diff from `old` to `new`. Both must be key-unique.
    pub fn between(old: &[Channel], new: &[Channel]) -> Self {
        let old_positions: HashMap<&ChannelKey, usize> = old
            .iter()
            .enumerate()
            .map(|(i, c)| (&c.key, i))
            .collect();
        let new_keys: HashSet<&ChannelKey> = new.iter().map(|c| &c.key).collect();

        let removed = old
            .iter()
            .filter(|c| !new_keys.contains(&c.key))
            .map(|c| c.key.clone())
            .collect();

        let mut inserted = Vec::new();
        let mut updated = Vec::new();
        let mut survivors: Vec<(usize, &ChannelKey)> = Vec::new();
        for channel in new {
            match old_positions.get(&channel.key) {
                None => inserted.push(channel.key.clone()),
                Some(&at) => {
                    if old[at] != *channel {
                        updated.push(channel.key.clone());
                    }
                    survivors.push((at, &channel.key));
                }
            }
        }

        let old_order: Vec<usize> = survivors.iter().map(|(at, _)| *at).collect();
        let stable = increasing_run_mask(&old_order);
        let moved = survivors
            .iter()
            .zip(stable)
            .filter(|(_, stays)| !stays)
            .map(|((_, key), _)| (*key).clone())
            .collect();

        Self {
            inserted,
            removed,
            updated,
            moved,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.removed.is_empty()
            && self.updated.is_empty()
            && self.moved.is_empty()
    }

    /// Total number of keys touched.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.removed.len() + self.updated.len() + self.moved.len()
    }
}

/// Marks the members of one longest strictly increasing subsequence.
fn increasing_run_mask(seq: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let at = tails.partition_point(|&t| seq[t] < value);
        if at > 0 {
            prev[i] = Some(tails[at - 1]);
        }
        if at == tails.len() {
            tails.push(i);
        } else {
            tails[at] = i;
        }
    }

    let mut mask = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        mask[i] = true;
        cursor = prev[i];
    }
    mask
}
