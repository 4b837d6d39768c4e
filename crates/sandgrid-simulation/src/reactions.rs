//! Reaction table
//!
//! Reactions are keyed by an unordered pair of material ids. Outputs are stored in
//! canonical (lower id, higher id) order and lookups report whether the caller's pair
//! was swapped, so the caller can map outputs back to the right cell.
//!
//! A reaction may also be written with material tags; it is expanded to every matching
//! pair and all of them share one handle.
//! Examples: water + fire → empty + empty, water + lava → steam + stone

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::materials::MaterialTable;
use crate::rng::probability_threshold;

/// Opaque value handed back to the host after a step when a reaction fires
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SideEffectToken(pub u64);

/// Identifies one registered reaction, with all its expanded pairs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReactionHandle {
    id: u32,
}

/// A single reaction between two materials
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reaction {
    id: u32,

    /// Chance per visit, out of `u32::MAX`
    pub probability: u32,

    /// What the lower material id becomes
    pub out_lo: u16,
    /// What the higher material id becomes
    pub out_hi: u16,

    pub side_effect: Option<SideEffectToken>,
}

impl Reaction {
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Result of looking up the reactions between two materials
#[derive(Clone, Copy, Debug)]
pub struct ReactionLookup<'a> {
    /// Candidates in registration order
    pub reactions: &'a [Reaction],
    /// The caller's first material is the higher id
    pub swap: bool,
}

impl ReactionLookup<'_> {
    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    /// Outputs in the caller's order: (first material becomes, second material becomes)
    #[inline]
    pub fn outputs(&self, reaction: &Reaction) -> (u16, u16) {
        if self.swap {
            (reaction.out_hi, reaction.out_lo)
        } else {
            (reaction.out_lo, reaction.out_hi)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReactionError {
    #[error("unknown material id {0}")]
    UnknownMaterial(u16),

    #[error("no material carries tag \"{0}\"")]
    UnknownTag(String),
}

/// Registry of all reactions with O(1) lookup via HashMap
/// Key: (material_a, material_b) where material_a <= material_b (normalized order)
pub struct ReactionTable {
    reactions: HashMap<(u16, u16), Vec<Reaction>>,
    /// Canonical pairs each reaction was expanded to
    pairs: HashMap<u32, Vec<(u16, u16)>>,
    next_id: u32,
}

impl ReactionTable {
    pub fn new() -> Self {
        Self {
            reactions: HashMap::new(),
            pairs: HashMap::new(),
            next_id: 0,
        }
    }

    /// Normalized key and whether `(a, b)` is reversed relative to it
    #[inline]
    pub fn canonical(a: u16, b: u16) -> ((u16, u16), bool) {
        if a > b {
            ((b, a), true)
        } else {
            ((a, b), false)
        }
    }

    /// Register `in1 + in2 → out1 + out2`. Rejects material ids missing from `materials`.
    pub fn add(
        &mut self,
        materials: &MaterialTable,
        (in1, in2): (u16, u16),
        (out1, out2): (u16, u16),
        probability: f64,
        side_effect: Option<SideEffectToken>,
    ) -> Result<ReactionHandle, ReactionError> {
        if let Some(&unknown) = [in1, in2, out1, out2]
            .iter()
            .find(|&&id| !materials.contains(id))
        {
            log::error!(
                "[REACTION] Rejected {} + {} -> {} + {}: unknown material {}",
                in1,
                in2,
                out1,
                out2,
                unknown
            );
            return Err(ReactionError::UnknownMaterial(unknown));
        }

        let handle = self.insert(&[(in1, in2)], (out1, out2), probability, side_effect);
        log::debug!(
            "[REACTION] Added #{} {} + {} -> {} + {} (p={})",
            handle.id,
            in1,
            in2,
            out1,
            out2,
            probability
        );
        Ok(handle)
    }

    /// Register `tag1 + tag2 → out1 + out2` for every pair of materials carrying the tags.
    ///
    /// Fails if either tag matches no material or an output id is unknown.
    pub fn add_by_tag(
        &mut self,
        materials: &MaterialTable,
        (tag1, tag2): (&str, &str),
        (out1, out2): (u16, u16),
        probability: f64,
        side_effect: Option<SideEffectToken>,
    ) -> Result<ReactionHandle, ReactionError> {
        if let Some(&unknown) = [out1, out2].iter().find(|&&id| !materials.contains(id)) {
            log::error!(
                "[REACTION] Rejected {} + {}: unknown output material {}",
                tag1,
                tag2,
                unknown
            );
            return Err(ReactionError::UnknownMaterial(unknown));
        }

        let ins1 = materials.with_tag(tag1);
        let ins2 = materials.with_tag(tag2);
        let missing = if ins1.is_empty() {
            Some(tag1)
        } else if ins2.is_empty() {
            Some(tag2)
        } else {
            None
        };
        if let Some(tag) = missing {
            log::error!("[REACTION] Rejected {} + {}: unknown tag {}", tag1, tag2, tag);
            return Err(ReactionError::UnknownTag(tag.to_string()));
        }

        let inputs: Vec<(u16, u16)> = ins1
            .iter()
            .flat_map(|&a| ins2.iter().map(move |&b| (a, b)))
            .collect();
        let handle = self.insert(&inputs, (out1, out2), probability, side_effect);
        log::debug!(
            "[REACTION] Added #{} {} + {} -> {} + {} over {} pairs (p={})",
            handle.id,
            tag1,
            tag2,
            out1,
            out2,
            inputs.len(),
            probability
        );
        Ok(handle)
    }

    fn insert(
        &mut self,
        inputs: &[(u16, u16)],
        (out1, out2): (u16, u16),
        probability: f64,
        side_effect: Option<SideEffectToken>,
    ) -> ReactionHandle {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let probability = probability_threshold(probability);

        let mut pairs = Vec::with_capacity(inputs.len());
        for &(in1, in2) in inputs {
            let (pair, swap) = Self::canonical(in1, in2);
            let (out_lo, out_hi) = if swap { (out2, out1) } else { (out1, out2) };
            self.reactions.entry(pair).or_default().push(Reaction {
                id,
                probability,
                out_lo,
                out_hi,
                side_effect,
            });
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
        self.pairs.insert(id, pairs);

        ReactionHandle { id }
    }

    /// Remove a reaction and every pair it was expanded to. Returns false if it was not
    /// registered.
    pub fn remove(&mut self, handle: ReactionHandle) -> bool {
        let Some(pairs) = self.pairs.remove(&handle.id) else {
            return false;
        };

        for pair in pairs {
            if let Some(bucket) = self.reactions.get_mut(&pair) {
                bucket.retain(|r| r.id != handle.id);
                if bucket.is_empty() {
                    self.reactions.remove(&pair);
                }
            }
        }
        true
    }

    /// Reactions between two materials, in either order
    #[inline]
    pub fn lookup(&self, m1: u16, m2: u16) -> ReactionLookup<'_> {
        let (pair, swap) = Self::canonical(m1, m2);
        let reactions = self
            .reactions
            .get(&pair)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        ReactionLookup { reactions, swap }
    }

    pub fn clear(&mut self) {
        self.reactions.clear();
        self.pairs.clear();
    }

    /// Number of registered reactions, a tag reaction counting once
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl Default for ReactionTable {
    fn default() -> Self {
        Self::new()
    }
}
