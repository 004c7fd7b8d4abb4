//! Group forest walks
//!
//! Ancestor and descendant closures are computed by repeated batched
//! lookups until no new group is discovered. The number of expansion rounds
//! is bounded by the total number of groups: in an acyclic forest of `n`
//! groups no chain is longer than `n`, so hitting the bound means the stored
//! parent links are corrupt and the walk stops with what it has.

use crate::error::Result;
use crate::storage::Storage;
use crate::types::{Group, GroupId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Direction of a closure walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow parent links toward the roots
    Ancestors,
    /// Follow child links toward the leaves
    Descendants,
}

/// Result of a closure walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    /// Seed groups plus everything reached from them
    pub ids: BTreeSet<GroupId>,

    /// True if the round bound was hit before a fixed point
    pub truncated: bool,
}

impl Closure {
    pub fn contains(&self, id: GroupId) -> bool {
        self.ids.contains(&id)
    }

    pub fn to_vec(&self) -> Vec<GroupId> {
        self.ids.iter().copied().collect()
    }
}

/// Bounded fixed-point expansion over group ids
///
/// The walk is storage-agnostic: callers pull the next frontier, look up its
/// neighbours however they like and feed them back with [`absorb`].
///
/// [`absorb`]: ClosureWalk::absorb
#[derive(Debug)]
pub struct ClosureWalk {
    visited: BTreeSet<GroupId>,
    frontier: Vec<GroupId>,
    rounds: usize,
    bound: usize,
    truncated: bool,
}

impl ClosureWalk {
    pub fn new(seed: impl IntoIterator<Item = GroupId>, bound: usize) -> Self {
        let visited: BTreeSet<GroupId> = seed.into_iter().collect();
        let frontier = visited.iter().copied().collect();
        Self {
            visited,
            frontier,
            rounds: 0,
            bound: bound.max(1),
            truncated: false,
        }
    }

    /// Take the ids to expand next, or `None` once the walk is complete
    pub fn next_frontier(&mut self) -> Option<Vec<GroupId>> {
        if self.frontier.is_empty() {
            return None;
        }
        if self.rounds >= self.bound {
            self.truncated = true;
            self.frontier.clear();
            return None;
        }
        self.rounds += 1;
        Some(std::mem::take(&mut self.frontier))
    }

    /// Record neighbours of the last frontier; only unseen ids are expanded
    pub fn absorb(&mut self, discovered: impl IntoIterator<Item = GroupId>) {
        for id in discovered {
            if self.visited.insert(id) {
                self.frontier.push(id);
            }
        }
    }

    pub fn finish(self) -> Closure {
        Closure {
            ids: self.visited,
            truncated: self.truncated,
        }
    }
}

/// Walk the stored forest from `seed` in the given direction
pub async fn closure(storage: &dyn Storage, seed: &[GroupId], direction: Direction) -> Result<Closure> {
    if seed.is_empty() {
        return Ok(Closure::default());
    }

    let bound = storage.group_count().await?;
    let mut walk = ClosureWalk::new(seed.iter().copied(), bound);

    while let Some(frontier) = walk.next_frontier() {
        let next = match direction {
            Direction::Ancestors => storage.parent_ids(&frontier).await?,
            Direction::Descendants => storage.child_ids(&frontier).await?,
        };
        walk.absorb(next);
    }

    let result = walk.finish();
    if result.truncated {
        warn!(
            "Group {:?} walk from {:?} stopped after {} rounds; parent links may contain a cycle",
            direction, seed, bound
        );
    }
    Ok(result)
}

/// Ancestor closure of `seed`, seed included
pub async fn ancestors(storage: &dyn Storage, seed: &[GroupId]) -> Result<Closure> {
    closure(storage, seed, Direction::Ancestors).await
}

/// Descendant closure of `seed`, seed included
pub async fn descendants(storage: &dyn Storage, seed: &[GroupId]) -> Result<Closure> {
    closure(storage, seed, Direction::Descendants).await
}

/// True if making `parent` the parent of `group` would close a cycle
pub async fn would_create_cycle(storage: &dyn Storage, group: GroupId, parent: GroupId) -> Result<bool> {
    if group == parent {
        return Ok(true);
    }
    Ok(ancestors(storage, &[parent]).await?.contains(group))
}

/// Depth-first ordering of a forest for display: `(depth, group)` pairs,
/// roots first, siblings by id. Groups unreachable from any root (only
/// possible with corrupt links) are appended at depth 0.
pub fn forest_order(groups: &[Group]) -> Vec<(usize, &Group)> {
    let ids: BTreeSet<GroupId> = groups.iter().map(|g| g.id).collect();
    let mut children: BTreeMap<Option<GroupId>, Vec<&Group>> = BTreeMap::new();
    for group in groups {
        // A dangling parent reference is displayed as a root
        let parent = group.parent_id.filter(|p| ids.contains(p));
        children.entry(parent).or_default().push(group);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|g| g.id);
    }

    let mut ordered = Vec::with_capacity(groups.len());
    let mut seen = BTreeSet::new();
    let mut stack: Vec<(usize, &Group)> = children
        .get(&None)
        .map(|roots| roots.iter().rev().map(|g| (0, *g)).collect())
        .unwrap_or_default();

    while let Some((depth, group)) = stack.pop() {
        if !seen.insert(group.id) {
            continue;
        }
        ordered.push((depth, group));
        if let Some(kids) = children.get(&Some(group.id)) {
            stack.extend(kids.iter().rev().map(|g| (depth + 1, *g)));
        }
    }

    for group in groups {
        if !seen.contains(&group.id) {
            ordered.push((0, group));
        }
    }
    ordered
}
