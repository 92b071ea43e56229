// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Small graph algorithms shared by the statement and compartmental
//! analyses.  Graphs are never materialized as a type of their own: callers
//! hand in a successor function over whatever node representation they
//! already have.

use std::collections::{BTreeMap, BTreeSet};

/// Transitive closure from `start` under a successor function.  The start
/// set is included in the result; cycles are fine.
pub fn reachable_from<T, I, F>(start: &BTreeSet<T>, mut successors: F) -> BTreeSet<T>
where
    T: Clone + Ord,
    F: FnMut(&T) -> I,
    I: IntoIterator<Item = T>,
{
    let mut queue: Vec<T> = start.iter().cloned().collect();
    let mut closure: BTreeSet<T> = start.clone();
    while let Some(u) = queue.pop() {
        for v in successors(&u) {
            if !closure.contains(&v) {
                closure.insert(v.clone());
                queue.push(v);
            }
        }
    }

    closure
}

/// Reverse adjacency of a dependency map.  Nodes with no incoming edges do
/// not appear as keys.
pub fn graph_inverse<T: Clone + Ord>(
    g: &BTreeMap<T, BTreeSet<T>>,
) -> BTreeMap<T, BTreeSet<T>> {
    let mut h: BTreeMap<T, BTreeSet<T>> = BTreeMap::new();

    for (left, deps) in g.iter() {
        for right in deps.iter() {
            h.entry(right.clone()).or_default().insert(left.clone());
        }
    }

    h
}

/// The strongly connected component containing `vertex`.
///
/// The backward search runs on the graph induced by the forward-reachable
/// vertices.  This is equivalent to intersecting full forward and backward
/// closures, and it is what bounds a central compartmental component
/// without expanding through one-way upstream compartments.
pub fn strongly_connected_component_of<T, I, J, F, G>(
    vertex: &T,
    successors: F,
    mut predecessors: G,
) -> BTreeSet<T>
where
    T: Clone + Ord,
    F: FnMut(&T) -> I,
    G: FnMut(&T) -> J,
    I: IntoIterator<Item = T>,
    J: IntoIterator<Item = T>,
{
    let start = BTreeSet::from([vertex.clone()]);

    let forward_reachable = reachable_from(&start, successors);

    reachable_from(&start, |u| {
        predecessors(u)
            .into_iter()
            .filter(|v| forward_reachable.contains(v))
            .collect::<Vec<T>>()
    })
}
