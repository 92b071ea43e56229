// Copyright 2026 The Pharmflow Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use crate::graph::{graph_inverse, reachable_from, strongly_connected_component_of};

const MAX_NODES: u32 = 12;

fn arb_graph() -> impl Strategy<Value = BTreeMap<u32, BTreeSet<u32>>> {
    proptest::collection::vec((0..MAX_NODES, 0..MAX_NODES), 0..48).prop_map(|edges| {
        let mut g: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        for (u, v) in edges {
            g.entry(u).or_default().insert(v);
        }
        g
    })
}

fn successors(g: &BTreeMap<u32, BTreeSet<u32>>) -> impl FnMut(&u32) -> Vec<u32> + '_ {
    |u| g.get(u).map(|vs| vs.iter().copied().collect()).unwrap_or_default()
}

proptest! {
    #[test]
    fn closure_is_idempotent(g in arb_graph(), start in 0..MAX_NODES) {
        let start = BTreeSet::from([start]);
        let once = reachable_from(&start, successors(&g));
        let twice = reachable_from(&once, successors(&g));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn closure_contains_start(g in arb_graph(), start in 0..MAX_NODES) {
        let start_set = BTreeSet::from([start]);
        let closure = reachable_from(&start_set, successors(&g));
        prop_assert!(closure.contains(&start));
    }

    #[test]
    fn scc_members_are_mutually_reachable(g in arb_graph(), v in 0..MAX_NODES) {
        let inv = graph_inverse(&g);
        let scc = strongly_connected_component_of(&v, successors(&g), successors(&inv));

        prop_assert!(scc.contains(&v));
        for u in scc.iter() {
            let from_u = reachable_from(&BTreeSet::from([*u]), successors(&g));
            prop_assert!(from_u.contains(&v), "{} must reach {}", u, v);
            let from_v = reachable_from(&BTreeSet::from([v]), successors(&g));
            prop_assert!(from_v.contains(u), "{} must reach {}", v, u);
        }
    }
}
