//! Independence proofs: bounded dominance and pointer disjointness.

use crate::shared::constants::DOMINATOR_WALK_BUDGET;
use crate::shared::models::{slot, Graph, NodeId, NodeKind};
use rustc_hash::FxHashSet;

/// Attempt to prove that every control path above `sub` passes through
/// `dom`'s control point. Conservative: any unrecognized shape, missing
/// edge, or exhausted budget answers "not proven".
///
/// Used to look past an allocation: when the reading access's control
/// predates the allocation, the allocation cannot have produced the
/// value being read.
pub fn all_controls_dominate(g: &Graph, dom: NodeId, sub: NodeId) -> bool {
    let dom_ctl = if g.kind(dom).is_cfg() {
        Some(dom)
    } else {
        match g.input(dom, slot::CONTROL) {
            // A node with no control floats freely and is pinned only by
            // its data inputs; it is available everywhere.
            None => return true,
            some => some,
        }
    };
    let dom_ctl = match dom_ctl {
        Some(c) => c,
        None => return true,
    };

    let start = if g.kind(sub).is_cfg() {
        sub
    } else {
        match g.input(sub, slot::CONTROL) {
            Some(c) => c,
            None => return false,
        }
    };

    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    let mut stack = vec![start];
    let mut budget = DOMINATOR_WALK_BUDGET;

    while let Some(c) = stack.pop() {
        if c == dom_ctl {
            continue; // this path is proven
        }
        if !visited.insert(c) {
            continue;
        }
        if budget == 0 {
            return false;
        }
        budget -= 1;

        match g.kind(c) {
            // Reached the top without meeting dom: some path escapes.
            NodeKind::Root => return false,
            NodeKind::Region => {
                // Every predecessor must independently pass through dom.
                for inp in g.inputs(c).iter() {
                    match inp {
                        Some(p) => stack.push(*p),
                        None => return false,
                    }
                }
            }
            NodeKind::Proj(_)
            | NodeKind::RangeCheck
            | NodeKind::Allocate(_)
            | NodeKind::Initialize(_)
            | NodeKind::Call => match g.input(c, 0) {
                Some(p) => stack.push(p),
                None => return false,
            },
            _ => return false,
        }
    }
    true
}

/// Attempt to prove two pointers cannot alias. They may both manifestly
/// be allocations (then they must differ), both be distinct constants,
/// or one is an allocation the other provably predates.
pub fn detect_ptr_independence(
    g: &Graph,
    p1: NodeId,
    a1: Option<NodeId>,
    p2: NodeId,
    a2: Option<NodeId>,
) -> bool {
    match (a1, a2) {
        (None, None) => {
            // Distinct constants address distinct objects.
            match (g.con_value(p1), g.con_value(p2)) {
                (Some(c1), Some(c2)) => c1 != c2,
                _ => false,
            }
        }
        (Some(x), Some(y)) => x != y,
        (Some(alloc1), None) => all_controls_dominate(g, p2, alloc1),
        (None, Some(alloc2)) => all_controls_dominate(g, p1, alloc2),
    }
}
