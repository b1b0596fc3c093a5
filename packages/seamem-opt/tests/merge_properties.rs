//! Property tests over the memory-state merge: the sparse invariant
//! holds after simplification, and simplification is idempotent.

mod common;

use common::rig;
use proptest::prelude::*;
use seamem_opt::features::merge;
use seamem_opt::{Graph, NodeId, NodeKind};

/// Build a merge over `width` slots where each slot is absent, the
/// base, a fresh memory node, or a nested merge, per the script.
#[derive(Debug, Clone)]
enum SlotScript {
    Absent,
    Base,
    Fresh,
    Nested,
}

fn slot_script() -> impl Strategy<Value = SlotScript> {
    prop_oneof![
        Just(SlotScript::Absent),
        Just(SlotScript::Base),
        Just(SlotScript::Fresh),
        Just(SlotScript::Nested),
    ]
}

fn build_merge(g: &mut Graph, base: NodeId, script: &[SlotScript]) -> NodeId {
    let mm = merge::make(g, base);
    for (i, s) in script.iter().enumerate() {
        let idx = seamem_opt::shared::constants::ALIAS_IDX_RAW + 1 + i;
        match s {
            SlotScript::Absent => {}
            SlotScript::Base => {
                // Violate the sparse invariant on purpose; simplify must
                // repair it.
                g.set_input(mm, idx, Some(base));
            }
            SlotScript::Fresh => {
                let n = g.add(NodeKind::Param(100 + i as u32), vec![]);
                g.set_input(mm, idx, Some(n));
            }
            SlotScript::Nested => {
                let deep = g.add(NodeKind::Param(200 + i as u32), vec![]);
                let inner = merge::make(g, deep);
                let sl = g.add(NodeKind::Param(300 + i as u32), vec![]);
                merge::set_memory_at(g, inner, idx, Some(sl));
                g.set_input(mm, idx, Some(inner));
            }
        }
    }
    mm
}

proptest! {
    #[test]
    fn simplify_restores_the_sparse_invariant(script in prop::collection::vec(slot_script(), 0..8)) {
        let mut r = rig();
        let mm = build_merge(&mut r.g, r.mem0, &script);

        merge::simplify(&mut r.g, mm);
        prop_assert!(merge::verify_sparse(&r.g, mm));
    }

    #[test]
    fn simplify_is_idempotent(script in prop::collection::vec(slot_script(), 0..8)) {
        let mut r = rig();
        let mm = build_merge(&mut r.g, r.mem0, &script);

        merge::simplify(&mut r.g, mm);
        let snapshot: Vec<_> = r.g.inputs(mm).to_vec();
        let progressed = merge::simplify(&mut r.g, mm);
        prop_assert!(!progressed, "second simplify reported progress");
        prop_assert_eq!(r.g.inputs(mm), snapshot.as_slice());
    }

    #[test]
    fn identity_iff_no_distinguishing_slices(script in prop::collection::vec(slot_script(), 0..8)) {
        let mut r = rig();
        let mm = build_merge(&mut r.g, r.mem0, &script);
        merge::simplify(&mut r.g, mm);

        let has_slice = (seamem_opt::shared::constants::ALIAS_IDX_RAW..r.g.num_inputs(mm))
            .any(|i| r.g.input(mm, i).is_some());
        match merge::identity(&r.g, mm) {
            Some(base) => {
                prop_assert_eq!(base, r.mem0);
                prop_assert!(!has_slice);
            }
            None => prop_assert!(has_slice),
        }
    }
}
