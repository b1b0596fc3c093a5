//! Store elimination and adjacent-store merging scenarios.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use seamem_opt::{
    slot, ConValue, LoadKind, NodeKind, NoBarriers, NoTypeInfo, Optimizer, OptimizerConfig,
    PortableTarget, StoreKind,
};

static ORACLE: NoTypeInfo = NoTypeInfo;
static BARRIERS: NoBarriers = NoBarriers;
static CAPS: PortableTarget = PortableTarget { reverse_bytes: true };

fn optimizer(g: seamem_opt::Graph) -> Optimizer<'static> {
    Optimizer::new(g, OptimizerConfig::default(), &ORACLE, &BARRIERS, &CAPS)
}

fn no_swap_caps() -> PortableTarget {
    PortableTarget { reverse_bytes: false }
}

#[test]
fn storing_back_a_loaded_value_is_a_noop() {
    let mut r = rig();
    let ld = load_at(
        &mut r.g,
        Some(r.root),
        r.mem0,
        r.obj,
        16,
        LoadKind::I,
        int_field(16),
    );
    let ld_adr = r.g.input(ld, slot::ADDRESS).unwrap();
    let st = seamem_opt::features::memory::store::make_raw(
        &mut r.g,
        Some(r.root),
        Some(r.mem0),
        ld_adr,
        int_field(16),
        StoreKind::I,
        ld,
        seamem_opt::MemOrd::Unordered,
        Default::default(),
    );
    let probe = r.g.add(NodeKind::Phi, vec![None, Some(st)]);

    let mut opt = optimizer(r.g);
    opt.enqueue(st);
    opt.run_to_fixpoint();

    let g = opt.graph();
    assert_eq!(g.input(probe, 1), Some(r.mem0));
    assert_eq!(opt.stats().stores_eliminated, 1);
}

#[test]
fn repeated_identical_store_collapses() {
    let mut r = rig();
    let v = r.g.add(NodeKind::Param(2), vec![Some(r.root)]);
    let a = addr(&mut r.g, r.obj, 16);
    let st1 = seamem_opt::features::memory::store::make_raw(
        &mut r.g,
        Some(r.root),
        Some(r.mem0),
        a,
        int_field(16),
        StoreKind::I,
        v,
        seamem_opt::MemOrd::Unordered,
        Default::default(),
    );
    let st2 = seamem_opt::features::memory::store::make_raw(
        &mut r.g,
        Some(r.root),
        Some(st1),
        a,
        int_field(16),
        StoreKind::I,
        v,
        seamem_opt::MemOrd::Unordered,
        Default::default(),
    );
    let probe = r.g.add(NodeKind::Phi, vec![None, Some(st2)]);

    let mut opt = optimizer(r.g);
    opt.enqueue(st2);
    opt.run_to_fixpoint();

    assert_eq!(opt.graph().input(probe, 1), Some(st1));
}

#[test]
fn overwritten_store_is_bypassed() {
    let mut r = rig();
    let v1 = r.g.add(NodeKind::Param(2), vec![Some(r.root)]);
    let v2 = r.g.add(NodeKind::Param(3), vec![Some(r.root)]);
    let st1 = store_at(
        &mut r.g,
        Some(r.root),
        r.mem0,
        r.obj,
        16,
        StoreKind::I,
        v1,
        int_field(16),
    );
    let st2 = store_at(
        &mut r.g,
        Some(r.root),
        st1,
        r.obj,
        16,
        StoreKind::I,
        v2,
        int_field(16),
    );

    let mut opt = optimizer(r.g);
    opt.enqueue(st2);
    opt.run_to_fixpoint();

    // st2 now writes over mem0 directly; st1 is dead.
    let g = opt.graph();
    assert_eq!(g.input(st2, slot::MEMORY), Some(r.mem0));
    assert_eq!(g.use_count(st1), 0);
}

#[test]
fn observed_store_is_not_bypassed() {
    let mut r = rig();
    let v1 = r.g.add(NodeKind::Param(2), vec![Some(r.root)]);
    let v2 = r.g.add(NodeKind::Param(3), vec![Some(r.root)]);
    let st1 = store_at(
        &mut r.g,
        Some(r.root),
        r.mem0,
        r.obj,
        16,
        StoreKind::I,
        v1,
        int_field(16),
    );
    let st2 = store_at(
        &mut r.g,
        Some(r.root),
        st1,
        r.obj,
        16,
        StoreKind::I,
        v2,
        int_field(16),
    );
    // A second observer of st1's memory state.
    let ld = load_at(
        &mut r.g,
        Some(r.root),
        st1,
        r.obj,
        32,
        LoadKind::I,
        int_field(32),
    );
    let _ = ld;

    let mut opt = optimizer(r.g);
    opt.enqueue(st2);
    opt.run_to_fixpoint();

    assert_eq!(opt.graph().input(st2, slot::MEMORY), Some(st1));
}

#[test]
fn zero_store_into_fresh_object_vanishes() {
    let mut r = rig();
    let a = allocate(&mut r.g, r.root, r.mem0, 16, 48);
    let zero = r.g.make_con(ConValue::Int(0));
    let st = store_at(
        &mut r.g,
        Some(a.ctl),
        a.mem,
        a.rawoop,
        24,
        StoreKind::I,
        zero,
        int_field(24),
    );
    let probe = r.g.add(NodeKind::Phi, vec![None, Some(st)]);

    let mut opt = optimizer(r.g);
    opt.enqueue(st);
    opt.run_to_fixpoint();

    assert_eq!(opt.graph().input(probe, 1), Some(a.mem));
}

#[test]
fn useless_mask_before_byte_store_is_dropped() {
    let mut r = rig();
    let v = r.g.add(NodeKind::Param(2), vec![Some(r.root)]);
    let mask = r.g.make_con(ConValue::Int(0xFF));
    let masked = r.g.add(NodeKind::AndInt, vec![None, Some(v), Some(mask)]);
    let st = store_at(
        &mut r.g,
        Some(r.root),
        r.mem0,
        r.obj,
        16,
        StoreKind::B,
        masked,
        int_field(16),
    );

    let mut opt = optimizer(r.g);
    opt.enqueue(st);
    opt.run_to_fixpoint();

    assert_eq!(opt.graph().input(st, slot::VALUE), Some(v));
}

#[test]
fn narrow_mask_is_kept() {
    let mut r = rig();
    let v = r.g.add(NodeKind::Param(2), vec![Some(r.root)]);
    let mask = r.g.make_con(ConValue::Int(0x7F));
    let masked = r.g.add(NodeKind::AndInt, vec![None, Some(v), Some(mask)]);
    let st = store_at(
        &mut r.g,
        Some(r.root),
        r.mem0,
        r.obj,
        16,
        StoreKind::B,
        masked,
        int_field(16),
    );

    let mut opt = optimizer(r.g);
    opt.enqueue(st);
    opt.run_to_fixpoint();

    assert_eq!(opt.graph().input(st, slot::VALUE), Some(masked));
}

// ═══════════════════════════════════════════════════════════════════════
// Adjacent-store merging
// ═══════════════════════════════════════════════════════════════════════

/// Four byte stores of right-shifted slices of one int, ascending
/// offsets, each unconditionally following the previous.
fn shifted_byte_chain(r: &mut Rig, reversed: bool) -> (seamem_opt::NodeId, seamem_opt::NodeId) {
    let v = r.g.add(NodeKind::Param(2), vec![Some(r.root)]);
    let at = seamem_opt::AddressType::ArrayElement { elem: seamem_opt::BasicType::Byte };
    let mut mem = r.mem0;
    let mut last = 0;
    for i in 0..4u32 {
        let shift_amt = if reversed { 24 - i * 8 } else { i * 8 };
        let value = if shift_amt == 0 {
            v
        } else {
            let s = r.g.make_con(ConValue::Int(shift_amt as i32));
            r.g.add(NodeKind::RShiftInt, vec![None, Some(v), Some(s)])
        };
        let st = store_at(
            &mut r.g,
            Some(r.root),
            mem,
            r.obj,
            16 + i as i64,
            StoreKind::B,
            value,
            at.clone(),
        );
        mem = st;
        last = st;
    }
    (v, last)
}

#[test]
fn adjacent_shifted_byte_stores_merge_into_one_int_store() {
    let mut r = rig();
    let (v, last) = shifted_byte_chain(&mut r, false);
    let probe = r.g.add(NodeKind::Phi, vec![None, Some(last)]);

    let mut opt = optimizer(r.g);
    opt.enqueue(last);
    opt.run_to_fixpoint();

    let g = opt.graph();
    let merged = g.input(probe, 1).unwrap();
    assert_ne!(merged, last);
    match g.kind(merged) {
        NodeKind::Store(acc) => {
            assert_eq!(acc.kind, StoreKind::I);
            assert!(acc.flags.mismatched);
        }
        other => panic!("expected a store, got {:?}", other),
    }
    // Platform order: the merged value is the shift base itself.
    assert_eq!(g.input(merged, slot::VALUE), Some(v));
    // The merged store starts at the chain's lowest offset.
    let (base, off) = seamem_opt::features::memory::domain::base_and_offset(
        g,
        g.input(merged, slot::ADDRESS).unwrap(),
    );
    assert_eq!(base, Some(r.obj));
    assert_eq!(off.constant(), Some(16));
    assert_eq!(g.input(merged, slot::MEMORY), Some(r.mem0));
    assert_eq!(opt.stats().stores_merged, 1);
}

#[test]
fn reversed_byte_stores_merge_with_byte_swap() {
    let mut r = rig();
    let (v, last) = shifted_byte_chain(&mut r, true);
    let probe = r.g.add(NodeKind::Phi, vec![None, Some(last)]);

    let mut opt = optimizer(r.g);
    opt.enqueue(last);
    opt.run_to_fixpoint();

    let g = opt.graph();
    let merged = g.input(probe, 1).unwrap();
    assert_ne!(merged, last);
    let value = g.input(merged, slot::VALUE).unwrap();
    match g.kind(value) {
        NodeKind::ReverseBytes(4) => {}
        other => panic!("expected a 4-byte swap, got {:?}", other),
    }
    assert_eq!(g.input(value, 1), Some(v));
}

#[test]
fn reversed_merge_needs_the_target_primitive() {
    let mut r = rig();
    let (_v, last) = shifted_byte_chain(&mut r, true);
    let probe = r.g.add(NodeKind::Phi, vec![None, Some(last)]);

    let caps = no_swap_caps();
    let mut opt = Optimizer::new(r.g, OptimizerConfig::default(), &ORACLE, &BARRIERS, &caps);
    opt.enqueue(last);
    opt.run_to_fixpoint();

    assert_eq!(opt.graph().input(probe, 1), Some(last), "no byte-swap, no merge");
}

#[test]
fn constant_byte_stores_merge_into_one_constant() {
    let mut r = rig();
    let at = seamem_opt::AddressType::ArrayElement { elem: seamem_opt::BasicType::Byte };
    let mut mem = r.mem0;
    let mut last = 0;
    let cons = [0x11, 0x22, 0x33, 0x44];
    for (i, c) in cons.iter().enumerate() {
        let v = r.g.make_con(ConValue::Int(*c));
        let st = store_at(
            &mut r.g,
            Some(r.root),
            mem,
            r.obj,
            16 + i as i64,
            StoreKind::B,
            v,
            at.clone(),
        );
        mem = st;
        last = st;
    }
    let probe = r.g.add(NodeKind::Phi, vec![None, Some(last)]);

    let mut opt = optimizer(r.g);
    opt.enqueue(last);
    opt.run_to_fixpoint();

    let g = opt.graph();
    let merged = g.input(probe, 1).unwrap();
    let value = g.input(merged, slot::VALUE).unwrap();
    // Reading each byte of the combined constant back must reproduce
    // the original constants in address order.
    let con = match g.con_value(value) {
        Some(ConValue::Int(c)) => c,
        other => panic!("expected an int constant, got {:?}", other),
    };
    let bytes = con.to_ne_bytes();
    assert_eq!(bytes, [0x11, 0x22, 0x33, 0x44]);
}

#[test]
fn three_store_chain_merges_only_a_power_of_two() {
    let mut r = rig();
    let at = seamem_opt::AddressType::ArrayElement { elem: seamem_opt::BasicType::Byte };
    let mut mem = r.mem0;
    let mut last = 0;
    for i in 0..3i64 {
        let v = r.g.make_con(ConValue::Int(0x10 + i as i32));
        let st = store_at(&mut r.g, Some(r.root), mem, r.obj, 16 + i, StoreKind::B, v, at.clone());
        mem = st;
        last = st;
    }
    let probe = r.g.add(NodeKind::Phi, vec![None, Some(last)]);

    let mut opt = optimizer(r.g);
    opt.enqueue(last);
    opt.run_to_fixpoint();

    let g = opt.graph();
    let merged = g.input(probe, 1).unwrap();
    match g.kind(merged) {
        // Three byte stores: the top two merge into one char store.
        NodeKind::Store(acc) => assert_eq!(acc.kind, StoreKind::C),
        other => panic!("expected a store, got {:?}", other),
    }
}

#[test]
fn store_chains_with_different_bases_do_not_merge() {
    let mut r = rig();
    let other = r.g.add(NodeKind::Param(2), vec![Some(r.root)]);
    let at = seamem_opt::AddressType::ArrayElement { elem: seamem_opt::BasicType::Byte };
    let c1 = r.g.make_con(ConValue::Int(1));
    let c2 = r.g.make_con(ConValue::Int(2));
    let st1 = store_at(&mut r.g, Some(r.root), r.mem0, r.obj, 16, StoreKind::B, c1, at.clone());
    let st2 = store_at(&mut r.g, Some(r.root), st1, other, 17, StoreKind::B, c2, at);
    let probe = r.g.add(NodeKind::Phi, vec![None, Some(st2)]);

    let mut opt = optimizer(r.g);
    opt.enqueue(st2);
    opt.run_to_fixpoint();

    assert_eq!(opt.graph().input(probe, 1), Some(st2));
}
