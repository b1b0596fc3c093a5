//! Bulk zero-fill nodes and the zero-fill builder.

use crate::features::memory::domain::Rewrite;
use crate::shared::models::{
    slot, AccessFlags, AddressType, ConValue, Graph, MemOrd, NodeId, NodeKind, StoreKind,
};

/// Build a bulk clear of `count` words starting at `adr`.
pub fn make(
    g: &mut Graph,
    ctl: Option<NodeId>,
    mem: Option<NodeId>,
    adr: NodeId,
    count_words: NodeId,
) -> NodeId {
    g.add(
        NodeKind::ClearRange,
        vec![ctl, mem, Some(adr), Some(count_words)],
    )
}

/// A clear of zero words is its own memory input.
pub fn identity(g: &Graph, clear: NodeId) -> Option<NodeId> {
    if !matches!(g.kind(clear), NodeKind::ClearRange) {
        return None;
    }
    let count = g.input(clear, slot::VALUE)?;
    match g.con_value(count) {
        Some(ConValue::Long(0)) | Some(ConValue::Int(0)) => g.input(clear, slot::MEMORY),
        _ => None,
    }
}

/// Expand a short constant-length clear into explicit word stores.
pub fn ideal(g: &mut Graph, clear: NodeId, clear_short_size: i64) -> Rewrite {
    if !matches!(g.kind(clear), NodeKind::ClearRange) {
        return Rewrite::None;
    }
    let count = match g.input(clear, slot::VALUE).and_then(|c| g.con_value(c)) {
        Some(ConValue::Long(c)) => c,
        Some(ConValue::Int(c)) => c as i64,
        _ => return Rewrite::None,
    };
    if count <= 0 || count * 8 > clear_short_size {
        return Rewrite::None;
    }
    let ctl = g.input(clear, slot::CONTROL);
    let mut mem = match g.input(clear, slot::MEMORY) {
        Some(m) => m,
        None => return Rewrite::None,
    };
    let adr = match g.input(clear, slot::ADDRESS) {
        Some(a) => a,
        None => return Rewrite::None,
    };

    for k in 0..count {
        let word_adr = offset_address(g, adr, k * 8);
        mem = zero_store(g, ctl, mem, word_adr, StoreKind::L);
    }
    Rewrite::ReplacedBy(mem)
}

/// Zero the byte range `[start, end)` of the object at `dest`, chaining
/// onto `mem`. Uses word stores for short runs, one bulk clear for long
/// ones, with int stores covering ragged 4-byte edges. Both bounds must
/// be 4-aligned.
pub fn clear_memory(
    g: &mut Graph,
    ctl: Option<NodeId>,
    mem: NodeId,
    dest: NodeId,
    start: i64,
    end: i64,
    clear_short_size: i64,
) -> NodeId {
    debug_assert_eq!(start % 4, 0);
    debug_assert_eq!(end % 4, 0);
    if start >= end {
        return mem;
    }

    let mut mem = mem;
    let mut start = start;

    // Align the head up to a word with one int store.
    if start % 8 != 0 {
        let adr = offset_address(g, dest, start);
        mem = zero_store(g, ctl, mem, adr, StoreKind::I);
        start += 4;
    }

    let aligned_end = end & !7;
    if aligned_end > start {
        let bytes = aligned_end - start;
        if bytes > clear_short_size {
            let adr = offset_address(g, dest, start);
            let count = g.make_con(ConValue::Long(bytes / 8));
            mem = make(g, ctl, Some(mem), adr, count);
        } else {
            let mut off = start;
            while off < aligned_end {
                let adr = offset_address(g, dest, off);
                mem = zero_store(g, ctl, mem, adr, StoreKind::L);
                off += 8;
            }
        }
    }

    // Ragged 4-byte tail.
    if end > aligned_end && aligned_end >= start {
        let adr = offset_address(g, dest, aligned_end.max(start));
        mem = zero_store(g, ctl, mem, adr, StoreKind::I);
    }

    mem
}

fn offset_address(g: &mut Graph, base: NodeId, offset: i64) -> NodeId {
    if offset == 0 {
        return base;
    }
    let off = g.make_con(ConValue::Long(offset));
    g.add(NodeKind::AddPtr, vec![None, Some(base), Some(off)])
}

fn zero_store(
    g: &mut Graph,
    ctl: Option<NodeId>,
    mem: NodeId,
    adr: NodeId,
    kind: StoreKind,
) -> NodeId {
    let zero = match kind {
        StoreKind::L => g.make_con(ConValue::Long(0)),
        _ => g.make_con(ConValue::Int(0)),
    };
    super::store::make_raw(
        g,
        ctl,
        Some(mem),
        adr,
        AddressType::Raw,
        kind,
        zero,
        MemOrd::Unordered,
        AccessFlags::default(),
    )
}
