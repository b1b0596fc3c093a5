//! Subword-constant tiling and barrier completion.
//!
//! On finalization the captured stores are linearized by ascending
//! offset, adjacent sub-word constants are packed into int/long tiles,
//! and untouched bytes are explicitly zero-filled: bulk clears for
//! long runs, word stores otherwise.

use super::barrier::{
    captured_store_insertion_point, get_store_offset, is_complete, make_raw_address,
    remove_extra_zeroes, set_complete,
};
use crate::features::memory::domain::{
    allocate_info, init_allocation, memory_size, store_access, zero_memory,
};
use crate::features::memory::infrastructure::clear::clear_memory;
use crate::features::memory::infrastructure::store;
use crate::shared::models::{
    slot, AccessFlags, AddressType, ConValue, Graph, MemOrd, NodeId, StoreKind, RAW_STORES,
};
use crate::shared::ports::TargetCaps;
use serde::{Deserialize, Serialize};

/// Counters reported by the coalescing passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalesceStats {
    /// Sub-word (and int) constant stores folded into the tile model.
    pub old_subword: usize,
    /// Long constant stores folded into the tile model.
    pub old_long: usize,
    /// Int tile stores emitted.
    pub new_int: usize,
    /// Long tile stores emitted.
    pub new_long: usize,
}

#[inline]
fn align_down(x: i64, a: i64) -> i64 {
    x & !(a - 1)
}

#[inline]
fn align_up(x: i64, a: i64) -> i64 {
    (x + a - 1) & !(a - 1)
}

/// Write a `size`-byte constant into the byte-exact tile model at byte
/// offset `off`. Mirrors what the store would do to real memory on this
/// platform, byte order included. Fails on strange sizes or offsets.
fn poke(tiles: &mut [i64], off: i64, size: i64, con: i64) -> bool {
    if size != 1 && size != 2 && size != 4 && size != 8 {
        return false;
    }
    if off & (size - 1) != 0 {
        return false; // strange store offset
    }
    let j = (off / 8) as usize;
    let sub = (off % 8) as usize;
    if j >= tiles.len() {
        return false;
    }
    let mut bytes = tiles[j].to_ne_bytes();
    match size {
        1 => bytes[sub] = con as u8,
        2 => bytes[sub..sub + 2].copy_from_slice(&(con as u16).to_ne_bytes()),
        4 => bytes[sub..sub + 4].copy_from_slice(&(con as u32).to_ne_bytes()),
        _ => bytes.copy_from_slice(&(con as u64).to_ne_bytes()),
    }
    tiles[j] = i64::from_ne_bytes(bytes);
    true
}

/// Split a tile into its (low-address, high-address) 32-bit halves.
#[inline]
fn halves(tile: i64) -> (i32, i32) {
    let bytes = tile.to_ne_bytes();
    let mut lo = [0u8; 4];
    let mut hi = [0u8; 4];
    lo.copy_from_slice(&bytes[0..4]);
    hi.copy_from_slice(&bytes[4..8]);
    (i32::from_ne_bytes(lo), i32::from_ne_bytes(hi))
}

#[inline]
fn from_halves(lo: i32, hi: i32) -> i64 {
    let mut bytes = [0u8; 8];
    bytes[0..4].copy_from_slice(&lo.to_ne_bytes());
    bytes[4..8].copy_from_slice(&hi.to_ne_bytes());
    i64::from_ne_bytes(bytes)
}

fn raw_store(
    g: &mut Graph,
    init: NodeId,
    ctl: Option<NodeId>,
    mem: Option<NodeId>,
    offset: i64,
    kind: StoreKind,
    con: ConValue,
) -> Option<NodeId> {
    let adr = make_raw_address(g, init, offset)?;
    let val = g.make_con(con);
    Some(store::make_raw(
        g,
        ctl,
        mem,
        adr,
        AddressType::Raw,
        kind,
        val,
        MemOrd::Unordered,
        AccessFlags::default(),
    ))
}

/// Pack adjacent sub-word constants into int/long tiles.
///
/// Pass A folds every relevant constant store into a byte-exact tile
/// model, alongside a coverage map of which bytes any store touches.
/// Pass B re-emits each non-zero tile as one long store, or as one or
/// two int stores when a half is already optimal, lies in the header,
/// or is fully covered by non-constant initializations.
pub fn coalesce_subword_stores(
    g: &mut Graph,
    caps: &dyn TargetCaps,
    init: NodeId,
    header_size: i64,
    tracked_limit: i64,
) -> CoalesceStats {
    let mut stats = CoalesceStats::default();
    let alloc = match init_allocation(g, init) {
        Some(a) => a,
        None => return stats,
    };
    let zmem = zero_memory(g, init);

    let size_limit = allocate_info(g, alloc)
        .and_then(|i| i.size_in_bytes)
        .unwrap_or(tracked_limit)
        .min(tracked_limit);
    let size_limit = align_up(size_limit, 8);
    let num_tiles = (size_limit / 8).max(0) as usize;
    if num_tiles == 0 {
        return stats;
    }

    // tiles: exact bitwise model of all primitive constants
    // nodes: last constant-storing node subsumed into the tile model
    // inits: which bytes (in each tile) are touched by any store
    let mut tiles = vec![0i64; num_tiles];
    let mut inits = vec![0i64; num_tiles];
    let mut nodes: Vec<Option<NodeId>> = vec![None; num_tiles];

    //// Pass A: fill in the tile model with any relevant stores.

    let limit = g.num_inputs(init);
    for i in RAW_STORES..limit {
        let st = match g.input(init, i) {
            Some(s) if Some(s) != zmem => s,
            _ => continue,
        };
        let st_off = get_store_offset(g, st);
        if st_off < header_size {
            continue; // ignore the header
        }
        if g.input(st, slot::MEMORY) != zmem {
            continue; // odd store chain
        }
        let st_size = match memory_size(g, st) {
            Some(s) => s,
            None => continue,
        };
        if st_off + st_size > size_limit {
            break;
        }

        // Record which bytes are touched, constant or not.
        if !poke(&mut inits, st_off, st_size, -1) {
            continue; // strange store size
        }

        let val = g
            .input(st, slot::VALUE)
            .and_then(|v| g.con_value(v));
        let con = match val {
            Some(ConValue::Int(v)) => v as i64,
            Some(ConValue::Long(v)) => v,
            Some(ConValue::Float(bits)) => bits as i64,
            Some(ConValue::Double(bits)) => bits as i64,
            _ => continue, // non-constant or reference store
        };

        let st_kind = match store_access(g, st) {
            Some(a) => a.kind,
            None => continue,
        };
        if st_kind == StoreKind::L && caps.is_simple_long_constant(con) {
            continue; // this long store is already optimal
        }

        // Store down the constant.
        poke(&mut tiles, st_off, st_size, con);
        let j = (st_off >> 3) as usize;

        if st_kind == StoreKind::I && st_size == 4 && (st_off & 4) == 4 {
            let lcon = tiles[j];
            if !caps.is_simple_long_constant(lcon) {
                // This int store is already optimal by itself: undo it,
                // and possibly undo the previous trip which swallowed
                // its partner half.
                let (lo, _hi) = halves(tiles[j]);
                tiles[j] = from_halves(lo, 0);

                let prev = nodes[j];
                let prev_off = st_off - 4;
                if lo != 0 {
                    if let Some(p) = prev {
                        let p_kind = store_access(g, p).map(|a| a.kind);
                        if p_kind == Some(StoreKind::I) {
                            debug_assert!(prev_off >= header_size);
                            debug_assert_eq!(get_store_offset(g, p), prev_off);
                            tiles[j] = 0;
                            g.set_input(init, i - 1, Some(p));
                            nodes[j] = None;
                            stats.old_subword = stats.old_subword.saturating_sub(1);
                        }
                    }
                }
                continue;
            }
        }

        // This store is subsumed by the tile model.
        g.set_input(init, i, zmem);
        nodes[j] = Some(st);
        if st_size < 8 {
            stats.old_subword += 1;
        } else {
            stats.old_long += 1;
        }
    }

    if stats.old_subword + stats.old_long == 0 {
        return stats; // nothing more to do
    }

    //// Pass B: convert non-zero tiles into optimal constant stores,
    //// inserted before any overlapping non-constant stores.

    for j in 0..num_tiles {
        let con = tiles[j];
        if con == 0 {
            continue;
        }
        let init_map = inits[j];
        let (con0, con1) = halves(con);
        let (init0, init1) = halves(init_map);

        let old = match nodes[j] {
            Some(o) => o,
            None => continue,
        };
        let mut offset = (j as i64) * 8;

        let mut split = !caps.is_simple_long_constant(con);
        if offset < header_size {
            // Only the second word counts, e.g. an array length header
            // sharing the first tile.
            split = true;
        } else if con0 == 0 && init0 == -1 {
            split = true; // first word fully covered by other inits
        } else if con1 == 0 && init1 == -1 {
            split = true; // second word fully covered by other inits
        }

        let ctl = g.input(old, slot::CONTROL);

        let mut emitted: Vec<(i64, NodeId)> = Vec::with_capacity(2);
        if !split {
            stats.new_long += 1;
            if let Some(st) = raw_store(g, init, ctl, zmem, offset, StoreKind::L, ConValue::Long(con))
            {
                emitted.push((offset, st));
            }
        } else {
            // Omit either half if it is a zero.
            if con0 != 0 && offset >= header_size {
                stats.new_int += 1;
                if let Some(st) =
                    raw_store(g, init, ctl, zmem, offset, StoreKind::I, ConValue::Int(con0))
                {
                    emitted.push((offset, st));
                }
            }
            if con1 != 0 {
                stats.new_int += 1;
                offset += 4;
                if let Some(st) =
                    raw_store(g, init, ctl, zmem, offset, StoreKind::I, ConValue::Int(con1))
                {
                    emitted.push((offset, st));
                }
            }
        }

        // Insert the second store first, then the first before it, each
        // just before any overlapping non-constant stores.
        while let Some((off, st)) = emitted.pop() {
            debug_assert!(off >= header_size);
            let ins = captured_store_insertion_point(g, init, off, 0, header_size, tracked_limit);
            if ins == 0 {
                continue; // should not happen; never overlap
            }
            let mut ins_idx = if ins < 0 { (-ins) as usize } else { ins as usize };
            if ins_idx > RAW_STORES && g.input(init, ins_idx - 1) == zmem {
                ins_idx -= 1;
                g.set_input(init, ins_idx, Some(st));
            } else {
                g.insert_input(init, ins_idx, Some(st));
            }
        }
    }

    // Clean up any remaining placeholder slots.
    remove_extra_zeroes(g, init);
    stats
}

/// Explore forward from captured slot `start` for the first fully
/// initialized word; groups of subword stores that together cover a
/// word count. Returns the word's offset, or a negative value when
/// nothing ahead completes a word.
pub fn find_next_fullword_store(g: &Graph, init: NodeId, start: usize) -> i64 {
    let full_map: i32 = (1 << 4) - 1; // the int coverage we hope for
    let mut int_map: i32 = 0;
    let mut int_map_off: i64 = 0;

    for i in start..g.num_inputs(init) {
        let st = match g.input(init, i) {
            Some(s) => s,
            None => break,
        };
        let st_off = get_store_offset(g, st);
        if st_off < 0 {
            break; // conservative answer
        }
        let st_size = match memory_size(g, st) {
            Some(s) => s,
            None => break,
        };
        if st_size >= 4 && st_off % 4 == 0 {
            return st_off; // a complete word init
        }

        let this_int_off = align_down(st_off, 4);
        if this_int_off != int_map_off {
            int_map = 0;
            int_map_off = this_int_off;
        }
        let subword_off = (st_off - this_int_off) as i32;
        int_map |= (((1i64 << (st_size.min(4))) - 1) as i32) << subword_off;
        if (int_map & full_map) == full_map {
            return this_int_off; // subwords sum to a complete word
        }

        let next_int_off = align_down(st_off + st_size, 4);
        if next_int_off == this_int_off + 4 {
            // Passed the current word without fully initializing it.
            int_map_off = next_int_off;
            int_map >>= 4;
        } else if next_int_off > this_int_off + 4 {
            return this_int_off + 4; // passed the current and next word
        }
    }
    -1
}

/// Finalize the barrier when the allocation is lowered to explicit
/// control flow: linearize captured stores by ascending offset, pack
/// constants, zero-fill untouched ranges on `rawmem`, and mark the
/// barrier complete. Returns the new raw memory chain.
#[allow(clippy::too_many_arguments)]
pub fn complete_stores(
    g: &mut Graph,
    caps: &dyn TargetCaps,
    init: NodeId,
    rawctl: Option<NodeId>,
    mut rawmem: NodeId,
    rawptr: NodeId,
    header_size: i64,
    reduce_field_zeroing: bool,
    tracked_limit: i64,
    clear_short_size: i64,
) -> (NodeId, CoalesceStats) {
    debug_assert!(!is_complete(g, init));

    remove_extra_zeroes(g, init);

    let mut stats = CoalesceStats::default();
    if reduce_field_zeroing {
        // Reduce instruction count for common initialization patterns.
        stats = coalesce_subword_stores(g, caps, init, header_size, tracked_limit);
    }

    let zmem = zero_memory(g, init);
    let zmem_node = match zmem {
        Some(z) => z,
        None => return (rawmem, stats),
    };
    // Accumulates the linearized chain of initializing stores.
    let mut inits_chain = zmem_node;

    let size_in_bytes = init_allocation(g, init)
        .and_then(|a| allocate_info(g, a))
        .and_then(|i| i.size_in_bytes);

    let mut zeroes_done = header_size;
    // Incremental zeroing may give up when the inits are very sparse;
    // the final bulk clear below still covers whatever remains.
    let zeroing_wanted = reduce_field_zeroing && size_in_bytes.is_some();
    let mut do_zeroing = zeroing_wanted;
    let mut big_init_gaps = 0;

    let limit = g.num_inputs(init);
    for i in RAW_STORES..limit {
        let st = match g.input(init, i) {
            Some(s) if Some(s) != zmem => s,
            _ => continue,
        };
        let st_off = get_store_offset(g, st);
        if st_off < 0 {
            break; // unknown junk in the inits
        }
        if g.input(st, slot::MEMORY) != zmem {
            break; // complicated store chains somehow got in the list
        }
        let st_size = match memory_size(g, st) {
            Some(s) => s,
            None => break,
        };
        let next_init_off = st_off + st_size;

        if do_zeroing && zeroes_done < next_init_off {
            // Does this store need a zero before it or under it?
            let mut zeroes_needed = st_off;
            if st_size < 4 {
                // Subword stores only partially initialize their word;
                // word-level zeroes must go down underneath them first.
                let next_full_store = find_next_fullword_store(g, init, i);
                if next_full_store < 0 {
                    zeroes_needed = align_up(zeroes_needed, 4);
                } else {
                    debug_assert!(next_full_store >= zeroes_needed);
                    zeroes_needed = next_full_store;
                }
            }

            if zeroes_needed > zeroes_done {
                let zsize = zeroes_needed - zeroes_done;
                zeroes_done = align_down(zeroes_done, 4);
                rawmem = clear_memory(
                    g,
                    rawctl,
                    rawmem,
                    rawptr,
                    zeroes_done,
                    zeroes_needed,
                    clear_short_size,
                );
                zeroes_done = zeroes_needed;
                if zsize > clear_short_size {
                    big_init_gaps += 1;
                    if big_init_gaps > 2 {
                        do_zeroing = false; // leave the holes alone
                    }
                }
            }
        }

        // Collect the store onto the linearized chain and move on.
        g.set_input(st, slot::MEMORY, Some(inits_chain));
        inits_chain = st;
        g.set_input(init, i, zmem);

        if zeroes_done == st_off {
            zeroes_done = next_init_off;
        }
    }

    remove_extra_zeroes(g, init);
    if inits_chain != zmem_node {
        // Hang the linearized chain on the barrier so it stays reachable
        // until lowering rewires the consumers.
        g.add_input(init, Some(inits_chain));
    }

    // If anything remains to be zeroed, zero it all now. This runs even
    // when incremental zeroing gave up: the single bulk clear covers
    // the skipped holes as well as the tail.
    if let Some(size_limit) = size_in_bytes {
        zeroes_done = align_down(zeroes_done, 4);
        if zeroes_done < size_limit && zeroing_wanted {
            rawmem = clear_memory(
                g,
                rawctl,
                rawmem,
                rawptr,
                zeroes_done,
                size_limit,
                clear_short_size,
            );
        }
    }

    set_complete(g, init);
    (rawmem, stats)
}
