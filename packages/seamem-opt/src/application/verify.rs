//! Structural invariant checks.
//!
//! Violations are optimizer bugs, not user-facing errors; production
//! rewrites maintain these by construction, and this module lets tests
//! assert them on arbitrary graphs.

use crate::errors::{OptError, Result};
use crate::features::init::infrastructure::get_store_offset;
use crate::features::memory::domain::{load_access, zero_memory};
use crate::features::merge;
use crate::shared::models::{slot, AddressType, Graph, NodeId, NodeKind, RAW_STORES};

/// Check every reachable structural invariant on the whole graph.
pub fn verify_graph(g: &Graph) -> Result<()> {
    for id in 0..g.len() as NodeId {
        match g.kind(id) {
            NodeKind::MergeMem => verify_merge(g, id)?,
            NodeKind::Initialize(_) => verify_initialize(g, id)?,
            NodeKind::Load(_) => {
                verify_access_shape(g, id)?;
                verify_load(g, id)?;
            }
            NodeKind::Store(_) | NodeKind::LoadStore(_) => verify_access_shape(g, id)?,
            _ => {}
        }
    }
    Ok(())
}

/// Arena-shape rule: a live memory access carries an address edge, and
/// writes carry a value edge. Dead nodes are exempt; rewrites clear
/// their edges.
fn verify_access_shape(g: &Graph, id: NodeId) -> Result<()> {
    if g.use_count(id) == 0 {
        return Ok(());
    }
    if g.input(id, slot::ADDRESS).is_none() {
        return Err(OptError::graph(format!("access {} has no address edge", id)));
    }
    if matches!(g.kind(id), NodeKind::Store(_) | NodeKind::LoadStore(_))
        && g.input(id, slot::VALUE).is_none()
    {
        return Err(OptError::graph(format!("write {} has no value edge", id)));
    }
    Ok(())
}

/// Sparse-merge invariant: no slot equals the base.
pub fn verify_merge(g: &Graph, mm: NodeId) -> Result<()> {
    if !merge::verify_sparse(g, mm) {
        return Err(OptError::verification(format!(
            "merge {} stores a slot equal to its base",
            mm
        )));
    }
    Ok(())
}

/// Capture ordering: captured-store offsets are non-decreasing.
pub fn verify_initialize(g: &Graph, init: NodeId) -> Result<()> {
    let zmem = zero_memory(g, init);
    let mut last = -1i64;
    for i in RAW_STORES..g.num_inputs(init) {
        let st = match g.input(init, i) {
            Some(s) if Some(s) != zmem => s,
            _ => continue,
        };
        let off = get_store_offset(g, st);
        if off < 0 {
            continue; // linearized chain tail or placeholder
        }
        if off < last {
            return Err(OptError::verification(format!(
                "initialize {} captured offsets go backward at slot {}",
                init, i
            )));
        }
        last = off;
    }
    Ok(())
}

/// Control-edge rule: raw loads must stay control dependent.
pub fn verify_load(g: &Graph, load: NodeId) -> Result<()> {
    let acc = match load_access(g, load) {
        Some(a) => a,
        None => return Ok(()),
    };
    if acc.addr_type == AddressType::Raw && g.input(load, slot::CONTROL).is_none() {
        return Err(OptError::verification(format!(
            "raw load {} has no control edge",
            load
        )));
    }
    Ok(())
}
