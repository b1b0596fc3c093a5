//! Worklist-driven fixed-point driver.
//!
//! One compilation thread owns the graph exclusively; transforms are
//! idempotent, so a node is always safe to re-run. A node that changes
//! re-enqueues its users; the loop drains until nothing is provable.

use crate::features::alias::AliasClassifier;
use crate::features::init;
use crate::features::memory::domain::Rewrite;
use crate::features::memory::{clear, load, store};
use crate::features::merge;
use crate::shared::constants::{
    DEFAULT_CAPTURE_COMPLEXITY_LIMIT, DEFAULT_CLEAR_SHORT_SIZE, DEFAULT_CYCLE_LIMIT,
    DEFAULT_TRACKED_INIT_LIMIT,
};
use crate::shared::models::{Graph, NodeId, NodeKind};
use crate::shared::ports::{BarrierPolicy, TargetCaps, TypeOracle};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Tunables. The numeric limits are termination guards, not contract
/// values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Step budget for the backward memory walk.
    pub cycle_limit: u32,
    /// Node budget for capture-independence proofs.
    pub capture_complexity_limit: usize,
    /// Byte window within which initialization stores are tracked.
    pub tracked_init_limit: i64,
    /// Zero runs at most this long use word stores, longer ones a bulk
    /// clear.
    pub clear_short_size: i64,
    /// Enable capture, tiling, and zero-store elimination.
    pub reduce_field_zeroing: bool,
    /// Enable adjacent-store merging.
    pub merge_stores: bool,
    /// The runtime stores references compressed.
    pub compressed_refs: bool,
    /// Hard cap on transforms per fixed-point run.
    pub max_transforms: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cycle_limit: DEFAULT_CYCLE_LIMIT,
            capture_complexity_limit: DEFAULT_CAPTURE_COMPLEXITY_LIMIT,
            tracked_init_limit: DEFAULT_TRACKED_INIT_LIMIT,
            clear_short_size: DEFAULT_CLEAR_SHORT_SIZE,
            reduce_field_zeroing: true,
            merge_stores: true,
            compressed_refs: false,
            max_transforms: 100_000,
        }
    }
}

/// Counters over one optimization run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OptimizerStats {
    pub transforms: usize,
    pub loads_folded: usize,
    pub loads_forwarded: usize,
    pub stores_eliminated: usize,
    pub stores_merged: usize,
    pub stores_captured: usize,
    pub merges_collapsed: usize,
    pub tiles_emitted: usize,
    pub subword_folded: usize,
}

/// The optimization driver: owns the graph, the alias classifier, and
/// the worklist; consults the collaborators through their ports.
pub struct Optimizer<'a> {
    graph: Graph,
    classifier: AliasClassifier,
    config: OptimizerConfig,
    oracle: &'a dyn TypeOracle,
    barriers: &'a dyn BarrierPolicy,
    caps: &'a dyn TargetCaps,
    stats: OptimizerStats,
    worklist: VecDeque<NodeId>,
    in_worklist: FxHashSet<NodeId>,
}

impl<'a> Optimizer<'a> {
    pub fn new(
        graph: Graph,
        config: OptimizerConfig,
        oracle: &'a dyn TypeOracle,
        barriers: &'a dyn BarrierPolicy,
        caps: &'a dyn TargetCaps,
    ) -> Self {
        Self {
            graph,
            classifier: AliasClassifier::new(),
            config,
            oracle,
            barriers,
            caps,
            stats: OptimizerStats::default(),
            worklist: VecDeque::new(),
            in_worklist: FxHashSet::default(),
        }
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    #[inline]
    pub fn classifier_mut(&mut self) -> &mut AliasClassifier {
        &mut self.classifier
    }

    #[inline]
    pub fn stats(&self) -> &OptimizerStats {
        &self.stats
    }

    #[inline]
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Queue a node for (re)processing.
    pub fn enqueue(&mut self, id: NodeId) {
        if self.in_worklist.insert(id) {
            self.worklist.push_back(id);
        }
    }

    /// Queue every current node.
    pub fn enqueue_all(&mut self) {
        for id in 0..self.graph.len() as NodeId {
            self.enqueue(id);
        }
    }

    fn enqueue_uses(&mut self, id: NodeId) {
        let users: Vec<NodeId> = self.graph.uses(id).to_vec();
        for u in users {
            self.enqueue(u);
        }
    }

    /// Drain the worklist to a fixed point.
    pub fn run_to_fixpoint(&mut self) {
        while let Some(id) = self.worklist.pop_front() {
            self.in_worklist.remove(&id);
            if self.stats.transforms >= self.config.max_transforms {
                debug!(
                    transforms = self.stats.transforms,
                    "transform budget exhausted; stopping"
                );
                break;
            }
            self.transform(id);
        }
    }

    /// Apply every applicable rewrite to one node. Returns true when the
    /// graph changed. The only visible outcomes are "simplified" and
    /// "unchanged"; nothing here faults on unexpected input.
    pub fn transform(&mut self, id: NodeId) -> bool {
        self.stats.transforms += 1;
        match self.graph.kind(id).clone() {
            NodeKind::Load(_) => self.transform_load(id),
            NodeKind::Store(_) => self.transform_store(id),
            NodeKind::MergeMem => self.transform_merge(id),
            NodeKind::ClearRange => self.transform_clear(id),
            _ => false,
        }
    }

    fn replace_and_requeue(&mut self, old: NodeId, with: NodeId) {
        self.enqueue_uses(old);
        self.graph.replace(old, with);
        self.enqueue(with);
    }

    fn transform_load(&mut self, id: NodeId) -> bool {
        // Constant folding first: it subsumes identity for constants and
        // is the only legal fold for pinned loads.
        if let Some(con) = load::value(&self.graph, self.oracle, id) {
            trace!(node = id, %con, "load folds to constant");
            let c = self.graph.make_con(con);
            self.replace_and_requeue(id, c);
            self.stats.loads_folded += 1;
            return true;
        }

        if let Some(value) = load::identity(&self.graph, id) {
            trace!(node = id, value, "load forwards stored value");
            self.replace_and_requeue(id, value);
            self.stats.loads_forwarded += 1;
            return true;
        }

        match load::ideal(
            &mut self.graph,
            &mut self.classifier,
            self.barriers,
            id,
            self.config.cycle_limit,
        ) {
            Rewrite::Progress => {
                self.enqueue(id);
                true
            }
            Rewrite::ReplacedBy(n) => {
                self.replace_and_requeue(id, n);
                true
            }
            Rewrite::None => false,
        }
    }

    fn transform_store(&mut self, id: NodeId) -> bool {
        if let Some(mem) = store::identity(
            &self.graph,
            &mut self.classifier,
            self.barriers,
            id,
            self.config.reduce_field_zeroing,
            self.config.cycle_limit,
        ) {
            trace!(node = id, "store is a no-op");
            self.replace_and_requeue(id, mem);
            self.stats.stores_eliminated += 1;
            return true;
        }

        match store::ideal(
            &mut self.graph,
            &mut self.classifier,
            self.barriers,
            self.caps,
            id,
            self.config.reduce_field_zeroing,
            self.config.merge_stores,
            self.config.capture_complexity_limit,
            self.config.tracked_init_limit,
        ) {
            Rewrite::Progress => {
                self.enqueue(id);
                true
            }
            Rewrite::ReplacedBy(n) => {
                // Captured into a barrier, overwritten, or merged wider.
                if matches!(self.graph.kind(n), NodeKind::Store(_)) {
                    self.stats.stores_merged += 1;
                } else {
                    self.stats.stores_captured += 1;
                }
                self.replace_and_requeue(id, n);
                true
            }
            Rewrite::None => false,
        }
    }

    fn transform_merge(&mut self, id: NodeId) -> bool {
        if let Some(base) = merge::identity(&self.graph, id) {
            trace!(node = id, base, "merge collapses to its base");
            self.replace_and_requeue(id, base);
            self.stats.merges_collapsed += 1;
            return true;
        }
        if merge::simplify(&mut self.graph, id) {
            self.enqueue(id);
            self.enqueue_uses(id);
            return true;
        }
        false
    }

    fn transform_clear(&mut self, id: NodeId) -> bool {
        if let Some(mem) = clear::identity(&self.graph, id) {
            self.replace_and_requeue(id, mem);
            return true;
        }
        match clear::ideal(&mut self.graph, id, self.config.clear_short_size) {
            Rewrite::ReplacedBy(n) => {
                self.replace_and_requeue(id, n);
                true
            }
            Rewrite::Progress => {
                self.enqueue(id);
                true
            }
            Rewrite::None => false,
        }
    }

    /// Build a store through the configured runtime conventions
    /// (pointer compression, boolean masking).
    #[allow(clippy::too_many_arguments)]
    pub fn make_store(
        &mut self,
        ctl: Option<NodeId>,
        mem: Option<NodeId>,
        adr: NodeId,
        addr_type: crate::shared::models::AddressType,
        value: NodeId,
        bt: crate::shared::models::BasicType,
        ord: crate::shared::models::MemOrd,
        flags: crate::shared::models::AccessFlags,
    ) -> NodeId {
        store::make(
            &mut self.graph,
            ctl,
            mem,
            adr,
            addr_type,
            value,
            bt,
            ord,
            flags,
            self.config.compressed_refs,
        )
    }

    /// Finalize an initialization barrier when its allocation is lowered
    /// into explicit control flow. Returns the new raw memory chain.
    pub fn complete_initialization(
        &mut self,
        init_node: NodeId,
        rawctl: Option<NodeId>,
        rawmem: NodeId,
        rawptr: NodeId,
        header_size: i64,
    ) -> NodeId {
        let (mem, cstats) = init::complete_stores(
            &mut self.graph,
            self.caps,
            init_node,
            rawctl,
            rawmem,
            rawptr,
            header_size,
            self.config.reduce_field_zeroing,
            self.config.tracked_init_limit,
            self.config.clear_short_size,
        );
        self.stats.tiles_emitted += cstats.new_int + cstats.new_long;
        self.stats.subword_folded += cstats.old_subword + cstats.old_long;
        debug!(
            init = init_node,
            subword = cstats.old_subword,
            long = cstats.old_long,
            new_int = cstats.new_int,
            new_long = cstats.new_long,
            "initialization completed"
        );
        mem
    }
}
