//! Dominator and post-dominator computation over a function's [`ControlFlowGraph`],
//! grounded on `original_source`'s networkx-based `ControlFlowGraph.get_dominators`/
//! `get_post_dominators`, reimplemented atop `petgraph::algo::dominators`.

use petgraph::algo::dominators::{self, Dominators as PetgraphDominators};
use petgraph::graph::{DiGraph, NodeIndex};

use udonc_analysis::{BlockId, ControlFlowGraph};

/// Wraps petgraph's immediate-dominator tree with the `BlockId`-keyed
/// queries the structural recoverer needs.
pub struct Dominance {
    inner: PetgraphDominators<NodeIndex>,
    root: NodeIndex,
}

impl Dominance {
    /// `a` dominates `b` when every path from the graph's root to `b`
    /// passes through `a`. Every block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        let node_b = NodeIndex::new(b);
        self.inner
            .dominators(node_b)
            .map(|mut chain| chain.any(|n| n.index() == a))
            .unwrap_or(false)
    }

    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        if NodeIndex::new(block) == self.root {
            return None;
        }
        self.inner.immediate_dominator(NodeIndex::new(block)).map(|n| n.index())
    }

    /// The dominator chain from `block` up to (and including) the root,
    /// nearest first.
    pub fn chain(&self, block: BlockId) -> Vec<BlockId> {
        self.inner
            .dominators(NodeIndex::new(block))
            .map(|chain| chain.map(|n| n.index()).collect())
            .unwrap_or_default()
    }
}

/// Forward dominators, rooted at the function's entry block.
pub fn compute_dominators(cfg: &ControlFlowGraph) -> Dominance {
    let mut graph = DiGraph::<(), ()>::new();
    for _ in 0..cfg.blocks.len() {
        graph.add_node(());
    }
    for from in cfg.block_ids() {
        for &to in cfg.successors(from) {
            graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), ());
        }
    }
    let root = NodeIndex::new(cfg.entry_block);
    Dominance {
        inner: dominators::simple_fast(&graph, root),
        root,
    }
}

/// Post-dominators: dominators of the reversed graph rooted at a synthetic
/// exit node wired in from every block with no successors (returns and
/// unresolved indirect jumps alike).
pub fn compute_post_dominators(cfg: &ControlFlowGraph) -> Dominance {
    let exit = cfg.blocks.len();
    let mut graph = DiGraph::<(), ()>::new();
    for _ in 0..=cfg.blocks.len() {
        graph.add_node(());
    }
    for from in cfg.block_ids() {
        for &to in cfg.successors(from) {
            // Reversed: edge runs to -> from.
            graph.add_edge(NodeIndex::new(to), NodeIndex::new(from), ());
        }
        if cfg.successors(from).is_empty() {
            graph.add_edge(NodeIndex::new(exit), NodeIndex::new(from), ());
        }
    }
    let root = NodeIndex::new(exit);
    Dominance {
        inner: dominators::simple_fast(&graph, root),
        root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udonc_analysis::{BasicBlock, BlockKind};

    fn block(start: u32) -> BasicBlock {
        BasicBlock {
            start_address: start,
            end_address: start,
            instructions: Vec::new(),
            kind: BlockKind::Normal,
            switch_info: None,
            indirect_jump_unresolved: false,
            function_name: Some("f".to_string()),
        }
    }

    fn diamond_cfg() -> ControlFlowGraph {
        // 0 -> {1, 2} -> 3
        ControlFlowGraph {
            function_name: "f".to_string(),
            is_public: true,
            entry_block: 0,
            blocks: vec![block(0), block(4), block(8), block(12)],
            successors: vec![vec![1, 2], vec![3], vec![3], vec![]],
            predecessors: vec![vec![], vec![0], vec![0], vec![1, 2]],
        }
    }

    #[test]
    fn entry_dominates_everything() {
        let cfg = diamond_cfg();
        let dom = compute_dominators(&cfg);
        assert!(dom.dominates(0, 3));
        assert!(!dom.dominates(1, 2));
    }

    #[test]
    fn merge_block_post_dominates_branches() {
        let cfg = diamond_cfg();
        let post = compute_post_dominators(&cfg);
        assert!(post.dominates(3, 1));
        assert!(post.dominates(3, 2));
        assert!(!post.dominates(1, 2));
    }
}
