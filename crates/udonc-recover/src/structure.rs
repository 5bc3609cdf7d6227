//! Strategy A structural recovery (§4.7, §9): natural-loop and
//! if/if-else identification from dominators and post-dominators, grounded
//! on `original_source`'s `ControlFlowStructureIdentifier` but rewritten
//! against `petgraph`-backed dominance instead of networkx.

use rustc_hash::FxHashSet;

use udonc_analysis::{BlockId, BlockKind, ControlFlowGraph};

use crate::dominators::Dominance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    DoWhile,
}

#[derive(Debug, Clone)]
pub struct NaturalLoop {
    pub header: BlockId,
    pub latch: BlockId,
    pub body: FxHashSet<BlockId>,
    pub kind: LoopKind,
}

impl NaturalLoop {
    /// The loop's exit block: its header's out-of-body successor for a
    /// `while`, or the latch's out-of-body successor for a `do-while`.
    pub fn exit_block(&self, cfg: &ControlFlowGraph) -> Option<BlockId> {
        let test_block = match self.kind {
            LoopKind::While => self.header,
            LoopKind::DoWhile => self.latch,
        };
        cfg.successors(test_block)
            .iter()
            .copied()
            .find(|b| !self.body.contains(b))
    }

    /// The block entered when the loop condition holds (header for
    /// `while`, header again for `do-while` since the body always runs
    /// at least once).
    pub fn body_entry(&self) -> BlockId {
        self.header
    }
}

/// Finds every back edge (`u -> v` where `v` dominates `u`) and computes
/// its natural loop body via reverse reachability from `u` stopping at `v`.
pub fn find_natural_loops(cfg: &ControlFlowGraph, dom: &Dominance) -> Vec<NaturalLoop> {
    let mut loops = Vec::new();

    for u in cfg.block_ids() {
        for &v in cfg.successors(u) {
            if !dom.dominates(v, u) {
                continue;
            }
            let mut body: FxHashSet<BlockId> = FxHashSet::default();
            body.insert(v);
            body.insert(u);
            let mut stack = vec![u];
            while let Some(node) = stack.pop() {
                for &pred in cfg.predecessors(node) {
                    if body.insert(pred) {
                        stack.push(pred);
                    }
                }
            }
            let kind = determine_loop_type(cfg, v, u, &body);
            loops.push(NaturalLoop {
                header: v,
                latch: u,
                body,
                kind,
            });
        }
    }

    loops
}

/// A loop is a `while` when its header is itself the conditional test with
/// an immediate exit edge (the loop can execute zero times); otherwise the
/// test sits at the latch and the loop always runs its body once, i.e. a
/// `do-while` (§4.7).
fn determine_loop_type(
    cfg: &ControlFlowGraph,
    header: BlockId,
    latch: BlockId,
    body: &FxHashSet<BlockId>,
) -> LoopKind {
    if cfg.block(header).kind == BlockKind::Conditional {
        let has_exit_edge = cfg
            .successors(header)
            .iter()
            .any(|s| !body.contains(s));
        if has_exit_edge {
            return LoopKind::While;
        }
    }
    let _ = latch;
    LoopKind::DoWhile
}

#[derive(Debug, Clone)]
pub struct Conditional {
    pub header: BlockId,
    pub then_branch: FxHashSet<BlockId>,
    pub else_branch: FxHashSet<BlockId>,
    pub merge: Option<BlockId>,
}

/// Recognizes an if/if-else rooted at `header`, a `Conditional` block with
/// exactly two successors. `loop_headers` is excluded from consideration:
/// loop recovery already claims those blocks' branch structure.
pub fn identify_conditional(
    cfg: &ControlFlowGraph,
    post_dom: &Dominance,
    header: BlockId,
) -> Option<Conditional> {
    if cfg.block(header).kind != BlockKind::Conditional {
        return None;
    }
    let succs = cfg.successors(header);
    if succs.len() != 2 {
        return None;
    }
    // `build_block_edges` inserts the JUMP_IF_FALSE target (the false
    // continuation) before the fall-through (the true continuation).
    let (false_succ, true_succ) = (succs[0], succs[1]);

    let merge = find_merge_point(post_dom, true_succ, false_succ);

    let (then_branch, else_branch) = match merge {
        Some(merge) => (
            collect_blocks_between(cfg, true_succ, merge),
            collect_blocks_between(cfg, false_succ, merge),
        ),
        None => (
            collect_reachable(cfg, true_succ),
            collect_reachable(cfg, false_succ),
        ),
    };

    Some(Conditional {
        header,
        then_branch,
        else_branch,
        merge,
    })
}

/// The closest common post-dominator of both successors: walk `a`'s
/// post-dominator chain (nearest-first) and return the first entry also
/// present in `b`'s chain.
fn find_merge_point(post_dom: &Dominance, a: BlockId, b: BlockId) -> Option<BlockId> {
    let chain_b: FxHashSet<BlockId> = post_dom.chain(b).into_iter().collect();
    post_dom
        .chain(a)
        .into_iter()
        .find(|candidate| chain_b.contains(candidate))
}

/// Every block reachable from `start` without passing through `stop`,
/// `stop` itself excluded.
fn collect_blocks_between(cfg: &ControlFlowGraph, start: BlockId, stop: BlockId) -> FxHashSet<BlockId> {
    if start == stop {
        return FxHashSet::default();
    }
    let mut visited = FxHashSet::default();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if node == stop || !visited.insert(node) {
            continue;
        }
        for &succ in cfg.successors(node) {
            if succ != stop {
                stack.push(succ);
            }
        }
    }
    visited
}

fn collect_reachable(cfg: &ControlFlowGraph, start: BlockId) -> FxHashSet<BlockId> {
    let mut visited = FxHashSet::default();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        stack.extend(cfg.successors(node).iter().copied());
    }
    visited
}
