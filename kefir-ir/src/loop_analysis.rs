//! Natural loop discovery and loop-nest forest construction.
//!
//! Grounded on `source/optimizer/analysis/loop_nest.c`: a natural loop is identified by a
//! back-edge `tail -> header` where `header` dominates `tail`; its body is every block that can
//! reach `tail` without passing back out through `header`, found by a backward BFS from `tail`
//! over the CFG's predecessor edges that stops expanding once it reaches `header`. Loops key into
//! a single 64-bit value, `(header << 32) | tail`, the same packing the original's hash table uses.
//!
//! The original's `update_loop_nest` additionally appends every loop as a new top-level root even
//! after already inserting it as a child of an enclosing one, which would leave the same loop
//! reachable from two places in the forest. That contradicts its own "forest of loops" framing and
//! the distilled specification's either/or wording, so this port does only one of the two: insert
//! as a child of the smallest enclosing root, re-parent an enclosing root under a new outer loop,
//! or else append as a new root — never more than one of the three.

use crate::dominator_tree::DominatorTree;
use crate::flowgraph::ControlFlowGraph;
use crate::ir::{BlockRef, OptCodeContainer};
use kefir_collections::forest;
use kefir_entity::EntityRef;
use std::collections::VecDeque;

/// A natural loop: a back-edge `tail -> header` where `header` dominates `tail`, together with
/// every block that can reach `tail` without leaving through `header`.
#[derive(Clone)]
pub struct NaturalLoop {
    header: BlockRef,
    tail: BlockRef,
    body: forest::Set<BlockRef>,
}

impl NaturalLoop {
    /// The 64-bit key `(header << 32) | tail` identifying this loop.
    pub fn id(&self) -> u64 {
        loop_id(self.header, self.tail)
    }

    /// The loop's header block, which dominates every block in its body.
    pub fn header(&self) -> BlockRef {
        self.header
    }

    /// The back-edge source.
    pub fn tail(&self) -> BlockRef {
        self.tail
    }

    /// Is `block` part of this loop's body?
    pub fn contains_block(&self, block: BlockRef) -> bool {
        self.body.contains(block)
    }

    /// Every block in this loop's body, in unspecified order.
    pub fn body(&self) -> impl Iterator<Item = BlockRef> + '_ {
        self.body.iter()
    }
}

/// Pack a loop's header/tail pair into the 64-bit key the original implementation keys its loop
/// table by.
pub fn loop_id(header: BlockRef, tail: BlockRef) -> u64 {
    ((header.as_u32() as u64) << 32) | (tail.as_u32() as u64)
}

/// One node of the loop-nest forest: a loop together with the loops immediately nested inside it.
pub struct LoopNest {
    natural_loop: NaturalLoop,
    children: Vec<LoopNest>,
}

impl LoopNest {
    /// The loop this node names.
    pub fn natural_loop(&self) -> &NaturalLoop {
        &self.natural_loop
    }

    /// Loops nested directly inside this one, outer-to-inner order not implied beyond discovery
    /// order.
    pub fn children(&self) -> &[LoopNest] {
        &self.children
    }
}

/// Every natural loop in a function, both as a flat list and organized into a nest forest.
#[derive(Default)]
pub struct LoopCollection {
    loops: Vec<NaturalLoop>,
    nests: Vec<LoopNest>,
}

impl LoopCollection {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover every natural loop in `container`, given its already-computed CFG and dominator
    /// tree, and build the nest forest.
    pub fn build(container: &OptCodeContainer, cfg: &ControlFlowGraph, dom: &DominatorTree) -> Self {
        let mut loops = Vec::new();
        for &block in container.blocks() {
            if !dom.is_reachable(block) {
                continue;
            }
            for successor in cfg.successors(block) {
                if !dom.is_reachable(successor) {
                    continue;
                }
                if dom.is_dominator(successor, block) {
                    loops.push(build_loop(cfg, successor, block));
                }
            }
        }

        let mut collection = Self {
            loops,
            nests: Vec::new(),
        };
        for natural_loop in collection.loops.clone() {
            update_loop_nest(&mut collection.nests, natural_loop);
        }
        collection
    }

    /// Every discovered loop, in discovery order (outer iteration over blocks, inner over each
    /// block's successors).
    pub fn loops(&self) -> &[NaturalLoop] {
        &self.loops
    }

    /// The root loops of the nest forest.
    pub fn nests(&self) -> &[LoopNest] {
        &self.nests
    }
}

fn build_loop(cfg: &ControlFlowGraph, header: BlockRef, tail: BlockRef) -> NaturalLoop {
    let mut body: forest::Set<BlockRef> = forest::Set::new();
    let mut queue: VecDeque<BlockRef> = VecDeque::new();
    queue.push_back(tail);
    while let Some(block) = queue.pop_front() {
        if body.contains(block) {
            continue;
        }
        body.insert(block);
        if block != header {
            for pred in cfg.predecessors(block) {
                queue.push_back(pred);
            }
        }
    }
    NaturalLoop { header, tail, body }
}

/// Is `contained_loop`'s body a superset that encloses `loop_`, i.e. is `loop_` nested inside
/// `contained_loop`?
fn loop_contained_within(loop_: &NaturalLoop, contained_loop: &NaturalLoop) -> bool {
    contained_loop.body.contains(loop_.header) && contained_loop.body.contains(loop_.tail)
}

fn insert_into_nest(natural_loop: NaturalLoop, nest: &mut LoopNest) {
    for child in nest.children.iter_mut() {
        if loop_contained_within(&natural_loop, &child.natural_loop) {
            insert_into_nest(natural_loop, child);
            return;
        }
    }
    nest.children.push(LoopNest {
        natural_loop,
        children: Vec::new(),
    });
}

fn update_loop_nest(nests: &mut Vec<LoopNest>, natural_loop: NaturalLoop) {
    for nest in nests.iter_mut() {
        if loop_contained_within(&natural_loop, &nest.natural_loop) {
            insert_into_nest(natural_loop, nest);
            return;
        }
        if loop_contained_within(&nest.natural_loop, &natural_loop) {
            let enclosed = std::mem::replace(
                nest,
                LoopNest {
                    natural_loop,
                    children: Vec::new(),
                },
            );
            nest.children.push(enclosed);
            return;
        }
    }
    nests.push(LoopNest {
        natural_loop,
        children: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    #[test]
    fn self_loop_is_a_single_block_natural_loop() {
        let mut c = OptCodeContainer::new();
        let header = c.new_block();
        c.set_entry_point(header).unwrap();
        let cond = c.append_instruction(header, Opcode::IntConst(1), &[]).unwrap();
        let after = c.new_block();
        c.append_instruction(
            header,
            Opcode::Branch {
                if_true: header,
                if_false: after,
            },
            &[cond],
        )
        .unwrap();
        c.append_instruction(after, Opcode::Return, &[]).unwrap();

        let cfg = ControlFlowGraph::compute(&c);
        let dom = DominatorTree::compute(&c, &cfg);
        let loops = LoopCollection::build(&c, &cfg, &dom);

        assert_eq!(loops.loops().len(), 1);
        let found = &loops.loops()[0];
        assert_eq!(found.header(), header);
        assert_eq!(found.tail(), header);
        assert_eq!(found.body().collect::<Vec<_>>(), vec![header]);
    }

    #[test]
    fn acyclic_cfg_has_no_loops() {
        let mut c = OptCodeContainer::new();
        let a = c.new_block();
        let b = c.new_block();
        c.set_entry_point(a).unwrap();
        c.append_instruction(a, Opcode::Jump(b), &[]).unwrap();
        c.append_instruction(b, Opcode::Return, &[]).unwrap();

        let cfg = ControlFlowGraph::compute(&c);
        let dom = DominatorTree::compute(&c, &cfg);
        let loops = LoopCollection::build(&c, &cfg, &dom);
        assert!(loops.loops().is_empty());
        assert!(loops.nests().is_empty());
    }

    #[test]
    fn nested_loops_form_a_parent_child_nest() {
        // entry -> outer_header -> inner_header -> inner_header (back edge) / inner_header ->
        // outer_header (back edge) via outer_latch -> exit.
        let mut c = OptCodeContainer::new();
        let entry = c.new_block();
        let outer_header = c.new_block();
        let inner_header = c.new_block();
        let exit = c.new_block();
        c.set_entry_point(entry).unwrap();
        c.append_instruction(entry, Opcode::Jump(outer_header), &[]).unwrap();

        let outer_cond = c
            .append_instruction(outer_header, Opcode::IntConst(1), &[])
            .unwrap();
        c.append_instruction(
            outer_header,
            Opcode::Branch {
                if_true: inner_header,
                if_false: exit,
            },
            &[outer_cond],
        )
        .unwrap();

        let inner_cond = c
            .append_instruction(inner_header, Opcode::IntConst(1), &[])
            .unwrap();
        c.append_instruction(
            inner_header,
            Opcode::Branch {
                if_true: inner_header,
                if_false: outer_header,
            },
            &[inner_cond],
        )
        .unwrap();

        c.append_instruction(exit, Opcode::Return, &[]).unwrap();

        let cfg = ControlFlowGraph::compute(&c);
        let dom = DominatorTree::compute(&c, &cfg);
        let loops = LoopCollection::build(&c, &cfg, &dom);

        assert_eq!(loops.loops().len(), 2);
        assert_eq!(loops.nests().len(), 1);
        let outer_nest = &loops.nests()[0];
        assert_eq!(outer_nest.natural_loop().header(), outer_header);
        assert_eq!(outer_nest.children().len(), 1);
        assert_eq!(outer_nest.children()[0].natural_loop().header(), inner_header);
    }

    #[test]
    fn loop_id_packs_header_and_tail() {
        let header = BlockRef::new(2);
        let tail = BlockRef::new(5);
        assert_eq!(loop_id(header, tail), (2u64 << 32) | 5);
    }
}
