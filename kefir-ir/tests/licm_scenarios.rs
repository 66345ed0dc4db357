//! End-to-end scenarios exercising loop-invariant code motion and the analyses it depends on.

use kefir_ir::diagnostics::NullDiagnosticSink;
use kefir_ir::dominator_tree::DominatorTree;
use kefir_ir::flowgraph::ControlFlowGraph;
use kefir_ir::ir::{LifetimeMarkKind, Opcode, OptCodeContainer};
use kefir_ir::licm;
use kefir_ir::liveness::Liveness;
use kefir_ir::loop_analysis::LoopCollection;
use kefir_ir::settings::OptConfig;
use kefir_ir::var_conflict::VariableConflicts;

fn self_loop(body: impl FnOnce(&mut OptCodeContainer, kefir_ir::ir::BlockRef) -> ()) -> (OptCodeContainer, kefir_ir::ir::BlockRef) {
    let mut c = OptCodeContainer::new();
    let entry = c.new_block();
    let header = c.new_block();
    let exit = c.new_block();
    c.set_entry_point(entry).unwrap();
    c.append_instruction(entry, Opcode::Jump(header), &[]).unwrap();
    body(&mut c, header);
    let cond = c.append_instruction(header, Opcode::IntConst(1), &[]).unwrap();
    c.append_instruction(
        header,
        Opcode::Branch {
            if_true: header,
            if_false: exit,
        },
        &[cond],
    )
    .unwrap();
    c.append_instruction(exit, Opcode::Return, &[]).unwrap();
    (c, header)
}

/// Scenario 1: a constant feeding only a store is hoisted into a new pre-header; the store stays.
#[test]
fn scenario_1_hoists_a_loop_invariant_constant() {
    let (mut c, header) = self_loop(|c, header| {
        let ptr = c.append_instruction(header, Opcode::AllocLocal, &[]).unwrap();
        let t = c.append_instruction(header, Opcode::IntConst(42), &[]).unwrap();
        c.append_instruction(header, Opcode::Store, &[ptr, t]).unwrap();
    });

    let report = licm::run(&mut c, &OptConfig::default(), &mut NullDiagnosticSink).unwrap();
    assert!(report.hoisted_instructions >= 1);
    assert_eq!(report.preheaders_inserted, 1);

    let cfg = ControlFlowGraph::compute(&c);
    let preheader = cfg
        .predecessors(header)
        .find(|&b| b != header)
        .expect("a pre-header predecessor");

    let store = c
        .def_order_iter(header)
        .find(|&i| c.opcode(i) == Opcode::Store)
        .expect("store stays in the header");
    let t = c.operands(store)[1];
    assert_eq!(c.block_of(t), Some(preheader));
}

/// Scenario 2: a load and the store that depends on it both stay put — a load is never hoisted.
#[test]
fn scenario_2_does_not_hoist_a_load() {
    let (mut c, header) = self_loop(|c, header| {
        let ptr = c.append_instruction(header, Opcode::AllocLocal, &[]).unwrap();
        let t = c.append_instruction(header, Opcode::Load, &[ptr]).unwrap();
        c.append_instruction(header, Opcode::Store, &[ptr, t]).unwrap();
    });

    let report = licm::run(&mut c, &OptConfig::default(), &mut NullDiagnosticSink).unwrap();
    assert_eq!(report.hoisted_instructions, 0);
    assert_eq!(report.preheaders_inserted, 0);

    let load = c
        .def_order_iter(header)
        .find(|&i| c.opcode(i) == Opcode::Load)
        .unwrap();
    assert_eq!(c.block_of(load), Some(header));
}

/// Scenario 3: a constant feeding a sign-extension, which feeds a store, hoists both the constant
/// and the extension; only the store stays behind.
#[test]
fn scenario_3_hoists_through_an_extension_chain() {
    let (mut c, header) = self_loop(|c, header| {
        let ptr = c.append_instruction(header, Opcode::AllocLocal, &[]).unwrap();
        let a = c.append_instruction(header, Opcode::IntConst(1), &[]).unwrap();
        let b = c.append_instruction(header, Opcode::Int64SignExtend(8), &[a]).unwrap();
        c.append_instruction(header, Opcode::Store, &[ptr, b]).unwrap();
    });

    let report = licm::run(&mut c, &OptConfig::default(), &mut NullDiagnosticSink).unwrap();
    assert_eq!(report.preheaders_inserted, 1);
    assert_eq!(report.hoisted_instructions, 2);

    let cfg = ControlFlowGraph::compute(&c);
    let preheader = cfg.predecessors(header).find(|&b| b != header).unwrap();
    let store = c
        .def_order_iter(header)
        .find(|&i| c.opcode(i) == Opcode::Store)
        .unwrap();
    let b = c.operands(store)[1];
    assert_eq!(c.block_of(b), Some(preheader));
    let a = c.operands(b)[0];
    assert_eq!(c.block_of(a), Some(preheader));
}

/// Scenario 4: a loop-invariant value defined inside a nested loop ends up in the outermost
/// pre-header, whether that takes one round (direct outer-first hoist) or more.
#[test]
fn scenario_4_nested_loops_hoist_to_the_outermost_preheader() {
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

    let ptr = c.append_instruction(inner_header, Opcode::AllocLocal, &[]).unwrap();
    let k = c.append_instruction(inner_header, Opcode::IntConst(7), &[]).unwrap();
    c.append_instruction(inner_header, Opcode::Store, &[ptr, k]).unwrap();
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

    let report = licm::run(&mut c, &OptConfig::default(), &mut NullDiagnosticSink).unwrap();
    assert!(report.hoisted_instructions >= 1);

    let cfg = ControlFlowGraph::compute(&c);
    let outer_preheader = cfg.predecessors(outer_header).find(|&b| b != inner_header).unwrap();
    assert_eq!(c.block_of(k), Some(outer_preheader));
}

/// Scenario 5: splitting a loop header's phi produces a pre-header phi carrying the non-back-edge
/// incoming values and a header phi selecting between the pre-header value and the back-edge value.
#[test]
fn scenario_5_splits_the_header_phi_across_the_new_preheader() {
    let mut c = OptCodeContainer::new();
    let entry = c.new_block();
    let p1 = c.new_block();
    let p2 = c.new_block();
    let header = c.new_block();
    let tail = c.new_block();
    let exit = c.new_block();
    c.set_entry_point(entry).unwrap();
    let entry_cond = c.append_instruction(entry, Opcode::IntConst(1), &[]).unwrap();
    c.append_instruction(
        entry,
        Opcode::Branch {
            if_true: p1,
            if_false: p2,
        },
        &[entry_cond],
    )
    .unwrap();

    let a = c.append_instruction(p1, Opcode::IntConst(1), &[]).unwrap();
    c.append_instruction(p1, Opcode::Jump(header), &[]).unwrap();
    let b = c.append_instruction(p2, Opcode::IntConst(2), &[]).unwrap();
    c.append_instruction(p2, Opcode::Jump(header), &[]).unwrap();

    let (phi, phi_instr) = c.new_phi(header).unwrap();
    let use_of_phi = c
        .append_instruction(header, Opcode::IntAdd, &[phi_instr, phi_instr])
        .unwrap();
    c.append_instruction(
        header,
        Opcode::Branch {
            if_true: tail,
            if_false: exit,
        },
        &[use_of_phi],
    )
    .unwrap();
    let t_value = c.append_instruction(tail, Opcode::IntConst(3), &[]).unwrap();
    c.append_instruction(tail, Opcode::Jump(header), &[]).unwrap();
    c.append_instruction(exit, Opcode::Return, &[]).unwrap();

    c.attach_phi(phi, p1, a).unwrap();
    c.attach_phi(phi, p2, b).unwrap();
    c.attach_phi(phi, tail, t_value).unwrap();

    // Force a pre-header insertion by seeding a hoistable candidate into the header.
    let ptr = c.append_instruction(header, Opcode::AllocLocal, &[]).unwrap();
    let konst = c.append_instruction(header, Opcode::IntConst(99), &[]).unwrap();
    c.append_instruction(header, Opcode::Store, &[ptr, konst]).unwrap();

    licm::run(&mut c, &OptConfig::default(), &mut NullDiagnosticSink).unwrap();

    let cfg = ControlFlowGraph::compute(&c);
    let preheader = cfg
        .predecessors(header)
        .find(|&b| b != tail)
        .expect("a pre-header predecessor distinct from the back edge");

    let header_phi_instr = c
        .def_order_iter(header)
        .find(|&i| c.is_phi(i))
        .expect("a surviving header phi");
    let header_phi = c.phi(header_phi_instr).unwrap();
    let header_links: Vec<_> = c.phi_links(header_phi).to_vec();
    assert_eq!(header_links.len(), 2);
    assert!(header_links.iter().any(|l| l.from_block == tail && l.value == t_value));
    assert!(header_links.iter().any(|l| l.from_block == preheader));

    let preheader_phi_instr = c
        .def_order_iter(preheader)
        .find(|&i| c.is_phi(i))
        .expect("a pre-header phi");
    let preheader_phi = c.phi(preheader_phi_instr).unwrap();
    let preheader_links: Vec<_> = c.phi_links(preheader_phi).to_vec();
    assert_eq!(preheader_links.len(), 2);
    assert!(preheader_links.iter().any(|l| l.from_block == p1 && l.value == a));
    assert!(preheader_links.iter().any(|l| l.from_block == p2 && l.value == b));
}

/// Scenario 6: two `ALLOC_LOCAL`s with no lifetime marks are each globally alive and so are never
/// considered to conflict with each other — the back end must give them distinct stack slots.
#[test]
fn scenario_6_allocations_without_lifetime_marks_are_globally_alive() {
    let mut c = OptCodeContainer::new();
    let block = c.new_block();
    c.set_entry_point(block).unwrap();
    let x = c.append_instruction(block, Opcode::AllocLocal, &[]).unwrap();
    let y = c.append_instruction(block, Opcode::AllocLocal, &[]).unwrap();
    c.append_instruction(block, Opcode::Return, &[]).unwrap();

    let cfg = ControlFlowGraph::compute(&c);
    let dom = DominatorTree::compute(&c, &cfg);
    let _ = LoopCollection::build(&c, &cfg, &dom);
    let liveness = Liveness::compute(&c, &cfg);
    let conflicts = VariableConflicts::build(&c, &liveness);

    assert!(conflicts.is_globally_alive(x));
    assert!(conflicts.is_globally_alive(y));
    assert!(!conflicts.is_locally_alive(x));
    assert!(!conflicts.is_locally_alive(y));

    // Globally-alive allocations carry no conflict set at all; distinct stack slots are implied by
    // both being alive for the function's whole lifetime, not by an explicit conflict entry.
    assert!(conflicts.conflicts_of(x).is_none());
    assert!(conflicts.conflicts_of(y).is_none());
    let _ = LifetimeMarkKind::Begin;
}
