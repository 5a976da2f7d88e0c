//! Canonicalization. Turns the raw tree a function body was built up
//! as (full of `Eseq`, and `Call`s in arbitrary expression position) into a
//! flat list of statements satisfying the instruction selector's invariants:
//! no `Eseq` survives, every `Call` sits immediately under `Move(Temp, _)` or
//! `Exp(_)`, and the list is partitioned into basic blocks that have been
//! traced so every `Cjump` is immediately followed by its false branch.
//!
//! This is the textbook three-pass pipeline (`linearize`, `basic_blocks`,
//! `trace_schedule`) each downstream consumer assumes has already run.

use crate::ir::{Exp, Stmt};
use crate::temp::Label;
use crate::translate::Translate;
use std::collections::HashMap;

/// Run the full canonicalization pipeline over one procedure body.
pub fn canonicalize(body: Stmt, ctx: &mut Translate) -> Vec<Stmt> {
    let linear = linearize(body, ctx);
    let (blocks, done) = basic_blocks(linear, ctx);
    trace_schedule(blocks, done)
}

// ---------------------------------------------------------------------
// Pass 1: linearize
// ---------------------------------------------------------------------

/// `true` iff evaluating `e` after running `stmts` for effect can never
/// observe a difference from running them in the other order. Conservative:
/// only `Const`/`Name` are assumed never to alias anything a statement could
/// have written, matching the classic `commute` check.
fn commutes(stmts: &Stmt, e: &Exp) -> bool {
    is_nop(stmts) || matches!(e, Exp::Const(_) | Exp::Name(_))
}

fn is_nop(s: &Stmt) -> bool {
    matches!(s, Stmt::Exp(e) if matches!(e.as_ref(), Exp::Const(_)))
}

/// Flatten a (possibly deeply nested) `Seq` into the statements it contains,
/// each already linearized.
fn linearize(stmt: Stmt, ctx: &mut Translate) -> Vec<Stmt> {
    let mut out = Vec::new();
    do_stmt(stmt, ctx, &mut out);
    out
}

fn do_stmt(stmt: Stmt, ctx: &mut Translate, out: &mut Vec<Stmt>) {
    match stmt {
        Stmt::Seq(a, b) => {
            do_stmt(*a, ctx, out);
            do_stmt(*b, ctx, out);
        }
        Stmt::Move(dst, src) => do_move(*dst, *src, ctx, out),
        Stmt::Exp(e) => match *e {
            Exp::Call(f, args) => {
                let (stmts, f, args) = reorder_call(*f, args, ctx);
                out.push(stmts);
                out.push(Stmt::exp(Exp::Call(Box::new(f), args)));
            }
            other => {
                let (stmts, e) = reorder_one(other, ctx);
                out.push(stmts);
                out.push(Stmt::exp(e));
            }
        },
        Stmt::Jump(e, labels) => {
            let (stmts, e) = reorder_one(*e, ctx);
            out.push(stmts);
            out.push(Stmt::Jump(Box::new(e), labels));
        }
        Stmt::Cjump(op, a, b, t, f) => {
            let (stmts, mut exps) = reorder(vec![*a, *b], ctx);
            let b2 = exps.pop().unwrap();
            let a2 = exps.pop().unwrap();
            out.push(stmts);
            out.push(Stmt::Cjump(op, Box::new(a2), Box::new(b2), t, f));
        }
        label @ Stmt::Label(_) => out.push(label),
    }
}

fn do_move(dst: Exp, src: Exp, ctx: &mut Translate, out: &mut Vec<Stmt>) {
    match (dst, src) {
        // MOVE(TEMP t, CALL(f, args)): the one place a bare Call is allowed
        // to stay where it is; only its operands need reordering.
        (Exp::Temp(t), Exp::Call(f, args)) => {
            let (stmts, f, args) = reorder_call(*f, args, ctx);
            out.push(stmts);
            out.push(Stmt::move_(
                Exp::Temp(t),
                Exp::Call(Box::new(f), args),
            ));
        }
        (Exp::Eseq(s, e), src) => {
            do_stmt(*s, ctx, out);
            do_move(*e, src, ctx, out);
        }
        (Exp::Mem(addr), src) => {
            let (stmts, mut exps) = reorder(vec![*addr, src], ctx);
            let src2 = exps.pop().unwrap();
            let addr2 = exps.pop().unwrap();
            out.push(stmts);
            out.push(Stmt::move_(Exp::mem(addr2), src2));
        }
        (dst, src) => {
            let (stmts, mut exps) = reorder(vec![dst, src], ctx);
            let src2 = exps.pop().unwrap();
            let dst2 = exps.pop().unwrap();
            out.push(stmts);
            out.push(Stmt::move_(dst2, src2));
        }
    }
}

/// `do_exp` from the classic algorithm: pull every statement a subexpression
/// needs to run for effect out in front of it, recursively.
fn do_exp(exp: Exp, ctx: &mut Translate) -> (Stmt, Exp) {
    match exp {
        Exp::Const(_) | Exp::Name(_) | Exp::Temp(_) => (Stmt::nop(), exp),
        Exp::Binop(op, a, b) => {
            let (stmts, mut exps) = reorder(vec![*a, *b], ctx);
            let b2 = exps.pop().unwrap();
            let a2 = exps.pop().unwrap();
            (stmts, Exp::binop(op, a2, b2))
        }
        Exp::Mem(addr) => {
            let (stmts, e) = reorder_one(*addr, ctx);
            (stmts, Exp::mem(e))
        }
        Exp::Eseq(s, e) => {
            let mut stmts = Vec::new();
            do_stmt(*s, ctx, &mut stmts);
            let (more, e2) = do_exp(*e, ctx);
            stmts.push(more);
            (Stmt::seq(stmts), e2)
        }
        Exp::Call(f, args) => {
            // A `Call` that isn't already the direct child of a `Move`/`Exp`
            // is rewritten to one that is, then re-processed: this is the
            // one place `do_exp` introduces a fresh temp rather than just
            // reordering.
            let t = ctx.new_temp();
            let rewritten = Exp::eseq(
                Stmt::move_(Exp::Temp(t), Exp::Call(f, args)),
                Exp::Temp(t),
            );
            do_exp(rewritten, ctx)
        }
    }
}

fn reorder_one(e: Exp, ctx: &mut Translate) -> (Stmt, Exp) {
    let (stmts, mut exps) = reorder(vec![e], ctx);
    (stmts, exps.pop().unwrap())
}

/// Reorder a list of expressions (e.g. an operator's operands, or a call's
/// arguments) left to right, hoisting side effects into preceding statements
/// and introducing a temp save whenever commuting would change behavior.
fn reorder(exps: Vec<Exp>, ctx: &mut Translate) -> (Stmt, Vec<Exp>) {
    if exps.is_empty() {
        return (Stmt::nop(), Vec::new());
    }
    let mut iter = exps.into_iter();
    let head = iter.next().unwrap();
    let tail: Vec<Exp> = iter.collect();

    if let Exp::Call(f, args) = head {
        // Same rewrite as in `do_exp`: a call used as an operand is saved to
        // a temp first so it never ends up nested inside another operator.
        let t = ctx.new_temp();
        let rewritten = Exp::eseq(Stmt::move_(Exp::Temp(t), Exp::Call(f, args)), Exp::Temp(t));
        let mut all = vec![rewritten];
        all.extend(tail);
        return reorder(all, ctx);
    }

    let (head_stmts, head_exp) = do_exp(head, ctx);
    let (tail_stmts, mut tail_exps) = reorder(tail, ctx);

    if commutes(&tail_stmts, &head_exp) {
        tail_exps.insert(0, head_exp);
        (Stmt::Seq(Box::new(head_stmts), Box::new(tail_stmts)), tail_exps)
    } else {
        let t = ctx.new_temp();
        let save = Stmt::move_(Exp::Temp(t), head_exp);
        tail_exps.insert(0, Exp::Temp(t));
        let combined = Stmt::Seq(
            Box::new(head_stmts),
            Box::new(Stmt::Seq(Box::new(save), Box::new(tail_stmts))),
        );
        (combined, tail_exps)
    }
}

/// Reorder a call's callee and argument list together, keeping the callee in
/// position 0.
fn reorder_call(f: Exp, args: Vec<Exp>, ctx: &mut Translate) -> (Stmt, Exp, Vec<Exp>) {
    let mut all = vec![f];
    all.extend(args);
    let (stmts, mut exps) = reorder(all, ctx);
    let f = exps.remove(0);
    (stmts, f, exps)
}

// ---------------------------------------------------------------------
// Pass 2: basic_blocks
// ---------------------------------------------------------------------

/// Partition a flat, linearized statement list into maximal straight-line
/// blocks. Every block starts with a `Label` and ends with a `Jump` or
/// `Cjump`; missing labels/jumps at a boundary are synthesized. Returns the
/// blocks plus a freshly minted `done` label that the last block falls
/// through to.
fn basic_blocks(stmts: Vec<Stmt>, ctx: &mut Translate) -> (Vec<Vec<Stmt>>, Label) {
    let done = ctx.new_label();

    // Split the flat list into groups, each starting at a `Label` (a
    // synthetic one is inserted at the very front if the list doesn't
    // already start with one).
    let mut groups: Vec<Vec<Stmt>> = Vec::new();
    for stmt in stmts {
        let starts_group = matches!(stmt, Stmt::Label(_));
        if starts_group || groups.is_empty() {
            if starts_group {
                groups.push(vec![stmt]);
                continue;
            } else {
                groups.push(vec![Stmt::Label(ctx.new_label())]);
            }
        }
        groups.last_mut().unwrap().push(stmt);
    }
    if groups.is_empty() {
        groups.push(vec![Stmt::Label(ctx.new_label())]);
    }

    // Every group but the last falls through to the label that starts the
    // next group unless it already ends in an explicit transfer; the last
    // one falls through to `done`.
    let next_labels: Vec<Label> = groups[1..]
        .iter()
        .map(|g| block_label(g))
        .chain(std::iter::once(done.clone()))
        .collect();
    for (group, fallthrough) in groups.iter_mut().zip(next_labels) {
        if !matches!(group.last(), Some(Stmt::Jump(..)) | Some(Stmt::Cjump(..))) {
            group.push(Stmt::jump(fallthrough));
        }
    }

    (groups, done)
}

fn block_label(block: &[Stmt]) -> Label {
    match block.first() {
        Some(Stmt::Label(l)) => l.clone(),
        _ => panic!("internal error: basic block does not start with a label"),
    }
}

// ---------------------------------------------------------------------
// Pass 3: trace_schedule
// ---------------------------------------------------------------------

/// Linearize the blocks into one instruction stream such that every `Cjump`
/// is immediately followed by a block beginning with its false label,
/// negating the test (and swapping the two labels) when that isn't already
/// the case, or splicing in an empty relay block when neither branch can be
/// made to follow directly.
fn trace_schedule(blocks: Vec<Vec<Stmt>>, done: Label) -> Vec<Stmt> {
    let mut blocks = blocks;
    let mut by_label: HashMap<Label, usize> = HashMap::new();
    for (i, block) in blocks.iter().enumerate() {
        by_label.insert(block_label(block), i);
    }
    let mut scheduled = vec![false; blocks.len()];
    let mut out: Vec<Stmt> = Vec::new();

    let original_len = blocks.len();
    for start in 0..original_len {
        if scheduled[start] {
            continue;
        }
        let mut idx = start;
        loop {
            if scheduled[idx] {
                break;
            }
            scheduled[idx] = true;

            // Fix up a trailing Cjump whose false branch won't be the very
            // next block emitted, per.
            if let Some(Stmt::Cjump(op, a, b, t, f)) = blocks[idx].last().cloned() {
                let f_is_next = by_label.get(&f).map_or(false, |&fi| !scheduled[fi]);
                if !f_is_next {
                    let t_is_next = by_label.get(&t).map_or(false, |&ti| !scheduled[ti]);
                    let new_last = if t_is_next {
                        Stmt::Cjump(op.negate(), a, b, f, t)
                    } else {
                        let relay_label = Label::named(format!("{}$relay{}", f, blocks.len()));
                        blocks.push(vec![Stmt::Label(relay_label.clone()), Stmt::jump(f)]);
                        scheduled.push(false);
                        by_label.insert(relay_label.clone(), blocks.len() - 1);
                        Stmt::Cjump(op, a, b, t, relay_label)
                    };
                    *blocks[idx].last_mut().unwrap() = new_last;
                }
            }

            out.extend(blocks[idx].clone());

            let next = match blocks[idx].last() {
                Some(Stmt::Jump(_, labels)) if labels.len() == 1 => {
                    by_label.get(&labels[0]).copied()
                }
                Some(Stmt::Cjump(_, _, _, _, f)) => by_label.get(f).copied(),
                _ => None,
            };
            match next {
                Some(n) if !scheduled[n] => idx = n,
                _ => break,
            }
        }
    }

    out.push(Stmt::Label(done));
    out
}

/// Checks that no `Eseq` survives, and every `Call` sits directly under a
/// `Move(Temp, _)` or `Exp(_)`. Exposed for tests and for any caller that
/// wants to assert canonicalization actually ran.
pub fn is_canonical(stmts: &[Stmt]) -> bool {
    stmts.iter().all(stmt_is_canonical)
}

fn stmt_is_canonical(s: &Stmt) -> bool {
    match s {
        Stmt::Move(dst, src) => {
            let src_ok = match src.as_ref() {
                Exp::Call(..) => matches!(dst.as_ref(), Exp::Temp(_)),
                other => exp_is_canonical(other),
            };
            src_ok && exp_is_canonical(dst)
        }
        Stmt::Exp(e) => match e.as_ref() {
            Exp::Call(f, args) => exp_is_canonical(f) && args.iter().all(exp_is_canonical),
            other => exp_is_canonical(other),
        },
        Stmt::Jump(e, _) => exp_is_canonical(e),
        Stmt::Cjump(_, a, b, _, _) => exp_is_canonical(a) && exp_is_canonical(b),
        Stmt::Seq(a, b) => stmt_is_canonical(a) && stmt_is_canonical(b),
        Stmt::Label(_) => true,
    }
}

fn exp_is_canonical(e: &Exp) -> bool {
    match e {
        Exp::Eseq(..) => false,
        Exp::Call(..) => false,
        Exp::Const(_) | Exp::Name(_) | Exp::Temp(_) => true,
        Exp::Binop(_, a, b) => exp_is_canonical(a) && exp_is_canonical(b),
        Exp::Mem(a) => exp_is_canonical(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, RelOp};
    use crate::temp::Temp;

    #[test]
    fn linearize_hoists_a_call_out_of_an_operand_position() {
        let mut ctx = Translate::new();
        let t = Temp::from_raw(100);
        // t := 1 + f()
        let call = Exp::Call(Box::new(Exp::Name(Label::named("f"))), vec![]);
        let body = Stmt::move_(Exp::Temp(t), Exp::binop(BinOp::Plus, Exp::Const(1), call));
        let flat = linearize(body, &mut ctx);
        assert!(is_canonical(&flat));
    }

    #[test]
    fn eseq_never_survives_canonicalization() {
        let mut ctx = Translate::new();
        let t = Temp::from_raw(101);
        let inner = Exp::eseq(Stmt::move_(Exp::Temp(t), Exp::Const(5)), Exp::Temp(t));
        let body = Stmt::exp(Exp::binop(BinOp::Plus, inner, Exp::Const(1)));
        let flat = linearize(body, &mut ctx);
        assert!(is_canonical(&flat));
        for s in &flat {
            assert!(!matches!(s, Stmt::Exp(e) if matches!(e.as_ref(), Exp::Eseq(..))));
        }
    }

    #[test]
    fn trace_schedule_places_the_false_label_block_immediately_after_a_cjump() {
        let mut ctx = Translate::new();
        let t_label = ctx.new_label();
        let f_label = ctx.new_label();
        let body = Stmt::seq(vec![
            Stmt::Cjump(
                RelOp::Lt,
                Box::new(Exp::Const(1)),
                Box::new(Exp::Const(2)),
                t_label.clone(),
                f_label.clone(),
            ),
            Stmt::Label(t_label),
            Stmt::exp(Exp::Const(0)),
            Stmt::Label(f_label.clone()),
            Stmt::exp(Exp::Const(0)),
        ]);
        let canon = canonicalize(body, &mut ctx);
        let cjump_idx = canon
            .iter()
            .position(|s| matches!(s, Stmt::Cjump(..)))
            .expect("a Cjump should survive canonicalization");
        match &canon[cjump_idx] {
            Stmt::Cjump(_, _, _, _, false_label) => {
                assert!(matches!(&canon[cjump_idx + 1], Stmt::Label(l) if l == false_label));
            }
            _ => unreachable!(),
        }
    }
}
