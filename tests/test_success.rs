//! Integration tests for programs that are expected to type-check and
//! translate cleanly, plus invariant checks run over the resulting
//! fragments. As in `test_compile_error.rs`, every program is an
//! `ast::Expr` tree built by hand since there is no parser in this crate.

mod common;

use common::*;
use tigerc::ast::{Decl, Expr, Oper, Var};
use tigerc::canon;
use tigerc::ir::{Exp, Stmt};
use tigerc::symbol::SymbolTable;
use tigerc::translate::Fragment;

/// Compiles `expr`, asserting success, and returns its fragments. Discards
/// the paired `Translate` context, since every test below only inspects
/// fragment shape or runs `canon::canonicalize` purely to check the
/// Eseq/Call placement invariant (not to produce temps that must line up
/// with anything else).
fn compile_ok(expr: &Expr, symbols: &mut SymbolTable) -> Vec<Fragment> {
    tigerc::compile(expr, symbols, "")
        .unwrap_or_else(|e| panic!("expected success, got {}", e))
        .0
}

#[test]
fn scenario_1_a_let_bound_int_is_readable_in_the_body() {
    let mut symbols = SymbolTable::new();
    let a = symbols.intern("a");
    let expr = let_(
        vec![var_dec(a, None, int(1))],
        op(var(a), Oper::Plus, int(2)),
    );
    let fragments = compile_ok(&expr, &mut symbols);
    // Exactly one procedure fragment: the implicit top-level `tigermain`.
    let procs: Vec<_> = fragments
        .iter()
        .filter(|f| matches!(f, Fragment::Proc { .. }))
        .collect();
    assert_eq!(procs.len(), 1);
}

#[test]
fn scenario_2_a_self_referential_record_type_and_nil_initializer_accept() {
    let mut symbols = SymbolTable::new();
    let list = symbols.intern("list");
    let hd = symbols.intern("hd");
    let tl = symbols.intern("tl");
    let x = symbols.intern("x");
    let int_ty = symbols.intern("int");
    let expr = let_(
        vec![
            Decl::Type(vec![type_record(list, vec![(hd, int_ty), (tl, list)])]),
            var_dec(x, Some(list), Expr::Nil(pos())),
        ],
        var(x),
    );
    let fragments = compile_ok(&expr, &mut symbols);
    assert!(!fragments.is_empty());
}

#[test]
fn scenario_3_mutually_recursive_functions_both_produce_a_fragment() {
    let mut symbols = SymbolTable::new();
    let f = symbols.intern("f");
    let g = symbols.intern("g");
    let x = symbols.intern("x");
    let int_ty = symbols.intern("int");
    let expr = let_(
        vec![Decl::Function(vec![
            fun_dec(f, vec![(x, int_ty)], Some(int_ty), call(g, vec![var(x)])),
            fun_dec(g, vec![(x, int_ty)], Some(int_ty), call(f, vec![var(x)])),
        ])],
        call(f, vec![int(1)]),
    );
    let fragments = compile_ok(&expr, &mut symbols);
    let proc_count = fragments
        .iter()
        .filter(|frag| matches!(frag, Fragment::Proc { .. }))
        .count();
    // tigermain, f, and g.
    assert_eq!(proc_count, 3);
}

#[test]
fn every_fragment_canonicalizes_without_eseq_or_misplaced_calls() {
    let mut symbols = SymbolTable::new();
    let list = symbols.intern("list");
    let hd = symbols.intern("hd");
    let tl = symbols.intern("tl");
    let x = symbols.intern("x");
    let sum = symbols.intern("sum");
    let acc = symbols.intern("acc");
    let int_ty = symbols.intern("int");
    let expr = let_(
        vec![
            Decl::Type(vec![type_record(list, vec![(hd, int_ty), (tl, list)])]),
            Decl::Function(vec![fun_dec(
                sum,
                vec![(x, list), (acc, int_ty)],
                Some(int_ty),
                if_then_else(
                    op(var(x), Oper::Eq, Expr::Nil(pos())),
                    var(acc),
                    call(
                        sum,
                        vec![
                            Expr::Var(field(Var::Simple(x, pos()), tl)),
                            op(
                                var(acc),
                                Oper::Plus,
                                Expr::Var(field(Var::Simple(x, pos()), hd)),
                            ),
                        ],
                    ),
                ),
            )]),
        ],
        call(sum, vec![Expr::Nil(pos()), int(0)]),
    );
    let (fragments, mut ctx) =
        tigerc::compile(&expr, &mut symbols, "").unwrap_or_else(|e| panic!("expected success, got {}", e));
    for fragment in fragments {
        if let Fragment::Proc { body, .. } = fragment {
            let canonical = canon::canonicalize(body, &mut ctx);
            assert!(
                canon::is_canonical(&canonical),
                "canonicalized body violates the Eseq/Call placement invariant"
            );
        }
    }
}

#[test]
fn a_for_loop_body_type_checks_and_its_variable_reads_back_as_int() {
    let mut symbols = SymbolTable::new();
    let i = symbols.intern("i");
    let total = symbols.intern("total");
    let expr = let_(
        vec![var_dec(total, None, int(0))],
        seq(vec![
            for_loop(
                i,
                int(1),
                int(10),
                assign(
                    Var::Simple(total, pos()),
                    op(var(total), Oper::Plus, var(i)),
                ),
            ),
            var(total),
        ]),
    );
    let fragments = compile_ok(&expr, &mut symbols);
    assert!(!fragments.is_empty());
}

#[test]
fn array_of_record_allocates_and_type_checks() {
    let mut symbols = SymbolTable::new();
    let point = symbols.intern("point");
    let px = symbols.intern("px");
    let py = symbols.intern("py");
    let points = symbols.intern("points");
    let p = symbols.intern("p");
    let arr = symbols.intern("arr");
    let int_ty = symbols.intern("int");
    let expr = let_(
        vec![
            Decl::Type(vec![
                type_record(point, vec![(px, int_ty), (py, int_ty)]),
                type_array(points, point),
            ]),
            var_dec(p, Some(point), Expr::Nil(pos())),
            var_dec(arr, Some(points), array_lit(points, int(10), var(p))),
        ],
        int(0),
    );
    let result = tigerc::compile(&expr, &mut symbols, "");
    assert!(result.is_ok(), "{:?}", result.err().map(|e| e.to_string()));
}

/// A nested function reading a variable bound one level up must chain a
/// static link before applying the variable's frame offset: the read
/// compiles down to a `Mem` of a `Mem`, not a single `Mem` against the
/// nested function's own (unrelated) frame.
#[test]
fn a_nested_function_reading_an_enclosing_variable_chains_one_static_link() {
    let mut symbols = SymbolTable::new();
    let x = symbols.intern("x");
    let f = symbols.intern("f");
    let int_ty = symbols.intern("int");
    let expr = let_(
        vec![
            var_dec(x, None, int(1)),
            Decl::Function(vec![fun_dec(f, vec![], Some(int_ty), var(x))]),
        ],
        call(f, vec![]),
    );
    let fragments = compile_ok(&expr, &mut symbols);
    let inner_body = fragments
        .iter()
        .find_map(|fragment| match fragment {
            Fragment::Proc { body, level } if level.label().as_str() != "tigermain" => Some(body),
            _ => None,
        })
        .expect("f's own fragment should be present alongside tigermain's");
    assert!(
        stmt_mem_depth(inner_body) >= 2,
        "reading an enclosing local must chain a static link before the final \
         frame read, so the translated body should nest one Mem inside another; got {:?}",
        inner_body
    );
}

fn stmt_mem_depth(stmt: &Stmt) -> usize {
    match stmt {
        Stmt::Move(dst, src) => exp_mem_depth(dst).max(exp_mem_depth(src)),
        Stmt::Exp(e) => exp_mem_depth(e),
        Stmt::Jump(e, _) => exp_mem_depth(e),
        Stmt::Cjump(_, left, right, _, _) => exp_mem_depth(left).max(exp_mem_depth(right)),
        Stmt::Seq(a, b) => stmt_mem_depth(a).max(stmt_mem_depth(b)),
        Stmt::Label(_) => 0,
    }
}

fn exp_mem_depth(exp: &Exp) -> usize {
    match exp {
        Exp::Mem(inner) => 1 + exp_mem_depth(inner),
        Exp::Binop(_, left, right) => exp_mem_depth(left).max(exp_mem_depth(right)),
        Exp::Call(f, args) => exp_mem_depth(f).max(args.iter().map(exp_mem_depth).max().unwrap_or(0)),
        Exp::Eseq(s, e) => stmt_mem_depth(s).max(exp_mem_depth(e)),
        Exp::Const(_) | Exp::Name(_) | Exp::Temp(_) => 0,
    }
}
