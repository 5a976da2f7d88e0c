//! Integration tests for programs that are expected to fail type-checking.
//! Since the lexer/parser is out of scope for this crate, every program
//! here is an `ast::Expr` tree built by hand via the `common` helpers, in
//! place of source text a real front end would produce.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use tigerc::ast::{Decl, Expr, Oper, Var};
use tigerc::symbol::SymbolTable;

/// Compiles `expr` and expects it to fail, asserting on the rendered
/// `TypeError:<pos>: <message>` string. Panics if compilation succeeds.
macro_rules! assert_compile_error {
    ($symbols:expr, $expr:expr, $expected:expr $(,)?) => {{
        let result = tigerc::compile(&$expr, &mut $symbols, "");
        let rendered = result.unwrap_err().to_string();
        assert_eq!(rendered, $expected);
    }};
}

#[test]
fn scenario_4_nil_without_a_declared_type_is_rejected() {
    let mut symbols = SymbolTable::new();
    let x = symbols.intern("x");
    let expr = let_(vec![var_dec(x, None, Expr::Nil(pos()))], var(x));
    assert_compile_error!(
        symbols,
        expr,
        "TypeError:0:0: You must declare the type of variable x"
    );
}

#[test]
fn scenario_5_assigning_to_the_for_loop_variable_is_rejected() {
    let mut symbols = SymbolTable::new();
    let i = symbols.intern("i");
    let expr = for_loop(
        i,
        int(0),
        int(10),
        assign(Var::Simple(i, pos()), op(var(i), Oper::Plus, int(1))),
    );
    let result = tigerc::compile(&expr, &mut symbols, "");
    assert!(result.is_err());
}

#[test]
fn scenario_6_break_at_top_level_is_rejected() {
    let mut symbols = SymbolTable::new();
    let expr = break_();
    assert_compile_error!(
        symbols,
        expr,
        "TypeError:0:0: Break is used outside of a loop"
    );
}

#[test]
fn scenario_7_pure_alias_cycle_is_rejected() {
    let mut symbols = SymbolTable::new();
    let a = symbols.intern("a");
    let b = symbols.intern("b");
    // type a = b; type b = a -- a genuine cycle.
    let expr = let_(
        vec![Decl::Type(vec![type_alias(a, b), type_alias(b, a)])],
        int(0),
    );
    assert_compile_error!(symbols, expr, "TypeError:0:0: type cycle detected");
}

#[test]
fn scenario_7_counterpart_non_cyclic_alias_chain_accepts() {
    let mut symbols = SymbolTable::new();
    let a = symbols.intern("a");
    let b = symbols.intern("b");
    let int_ty = symbols.intern("int");
    // type a = b; type b = int -- a forward reference, but not a cycle.
    let expr = let_(
        vec![Decl::Type(vec![type_alias(a, b), type_alias(b, int_ty)])],
        int(0),
    );
    let result = tigerc::compile(&expr, &mut symbols, "");
    assert!(result.is_ok(), "{:?}", result.err().map(|e| e.to_string()));
}

#[test]
fn break_is_rejected_inside_a_function_body_whose_caller_loops() {
    // `break` only escapes to the nearest *lexically* enclosing loop, not a
    // dynamically enclosing one: a function body with a bare `break` is
    // rejected even if every caller happens to be inside a `while`.
    let mut symbols = SymbolTable::new();
    let f = symbols.intern("f");
    let expr = let_(
        vec![Decl::Function(vec![fun_dec(f, vec![], None, break_())])],
        while_loop(int(1), call(f, vec![])),
    );
    assert_compile_error!(
        symbols,
        expr,
        "TypeError:0:0: Break is used outside of a loop"
    );
}

#[test]
fn mismatched_if_branch_types_are_rejected() {
    let mut symbols = SymbolTable::new();
    let expr = if_then_else(int(1), int(2), string("nope"));
    let result = tigerc::compile(&expr, &mut symbols, "");
    assert!(result.is_err());
}

#[test]
fn arity_mismatch_reports_expected_and_actual_counts() {
    let mut symbols = SymbolTable::new();
    let print = symbols.intern("print");
    let expr = call(print, vec![]);
    let result = tigerc::compile(&expr, &mut symbols, "");
    let rendered = result.unwrap_err().to_string();
    assert!(rendered.contains("1 argument"));
    assert!(rendered.contains("found 0"));
}

#[test]
fn records_with_the_same_fields_declared_separately_are_not_assignable() {
    let mut symbols = SymbolTable::new();
    let a = symbols.intern("a");
    let b = symbols.intern("b");
    let x = symbols.intern("x");
    let y = symbols.intern("y");
    let n = symbols.intern("n");
    let int_ty = symbols.intern("int");
    let expr = let_(
        vec![
            Decl::Type(vec![type_record(a, vec![(n, int_ty)])]),
            Decl::Type(vec![type_record(b, vec![(n, int_ty)])]),
        ],
        let_(
            vec![
                var_dec(x, Some(a), Expr::Nil(pos())),
                var_dec(y, Some(b), Expr::Nil(pos())),
            ],
            assign(Var::Simple(x, pos()), var(y)),
        ),
    );
    let result = tigerc::compile(&expr, &mut symbols, "");
    assert!(result.is_err());
}
