//! Shared AST-building helpers for the integration tests. There is no
//! parser in this crate, so every test builds its `ast::Expr` tree by
//! hand; these helpers just keep that construction terse and keep
//! `Pos::dummy()` out of every call site.

use tigerc::ast::{Decl, Expr, Field, FunDec, Oper, TypeDec, TypeExpr, Var, VarDec};
use tigerc::symbol::{Symbol, SymbolTable};
use tigerc::util::Pos;

pub fn pos() -> Pos {
    Pos::dummy()
}

pub fn int(n: i64) -> Expr {
    Expr::Int(n, pos())
}

pub fn string(s: &str) -> Expr {
    Expr::Str(s.to_string(), pos())
}

pub fn var(sym: Symbol) -> Expr {
    Expr::Var(Var::Simple(sym, pos()))
}

pub fn field(base: Var, sym: Symbol) -> Var {
    Var::Field(Box::new(base), sym, pos())
}

pub fn subscript(base: Var, index: Expr) -> Var {
    Var::Subscript(Box::new(base), Box::new(index), pos())
}

pub fn op(left: Expr, oper: Oper, right: Expr) -> Expr {
    Expr::Op {
        left: Box::new(left),
        op: oper,
        right: Box::new(right),
        pos: pos(),
    }
}

pub fn assign(lhs: Var, rhs: Expr) -> Expr {
    Expr::Assign {
        var: lhs,
        expr: Box::new(rhs),
        pos: pos(),
    }
}

pub fn seq(exprs: Vec<Expr>) -> Expr {
    Expr::Seq(exprs, pos())
}

pub fn if_then(test: Expr, then_: Expr) -> Expr {
    Expr::If {
        test: Box::new(test),
        then_: Box::new(then_),
        else_: None,
        pos: pos(),
    }
}

pub fn if_then_else(test: Expr, then_: Expr, else_: Expr) -> Expr {
    Expr::If {
        test: Box::new(test),
        then_: Box::new(then_),
        else_: Some(Box::new(else_)),
        pos: pos(),
    }
}

pub fn while_loop(test: Expr, body: Expr) -> Expr {
    Expr::While {
        test: Box::new(test),
        body: Box::new(body),
        pos: pos(),
    }
}

pub fn for_loop(var: Symbol, lo: Expr, hi: Expr, body: Expr) -> Expr {
    Expr::For {
        var,
        lo: Box::new(lo),
        hi: Box::new(hi),
        body: Box::new(body),
        pos: pos(),
    }
}

pub fn break_() -> Expr {
    Expr::Break(pos())
}

pub fn call(func: Symbol, args: Vec<Expr>) -> Expr {
    Expr::Call {
        func,
        args,
        pos: pos(),
    }
}

pub fn let_(decls: Vec<Decl>, body: Expr) -> Expr {
    Expr::Let {
        decls,
        body: Box::new(body),
        pos: pos(),
    }
}

pub fn array_lit(type_name: Symbol, size: Expr, init: Expr) -> Expr {
    Expr::Array {
        type_name,
        size: Box::new(size),
        init: Box::new(init),
        pos: pos(),
    }
}

pub fn record_lit(type_name: Symbol, fields: Vec<(Symbol, Expr)>) -> Expr {
    Expr::Record {
        type_name,
        fields: fields.into_iter().map(|(s, e)| (s, e, pos())).collect(),
        pos: pos(),
    }
}

pub fn var_dec(name: Symbol, type_name: Option<Symbol>, init: Expr) -> Decl {
    Decl::Var(VarDec {
        name,
        type_name: type_name.map(|s| (s, pos())),
        init,
        pos: pos(),
    })
}

pub fn type_alias(name: Symbol, target: Symbol) -> TypeDec {
    TypeDec {
        name,
        ty: TypeExpr::Name(target, pos()),
        pos: pos(),
    }
}

pub fn type_record(name: Symbol, fields: Vec<(Symbol, Symbol)>) -> TypeDec {
    TypeDec {
        name,
        ty: TypeExpr::Record(
            fields
                .into_iter()
                .map(|(n, t)| Field {
                    name: n,
                    type_name: t,
                    pos: pos(),
                })
                .collect(),
            pos(),
        ),
        pos: pos(),
    }
}

pub fn type_array(name: Symbol, elem: Symbol) -> TypeDec {
    TypeDec {
        name,
        ty: TypeExpr::Array(elem, pos()),
        pos: pos(),
    }
}

pub fn fun_dec(
    name: Symbol,
    params: Vec<(Symbol, Symbol)>,
    result: Option<Symbol>,
    body: Expr,
) -> FunDec {
    FunDec {
        name,
        params: params
            .into_iter()
            .map(|(n, t)| Field {
                name: n,
                type_name: t,
                pos: pos(),
            })
            .collect(),
        result: result.map(|s| (s, pos())),
        body,
        pos: pos(),
    }
}
