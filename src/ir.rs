//! The tree-IR language. Raw trees built by `translate` may contain `Eseq`;
//! `canon::linearize` removes them before instruction selection ever sees a
//! tree.

use crate::temp::{Label, Temp};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Plus,
    Minus,
    Mul,
    Div,
    And,
    Or,
    Lshift,
    Rshift,
    Arshift,
    Xor,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl RelOp {
    /// The relop that holds exactly when this one doesn't. Used by the
    /// trace scheduler to flip a `Cjump` so its false branch falls through.
    pub fn negate(self) -> RelOp {
        match self {
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
            RelOp::Lt => RelOp::Ge,
            RelOp::Ge => RelOp::Lt,
            RelOp::Gt => RelOp::Le,
            RelOp::Le => RelOp::Gt,
            RelOp::Ult => RelOp::Uge,
            RelOp::Uge => RelOp::Ult,
            RelOp::Ugt => RelOp::Ule,
            RelOp::Ule => RelOp::Ugt,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Exp {
    Const(i64),
    Name(Label),
    Temp(Temp),
    Binop(BinOp, Box<Exp>, Box<Exp>),
    /// Address dereference. A store when it's the destination of a `Move`,
    /// a load everywhere else.
    Mem(Box<Exp>),
    Call(Box<Exp>, Vec<Exp>),
    /// Evaluate `stmt` for effect, then yield `exp`. Eliminated by
    /// canonicalization; never appears in the instruction selector's input.
    Eseq(Box<Stmt>, Box<Exp>),
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Move(Box<Exp>, Box<Exp>),
    Exp(Box<Exp>),
    Jump(Box<Exp>, Vec<Label>),
    Cjump(RelOp, Box<Exp>, Box<Exp>, Label, Label),
    Seq(Box<Stmt>, Box<Stmt>),
    Label(Label),
}

impl Exp {
    pub fn mem(e: Exp) -> Exp {
        Exp::Mem(Box::new(e))
    }

    pub fn binop(op: BinOp, left: Exp, right: Exp) -> Exp {
        Exp::Binop(op, Box::new(left), Box::new(right))
    }

    pub fn eseq(stmt: Stmt, exp: Exp) -> Exp {
        Exp::Eseq(Box::new(stmt), Box::new(exp))
    }
}

impl Stmt {
    pub fn move_(dst: Exp, src: Exp) -> Stmt {
        Stmt::Move(Box::new(dst), Box::new(src))
    }

    pub fn exp(e: Exp) -> Stmt {
        Stmt::Exp(Box::new(e))
    }

    pub fn jump(target: Label) -> Stmt {
        Stmt::Jump(Box::new(Exp::Name(target.clone())), vec![target])
    }

    /// A no-op statement, used as the effect half of an `Eseq` that only
    /// needs to carry a value, and as the unit value of a `while`/`for`.
    pub fn nop() -> Stmt {
        Stmt::Exp(Box::new(Exp::Const(0)))
    }

    /// Fold a non-empty list of statements into a right-leaning `Seq` chain.
    /// Panics on an empty list; callers always have at least a `nop()` to
    /// fall back to.
    pub fn seq(stmts: impl IntoIterator<Item = Stmt>) -> Stmt {
        let mut iter = stmts.into_iter();
        let first = iter.next().expect("Stmt::seq requires at least one statement");
        iter.fold(first, |acc, next| Stmt::Seq(Box::new(acc), Box::new(next)))
    }
}
