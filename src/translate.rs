//! The translator. Owns the per-compilation counters and the fragment list
//! as plain fields on a context value, rather than behind global mutable
//! state, and exposes the IR constructors `semant` drives.

use crate::frame::{access_exp, Access, Level};
use crate::ir::{BinOp, Exp, RelOp, Stmt};
use crate::temp::{Label, Temp};
use crate::types::{Uniq, UniqGen};

/// A translated expression, in one of the three shapes every IR-producing
/// rule in `semant` needs:
/// - `Ex`: a genuine value.
/// - `Nx`: a statement with no useful value (its value, if forced, is 0).
/// - `Cx`: a conditional, represented as a function from (true-label,
///   false-label) to the statement that jumps to one or the other. Kept
///   unevaluated until the caller knows which labels it needs, so `if`/
///   `while`/`&`/`|`-shaped code never materializes a boolean it doesn't
///   need.
pub enum TrExp {
    Ex(Exp),
    Nx(Stmt),
    Cx(Box<dyn FnOnce(Label, Label) -> Stmt>),
}

impl TrExp {
    pub fn un_ex(self, ctx: &mut Translate) -> Exp {
        match self {
            TrExp::Ex(e) => e,
            TrExp::Nx(s) => Exp::eseq(s, Exp::Const(0)),
            TrExp::Cx(gen) => {
                let r = ctx.new_temp();
                let t = ctx.new_label();
                let f = ctx.new_label();
                let cond = gen(t.clone(), f.clone());
                Exp::eseq(
                    Stmt::seq(vec![
                        Stmt::move_(Exp::Temp(r), Exp::Const(1)),
                        cond,
                        Stmt::Label(f),
                        Stmt::move_(Exp::Temp(r), Exp::Const(0)),
                        Stmt::Label(t),
                    ]),
                    Exp::Temp(r),
                )
            }
        }
    }

    pub fn un_nx(self, ctx: &mut Translate) -> Stmt {
        match self {
            TrExp::Ex(e) => Stmt::exp(e),
            TrExp::Nx(s) => s,
            TrExp::Cx(gen) => {
                let done = ctx.new_label();
                Stmt::seq(vec![gen(done.clone(), done.clone()), Stmt::Label(done)])
            }
        }
    }

    pub fn un_cx(self) -> Box<dyn FnOnce(Label, Label) -> Stmt> {
        match self {
            TrExp::Cx(gen) => gen,
            TrExp::Ex(e) => Box::new(move |t, f| {
                Stmt::Cjump(RelOp::Ne, Box::new(e), Box::new(Exp::Const(0)), t, f)
            }),
            TrExp::Nx(_) => {
                panic!("internal error: un_cx of a statement-shaped translation")
            }
        }
    }
}

/// A completed piece of output: either a canonicalizable procedure body, or
/// a string literal bound for the data segment.
pub enum Fragment {
    Proc { body: Stmt, level: Level },
    Str { label: Label, value: String },
}

/// The single mutable-state carrier for one compilation. Counters
/// here are process-local, not global/thread-local, so two `Translate`
/// values never interfere.
pub struct Translate {
    uniq_gen: UniqGen,
    next_temp: u32,
    next_label: u32,
    outermost: Level,
    fragments: Vec<Fragment>,
}

impl Default for Translate {
    fn default() -> Self {
        Self::new()
    }
}

impl Translate {
    pub fn new() -> Self {
        Translate {
            uniq_gen: UniqGen::new(),
            next_temp: Temp::FIRST_GENERATED,
            next_label: 0,
            outermost: Level::new_outermost(Label::named("tigermain")),
            fragments: Vec::new(),
        }
    }

    pub fn outermost(&self) -> Level {
        self.outermost.clone()
    }

    pub fn new_temp(&mut self) -> Temp {
        let id = self.next_temp;
        self.next_temp += 1;
        Temp::from_raw(id)
    }

    pub fn new_label(&mut self) -> Label {
        let id = self.next_label;
        self.next_label += 1;
        Label::named(format!("L{}", id))
    }

    pub fn new_uniq(&mut self) -> Uniq {
        self.uniq_gen.next()
    }

    pub fn new_level(&mut self, parent: Level, name: Label, formal_escapes: &[bool]) -> Level {
        Level::new(parent, name, formal_escapes)
    }

    pub fn alloc_local(&mut self, level: &Level, escape: bool) -> Access {
        // Closures can't borrow `self` mutably while it's also the receiver,
        // so generate the temp up front; it's only used in the non-escaping
        // branch.
        let temp = self.new_temp();
        level.alloc_local(escape, || temp)
    }

    pub fn add_fragment(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }

    /// Drain the accumulated fragments while keeping this context (and in
    /// particular its temp/label/uniq counters) alive. Callers that go on to
    /// canonicalize and select instructions for those fragments must keep
    /// using this same `Translate` so the fresh temps those later passes
    /// mint never collide with the ones already embedded in a fragment's
    /// body from the type-and-translate pass.
    pub fn take_fragments(&mut self) -> Vec<Fragment> {
        std::mem::take(&mut self.fragments)
    }

    // ---- IR-constructing rules ----

    pub fn int_const(value: i64) -> TrExp {
        TrExp::Ex(Exp::Const(value))
    }

    pub fn nil() -> TrExp {
        TrExp::Ex(Exp::Const(0))
    }

    pub fn unit() -> TrExp {
        TrExp::Nx(Stmt::nop())
    }

    pub fn string_literal(&mut self, value: &str) -> TrExp {
        let label = self.new_label();
        self.add_fragment(Fragment::Str {
            label: label.clone(),
            value: value.to_string(),
        });
        TrExp::Ex(Exp::Name(label))
    }

    /// Read a variable bound at `access` in `def_level`, from code executing
    /// at `use_level`, chaining static links as needed.
    pub fn simple_var(access: Access, def_level: &Level, use_level: &Level) -> TrExp {
        let frame_ptr = static_link_chain(use_level, def_level);
        TrExp::Ex(access_exp(access, frame_ptr))
    }

    pub fn field_var(base: TrExp, field_index: usize, ctx: &mut Translate) -> TrExp {
        let base = base.un_ex(ctx);
        let offset = field_index as i64 * i64::from(crate::consts::WORD_SIZE);
        TrExp::Ex(Exp::mem(Exp::binop(BinOp::Plus, base, Exp::Const(offset))))
    }

    pub fn subscript_var(base: TrExp, index: TrExp, ctx: &mut Translate) -> TrExp {
        let base = base.un_ex(ctx);
        let index = index.un_ex(ctx);
        let byte_offset = Exp::binop(BinOp::Mul, index, Exp::Const(i64::from(crate::consts::WORD_SIZE)));
        TrExp::Ex(Exp::mem(Exp::binop(BinOp::Plus, base, byte_offset)))
    }

    pub fn binop(op: BinOp, left: TrExp, right: TrExp, ctx: &mut Translate) -> TrExp {
        let left = left.un_ex(ctx);
        let right = right.un_ex(ctx);
        TrExp::Ex(Exp::binop(op, left, right))
    }

    pub fn relop(op: RelOp, left: TrExp, right: TrExp, ctx: &mut Translate) -> TrExp {
        let left = left.un_ex(ctx);
        let right = right.un_ex(ctx);
        TrExp::Cx(Box::new(move |t, f| {
            Stmt::Cjump(op, Box::new(left), Box::new(right), t, f)
        }))
    }

    /// String equality/ordering is not a machine relop; emit a call to the
    /// runtime and compare its result to zero.
    pub fn string_relop(
        runtime_name: &str,
        negate: bool,
        left: TrExp,
        right: TrExp,
        ctx: &mut Translate,
    ) -> TrExp {
        let left = left.un_ex(ctx);
        let right = right.un_ex(ctx);
        let call = Exp::Call(Box::new(Exp::Name(Label::named(runtime_name))), vec![left, right]);
        let op = if negate { RelOp::Eq } else { RelOp::Ne };
        TrExp::Cx(Box::new(move |t, f| {
            Stmt::Cjump(op, Box::new(call), Box::new(Exp::Const(0)), t, f)
        }))
    }

    pub fn assign(lhs: TrExp, rhs: TrExp, ctx: &mut Translate) -> TrExp {
        let lhs = lhs.un_ex(ctx);
        let rhs = rhs.un_ex(ctx);
        TrExp::Nx(Stmt::move_(lhs, rhs))
    }

    /// `(e1; e2; ...; en)`. An empty sequence is `unit`.
    pub fn seq(exps: Vec<TrExp>, ctx: &mut Translate) -> TrExp {
        let mut exps = exps;
        match exps.len() {
            0 => Self::unit(),
            _ => {
                let last = exps.pop().unwrap();
                if exps.is_empty() {
                    return last;
                }
                let stmts: Vec<Stmt> = exps.into_iter().map(|e| e.un_nx(ctx)).collect();
                match last {
                    TrExp::Ex(e) => TrExp::Ex(Exp::eseq(Stmt::seq(stmts), e)),
                    TrExp::Nx(s) => TrExp::Nx(Stmt::seq(stmts.into_iter().chain(std::iter::once(s)))),
                    cx @ TrExp::Cx(_) => {
                        // Rare (a sequence ending in a bare comparison used as
                        // a condition); evaluate the prefix for effect, then
                        // hand back the still-unevaluated condition.
                        let prefix = Stmt::seq(stmts);
                        TrExp::Cx(Box::new(move |t, f| {
                            Stmt::Seq(Box::new(prefix), Box::new(cx.un_cx()(t, f)))
                        }))
                    }
                }
            }
        }
    }

    pub fn if_then(test: TrExp, then_: TrExp, ctx: &mut Translate) -> TrExp {
        let t = ctx.new_label();
        let f = ctx.new_label();
        let test_stmt = test.un_cx()(t.clone(), f.clone());
        let then_stmt = then_.un_nx(ctx);
        TrExp::Nx(Stmt::seq(vec![
            test_stmt,
            Stmt::Label(t),
            then_stmt,
            Stmt::Label(f),
        ]))
    }

    pub fn if_then_else_unit(test: TrExp, then_: TrExp, else_: TrExp, ctx: &mut Translate) -> TrExp {
        let t = ctx.new_label();
        let f = ctx.new_label();
        let done = ctx.new_label();
        let test_stmt = test.un_cx()(t.clone(), f.clone());
        let then_stmt = then_.un_nx(ctx);
        let else_stmt = else_.un_nx(ctx);
        TrExp::Nx(Stmt::seq(vec![
            test_stmt,
            Stmt::Label(t),
            then_stmt,
            Stmt::jump(done.clone()),
            Stmt::Label(f),
            else_stmt,
            Stmt::Label(done),
        ]))
    }

    pub fn if_then_else_value(test: TrExp, then_: TrExp, else_: TrExp, ctx: &mut Translate) -> TrExp {
        let t = ctx.new_label();
        let f = ctx.new_label();
        let done = ctx.new_label();
        let result = ctx.new_temp();
        let test_stmt = test.un_cx()(t.clone(), f.clone());
        let then_exp = then_.un_ex(ctx);
        let else_exp = else_.un_ex(ctx);
        let body = Stmt::seq(vec![
            test_stmt,
            Stmt::Label(t),
            Stmt::move_(Exp::Temp(result), then_exp),
            Stmt::jump(done.clone()),
            Stmt::Label(f),
            Stmt::move_(Exp::Temp(result), else_exp),
            Stmt::Label(done),
        ]);
        TrExp::Ex(Exp::eseq(body, Exp::Temp(result)))
    }

    pub fn while_loop(test: TrExp, body: TrExp, done_label: Label, ctx: &mut Translate) -> TrExp {
        let test_label = ctx.new_label();
        let body_label = ctx.new_label();
        let test_stmt = test.un_cx()(body_label.clone(), done_label.clone());
        let body_stmt = body.un_nx(ctx);
        TrExp::Nx(Stmt::seq(vec![
            Stmt::Label(test_label.clone()),
            test_stmt,
            Stmt::Label(body_label),
            body_stmt,
            Stmt::jump(test_label),
            Stmt::Label(done_label),
        ]))
    }

    pub fn break_(label: Label) -> TrExp {
        TrExp::Nx(Stmt::jump(label))
    }

    /// `let_body` prepends the `let` block's initializing statements to the
    /// translated body, in source order.
    pub fn let_body(inits: Vec<Stmt>, body: TrExp) -> TrExp {
        if inits.is_empty() {
            return body;
        }
        let prelude = Stmt::seq(inits);
        match body {
            TrExp::Ex(e) => TrExp::Ex(Exp::eseq(prelude, e)),
            TrExp::Nx(s) => TrExp::Nx(Stmt::Seq(Box::new(prelude), Box::new(s))),
            TrExp::Cx(gen) => TrExp::Cx(Box::new(move |t, f| {
                Stmt::Seq(Box::new(prelude), Box::new(gen(t, f)))
            })),
        }
    }

    pub fn call(
        callee_level: &Level,
        caller_level: &Level,
        label: Label,
        args: Vec<TrExp>,
        is_procedure: bool,
        ctx: &mut Translate,
    ) -> TrExp {
        let static_link = match callee_level.parent() {
            // Calling a function nested one level in from `caller_level`'s
            // own defining level chain: the callee's static link is the
            // frame of *its* parent, reached by chaining from the caller.
            Some(callee_parent) => static_link_chain(caller_level, callee_parent),
            // Calling a top-level (outermost-nested) function: no real
            // enclosing frame, pass a dummy.
            None => Exp::Const(0),
        };
        let mut arg_exps = vec![static_link];
        arg_exps.extend(args.into_iter().map(|a| a.un_ex(ctx)));
        let call = Exp::Call(Box::new(Exp::Name(label)), arg_exps);
        if is_procedure {
            TrExp::Nx(Stmt::exp(call))
        } else {
            TrExp::Ex(call)
        }
    }

    pub fn record(field_exps: Vec<TrExp>, ctx: &mut Translate) -> TrExp {
        let n = field_exps.len();
        let size_bytes = n as i64 * i64::from(crate::consts::WORD_SIZE);
        let base = ctx.new_temp();
        let alloc = Exp::Call(
            Box::new(Exp::Name(Label::named(crate::consts::RUNTIME_ALLOC_RECORD))),
            vec![Exp::Const(size_bytes)],
        );
        let mut stmts = vec![Stmt::move_(Exp::Temp(base), alloc)];
        for (i, field) in field_exps.into_iter().enumerate() {
            let field_exp = field.un_ex(ctx);
            let offset = i as i64 * i64::from(crate::consts::WORD_SIZE);
            let dst = Exp::mem(Exp::binop(BinOp::Plus, Exp::Temp(base), Exp::Const(offset)));
            stmts.push(Stmt::move_(dst, field_exp));
        }
        TrExp::Ex(Exp::eseq(Stmt::seq(stmts), Exp::Temp(base)))
    }

    pub fn array(size: TrExp, init: TrExp, ctx: &mut Translate) -> TrExp {
        let size = size.un_ex(ctx);
        let init = init.un_ex(ctx);
        TrExp::Ex(Exp::Call(
            Box::new(Exp::Name(Label::named(crate::consts::RUNTIME_INIT_ARRAY))),
            vec![size, init],
        ))
    }

    /// Wrap a translated function body with its prologue/epilogue and queue
    /// it as a procedure fragment. Procedures (declared result type `unit`)
    /// don't move their value into the return-value temporary.
    pub fn proc_entry_exit(&mut self, level: Level, body: TrExp, is_procedure: bool) {
        let body_stmt = if is_procedure {
            body.un_nx(self)
        } else {
            let value = body.un_ex(self);
            Stmt::move_(Exp::Temp(Temp::RETURN_VALUE), value)
        };
        self.add_fragment(Fragment::Proc {
            body: body_stmt,
            level,
        });
    }
}

/// Climb from `use_level` to `def_level`, following each frame's static
/// link, and return the expression for `def_level`'s frame pointer as seen
/// from `use_level`.
pub fn static_link_chain(use_level: &Level, def_level: &Level) -> Exp {
    let mut addr = Exp::Temp(Temp::FRAME_POINTER);
    let mut current = use_level.clone();
    while !Level::same(&current, def_level) {
        let link = current.static_link_access();
        addr = access_exp(link, addr);
        current = current
            .parent()
            .cloned()
            .expect("internal error: static link chain ran off the top of the level tree");
    }
    addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_link_chain_is_identity_for_same_level() {
        let mut ctx = Translate::new();
        let level = ctx.outermost();
        let addr = static_link_chain(&level, &level);
        assert!(matches!(addr, Exp::Temp(t) if t == Temp::FRAME_POINTER));
    }

    #[test]
    fn calling_a_sibling_passes_the_shared_parent_frame() {
        let mut ctx = Translate::new();
        let outer = ctx.outermost();
        let f = ctx.new_level(outer.clone(), Label::named("f"), &[]);
        let g = ctx.new_level(outer, Label::named("g"), &[]);
        // f calling g: since both are defined directly under `outer`, g's
        // static link is just outer's frame pointer as seen from f.
        let call = Translate::call(&g, &f, Label::named("g"), vec![], false, &mut ctx);
        match call {
            TrExp::Ex(Exp::Call(_, args)) => assert_eq!(args.len(), 1),
            _ => panic!("expected a call expression"),
        }
    }

    /// A read of a local bound one level up must chain exactly one static
    /// link before applying the access's own offset: one `Mem` for the link
    /// dereference, one for the final frame read. Regression test for a bug
    /// where `simple_var` was always called with `def_level == use_level`,
    /// silently skipping the chain and reading the wrong frame.
    #[test]
    fn simple_var_chains_one_static_link_to_read_an_enclosing_local() {
        let mut ctx = Translate::new();
        let outer = ctx.outermost();
        let access = ctx.alloc_local(&outer, true);
        let inner = ctx.new_level(outer.clone(), Label::named("inner"), &[]);

        let read = Translate::simple_var(access, &outer, &inner);
        let exp = match read {
            TrExp::Ex(e) => e,
            _ => panic!("expected an Ex translation for a variable read"),
        };
        assert_eq!(
            count_mem(&exp),
            2,
            "one hop through the static link plus the final frame read; got {:?}",
            exp
        );
    }

    fn count_mem(e: &Exp) -> usize {
        match e {
            Exp::Mem(inner) => 1 + count_mem(inner),
            Exp::Binop(_, a, b) => count_mem(a) + count_mem(b),
            Exp::Call(f, args) => count_mem(f) + args.iter().map(count_mem).sum::<usize>(),
            Exp::Eseq(_, e) => count_mem(e),
            Exp::Const(_) | Exp::Name(_) | Exp::Temp(_) => 0,
        }
    }
}
