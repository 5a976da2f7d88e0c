//! The type-and-translate pass. One function per AST shape, each
//! returning a translated IR fragment paired with its static type; errors
//! are `?`-propagated so the first one found aborts the whole walk
//! ("first error wins").

use crate::ast::{Decl, Expr, Field, FunDec, Oper, TypeDec, TypeExpr, Var, VarDec};
use crate::consts::{FOR_LIMIT_NAME, RUNTIME_STRING_EQUAL, RUNTIME_STRING_LESS};
use crate::env::{EnvEntry, TypeEnv, ValueEnv};
use crate::error::{CompileError, SourceErrorWrapper, WithSource};
use crate::frame::Level;
use crate::ir::{BinOp, RelOp, Stmt};
use crate::symbol::{Symbol, SymbolTable};
use crate::temp::Label;
use crate::translate::{TrExp, Translate};
use crate::types::{compatible, Ty};
use crate::util::Pos;
use std::collections::HashSet;
use std::rc::Rc;

type TResult = Result<(TrExp, Ty), SourceErrorWrapper<CompileError>>;
type EResult<T> = Result<T, SourceErrorWrapper<CompileError>>;

fn err<T>(pos: Pos, e: CompileError) -> EResult<T> {
    Err(SourceErrorWrapper::new(e, pos))
}

/// Chase a `Ty::Name` chain to its concrete target. Declaration-time cycle
/// detection is assumed to have already rejected any real cycle, so
/// the bound here is an invariant check, not a user-facing error path.
fn resolve(tenv: &TypeEnv, ty: Ty) -> Ty {
    let mut current = ty;
    let mut steps = 0usize;
    while let Ty::Name(sym) = current {
        current = tenv
            .get(&sym)
            .cloned()
            .unwrap_or_else(|| panic!("internal error: unresolved type name escaped declaration processing"));
        steps += 1;
        if steps > tenv.len() + 1 {
            panic!("internal error: type alias cycle escaped declaration-time detection");
        }
    }
    current
}

fn lookup_type(tenv: &TypeEnv, sym: Symbol) -> Option<Ty> {
    tenv.get(&sym).cloned().map(|t| resolve(tenv, t))
}

/// The threaded state of one point in the AST walk: the two environments,
/// the enclosing function's level, and the label a `break` should jump to
/// (if any). Persistent maps and `Rc`-backed levels make this cheap to
/// clone per nested scope, so there's no explicit push/pop bookkeeping.
#[derive(Clone)]
struct Scope {
    tenv: TypeEnv,
    venv: ValueEnv,
    level: Level,
    break_label: Option<Label>,
}

/// Type-check and translate a whole program, producing the completed
/// [`Translate`] context (its fragment list plus the temp/label/uniq
/// counters that produced them) or the single error that aborted
/// compilation. `symbols` must be the same table the AST's identifiers were
/// interned against.
///
/// The context is returned whole, rather than just its fragment list, so a
/// caller that goes on to canonicalize and select instructions for those
/// fragments (see [`crate::compile_body`]) keeps minting temps from the same
/// counter that built the fragments in the first place.
pub fn translate_program(
    expr: &Expr,
    symbols: &mut SymbolTable,
    source: &str,
) -> Result<Translate, WithSource<CompileError>> {
    let mut ctx = Translate::new();
    let tenv = base_tenv(symbols);
    let outermost = ctx.outermost();
    let venv = base_venv(symbols, &outermost);
    let main_level = ctx.new_level(outermost, Label::named("tigermain"), &[]);
    let scope = Scope {
        tenv,
        venv,
        level: main_level.clone(),
        break_label: None,
    };
    match trans_expr(&scope, &mut ctx, symbols, expr) {
        Ok((body, _ty)) => {
            ctx.proc_entry_exit(main_level, body, true);
            Ok(ctx)
        }
        Err(wrapper) => Err(WithSource::new(wrapper, source.to_string())),
    }
}

fn base_tenv(symbols: &mut SymbolTable) -> TypeEnv {
    let mut tenv = TypeEnv::new();
    tenv.insert(symbols.intern("int"), Ty::Int);
    tenv.insert(symbols.intern("string"), Ty::String);
    tenv
}

fn base_venv(symbols: &mut SymbolTable, outermost: &Level) -> ValueEnv {
    let mut venv = ValueEnv::new();
    let mut builtin = |venv: &mut ValueEnv, name: &str, formals: Vec<Ty>, result: Ty| {
        let sym = symbols.intern(name);
        venv.insert(
            sym,
            EnvEntry::Func {
                level: outermost.clone(),
                label: Label::named(name),
                formals,
                result,
            },
        );
    };
    builtin(&mut venv, "print", vec![Ty::String], Ty::Unit);
    builtin(&mut venv, "flush", vec![], Ty::Unit);
    builtin(&mut venv, "getchar", vec![], Ty::String);
    builtin(&mut venv, "ord", vec![Ty::String], Ty::Int);
    builtin(&mut venv, "chr", vec![Ty::Int], Ty::String);
    builtin(&mut venv, "size", vec![Ty::String], Ty::Int);
    builtin(
        &mut venv,
        "substring",
        vec![Ty::String, Ty::Int, Ty::Int],
        Ty::String,
    );
    builtin(&mut venv, "concat", vec![Ty::String, Ty::String], Ty::String);
    builtin(&mut venv, "not", vec![Ty::Int], Ty::Int);
    builtin(&mut venv, "exit", vec![Ty::Int], Ty::Unit);
    venv
}

fn trans_expr(scope: &Scope, ctx: &mut Translate, symbols: &mut SymbolTable, expr: &Expr) -> TResult {
    match expr {
        Expr::Var(v) => {
            let (ir, ty, _read_only) = trans_var(scope, ctx, symbols, v)?;
            Ok((ir, ty))
        }
        Expr::Nil(_) => Ok((Translate::nil(), Ty::Nil)),
        Expr::Int(n, _) => Ok((Translate::int_const(*n), Ty::Int)),
        Expr::Str(s, _) => Ok((ctx.string_literal(s), Ty::String)),
        Expr::Call { func, args, pos } => trans_call(scope, ctx, symbols, *func, args, *pos),
        Expr::Op { left, op, right, pos } => trans_op(scope, ctx, symbols, left, *op, right, *pos),
        Expr::Record { type_name, fields, pos } => {
            trans_record(scope, ctx, symbols, *type_name, fields, *pos)
        }
        Expr::Seq(exprs, _) => {
            if exprs.is_empty() {
                return Ok((Translate::unit(), Ty::Unit));
            }
            let mut irs = Vec::with_capacity(exprs.len());
            let mut last_ty = Ty::Unit;
            for e in exprs {
                let (ir, ty) = trans_expr(scope, ctx, symbols, e)?;
                irs.push(ir);
                last_ty = ty;
            }
            Ok((Translate::seq(irs, ctx), last_ty))
        }
        Expr::Assign { var, expr, pos } => trans_assign(scope, ctx, symbols, var, expr, *pos),
        Expr::If { test, then_, else_, pos } => {
            trans_if(scope, ctx, symbols, test, then_, else_.as_deref(), *pos)
        }
        Expr::While { test, body, pos } => trans_while(scope, ctx, symbols, test, body, *pos),
        Expr::For { var, lo, hi, body, pos } => trans_for(scope, ctx, symbols, *var, lo, hi, body, *pos),
        Expr::Break(pos) => match &scope.break_label {
            Some(label) => Ok((Translate::break_(label.clone()), Ty::Unit)),
            None => err(*pos, CompileError::type_error("Break is used outside of a loop")),
        },
        Expr::Let { decls, body, pos: _ } => {
            let (inner, inits) = trans_decs(scope, ctx, symbols, decls)?;
            let (body_ir, body_ty) = trans_expr(&inner, ctx, symbols, body)?;
            Ok((Translate::let_body(inits, body_ir), body_ty))
        }
        Expr::Array { type_name, size, init, pos } => {
            trans_array(scope, ctx, symbols, *type_name, size, init, *pos)
        }
    }
}

/// Returns the variable's IR, its type, and whether it is read-only (true
/// only for a desugared `for` loop's bound variable).
fn trans_var(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    var: &Var,
) -> EResult<(TrExp, Ty, bool)> {
    match var {
        Var::Simple(sym, pos) => match scope.venv.get(sym) {
            None => err(
                *pos,
                CompileError::undefined(format!("undefined variable {}", symbols.name(*sym))),
            ),
            Some(EnvEntry::Func { .. }) => err(*pos, CompileError::type_error("non-function expected")),
            Some(EnvEntry::Var { access, ty, level, read_only }) => {
                let ir = Translate::simple_var(*access, level, &scope.level);
                Ok((ir, ty.clone(), *read_only))
            }
        },
        Var::Field(base, field_sym, pos) => {
            let (base_ir, base_ty, _) = trans_var(scope, ctx, symbols, base)?;
            let base_ty = resolve(&scope.tenv, base_ty);
            let fields = match base_ty.fields() {
                Some(fields) => fields,
                None => {
                    return err(
                        *pos,
                        CompileError::type_error(format!(
                            "expected record, found {}",
                            base_ty.describe(symbols)
                        )),
                    )
                }
            };
            match fields.iter().position(|(name, _)| name == field_sym) {
                Some(index) => {
                    let field_ty = fields[index].1.clone();
                    let ir = Translate::field_var(base_ir, index, ctx);
                    Ok((ir, field_ty, false))
                }
                None => err(
                    *pos,
                    CompileError::undefined(format!("undefined field {}", symbols.name(*field_sym))),
                ),
            }
        }
        Var::Subscript(base, index_expr, pos) => {
            let (base_ir, base_ty, _) = trans_var(scope, ctx, symbols, base)?;
            let base_ty = resolve(&scope.tenv, base_ty);
            let elem = match base_ty.element() {
                Some(elem) => elem.clone(),
                None => {
                    return err(
                        *pos,
                        CompileError::type_error(format!(
                            "expected array, found {}",
                            base_ty.describe(symbols)
                        )),
                    )
                }
            };
            let (index_ir, index_ty) = trans_expr(scope, ctx, symbols, index_expr)?;
            if index_ty != Ty::Int {
                return err(
                    *pos,
                    CompileError::type_error(format!(
                        "array subscript must be int, found {}",
                        index_ty.describe(symbols)
                    )),
                );
            }
            let ir = Translate::subscript_var(base_ir, index_ir, ctx);
            Ok((ir, elem, false))
        }
    }
}

fn trans_call(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    func: Symbol,
    args: &[Expr],
    pos: Pos,
) -> TResult {
    let entry = match scope.venv.get(&func) {
        Some(EnvEntry::Func { level, label, formals, result }) => {
            (level.clone(), label.clone(), formals.clone(), result.clone())
        }
        Some(EnvEntry::Var { .. }) => {
            return err(
                pos,
                CompileError::type_error(format!("{} is not a function", symbols.name(func))),
            )
        }
        None => {
            return err(
                pos,
                CompileError::undefined(format!("undefined function {}", symbols.name(func))),
            )
        }
    };
    let (callee_level, label, formals, result) = entry;
    if args.len() != formals.len() {
        return err(
            pos,
            CompileError::type_error(format!(
                "function {} expects {} argument(s), found {}",
                symbols.name(func),
                formals.len(),
                args.len()
            )),
        );
    }
    let mut arg_irs = Vec::with_capacity(args.len());
    for (actual, formal_ty) in args.iter().zip(formals.iter()) {
        let (ir, ty) = trans_expr(scope, ctx, symbols, actual)?;
        if !compatible(&ty, formal_ty) {
            return err(
                actual.pos(),
                CompileError::type_error(format!(
                    "expected {}, found {}",
                    formal_ty.describe(symbols),
                    ty.describe(symbols)
                )),
            );
        }
        arg_irs.push(ir);
    }
    let is_procedure = result == Ty::Unit;
    let ir = Translate::call(&callee_level, &scope.level, label, arg_irs, is_procedure, ctx);
    Ok((ir, result))
}

fn trans_op(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    left: &Expr,
    op: Oper,
    right: &Expr,
    pos: Pos,
) -> TResult {
    let (left_ir, left_ty) = trans_expr(scope, ctx, symbols, left)?;
    let (right_ir, right_ty) = trans_expr(scope, ctx, symbols, right)?;
    match op {
        Oper::Plus | Oper::Minus | Oper::Times | Oper::Divide => {
            require_int(&left_ty, left.pos(), symbols)?;
            require_int(&right_ty, right.pos(), symbols)?;
            let binop = match op {
                Oper::Plus => BinOp::Plus,
                Oper::Minus => BinOp::Minus,
                Oper::Times => BinOp::Mul,
                Oper::Divide => BinOp::Div,
                _ => unreachable!(),
            };
            Ok((Translate::binop(binop, left_ir, right_ir, ctx), Ty::Int))
        }
        Oper::Lt | Oper::Le | Oper::Gt | Oper::Ge => {
            require_int(&left_ty, left.pos(), symbols)?;
            require_int(&right_ty, right.pos(), symbols)?;
            let relop = match op {
                Oper::Lt => RelOp::Lt,
                Oper::Le => RelOp::Le,
                Oper::Gt => RelOp::Gt,
                Oper::Ge => RelOp::Ge,
                _ => unreachable!(),
            };
            Ok((Translate::relop(relop, left_ir, right_ir, ctx), Ty::Int))
        }
        Oper::Eq | Oper::Neq => {
            if !compatible(&left_ty, &right_ty) {
                return err(
                    pos,
                    CompileError::type_error(format!(
                        "cannot compare {} with {}",
                        left_ty.describe(symbols),
                        right_ty.describe(symbols)
                    )),
                );
            }
            if left_ty == Ty::String {
                let negate = op == Oper::Neq;
                Ok((
                    Translate::string_relop(RUNTIME_STRING_EQUAL, negate, left_ir, right_ir, ctx),
                    Ty::Int,
                ))
            } else {
                let relop = if op == Oper::Eq { RelOp::Eq } else { RelOp::Ne };
                Ok((Translate::relop(relop, left_ir, right_ir, ctx), Ty::Int))
            }
        }
    }
}

fn require_int(ty: &Ty, pos: Pos, symbols: &SymbolTable) -> EResult<()> {
    if *ty == Ty::Int {
        Ok(())
    } else {
        err(
            pos,
            CompileError::type_error(format!("expected int, found {}", ty.describe(symbols))),
        )
    }
}

fn trans_record(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    type_name: Symbol,
    fields: &[(Symbol, Expr, Pos)],
    pos: Pos,
) -> TResult {
    let record_ty = match lookup_type(&scope.tenv, type_name) {
        Some(ty) => ty,
        None => {
            return err(
                pos,
                CompileError::undefined(format!("undefined type {}", symbols.name(type_name))),
            )
        }
    };
    let decl_fields = match record_ty.fields() {
        Some(fields) => fields.to_vec(),
        None => {
            return err(
                pos,
                CompileError::type_error(format!("expected record, found {}", record_ty.describe(symbols))),
            )
        }
    };
    if fields.len() != decl_fields.len() {
        return err(
            pos,
            CompileError::undefined(format!(
                "record {} expects {} field(s), found {}",
                symbols.name(type_name),
                decl_fields.len(),
                fields.len()
            )),
        );
    }
    let mut field_irs = Vec::with_capacity(fields.len());
    for ((given_name, given_expr, given_pos), (decl_name, decl_ty)) in fields.iter().zip(decl_fields.iter()) {
        if given_name != decl_name {
            return err(
                *given_pos,
                CompileError::undefined(format!("undefined field {}", symbols.name(*given_name))),
            );
        }
        let (ir, ty) = trans_expr(scope, ctx, symbols, given_expr)?;
        if !compatible(&ty, decl_ty) {
            return err(
                *given_pos,
                CompileError::type_error(format!(
                    "field {} expects {}, found {}",
                    symbols.name(*decl_name),
                    decl_ty.describe(symbols),
                    ty.describe(symbols)
                )),
            );
        }
        field_irs.push(ir);
    }
    Ok((Translate::record(field_irs, ctx), record_ty))
}

fn trans_assign(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    var: &Var,
    expr: &Expr,
    pos: Pos,
) -> TResult {
    let (var_ir, var_ty, read_only) = trans_var(scope, ctx, symbols, var)?;
    if read_only {
        let name = match var {
            Var::Simple(sym, _) => symbols.name(*sym).to_string(),
            _ => "<loop variable>".to_string(),
        };
        return err(
            pos,
            CompileError::type_error(format!("cannot assign to read-only variable `{}`", name)),
        );
    }
    let (expr_ir, expr_ty) = trans_expr(scope, ctx, symbols, expr)?;
    if !compatible(&expr_ty, &var_ty) {
        return err(
            pos,
            CompileError::type_error(format!(
                "cannot assign {} to variable of type {}",
                expr_ty.describe(symbols),
                var_ty.describe(symbols)
            )),
        );
    }
    Ok((Translate::assign(var_ir, expr_ir, ctx), Ty::Unit))
}

fn trans_if(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    test: &Expr,
    then_: &Expr,
    else_: Option<&Expr>,
    pos: Pos,
) -> TResult {
    let (test_ir, test_ty) = trans_expr(scope, ctx, symbols, test)?;
    require_int(&test_ty, test.pos(), symbols)?;
    let (then_ir, then_ty) = trans_expr(scope, ctx, symbols, then_)?;
    match else_ {
        None => {
            if then_ty != Ty::Unit {
                return err(
                    pos,
                    CompileError::type_error(format!(
                        "if-then branch must be unit, found {}",
                        then_ty.describe(symbols)
                    )),
                );
            }
            Ok((Translate::if_then(test_ir, then_ir, ctx), Ty::Unit))
        }
        Some(else_expr) => {
            let (else_ir, else_ty) = trans_expr(scope, ctx, symbols, else_expr)?;
            if !compatible(&then_ty, &else_ty) {
                return err(
                    pos,
                    CompileError::type_error(format!(
                        "if branches have incompatible types: {} vs {}",
                        then_ty.describe(symbols),
                        else_ty.describe(symbols)
                    )),
                );
            }
            let result_ty = if then_ty == Ty::Nil { else_ty } else { then_ty };
            if result_ty == Ty::Unit {
                Ok((
                    Translate::if_then_else_unit(test_ir, then_ir, else_ir, ctx),
                    Ty::Unit,
                ))
            } else {
                Ok((
                    Translate::if_then_else_value(test_ir, then_ir, else_ir, ctx),
                    result_ty,
                ))
            }
        }
    }
}

fn trans_while(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    test: &Expr,
    body: &Expr,
    pos: Pos,
) -> TResult {
    let (test_ir, test_ty) = trans_expr(scope, ctx, symbols, test)?;
    require_int(&test_ty, test.pos(), symbols)?;
    let done_label = ctx.new_label();
    let body_scope = Scope {
        break_label: Some(done_label.clone()),
        ..scope.clone()
    };
    let (body_ir, body_ty) = trans_expr(&body_scope, ctx, symbols, body)?;
    if body_ty != Ty::Unit {
        return err(
            pos,
            CompileError::type_error(format!(
                "while body must produce no value, found {}",
                body_ty.describe(symbols)
            )),
        );
    }
    Ok((Translate::while_loop(test_ir, body_ir, done_label, ctx), Ty::Unit))
}

/// Desugars `for v := lo to hi do body` into the `let`/`if`/`while`/`break`
/// form, built directly over IR constructors rather than as a textual AST
/// rewrite that would need re-parsing.
fn trans_for(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    var: Symbol,
    lo: &Expr,
    hi: &Expr,
    body: &Expr,
    pos: Pos,
) -> TResult {
    let (lo_ir, lo_ty) = trans_expr(scope, ctx, symbols, lo)?;
    require_int(&lo_ty, lo.pos(), symbols)?;
    let (hi_ir, hi_ty) = trans_expr(scope, ctx, symbols, hi)?;
    require_int(&hi_ty, hi.pos(), symbols)?;

    let i_access = ctx.alloc_local(&scope.level, true);
    let limit_access = ctx.alloc_local(&scope.level, true);
    let limit_sym = symbols.intern(FOR_LIMIT_NAME);

    let init_i = Translate::assign(
        Translate::simple_var(i_access, &scope.level, &scope.level),
        lo_ir,
        ctx,
    )
    .un_nx(ctx);
    let init_limit = Translate::assign(
        Translate::simple_var(limit_access, &scope.level, &scope.level),
        hi_ir,
        ctx,
    )
    .un_nx(ctx);

    let done_label = ctx.new_label();
    let mut body_venv = scope.venv.clone();
    body_venv.insert(
        var,
        EnvEntry::Var {
            access: i_access,
            ty: Ty::Int,
            level: scope.level.clone(),
            read_only: true,
        },
    );
    body_venv.insert(
        limit_sym,
        EnvEntry::Var {
            access: limit_access,
            ty: Ty::Int,
            level: scope.level.clone(),
            read_only: true,
        },
    );
    let body_scope = Scope {
        tenv: scope.tenv.clone(),
        venv: body_venv,
        level: scope.level.clone(),
        break_label: Some(done_label.clone()),
    };
    let (body_ir, body_ty) = trans_expr(&body_scope, ctx, symbols, body)?;
    if body_ty != Ty::Unit {
        return err(
            pos,
            CompileError::type_error(format!(
                "for-loop body must produce no value, found {}",
                body_ty.describe(symbols)
            )),
        );
    }

    let incr_test = Translate::relop(
        RelOp::Lt,
        Translate::simple_var(i_access, &scope.level, &scope.level),
        Translate::simple_var(limit_access, &scope.level, &scope.level),
        ctx,
    );
    let incr_then = Translate::assign(
        Translate::simple_var(i_access, &scope.level, &scope.level),
        Translate::binop(
            BinOp::Plus,
            Translate::simple_var(i_access, &scope.level, &scope.level),
            Translate::int_const(1),
            ctx,
        ),
        ctx,
    );
    let incr_else = Translate::break_(done_label.clone());
    let incr_stmt = Translate::if_then_else_unit(incr_test, incr_then, incr_else, ctx);

    let loop_body = Translate::seq(vec![body_ir, incr_stmt], ctx);
    let while_ir = Translate::while_loop(Translate::int_const(1), loop_body, done_label, ctx);

    let guard_test = Translate::relop(
        RelOp::Le,
        Translate::simple_var(i_access, &scope.level, &scope.level),
        Translate::simple_var(limit_access, &scope.level, &scope.level),
        ctx,
    );
    let guarded = Translate::if_then(guard_test, while_ir, ctx);

    Ok((Translate::let_body(vec![init_i, init_limit], guarded), Ty::Unit))
}

fn trans_array(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    type_name: Symbol,
    size: &Expr,
    init: &Expr,
    pos: Pos,
) -> TResult {
    let array_ty = match lookup_type(&scope.tenv, type_name) {
        Some(ty) => ty,
        None => {
            return err(
                pos,
                CompileError::undefined(format!("undefined type {}", symbols.name(type_name))),
            )
        }
    };
    let elem_ty = match array_ty.element() {
        Some(elem) => elem.clone(),
        None => {
            return err(
                pos,
                CompileError::type_error(format!("expected array, found {}", array_ty.describe(symbols))),
            )
        }
    };
    let (size_ir, size_ty) = trans_expr(scope, ctx, symbols, size)?;
    require_int(&size_ty, size.pos(), symbols)?;
    let (init_ir, init_ty) = trans_expr(scope, ctx, symbols, init)?;
    if !compatible(&init_ty, &elem_ty) {
        return err(
            pos,
            CompileError::type_error(format!(
                "array element expects {}, found {}",
                elem_ty.describe(symbols),
                init_ty.describe(symbols)
            )),
        );
    }
    Ok((Translate::array(size_ir, init_ir, ctx), array_ty))
}

fn trans_decs(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    decls: &[Decl],
) -> EResult<(Scope, Vec<Stmt>)> {
    let mut scope = scope.clone();
    let mut inits = Vec::new();
    for decl in decls {
        match decl {
            Decl::Var(vardec) => {
                let (new_scope, stmt) = trans_var_dec(&scope, ctx, symbols, vardec)?;
                scope = new_scope;
                inits.push(stmt);
            }
            Decl::Type(group) => {
                scope = trans_type_group(&scope, ctx, symbols, group)?;
            }
            Decl::Function(group) => {
                scope = trans_function_group(&scope, ctx, symbols, group)?;
            }
        }
    }
    Ok((scope, inits))
}

fn trans_var_dec(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    vardec: &VarDec,
) -> EResult<(Scope, Stmt)> {
    let (init_ir, init_ty) = trans_expr(scope, ctx, symbols, &vardec.init)?;
    let declared_ty = match &vardec.type_name {
        Some((type_sym, type_pos)) => {
            let declared = lookup_type(&scope.tenv, *type_sym).ok_or_else(|| {
                SourceErrorWrapper::new(
                    CompileError::undefined(format!("undefined type {}", symbols.name(*type_sym))),
                    *type_pos,
                )
            })?;
            if !compatible(&declared, &init_ty) {
                return err(
                    *type_pos,
                    CompileError::type_error(format!(
                        "expected {}, found {}",
                        declared.describe(symbols),
                        init_ty.describe(symbols)
                    )),
                );
            }
            declared
        }
        None => {
            if init_ty == Ty::Nil {
                return err(
                    vardec.pos,
                    CompileError::type_error(format!(
                        "You must declare the type of variable {}",
                        symbols.name(vardec.name)
                    )),
                );
            }
            init_ty
        }
    };
    let access = ctx.alloc_local(&scope.level, true);
    let mut new_venv = scope.venv.clone();
    new_venv.insert(
        vardec.name,
        EnvEntry::Var {
            access,
            ty: declared_ty,
            level: scope.level.clone(),
            read_only: false,
        },
    );
    let init_stmt = Translate::assign(
        Translate::simple_var(access, &scope.level, &scope.level),
        init_ir,
        ctx,
    )
    .un_nx(ctx);
    let new_scope = Scope {
        venv: new_venv,
        ..scope.clone()
    };
    Ok((new_scope, init_stmt))
}

fn trans_type_group(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    group: &[TypeDec],
) -> EResult<Scope> {
    let mut seen = HashSet::new();
    for dec in group {
        if !seen.insert(dec.name) {
            return err(
                dec.pos,
                CompileError::type_error(format!(
                    "type `{}` is already declared in this group",
                    symbols.name(dec.name)
                )),
            );
        }
    }

    // Every name declared in this group is visible to every other
    // declaration's right-hand side, including a pure
    // alias forward-referencing a sibling declared later in the same
    // group (e.g. `type a = b type b = int`) — so the placeholder goes in
    // for all three declaration shapes, not just record/array.
    let mut placeholder_tenv = scope.tenv.clone();
    for dec in group {
        placeholder_tenv.insert(dec.name, Ty::Name(dec.name));
    }

    let mut final_tenv = scope.tenv.clone();
    for dec in group {
        let resolved = match &dec.ty {
            TypeExpr::Name(other, pos) => {
                if !placeholder_tenv.contains_key(other) {
                    return err(
                        *pos,
                        CompileError::undefined(format!("undefined type {}", symbols.name(*other))),
                    );
                }
                Ty::Name(*other)
            }
            TypeExpr::Record(fields, pos) => {
                let mut resolved_fields = Vec::with_capacity(fields.len());
                let mut field_names = HashSet::new();
                for field in fields {
                    if !field_names.insert(field.name) {
                        return err(
                            field.pos,
                            CompileError::type_error(format!(
                                "duplicate field `{}` in record type",
                                symbols.name(field.name)
                            )),
                        );
                    }
                    let field_ty = placeholder_tenv.get(&field.type_name).cloned().ok_or_else(|| {
                        SourceErrorWrapper::new(
                            CompileError::undefined(format!(
                                "undefined type {}",
                                symbols.name(field.type_name)
                            )),
                            field.pos,
                        )
                    })?;
                    resolved_fields.push((field.name, field_ty));
                }
                let _ = pos;
                Ty::Record(Rc::new(resolved_fields), ctx.new_uniq())
            }
            TypeExpr::Array(elem, pos) => {
                let elem_ty = placeholder_tenv.get(elem).cloned().ok_or_else(|| {
                    SourceErrorWrapper::new(
                        CompileError::undefined(format!("undefined type {}", symbols.name(*elem))),
                        *pos,
                    )
                })?;
                Ty::Array(Rc::new(elem_ty), ctx.new_uniq())
            }
        };
        final_tenv.insert(dec.name, resolved);
    }

    for dec in group {
        if let TypeExpr::Name(_, pos) = &dec.ty {
            let mut visited = HashSet::new();
            let mut current = dec.name;
            loop {
                if !visited.insert(current) {
                    return err(*pos, CompileError::type_error("type cycle detected"));
                }
                match final_tenv.get(&current) {
                    Some(Ty::Name(next)) => current = *next,
                    Some(_) => break,
                    None => {
                        return err(
                            *pos,
                            CompileError::undefined(format!("undefined type {}", symbols.name(current))),
                        )
                    }
                }
            }
        }
    }

    Ok(Scope {
        tenv: final_tenv,
        ..scope.clone()
    })
}

fn trans_function_group(
    scope: &Scope,
    ctx: &mut Translate,
    symbols: &mut SymbolTable,
    group: &[FunDec],
) -> EResult<Scope> {
    let mut seen = HashSet::new();
    for dec in group {
        if !seen.insert(dec.name) {
            return err(
                dec.pos,
                CompileError::type_error(format!(
                    "function `{}` is already declared in this group",
                    symbols.name(dec.name)
                )),
            );
        }
    }

    struct Signature<'a> {
        level: Level,
        formals: Vec<Ty>,
        result: Ty,
        params: Vec<Field>,
        body: &'a Expr,
        result_pos: Pos,
    }

    let mut venv = scope.venv.clone();
    let mut signatures = Vec::with_capacity(group.len());
    for dec in group {
        let mut formals = Vec::with_capacity(dec.params.len());
        for param in &dec.params {
            let ty = lookup_type(&scope.tenv, param.type_name).ok_or_else(|| {
                SourceErrorWrapper::new(
                    CompileError::undefined(format!("undefined type {}", symbols.name(param.type_name))),
                    param.pos,
                )
            })?;
            formals.push(ty);
        }
        let (result, result_pos) = match &dec.result {
            Some((sym, pos)) => {
                let ty = lookup_type(&scope.tenv, *sym).ok_or_else(|| {
                    SourceErrorWrapper::new(
                        CompileError::undefined(format!("undefined type {}", symbols.name(*sym))),
                        *pos,
                    )
                })?;
                (ty, *pos)
            }
            None => (Ty::Unit, dec.pos),
        };
        let fresh = ctx.new_label();
        let label = Label::named(format!("{}${}", symbols.name(dec.name), fresh));
        let escapes = vec![true; formals.len()];
        let level = ctx.new_level(scope.level.clone(), label.clone(), &escapes);
        venv.insert(
            dec.name,
            EnvEntry::Func {
                level: level.clone(),
                label: label.clone(),
                formals: formals.clone(),
                result: result.clone(),
            },
        );
        signatures.push(Signature {
            level,
            formals,
            result,
            params: dec.params.clone(),
            body: &dec.body,
            result_pos,
        });
    }

    for sig in &signatures {
        let mut body_venv = venv.clone();
        for (param, (formal_ty, access)) in sig
            .params
            .iter()
            .zip(sig.formals.iter().zip(sig.level.formals().iter()))
        {
            body_venv.insert(
                param.name,
                EnvEntry::Var {
                    access: *access,
                    ty: formal_ty.clone(),
                    level: sig.level.clone(),
                    read_only: false,
                },
            );
        }
        let body_scope = Scope {
            tenv: scope.tenv.clone(),
            venv: body_venv,
            level: sig.level.clone(),
            break_label: None,
        };
        let (body_ir, body_ty) = trans_expr(&body_scope, ctx, symbols, sig.body)?;
        if !compatible(&body_ty, &sig.result) {
            return err(
                sig.result_pos,
                CompileError::type_error(format!(
                    "function body returns {}, expected {}",
                    body_ty.describe(symbols),
                    sig.result.describe(symbols)
                )),
            );
        }
        let is_procedure = sig.result == Ty::Unit;
        ctx.proc_entry_exit(sig.level.clone(), body_ir, is_procedure);
    }

    Ok(Scope { venv, ..scope.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr as E, Var as V};

    fn pos() -> Pos {
        Pos::dummy()
    }

    #[test]
    fn a_lone_integer_literal_type_checks_as_int() {
        let mut symbols = SymbolTable::new();
        let expr = E::Int(42, pos());
        let result = translate_program(&expr, &mut symbols, "42");
        assert!(result.is_ok());
    }

    #[test]
    fn break_outside_any_loop_is_rejected() {
        let mut symbols = SymbolTable::new();
        let expr = E::Break(pos());
        let result = translate_program(&expr, &mut symbols, "break");
        let rendered = result.unwrap_err().to_string();
        assert_eq!(rendered, "TypeError:0:0: Break is used outside of a loop");
    }

    #[test]
    fn let_without_a_declared_type_rejects_a_nil_initializer() {
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");
        let expr = E::Let {
            decls: vec![Decl::Var(VarDec {
                name: x,
                type_name: None,
                init: E::Nil(pos()),
                pos: pos(),
            })],
            body: Box::new(E::Var(V::Simple(x, pos()))),
            pos: pos(),
        };
        let result = translate_program(&expr, &mut symbols, "");
        let rendered = result.unwrap_err().to_string();
        assert_eq!(
            rendered,
            "TypeError:0:0: You must declare the type of variable x"
        );
    }

    #[test]
    fn assigning_to_the_for_loop_variable_is_rejected() {
        let mut symbols = SymbolTable::new();
        let i = symbols.intern("i");
        let expr = E::For {
            var: i,
            lo: Box::new(E::Int(0, pos())),
            hi: Box::new(E::Int(10, pos())),
            body: Box::new(E::Assign {
                var: V::Simple(i, pos()),
                expr: Box::new(E::Op {
                    left: Box::new(E::Var(V::Simple(i, pos()))),
                    op: Oper::Plus,
                    right: Box::new(E::Int(1, pos())),
                    pos: pos(),
                }),
                pos: pos(),
            }),
            pos: pos(),
        };
        let result = translate_program(&expr, &mut symbols, "");
        assert!(result.is_err());
    }
}
