//! Semantic analysis and tree-IR translation core for a small,
//! strongly-typed, expression-oriented language with records, arrays,
//! nested functions, and lexically-scoped variable bindings. The crate
//! owns three passes:
//!
//! 1. type-and-translate (`semant`/`translate`) — one recursive walk over a
//!    hand-built AST that resolves identifiers, checks types, and emits
//!    tree-IR fragments;
//! 2. canonicalization (`canon`) — rewrites each fragment's raw tree into
//!    the `Eseq`-free, traced form the instruction selector requires;
//! 3. instruction selection (`instr`) — "maximal munch" tiling of canonical
//!    IR into an abstract assembly stream.
//!
//! The lexer, parser, and register allocator are out of scope; callers
//! supply an [`ast::Expr`] tree directly.
//!
//! ```
//! use tigerc::ast::Expr;
//! use tigerc::symbol::SymbolTable;
//!
//! let mut symbols = SymbolTable::new();
//! let expr = Expr::Int(42, Default::default());
//! let (fragments, _ctx) = tigerc::compile(&expr, &mut symbols, "42").unwrap();
//! assert_eq!(fragments.len(), 1);
//! ```

pub mod ast;
pub mod canon;
pub mod consts;
pub mod env;
pub mod error;
pub mod frame;
pub mod instr;
pub mod ir;
pub mod semant;
pub mod symbol;
pub mod temp;
pub mod translate;
pub mod types;
pub mod util;

pub use error::{CompileError, SourceErrorWrapper, WithSource};
pub use translate::Fragment;

use instr::{Instr, Selector};
use symbol::SymbolTable;
use translate::Translate;

#[allow(unused_imports)]
use crate::debug;

/// Type-check and translate a whole program, returning its completed
/// fragment list alongside the [`Translate`] context that produced it, or
/// the single error that aborted compilation. This is the crate's single
/// public entry point into the type-and-translate pass.
///
/// The context is returned because its temp/label/uniq counters must keep
/// running, not reset, across [`compile_body`]: see that function and
/// [`translate::Translate::take_fragments`].
pub fn compile(
    expr: &ast::Expr,
    symbols: &mut SymbolTable,
    source: &str,
) -> Result<(Vec<Fragment>, Translate), WithSource<CompileError>> {
    let mut ctx = Compiler::new(expr, symbols, source)
        .debug()
        .translate()?
        .debug()
        .into_context();
    let fragments = ctx.take_fragments();
    Ok((fragments, ctx))
}

/// Canonicalize and select instructions for one procedure fragment. Pairs
/// naturally with [`compile`]'s output: callers iterate the fragment list,
/// skip `Fragment::Str` (which goes straight to the data-section emitter,
/// out of scope here), and call this once per `Fragment::Proc`, always
/// passing the *same* `ctx` that `compile` returned alongside the fragments
/// — canonicalization and instruction selection both mint fresh temps, and
/// reusing the context that built the fragment's body in the first place is
/// what keeps those fresh temps from colliding with ones already embedded
/// in the tree.
pub fn compile_body(body: ir::Stmt, ctx: &mut Translate) -> Vec<Instr> {
    let canonical = canon::canonicalize(body, ctx);
    debug!(println!("canonical IR: {:?}", &canonical));
    Selector::new(ctx).select(canonical)
}

/// Carries the pipeline's mutable [`Translate`] context across the two
/// stages of [`compile`] using a type-state parameter: `T` pins down which
/// transition is legal next, so a caller can't, say, ask for fragments
/// before translation has run.
struct Compiler<'a, T> {
    symbols: &'a mut SymbolTable,
    source: &'a str,
    state: T,
}

impl<'a> Compiler<'a, &'a ast::Expr> {
    fn new(expr: &'a ast::Expr, symbols: &'a mut SymbolTable, source: &'a str) -> Self {
        Compiler {
            symbols,
            source,
            state: expr,
        }
    }

    fn translate(self) -> Result<Compiler<'a, Translate>, WithSource<CompileError>> {
        let ctx = semant::translate_program(self.state, self.symbols, self.source)?;
        Ok(Compiler {
            symbols: self.symbols,
            source: self.source,
            state: ctx,
        })
    }
}

impl<'a> Compiler<'a, Translate> {
    fn into_context(self) -> Translate {
        self.state
    }
}

impl<'a, T> Compiler<'a, T> {
    /// Prints the pipeline's current state when `DEBUG=true` is set. `T`
    /// must support `Debug`-style introspection for this to say anything
    /// useful, so stages that hold non-`Debug` state (the AST reference,
    /// fragments) get a cheap textual summary instead of a full derive.
    fn debug(self) -> Self {
        debug!(eprintln!(
            "[tigerc] stage complete, {} source bytes",
            self.source.len()
        ));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn compile_accepts_a_lone_integer_literal() {
        let mut symbols = SymbolTable::new();
        let expr = Expr::Int(42, Default::default());
        let (fragments, _ctx) = compile(&expr, &mut symbols, "42").unwrap();
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn compile_body_produces_a_nonempty_instruction_stream() {
        let mut symbols = SymbolTable::new();
        let expr = Expr::Int(42, Default::default());
        let (fragments, mut ctx) = compile(&expr, &mut symbols, "42").unwrap();
        let mut saw_instrs = false;
        for fragment in fragments {
            if let Fragment::Proc { body, level: _ } = fragment {
                let instrs = compile_body(body, &mut ctx);
                saw_instrs |= !instrs.is_empty();
            }
        }
        assert!(saw_instrs);
    }
}
