//! The lexically scoped symbol tables. Both are
//! persistent maps (`im::HashMap`): entering a new scope is a cheap
//! `.clone()`, and leaving it is just dropping that clone and continuing
//! with the parent value — no explicit push/pop bookkeeping.

use crate::frame::{Access, Level};
use crate::symbol::Symbol;
use crate::temp::Label;
use crate::types::Ty;
use im::HashMap;

pub type TypeEnv = HashMap<Symbol, Ty>;

#[derive(Clone, Debug)]
pub enum EnvEntry {
    Var {
        access: Access,
        ty: Ty,
        /// The level whose frame `access` is relative to. A read from any
        /// other (nested) level must chain static links from the reading
        /// level up to this one before applying `access`.
        level: Level,
        /// `true` only for the implicit variable bound by a desugared
        /// `for` loop.
        read_only: bool,
    },
    Func {
        level: Level,
        label: Label,
        formals: Vec<Ty>,
        result: Ty,
    },
}

pub type ValueEnv = HashMap<Symbol, EnvEntry>;
