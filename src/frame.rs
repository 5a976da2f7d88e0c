//! The frame/level model. A [`Level`] is a
//! cheap-to-clone handle (`Rc`-backed) to a function activation's layout;
//! two `Level`s are the same level iff they share the same backing `Rc`.

use crate::consts::WORD_SIZE;
use crate::ir::{BinOp, Exp};
use crate::temp::{Label, Temp};
use std::cell::Cell;
use std::rc::Rc;

/// Where a variable lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// Byte offset from the frame pointer of the *defining* level.
    InFrame(i32),
    InReg(Temp),
}

#[derive(Debug)]
struct LevelInner {
    parent: Option<Level>,
    label: Label,
    /// Index 0 is always the implicit static link; the rest mirror the
    /// caller-supplied escape list in order.
    formals: Vec<Access>,
    /// Next free (more negative) local-slot offset; frames grow downward.
    next_local_offset: Cell<i32>,
}

/// A function's frame layout. Clone is `Rc::clone`, i.e. O(1) and aliases
/// the same frame.
#[derive(Clone, Debug)]
pub struct Level(Rc<LevelInner>);

impl Level {
    /// The sentinel level with no frame of its own. There is deliberately no
    /// public constructor other than [`crate::translate::Translate::outermost`];
    /// every real level's ancestry bottoms out at that single shared value.
    pub(crate) fn new_outermost(label: Label) -> Self {
        Level(Rc::new(LevelInner {
            parent: None,
            label,
            formals: Vec::new(),
            next_local_offset: Cell::new(0),
        }))
    }

    /// Allocate a new level nested under `parent`. `formal_escapes[i]` says
    /// whether the i-th *user* formal (not counting the implicit static
    /// link, which always escapes) must live in the frame.
    pub fn new(parent: Level, label: Label, formal_escapes: &[bool]) -> Self {
        let next_local_offset = Cell::new(0);
        let mut formals = Vec::with_capacity(formal_escapes.len() + 1);
        // The static link is formal 0 and always escapes.
        formals.push(Self::alloc_frame_slot(&next_local_offset));
        for _ in formal_escapes {
            // Every formal of a Tiger function is user-level data; this core
            // treats every one as escaping, same as every `var` local.
            formals.push(Self::alloc_frame_slot(&next_local_offset));
        }
        Level(Rc::new(LevelInner {
            parent: Some(parent),
            label,
            formals,
            next_local_offset,
        }))
    }

    fn alloc_frame_slot(next_local_offset: &Cell<i32>) -> Access {
        let offset = next_local_offset.get() - WORD_SIZE;
        next_local_offset.set(offset);
        Access::InFrame(offset)
    }

    /// Allocate storage for one more local in this frame. Escaping locals
    /// get a frame slot; non-escaping ones get a fresh register (this core
    /// always passes `escape: true` for `var` locals, but the non-escaping
    /// path is kept so an escape-analysis pass could plug in later.
    pub fn alloc_local(&self, escape: bool, new_temp: impl FnOnce() -> Temp) -> Access {
        if escape {
            Self::alloc_frame_slot(&self.0.next_local_offset)
        } else {
            Access::InReg(new_temp())
        }
    }

    /// All formals *except* the implicit static link, in declaration order.
    pub fn formals(&self) -> &[Access] {
        &self.0.formals[1..]
    }

    pub fn static_link_access(&self) -> Access {
        self.0.formals[0]
    }

    pub fn parent(&self) -> Option<&Level> {
        self.0.parent.as_ref()
    }

    pub fn label(&self) -> &Label {
        &self.0.label
    }

    pub fn same(a: &Level, b: &Level) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

/// Read the value at `access`, given the frame-pointer expression of the
/// level that *defines* the access (not necessarily the level currently
/// executing — the caller is responsible for static-link chaining, see
/// [`crate::translate::static_link_chain`]).
pub fn access_exp(access: Access, frame_ptr: Exp) -> Exp {
    match access {
        Access::InFrame(offset) => {
            Exp::mem(Exp::binop(BinOp::Plus, frame_ptr, Exp::Const(offset as i64)))
        }
        Access::InReg(t) => Exp::Temp(t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_link_is_always_the_first_formal_and_escapes() {
        let outer = Level::new_outermost(Label::named("tigermain"));
        let inner = Level::new(outer, Label::named("f"), &[false, true]);
        assert_eq!(
            inner.static_link_access(),
            Access::InFrame(-WORD_SIZE)
        );
        assert_eq!(inner.formals().len(), 2);
        // Every formal is frame-allocated, per this core's escape policy.
        for access in inner.formals() {
            assert!(matches!(access, Access::InFrame(_)));
        }
    }

    #[test]
    fn two_levels_are_never_the_same_even_with_identical_shape() {
        let outer = Level::new_outermost(Label::named("tigermain"));
        let a = Level::new(outer.clone(), Label::named("f"), &[]);
        let b = Level::new(outer, Label::named("f"), &[]);
        assert!(!Level::same(&a, &b));
        assert!(Level::same(&a, &a.clone()));
    }
}
