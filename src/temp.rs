//! Temporaries and labels. Both are just small opaque handles; the
//! generators that mint fresh ones live on the [`crate::translate::Translate`]
//! context rather than behind a global counter, so two independent
//! compilations never collide on the same name.

use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

/// A symbolic register. `FRAME_POINTER`, `STACK_POINTER`, `RETURN_VALUE` and
/// the `ARG` registers are the reserved, non-generated temporaries the
/// instruction selector addresses by fixed identity; every
/// [`crate::frame::Access::InFrame`] is relative to `FRAME_POINTER`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Temp(u32);

impl Temp {
    pub const FRAME_POINTER: Temp = Temp(0);
    pub const STACK_POINTER: Temp = Temp(1);
    pub const RETURN_VALUE: Temp = Temp(2);

    /// One reserved temp per outgoing-argument register; the first
    /// [`crate::consts::ARG_REGS`] call arguments go in registers.
    pub fn arg_reg(index: usize) -> Temp {
        assert!(
            index < crate::consts::ARG_REGS,
            "internal error: argument register index out of range"
        );
        Temp(Self::FIRST_GENERATED - crate::consts::ARG_REGS as u32 + index as u32)
    }

    /// Instruction selection and the frame model never hand out these
    /// reserved ids, so a fresh-temp generator must start here.
    pub(crate) const FIRST_GENERATED: u32 = 3 + crate::consts::ARG_REGS as u32;

    pub(crate) fn from_raw(id: u32) -> Self {
        Temp(id)
    }
}

impl Display for Temp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Temp::FRAME_POINTER => write!(f, "FP"),
            Temp::STACK_POINTER => write!(f, "SP"),
            Temp::RETURN_VALUE => write!(f, "RV"),
            Temp(id) if id >= 3 && id < Self::FIRST_GENERATED => {
                write!(f, "a{}", id - 3)
            }
            Temp(id) => write!(f, "t{}", id),
        }
    }
}

/// A jump target. Cheap to clone; two labels are equal iff they name the
/// same point in the program.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(Rc<str>);

impl Label {
    /// A label with a fixed, externally meaningful name (a runtime routine,
    /// or a user function whose name must be link-visible).
    pub fn named(name: impl Into<Rc<str>>) -> Self {
        Label(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
