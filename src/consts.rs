//! Target-independent constants for the calling convention and frame layout.
//! A real backend would make these configurable per target; this core fixes
//! one abstract target.

/// Size in bytes of a machine word (and so of every frame slot, array
/// element, and record field).
pub const WORD_SIZE: i32 = 8;

/// Number of arguments passed in registers before spilling to outgoing-arg
/// stack slots.
pub const ARG_REGS: usize = 6;

/// The reserved internal name used for the upper bound of a desugared `for`
/// loop. Chosen to be un-writable by user source (the parser, out of scope
/// here, is expected to reject identifiers containing this shape).
pub const FOR_LIMIT_NAME: &str = "$limit";

/// Names of the standard library routines the runtime must provide.
pub const RUNTIME_INIT_ARRAY: &str = "initArray";
pub const RUNTIME_ALLOC_RECORD: &str = "allocRecord";
pub const RUNTIME_STRING_EQUAL: &str = "stringEqual";
pub const RUNTIME_STRING_LESS: &str = "stringLess";
