//! Small helpers shared across the crate: the opaque source-position type and
//! the debug-dump macro used by the pipeline stages.

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Macro that can wrap any body, and only executes the body if we are running
/// in debug mode. Debug mode is enabled by setting the environment variable
/// `DEBUG=true`. This compiles away to nothing when `--release` is used.
///
/// ```
/// use tigerc::debug;
/// debug!(println!("Hello!"));
/// ```
#[macro_export]
macro_rules! debug {
    ($arg:expr) => {
        #[cfg(debug_assertions)]
        {
            if let Ok(debug_val) = std::env::var("DEBUG") {
                if debug_val.to_lowercase().as_str() == "true" {
                    $arg
                }
            }
        }
    };
}

/// An opaque source position. The lexer/parser (out of scope for this crate)
/// is the only thing that should ever construct one of these from real
/// source text; everywhere else it's just threaded through as a tag for
/// error messages.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// A placeholder position for hand-built ASTs (tests, desugared trees
    /// that don't originate from a single source location).
    pub fn dummy() -> Self {
        Self { line: 0, col: 0 }
    }
}

impl Display for Pos {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
