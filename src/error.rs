//! The crate's internal error currency. Both the compiler and the VM raise
//! `Error`; [`crate::interpret`] collapses it into the three-valued
//! `InterpretResult` the public surface exposes, but the richer variants
//! stay available to embedders who call [`crate::Vm::interpret`] directly.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum Error {
    /// A syntax or static-semantics error caught during compilation.
    /// Rendered as `[line N] Error at 'LEXEME': message` (or `at end`).
    #[error("[line {line}] Error{where_}: {message}")]
    Compile {
        line: usize,
        where_: String,
        message: String,
    },

    /// A failure raised while executing already-compiled bytecode.
    /// `trace` holds one `[line L] in FNAME` entry per active call frame,
    /// innermost first.
    #[error("{message}\n{}", trace.join("\n"))]
    Runtime { message: String, trace: Vec<String> },
}

impl Error {
    pub fn compile_at_end(line: usize, message: impl Into<String>) -> Self {
        Error::Compile {
            line,
            where_: " at end".to_string(),
            message: message.into(),
        }
    }

    pub fn compile_at(line: usize, lexeme: &str, message: impl Into<String>) -> Self {
        Error::Compile {
            line,
            where_: format!(" at '{}'", lexeme),
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>, trace: Vec<String>) -> Self {
        Error::Runtime {
            message: message.into(),
            trace,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_renders_lexeme() {
        let err = Error::compile_at(3, "+", "Expect expression.");
        assert_eq!(err.to_string(), "[line 3] Error at '+': Expect expression.");
    }

    #[test]
    fn compile_error_renders_at_end() {
        let err = Error::compile_at_end(5, "Expect ';' after value.");
        assert_eq!(err.to_string(), "[line 5] Error at end: Expect ';' after value.");
    }

    #[test]
    fn runtime_error_joins_trace() {
        let err = Error::runtime(
            "Undefined variable 'x'.",
            vec!["[line 2] in script".to_string()],
        );
        assert_eq!(err.to_string(), "Undefined variable 'x'.\n[line 2] in script");
    }
}
