//! loxrs - a small, embeddable bytecode virtual machine for Lox
//!
//! loxrs compiles Lox source straight to bytecode (no intermediate AST) with
//! a single-pass Pratt parser, then executes it on a stack-based VM with
//! call frames, a global/local variable model, and an interned string table.
//!
//! # Quick Start
//!
//! ```
//! use loxrs::Vm;
//!
//! let mut vm = Vm::new();
//! vm.interpret("print 1 + 2;");
//! ```
//!
//! # Supported Lox Features
//!
//! ## Types
//! - `nil`, `bool`, `number` (f64), `string`
//!
//! ## Operators
//! - Arithmetic: `+` (also string concatenation), `-`, `*`, `/`
//! - Comparison: `==`, `!=`, `<`, `<=`, `>`, `>=`
//! - Boolean: `and`, `or` (short-circuiting), `!`
//!
//! ## Control Flow
//! - `if`/`else`
//! - `while` and `for` loops
//! - Block scoping with `{ }`
//!
//! ## Variables and Functions
//! - `var` declarations, global and block-scoped local
//! - `fun` declarations with first-class function values
//! - Recursive calls; no closures over non-global state, no classes
//!
//! ## Native Functions
//! - `clock()` ships by default; embedders can register more via
//!   [`Vm::register_native`]
//!
//! ## Resource Limits
//! - Configurable call-frame depth and value-stack size via [`Limits`]
//!
//! ## Output
//! - `print` always writes to the host's real stdout; it's also captured
//!   into an in-memory buffer an embedder can read back deterministically
//!   via [`Vm::take_print_output`] (and discard without reading via
//!   [`Vm::clear_print_buffer`])
//!
//! # Not Supported
//!
//! - Classes, inheritance, methods
//! - Closures that capture non-global enclosing scopes (upvalues)
//! - A CLI, REPL, or source file loader (embedders own that layer)
//! - Bytecode disassembly or a source-level debugger
//! - Persisted or incrementally recompiled bytecode

mod chunk;
mod compiler;
mod error;
mod natives;
mod operators;
mod scanner;
mod table;
mod value;
mod vm;

pub use error::{Error, Result};
pub use value::{NativeFn, Value};
pub use vm::{interpret, InterpretResult, Limits, Vm};
