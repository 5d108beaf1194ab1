//! A small Lisp that compiles to JavaScript.
//!
//! Source text is read into forms, forms are compiled into VOPs, and VOPs
//! are either written out as JavaScript or evaluated on the embedded
//! machine. Macros are ordinary functions from forms to forms; a macro
//! becomes usable once the unit defining it has been evaluated.

#[macro_use]
mod macros;

pub mod location;
pub mod error;
pub mod mangle;
pub mod form;
pub mod token;
pub mod lexer;
pub mod parser;
pub mod vop;
pub mod value;
pub mod macro_table;
pub mod machine;
pub mod eval;
pub mod compiler;
pub mod quasiquote;
pub mod emitter;
pub mod recipes;

pub use error::Error;
pub use recipes::{Config, Session};
