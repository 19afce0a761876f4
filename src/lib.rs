//! UTL-X transformation engine
//!
//! A format-agnostic functional transformation language. A program reads
//! one or more inputs in heterogeneous formats (XML, JSON, YAML, CSV),
//! lifts them into the Universal Data Model, applies a pure-functional
//! script, and serializes the result into the chosen output format.
//!
//! The pipeline: source text → lexer → parser → AST, while each input
//! buffer goes through a format bridge into UDM. The tree-walking
//! interpreter evaluates the body over an environment preloaded with the
//! standard library and the named inputs, and the output bridge lowers the
//! resulting UDM back to bytes.
//!
//! The [`api`] module is the whole public surface consumed by the CLI and
//! other shells:
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! let program = utlx::api::compile(
//!     "%utlx 1.0\ninput json\noutput json\n---\n{doubled: $input.n * 2}",
//! )
//! .unwrap();
//! let mut inputs = HashMap::new();
//! inputs.insert("input".to_string(), br#"{"n":21}"#.to_vec());
//! let out = utlx::api::run(&program, &inputs, &utlx::api::RunOptions::default()).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), r#"{"doubled":42}"#);
//! ```

pub mod api;
pub mod error;
pub mod formats;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod stdlib;
pub mod udm;

pub use api::{compile, run, validate, RunOptions};
pub use error::{Diagnostic, Diagnostics, ErrorKind, Position, Span};
pub use udm::Udm;
