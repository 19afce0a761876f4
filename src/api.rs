//! Engine API
//!
//! Pure functions for compiling and running UTL-X programs. This module
//! contains no I/O, CLI handling, or process exits; callers (the CLI, a
//! daemon, test harnesses) hand in source text plus input buffers and get
//! structured results back.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::{Diagnostic, Diagnostics, ErrorKind};
use crate::formats::{self, Format};
use crate::interpreter::{evaluate_program, CancelToken, EvalOptions};
use crate::parser::{parse_program, Program};
use crate::udm::Udm;

/// Per-run knobs threaded through to the evaluator and serializer
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Cooperative cancellation; a caller-side watchdog may flip it
    pub cancel: CancelToken,
    /// Override the per-run wall-clock snapshot
    pub clock: Option<chrono::DateTime<chrono::FixedOffset>>,
    /// Seed the `random*` source for reproducible runs
    pub seed: Option<u64>,
    /// Override the program's declared output format
    pub output_format: Option<Format>,
}

impl RunOptions {
    fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            cancel: self.cancel.clone(),
            clock: self.clock,
            seed: self.seed,
        }
    }
}

/// Compile source text into a program, collecting every diagnostic the
/// parser can recover to
pub fn compile(source: &str) -> Result<Program, Diagnostics> {
    parse_program(source)
}

/// Compile-check only; an empty batch means the source is well-formed
pub fn validate(source: &str) -> Diagnostics {
    match parse_program(source) {
        Ok(_) => Diagnostics::new(),
        Err(diagnostics) => diagnostics,
    }
}

/// Lift the declared inputs, evaluate the body, and hand back the result
/// before serialization
pub fn evaluate(
    program: &Program,
    inputs: &HashMap<String, Vec<u8>>,
    options: &RunOptions,
) -> Result<Udm, Diagnostic> {
    let mut lifted = Vec::with_capacity(program.inputs.len());
    for decl in &program.inputs {
        let name = decl.name.clone().unwrap_or_else(|| "input".to_string());
        let bytes = inputs.get(&name).ok_or_else(|| {
            Diagnostic::new(
                ErrorKind::FormatParse,
                format!("no payload provided for input `{}`", name),
            )
        })?;
        let format: Format = decl.format.parse()?;
        let value = formats::parse(format, bytes, &decl.options)?;
        lifted.push((name, value));
    }
    evaluate_program(program, &lifted, &options.eval_options())
}

/// Full run: evaluate, then serialize per the output directive (or the
/// caller's override)
pub fn run(
    program: &Program,
    inputs: &HashMap<String, Vec<u8>>,
    options: &RunOptions,
) -> Result<Vec<u8>, Diagnostic> {
    let value = evaluate(program, inputs, options)?;
    let format = match options.output_format {
        Some(format) => format,
        None => program.output.format.parse()?,
    };
    formats::serialize(format, &value, &program.output.options)
}

/// Stable fingerprint for caching compiled programs: the version tag and
/// the source text, hashed
pub fn canonical_fingerprint(program: &Program) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"utlx");
    hasher.update([
        program.version.0 as u8,
        program.version.1 as u8,
    ]);
    hasher.update(program.source.as_bytes());
    hasher.finalize().into()
}
