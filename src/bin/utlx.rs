//! UTL-X command line interface
//!
//! A thin shell over the engine API: argument parsing, file I/O, and
//! diagnostic rendering live here; everything else is `utlx::api`.
//! Transformed output goes to stdout (or `-o`), diagnostics go to stderr,
//! and the process exits 0 on success and 1 on any failure.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use utlx::api::{self, RunOptions};
use utlx::formats::Format;
use utlx::interpreter::CancelToken;

#[derive(Parser, Debug)]
#[command(name = "utlx", version, about = "Format-agnostic data transformation")]
struct Args {
    /// Path to the UTL-X script
    script: PathBuf,

    /// Payload for the single unnamed input; stdin when omitted
    input: Option<PathBuf>,

    /// Payload for a named input, as name=path; repeatable
    #[arg(short = 'i', long = "input", value_name = "NAME=PATH")]
    named_inputs: Vec<String>,

    /// Write output here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Check the script and report diagnostics without running it
    #[arg(long)]
    validate: bool,

    /// Override the script's declared output format
    #[arg(long, value_name = "FORMAT")]
    format: Option<String>,

    /// Seed the random source for reproducible runs
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Abort evaluation after this many milliseconds
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            report(&failure);
            ExitCode::FAILURE
        }
    }
}

struct Failure {
    rendered: Vec<String>,
}

impl Failure {
    fn plain(message: impl Into<String>) -> Failure {
        Failure {
            rendered: vec![message.into()],
        }
    }
}

fn run(args: &Args) -> Result<(), Failure> {
    let source = std::fs::read_to_string(&args.script)
        .map_err(|err| Failure::plain(format!("cannot read {}: {}", args.script.display(), err)))?;

    if args.validate {
        let diagnostics = api::validate(&source);
        if diagnostics.is_empty() {
            return Ok(());
        }
        return Err(Failure {
            rendered: diagnostics.items.iter().map(|d| d.render(&source)).collect(),
        });
    }

    let program = api::compile(&source).map_err(|diagnostics| Failure {
        rendered: diagnostics.items.iter().map(|d| d.render(&source)).collect(),
    })?;

    let inputs = gather_inputs(args, &program)?;

    let cancel = CancelToken::new();
    if let Some(millis) = args.timeout {
        let watchdog = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(millis));
            watchdog.cancel();
        });
    }

    let output_format = match &args.format {
        Some(name) => Some(
            name.parse::<Format>()
                .map_err(|diag| Failure::plain(diag.to_string()))?,
        ),
        None => None,
    };

    let options = RunOptions {
        cancel,
        seed: args.seed,
        output_format,
        ..RunOptions::default()
    };

    let output = api::run(&program, &inputs, &options).map_err(|diag| Failure {
        rendered: vec![diag.render(&source)],
    })?;

    match &args.output {
        Some(path) => std::fs::write(path, output)
            .map_err(|err| Failure::plain(format!("cannot write {}: {}", path.display(), err)))?,
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&output)
                .and_then(|_| handle.write_all(b"\n"))
                .map_err(|err| Failure::plain(format!("cannot write output: {}", err)))?;
        }
    }
    Ok(())
}

fn gather_inputs(args: &Args, program: &utlx::parser::Program) -> Result<HashMap<String, Vec<u8>>, Failure> {
    let mut inputs = HashMap::new();

    for pair in &args.named_inputs {
        let (name, path) = pair.split_once('=').ok_or_else(|| {
            Failure::plain(format!("`-i {}` is not of the form name=path", pair))
        })?;
        let bytes = std::fs::read(path)
            .map_err(|err| Failure::plain(format!("cannot read {}: {}", path, err)))?;
        inputs.insert(name.to_string(), bytes);
    }

    // The unnamed input comes from the positional file, or stdin
    let needs_unnamed = program.inputs.iter().any(|decl| decl.name.is_none());
    if needs_unnamed && !inputs.contains_key("input") {
        let bytes = match &args.input {
            Some(path) => std::fs::read(path)
                .map_err(|err| Failure::plain(format!("cannot read {}: {}", path.display(), err)))?,
            None => {
                let mut buffer = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut buffer)
                    .map_err(|err| Failure::plain(format!("cannot read stdin: {}", err)))?;
                buffer
            }
        };
        inputs.insert("input".to_string(), bytes);
    }
    Ok(inputs)
}

fn report(failure: &Failure) {
    let choice = if atty::is(atty::Stream::Stderr) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stderr = StandardStream::stderr(choice);
    for rendered in &failure.rendered {
        let mut lines = rendered.lines();
        if let Some(first) = lines.next() {
            let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
            let _ = writeln!(stderr, "{}", first);
            let _ = stderr.reset();
        }
        for line in lines {
            let _ = writeln!(stderr, "{}", line);
        }
    }
}
