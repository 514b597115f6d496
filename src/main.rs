use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::info;

use minischeme::reader;
use minischeme::{Config, EvalError, Interpreter, Value};

/// A small Scheme interpreter with syntax objects and multiple values.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Evaluate a source file before anything else. May be repeated.
    #[arg(long = "load", value_name = "FILE")]
    load: Vec<PathBuf>,

    /// Treat define, let and letrec as ordinary identifiers.
    #[arg(long)]
    no_sugar: bool,

    /// Run this script and exit instead of starting a REPL.
    script: Option<PathBuf>,
}

/// Install a subscriber only when `RUST_LOG` is set.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_writer(io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let config = Config {
        sugar: !args.no_sugar,
        ..Config::default()
    };
    let mut interp = match Interpreter::new(config) {
        Ok(interp) => interp,
        Err(e) => {
            eprintln!("failed to initialize interpreter: {e}");
            return ExitCode::FAILURE;
        }
    };

    for path in &args.load {
        if let Err(e) = load_file(&mut interp, path) {
            eprintln!("Error loading {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    if let Some(script) = &args.script {
        return match load_file(&mut interp, script) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}: {e}", script.display());
                ExitCode::FAILURE
            }
        };
    }

    if io::stdin().is_terminal() {
        println!("minischeme {}", env!("CARGO_PKG_VERSION"));
        run_interactive(&mut interp);
    } else {
        run_piped(&mut interp);
    }
    ExitCode::SUCCESS
}

/// Evaluate a file form by form; the first error aborts.
fn load_file(interp: &mut Interpreter, path: &Path) -> Result<(), EvalError> {
    let source = std::fs::read_to_string(path)?;
    let start = Instant::now();
    let mut pos = 0;
    let mut count = 0;
    while let Some((expr, next)) = reader::read_one_at(&source, pos, &mut interp.heap, &mut interp.symbols)? {
        pos = next;
        count += 1;
        interp.eval(expr, interp.global_env())?;
    }
    interp.output().flush()?;
    info!(
        path = %path.display(),
        forms = count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loaded"
    );
    Ok(())
}

/// Interactive REPL: accumulate lines until brackets balance.
fn run_interactive(interp: &mut Interpreter) {
    let stdin = io::stdin();
    let mut buf = String::new();
    let mut depth: i32 = 0;

    loop {
        print!("{}", if depth == 0 { "> " } else { "  " });
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Read error: {e}");
                break;
            }
        }

        // Naive: brackets inside strings and comments also count.
        for ch in line.chars() {
            match ch {
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                _ => {}
            }
        }
        buf.push_str(&line);

        if depth <= 0 {
            depth = 0;
            let input = std::mem::take(&mut buf);
            if !input.trim().is_empty() {
                eval_and_print(interp, &input);
            }
        }
    }
    println!();
}

/// Piped mode: read everything, then evaluate and print one form at a time.
fn run_piped(interp: &mut Interpreter) {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        eprintln!("Read error: {e}");
        return;
    }
    eval_and_print(interp, &input);
}

/// Evaluate every form in `input`, printing each result. Errors are reported
/// and evaluation continues with the next form.
fn eval_and_print(interp: &mut Interpreter, input: &str) {
    let mut pos = 0;
    loop {
        match reader::read_one_at(input, pos, &mut interp.heap, &mut interp.symbols) {
            Ok(Some((expr, next))) => {
                pos = next;
                match interp.eval(expr, interp.global_env()) {
                    Ok(val) => print_result(interp, val),
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("{e}");
                break;
            }
        }
    }
}

fn print_result(interp: &mut Interpreter, val: Value) {
    let _ = interp.output().flush();
    match val {
        Value::Void => {}
        Value::MultipleValues => {
            for v in interp.take_values() {
                println!("{}", interp.write_string(v));
            }
        }
        other => println!("{}", interp.write_string(other)),
    }
}
