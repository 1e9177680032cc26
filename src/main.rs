use clap::Parser;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use snowball_interp::runtime::Env;
use snowball_interp::snowball::{self, ast::Program, Config, DEFAULT_MAX_DEPTH};

/// Runs a compiled Snowball stemmer over words.
#[derive(Parser)]
struct Args {
    /// Program listing to load.
    path: PathBuf,
    /// Words to stem. Read one per line from stdin when none are given.
    words: Vec<String>,
    /// Print the parsed program instead of running it.
    #[arg(long)]
    print: bool,
    /// Deepest command nesting allowed before a run is abandoned.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
    /// Dump the register file after each word.
    #[arg(long)]
    registers: bool,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_writer(io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn dump_registers<W: Write>(w: &mut W, prog: &Program, env: &Env) -> io::Result<()> {
    use snowball::ast::NameKind;

    for name in prog.names.iter() {
        let Some(slot) = name.slot else { continue };
        match name.kind {
            NameKind::Integer => writeln!(w, "  {} = {}", name.name, env.integers[slot])?,
            NameKind::Boolean => writeln!(w, "  {} = {}", name.name, env.booleans[slot])?,
            NameKind::String => writeln!(w, "  {} = {:?}", name.name, env.strings[slot].to_string())?,
            _ => {}
        }
    }
    Ok(())
}

fn stem_all(args: &Args, prog: &Program) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config { max_depth: args.max_depth };
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut stem_one = |word: &str| -> Result<(), Box<dyn std::error::Error>> {
        let outcome = snowball::run(prog, word.as_bytes(), &config)?;
        writeln!(out, "{}", String::from_utf8_lossy(outcome.text()))?;
        if args.registers {
            dump_registers(&mut out, prog, &outcome.env)?;
        }
        Ok(())
    };

    if args.words.is_empty() {
        for line in io::stdin().lock().lines() {
            stem_one(line?.trim())?;
        }
    } else {
        for word in &args.words {
            stem_one(word)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let s = match fs::read_to_string(&args.path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {e}", args.path.display());
            return ExitCode::FAILURE;
        }
    };
    let prog = match snowball::parse(&s) {
        Ok(prog) => prog,
        Err(e) => {
            eprintln!("{}: {e}", args.path.display());
            return ExitCode::FAILURE;
        }
    };

    if args.print {
        if let Err(e) = snowball::print::write(io::stdout().lock(), &prog) {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    match stem_all(&args, &prog) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", args.path.display());
            ExitCode::FAILURE
        }
    }
}
