use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cup_cli::{evaluate, evaluate_in, CupError, Env, Value};
use cup_parse::{parse_str, tokenize};

/// Maximum source file size in bytes (1MB)
const MAX_SOURCE_SIZE: usize = 1_000_000;

/// Extensions accepted by `cup run`
const EXTENSIONS: &[&str] = &["cup", "cp", "u"];

/// Stack for the evaluator thread; every Cup call nests several Rust frames.
const EVAL_STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "cup")]
#[command(version, about = "Cup: a small indentation-structured scripting language")]
struct Cli {
    /// Log tokens, the AST and final bindings
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a Cup program and print its value
    Run {
        /// Path to a .cup, .cp or .u source file
        file: String,

        /// Output format for the program value
        #[arg(long, value_enum, default_value_t = ValueFormat::Display)]
        format: ValueFormat,
    },

    /// Interactive prompt that keeps bindings between inputs
    Repl,

    /// Parse a source file and dump the AST
    Parse {
        /// Path to source file
        file: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },

    /// Dump the token stream of a source file
    Tokens {
        /// Path to source file
        file: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ValueFormat {
    Display,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let handle = std::thread::Builder::new()
        .name("cup-eval".into())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(move || dispatch(cli))
        .context("failed to start evaluator thread")?;
    handle
        .join()
        .map_err(|_| anyhow!("evaluator thread panicked"))?
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { file, format } => cmd_run(&file, format, cli.verbose),
        Commands::Repl => cmd_repl(cli.verbose),
        Commands::Parse { file, format } => cmd_parse(&file, format),
        Commands::Tokens { file } => cmd_tokens(&file),
    }
}

fn load_source(path: &str) -> Result<String> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read source file '{path}'"))?;

    if src.len() > MAX_SOURCE_SIZE {
        bail!(
            "source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
    }
    Ok(src)
}

/// Print an evaluation failure; syntax errors get a caret under the column.
fn report(src: &str, err: &CupError) {
    match err {
        CupError::Syntax(e) => eprintln!("{}", e.render(src)),
        CupError::Runtime(e) => eprintln!("{e}"),
    }
}

fn cmd_run(file: &str, format: ValueFormat, verbose: bool) -> Result<()> {
    let ext = Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    if !EXTENSIONS.contains(&ext) {
        bail!("invalid file type for Cup (.cup, .cp, .u): '{file}'");
    }

    let src = load_source(file)?;
    log::debug!("running {file} ({} bytes)", src.len());

    match evaluate(&src, verbose) {
        Ok(value) => print_value(&value, format)?,
        Err(e) => {
            report(&src, &e);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn print_value(value: &Value, format: ValueFormat) -> Result<()> {
    match format {
        ValueFormat::Display => {
            if !matches!(value, Value::Null) {
                println!("{value}");
            }
        }
        ValueFormat::Json => println!("{}", serde_json::to_string(value)?),
    }
    Ok(())
}

fn cmd_repl(verbose: bool) -> Result<()> {
    println!(
        "Welcome to Cup {}! Type \"exit()\" to leave.",
        env!("CARGO_PKG_VERSION")
    );
    let mut env = Env::with_defaults();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        prompt("[Cup] ")?;
        let Some(line) = lines.next() else {
            break;
        };
        let mut input = line?;
        if input.trim().eq_ignore_ascii_case("exit()") {
            break;
        }

        // a block opener keeps reading until an empty line
        if input.trim_end().ends_with(':') {
            loop {
                prompt("[...] ")?;
                match lines.next() {
                    Some(next) => {
                        let next = next?;
                        if next.trim().is_empty() {
                            break;
                        }
                        input.push('\n');
                        input.push_str(&next);
                    }
                    None => break,
                }
            }
        }

        if input.trim().is_empty() {
            continue;
        }
        match evaluate_in(&input, &mut env, verbose) {
            Ok(value) => print_value(&value, ValueFormat::Display)?,
            Err(e) => report(&input, &e),
        }
    }
    Ok(())
}

fn prompt(text: &str) -> Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "{text}")?;
    stdout.flush()?;
    Ok(())
}

fn cmd_parse(file: &str, format: Format) -> Result<()> {
    let src = load_source(file)?;

    let program = match parse_str(&src) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e.render(&src));
            std::process::exit(1);
        }
    };

    match format {
        Format::Pretty => println!("{:#?}", program),
        Format::Json => println!("{}", serde_json::to_string_pretty(&program)?),
    }
    Ok(())
}

fn cmd_tokens(file: &str) -> Result<()> {
    let src = load_source(file)?;

    let toks = match tokenize(&src) {
        Ok(toks) => toks,
        Err(e) => {
            eprintln!("{}", e.render(&src));
            std::process::exit(1);
        }
    };

    for tok in toks {
        println!(
            "{}:{}\t{}\t{}",
            tok.span.line,
            tok.span.column,
            tok.kind.name(),
            tok.kind
        );
    }
    Ok(())
}
