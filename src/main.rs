use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rox as lox;

use lox::error::LoxError;
use lox::interpreter::{InterpreterConfig, DEFAULT_MAX_CALL_DEPTH};
use lox::scanner::Scanner;
use lox::token::Token;
use lox::Lox;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Maximum nesting of Lox function calls
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Runs input from a file as a Lox program
    Run { filename: PathBuf },

    /// Reads and runs one line at a time
    Repl,
}

/// Maps the file and validates it as UTF‑8.
fn read_source(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file: File =
        File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;

    let len: u64 = file
        .metadata()
        .with_context(|| format!("Failed to stat file {:?}", filename))?
        .len();

    // Mapping a zero-length file fails on some platforms.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the mapping is copied out immediately and never outlives `file`.
    let mmap: Mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map file {:?}", filename))?;

    let text: &str = std::str::from_utf8(&mmap)
        .map_err(LoxError::from)
        .with_context(|| format!("File {:?} is not valid UTF-8", filename))?;

    info!("Read {} bytes from {:?}", len, filename);

    Ok(text.to_owned())
}

fn read_source_or_exit(filename: &Path) -> String {
    match read_source(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(74);
        }
    }
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file: File = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module: &str = record.module_path().unwrap_or("<unnamed>");
            let module: &str = module.strip_prefix("rox::").unwrap_or(module);

            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Prints every error and returns the exit status for the worst of them.
fn report(errors: &[LoxError]) -> i32 {
    for e in errors {
        eprintln!("{}", e);
    }

    errors.iter().map(LoxError::exit_code).max().unwrap_or(0)
}

fn tokenize(source: &str, json: bool) -> Result<i32> {
    let (tokens, errors): (Vec<Token>, Vec<LoxError>) = Scanner::new(source).scan_all();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        serde_json::to_writer_pretty(&mut out, &tokens).context("Failed to write tokens")?;
        writeln!(out)?;
    } else {
        for token in &tokens {
            writeln!(out, "{}", token)?;
        }
    }

    if !errors.is_empty() {
        debug!("Tokenization failed with {} error(s)", errors.len());
    }

    Ok(report(&errors))
}

fn run_file(source: &str, config: InterpreterConfig) -> i32 {
    let mut lox: Lox<io::Stdout> = Lox::with_config(io::stdout(), config);

    match lox.run(source) {
        Ok(()) => {
            info!("Program executed successfully");
            0
        }
        Err(errors) => report(&errors),
    }
}

fn repl(config: InterpreterConfig) -> i32 {
    let mut lox: Lox<io::Stdout> = Lox::with_config(io::stdout(), config);
    let stdin = io::stdin();
    let mut line: String = String::new();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return 74;
        }

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                println!();
                return 0;
            }
            Ok(_) => {
                if let Err(errors) = lox.run(&line) {
                    report(&errors);
                }
            }
            Err(e) => {
                eprintln!("{}", e);
                return 74;
            }
        }
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Silent unless RUST_LOG asks otherwise.
        Builder::new()
            .filter_level(log::LevelFilter::Off)
            .parse_default_env()
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let config: InterpreterConfig = InterpreterConfig {
        max_call_depth: args.max_depth,
    };

    let code: i32 = match args.commands {
        Commands::Tokenize { filename, json } => {
            info!("Running Tokenize subcommand");
            let source: String = read_source_or_exit(&filename);
            tokenize(&source, json)?
        }

        Commands::Run { filename } => {
            info!("Running Run subcommand");
            let source: String = read_source_or_exit(&filename);
            run_file(&source, config)
        }

        Commands::Repl => {
            info!("Running Repl subcommand");
            repl(config)
        }
    };

    if code != 0 {
        debug!("Exiting with code {}", code);
        process::exit(code);
    }

    Ok(())
}
