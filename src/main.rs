use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::interpreter::{Interpreter, InterpreterConfig, DEFAULT_MAX_CALL_DEPTH};
use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::{scan_tokens, Scanner};
use rox::{ErrorKind, Lox, LoxError};

/// Exit code for syntax and static errors.
const EXIT_DATA_ERROR: i32 = 65;

/// Exit code for runtime errors.
const EXIT_SOFTWARE: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Rox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Maximum nesting of calls before reporting a stack overflow
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

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs a program from a file, or starts an interactive prompt
    Run { filename: Option<PathBuf> },
}

/// Reads the contents of a file into a String
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger(to_file: bool) -> Result<()> {
    if !to_file {
        // RUST_LOG still works; silent by default.
        Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
        return Ok(());
    }

    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn exit_code(err: &LoxError) -> i32 {
    match err.kind() {
        ErrorKind::Syntax | ErrorKind::Static => EXIT_DATA_ERROR,
        _ => EXIT_SOFTWARE,
    }
}

/// Report `err` on stderr and exit with the code matching its stage.
fn fail(err: LoxError) -> ! {
    debug!("Failing with: {:?}", err);
    eprintln!("{}", err);
    std::process::exit(exit_code(&err));
}

fn repl(lox: &mut Lox) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    print!("> ");
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;

        match lox.run(&line) {
            Ok(Some(value)) => println!("{}", value),
            Ok(None) => {}
            Err(e) => eprintln!("{}", e),
        }

        print!("> ");
        stdout.flush()?;
    }

    println!();
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    init_logger(args.log)?;

    info!("CLI arguments: {:?}", args);

    let config = InterpreterConfig {
        max_call_depth: args.max_depth,
    };

    match args.commands {
        Commands::Tokenize { filename, json } => {
            let source = read_file(&filename)?;
            let (tokens, errors) = Scanner::new(&source).scan_all();

            for e in &errors {
                eprintln!("{}", e);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&tokens)?);
            } else {
                for token in &tokens {
                    println!("{}", token);
                }
            }

            if !errors.is_empty() {
                debug!("Tokenization failed, exiting with code {}", EXIT_DATA_ERROR);
                std::process::exit(EXIT_DATA_ERROR);
            }
        }

        Commands::Parse { filename } => {
            let source = read_file(&filename)?;
            let tokens = scan_tokens(&source).unwrap_or_else(|e| fail(e));

            match Parser::new(&tokens).parse_expression() {
                Ok(expr) => println!("{}", AstPrinter.print(&expr)),
                Err(e) => fail(e),
            }
        }

        Commands::Evaluate { filename } => {
            let source = read_file(&filename)?;
            let tokens = scan_tokens(&source).unwrap_or_else(|e| fail(e));
            let expr = Parser::new(&tokens)
                .parse_expression()
                .unwrap_or_else(|e| fail(e));

            let locals = Resolver::new()
                .resolve_expression(&expr)
                .unwrap_or_else(|e| fail(e));

            let mut interpreter = Interpreter::new().with_config(config);
            interpreter.absorb(locals);

            match interpreter.evaluate(&expr) {
                Ok(value) => println!("{}", value),
                Err(e) => fail(e),
            }
        }

        Commands::Run { filename } => {
            let mut lox = Lox::with_interpreter(Interpreter::new().with_config(config));

            match filename {
                Some(filename) => {
                    let source = read_file(&filename)?;

                    if let Err(e) = lox.run(&source) {
                        fail(e);
                    }

                    info!("Program executed successfully");
                }

                None => {
                    info!("No file given, starting prompt");
                    repl(&mut lox)?;
                }
            }
        }
    }

    Ok(())
}
