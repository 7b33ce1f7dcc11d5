use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rulox as lox;

use lox::ast::ExprId;
use lox::ast_printer::AstPrinter;
use lox::error::LoxError;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::{self, Scanner};
use lox::token::Token;
use lox::value::Value;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script to run; starts an interactive prompt when omitted
    script: Option<PathBuf>,

    /// Enable logging to rulox.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Emit tokens as JSON instead of the plain-text dump
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file and prints the program back in source form
    Parse { filename: PathBuf },

    /// Runs a script, or starts an interactive prompt when no file is given
    Run { filename: Option<PathBuf> },
}

/// Map a script into memory and borrow it as UTF-8 text.
///
/// Scripts are read-only for the process lifetime, so a shared mapping is
/// enough; empty files skip the mapping since zero-length maps are refused
/// on some platforms.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    let len = file
        .metadata()
        .context(format!("Failed to stat file {:?}", filename))?
        .len();

    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the mapping is read-only and dropped before the file handle.
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    let text = std::str::from_utf8(&mmap)
        .context(format!("File {:?} is not valid UTF-8", filename))?
        .to_owned();

    info!("Read {} bytes from {:?}", text.len(), filename);

    Ok(text)
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("rulox.log").context("Failed to create rulox.log")?;

    // Configure env_logger to write to file with module path and source line
    Builder::new()
        .format(|buf, record| {
            // Strip 'rulox::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rulox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
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

    info!("Logger initialized, writing to rulox.log");
    Ok(())
}

// ───────────────────────────── native functions ─────────────────────────────
//
// The interpreter core only exposes the injection point; the actual
// implementations live out here with the rest of the process plumbing.

fn native_clock(_args: &[Value]) -> std::result::Result<Value, String> {
    let timestamp: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}

fn native_read_file(args: &[Value]) -> std::result::Result<Value, String> {
    let (Value::Str(path), Value::Str(mode)) = (&args[0], &args[1]) else {
        return Err("read_file expects a path string and a mode string.".to_string());
    };

    if mode != "r" {
        return Err(format!("Unsupported file mode '{}'.", mode));
    }

    std::fs::read_to_string(path)
        .map(Value::Str)
        .map_err(|e| format!("Failed to read file '{}': {}", path, e))
}

fn install_natives(interpreter: &mut Interpreter) {
    interpreter.define_native("clock", 0, native_clock);
    interpreter.define_native("read_file", 2, native_read_file);
}

// ─────────────────────────────── run pipeline ───────────────────────────────

fn report_and_exit(errors: &[LoxError]) -> ! {
    for e in errors {
        eprintln!("{}", e);
    }

    // Every error in one batch shares a stage, so the first code stands for
    // all of them.
    process::exit(errors.first().map_or(65, LoxError::exit_code));
}

fn run_file(path: &Path) -> Result<()> {
    let source = read_file(path)?;

    let tokens: Vec<Token> = match scanner::scan(&source) {
        Ok(tokens) => tokens,
        Err(errors) => report_and_exit(&errors),
    };

    let mut parser = Parser::new(&tokens);
    let statements = match parser.parse() {
        Ok(statements) => statements,
        Err(errors) => report_and_exit(&errors),
    };

    let locals = match Resolver::new().resolve(&statements) {
        Ok(locals) => locals,
        Err(e) => report_and_exit(&[e]),
    };

    let mut interpreter = Interpreter::new();
    install_natives(&mut interpreter);
    interpreter.add_resolutions(locals);

    if let Err(e) = interpreter.interpret(&statements) {
        eprintln!("{}", e);
        process::exit(e.exit_code());
    }

    Ok(())
}

/// Read-eval-print loop: one line per iteration, persistent interpreter.
///
/// Errors are reported and the prompt continues.  Expression ids are handed
/// out monotonically across lines so resolver tables never collide.
fn run_prompt() -> Result<()> {
    let mut interpreter = Interpreter::new();
    install_natives(&mut interpreter);

    let mut next_id: ExprId = 0;
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF (ctrl-d)
        }

        if line.trim().is_empty() {
            continue;
        }

        run_line(&mut interpreter, &line, &mut next_id);
    }

    Ok(())
}

fn run_line(interpreter: &mut Interpreter, source: &str, next_id: &mut ExprId) {
    let tokens: Vec<Token> = match scanner::scan(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            for e in errors {
                eprintln!("{}", e);
            }
            return;
        }
    };

    let mut parser = Parser::with_base_id(&tokens, *next_id);
    let parsed = parser.parse();
    *next_id = parser.id_high_water();

    let statements = match parsed {
        Ok(statements) => statements,
        Err(errors) => {
            for e in errors {
                eprintln!("{}", e);
            }
            return;
        }
    };

    let locals = match Resolver::new().resolve(&statements) {
        Ok(locals) => locals,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    interpreter.add_resolutions(locals);

    if let Err(e) = interpreter.interpret(&statements) {
        eprintln!("{}", e);
    }
}

// ─────────────────────────────── subcommands ────────────────────────────────

fn tokenize_command(filename: &Path, json: bool) -> Result<()> {
    info!("Running Tokenize subcommand");

    let source = read_file(filename)?;

    let mut tokens: Vec<Token> = Vec::new();
    let mut errored = false;

    for item in Scanner::new(&source) {
        match item {
            Ok(token) => {
                debug!("Scanned token: {}", token);

                tokens.push(token);
            }

            Err(e) => {
                errored = true;
                eprintln!("{}", e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    if errored {
        debug!("Tokenization failed, exiting with code 65");

        process::exit(65);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse_command(filename: &Path) -> Result<()> {
    info!("Running Parse subcommand");

    let source = read_file(filename)?;

    let tokens: Vec<Token> = match scanner::scan(&source) {
        Ok(tokens) => tokens,
        Err(errors) => report_and_exit(&errors),
    };

    match Parser::new(&tokens).parse() {
        Ok(statements) => {
            println!("{}", AstPrinter::print_program(&statements));
        }

        Err(errors) => report_and_exit(&errors),
    }

    info!("Parse subcommand completed");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.command {
        Some(Commands::Tokenize { filename, json }) => tokenize_command(&filename, json)?,

        Some(Commands::Parse { filename }) => parse_command(&filename)?,

        Some(Commands::Run { filename }) => match filename {
            Some(filename) => run_file(&filename)?,
            None => run_prompt()?,
        },

        None => match args.script {
            Some(script) => run_file(&script)?,
            None => run_prompt()?,
        },
    }

    Ok(())
}
