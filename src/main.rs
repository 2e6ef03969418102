use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::Result;
use std::path::{Path, PathBuf};
use std::{fs::read_to_string, process::ExitCode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DATA_ERROR: u8 = 65;
const SOFTWARE_ERROR: u8 = 70;

#[derive(Debug, Parser)]
#[clap(name = "lython", version)]
pub struct CLArgs {
    #[clap(subcommand)]
    pub routine: LythonCommand,
    /// Emit evaluator debug events to stderr.
    #[clap(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum LythonCommand {
    Tokenize {
        path: PathBuf,
        #[clap(long = "format", value_enum, default_value = "basic")]
        format: TokenFormat,
    },
    Parse {
        path: PathBuf,
        #[clap(long = "format", value_enum, default_value = "tree")]
        format: ModuleFormat,
    },
    Run {
        path: PathBuf,
        /// Active calls allowed before `RecursionError`.
        #[clap(long = "max-depth", default_value_t = 200)]
        max_depth: usize,
        /// File name shown in tracebacks. Defaults to the script path.
        #[clap(long = "file-name")]
        file_name: Option<String>,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum TokenFormat {
    Debug,
    Basic,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ModuleFormat {
    Debug,
    Tree,
}

fn main() -> ExitCode {
    lython_main().expect("Encountered an error!")
}

fn lython_main() -> Result<ExitCode> {
    color_eyre::install().expect("Can't fail at first call!");
    let args = CLArgs::parse();
    init_tracing(args.verbose);
    match args.routine {
        LythonCommand::Tokenize { path, format } => {
            eprintln!("Tokenizing {:?}...", path);
            let src = read_to_string(&path)?;
            if !tokenize(&src, &path, &format) {
                return Ok(ExitCode::from(DATA_ERROR));
            }
        }
        LythonCommand::Parse { path, format } => {
            eprintln!("Parsing {:?}...", path);
            let src = read_to_string(&path)?;
            if !parse(&src, &path, &format) {
                return Ok(ExitCode::from(DATA_ERROR));
            }
        }
        LythonCommand::Run {
            path,
            max_depth,
            file_name,
        } => {
            eprintln!("Running {:?}...", path);
            let src = read_to_string(&path)?;
            let file_name = file_name.unwrap_or_else(|| path.to_string_lossy().into_owned());
            return Ok(run(&src, &path, max_depth, &file_name));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("lython=debug"),
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}

fn tokenize(src: &str, path: &Path, format: &TokenFormat) -> bool {
    use lython::lexer::formatter::{DebugFormatter, LineFormatter, PrettyFormatter, TokenFormatter};
    use lython::lexer::{Lexer, TokenKind};

    let mut scanner = Lexer::new(src);
    let formatter: Box<dyn TokenFormatter> = match format {
        TokenFormat::Debug => Box::new(DebugFormatter),
        TokenFormat::Basic => Box::new(LineFormatter::new(src)),
    };
    let reporter = PrettyFormatter::new(src, path);
    let mut succeeded = true;
    loop {
        match scanner.next_token() {
            Ok(token) => {
                println!("{}", formatter.format(&token));
                if matches!(token.kind, TokenKind::Eof) {
                    return succeeded;
                }
            }
            Err(error) => {
                eprintln!("{}", reporter.format_error(&error));
                succeeded = false;
            }
        };
    }
}

fn parse(src: &str, path: &Path, format: &ModuleFormat) -> bool {
    use lython::parser::formatter::{ModuleFormatter, ParserFormatter, PrettyParserFormatter};
    use lython::parser::Parser;

    let mut parser = Parser::new(src);
    match parser.parse() {
        Ok(module) => {
            match format {
                ModuleFormat::Debug => println!("{module:?}"),
                ModuleFormat::Tree => print!("{}", ModuleFormatter.format(&module)),
            }
            true
        }
        Err(error) => {
            eprintln!("{}", PrettyParserFormatter::new(src, path).format_error(&error));
            false
        }
    }
}

fn run(src: &str, path: &Path, max_depth: usize, file_name: &str) -> ExitCode {
    use lython::interpreter::context::StdioContext;
    use lython::interpreter::formatter::{PrettyRuntimeFormatter, RuntimeFormatter};
    use lython::interpreter::{EvaluatorConfig, TreeEvaluator};
    use lython::parser::formatter::{ParserFormatter, PrettyParserFormatter};
    use lython::parser::Parser;
    use lython::resolver::formatter::{PrettyResolverFormatter, ResolverFormatter};
    use lython::resolver::Resolver;

    let module = match Parser::new(src).parse() {
        Ok(module) => module,
        Err(error) => {
            eprintln!("{}", PrettyParserFormatter::new(src, path).format_error(&error));
            return ExitCode::from(DATA_ERROR);
        }
    };
    if let Err(errors) = Resolver::new().resolve(&module) {
        let formatter = PrettyResolverFormatter::new(src, path);
        for error in errors.iter() {
            eprintln!("{}", formatter.format_error(error));
        }
        return ExitCode::from(DATA_ERROR);
    }

    let config = EvaluatorConfig {
        max_depth,
        file_name: file_name.into(),
    };
    let mut evaluator = TreeEvaluator::new(module, StdioContext, config);
    match evaluator.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", PrettyRuntimeFormatter::new(src, path).format_error(&error));
            ExitCode::from(SOFTWARE_ERROR)
        }
    }
}
