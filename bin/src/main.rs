mod logging;
mod repl;

use std::{
    borrow::Cow,
    error::Error as _,
    fmt,
    fs,
    io::{self, Read},
    path::PathBuf,
    process,
};

use clap::Parser;
use lispjs::{
    Config,
    Session,
    emitter::{Emit, PRELUDE},
    machine::DEFAULT_CALL_DEPTH_LIMIT,
    parser::DEFAULT_NEST_LIMIT,
    recipes::Stage,
    value::Value,
};
use rustyline::error::ReadlineError;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Inline(String),
    Stdin,
    File(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => write!(f, "<inline>"),
            Self::Stdin => write!(f, "<stdin>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Source {
    fn from_path(path: PathBuf) -> Self {
        if path.as_os_str() == "-" { Self::Stdin } else { Self::File(path) }
    }

    fn read(&self) -> Result<Cow<'_, str>, Error> {
        match self {
            Self::Inline(text) => Ok(Cow::Borrowed(&text[..])),
            Self::Stdin => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(ErrorKind::from)
                    .map_err(|kind| self.error(kind))?;
                Ok(Cow::Owned(buf))
            },
            Self::File(path) => {
                let buf = fs::read_to_string(path)
                    .map_err(ErrorKind::from)
                    .map_err(|kind| self.error(kind))?;
                Ok(Cow::Owned(buf))
            },
        }
    }

    fn error(&self, kind: ErrorKind) -> Error {
        Error { source: self.clone(), kind }
    }

    fn lang_error(&self, error: &lispjs::Error, code: &str) -> Error {
        let diagnostic = error.diagnose(code);
        self.error(ErrorKind::Lang(diagnostic.trim_end().to_owned()))
    }
}

#[derive(Debug, Error)]
#[error("{source}: {kind}")]
struct Error {
    source: Source,
    #[source]
    kind: ErrorKind,
}

#[derive(Debug, Error)]
enum ErrorKind {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Readline(#[from] ReadlineError),
    #[error("{0}")]
    Lang(String),
}

/// Compiles a small Lisp to JavaScript, or runs it directly.
#[derive(Debug, clap::Parser)]
#[clap(version)]
struct Cli {
    /// Source files loaded in order, one unit each; `-` reads standard
    /// input.
    files: Vec<PathBuf>,
    /// Code run after the files, one unit per occurrence.
    #[clap(short = 'e', long = "eval", value_name = "CODE")]
    code: Vec<String>,
    /// Prints JavaScript instead of evaluating.
    #[clap(short = 'S', long, conflicts_with = "interactive")]
    emit: bool,
    /// Prints the JavaScript helpers emitted code relies on first.
    #[clap(long, requires = "emit")]
    prelude: bool,
    /// Starts the REPL after loading; the default without sources.
    #[clap(short, long)]
    interactive: bool,
    /// Prints forms, VOPs and JavaScript of every unit.
    #[clap(long)]
    debug: bool,
    #[clap(long, default_value_t = DEFAULT_NEST_LIMIT)]
    nest_limit: usize,
    #[clap(long, default_value_t = DEFAULT_CALL_DEPTH_LIMIT)]
    call_depth_limit: usize,
    /// Log filter, `RUST_LOG` syntax.
    #[clap(long, value_name = "LEVEL")]
    log: Option<String>,
}

/// Runs one unit, echoing intermediate results to standard error when
/// debugging.
pub(crate) fn run_unit(
    session: &mut Session,
    code: &str,
    debug: bool,
) -> Result<Value, lispjs::Error> {
    session.run_observed(code, |stage| {
        if !debug {
            return;
        }
        match stage {
            Stage::Read(forms) => {
                for form in forms {
                    eprintln!("form: {}", form.data);
                }
            },
            Stage::Compiled(vop) => {
                eprintln!("vop: {vop:?}");
                eprint!("js: {}", Emit::statements(vop));
            },
        }
    })
}

fn try_main(cli: Cli) -> Result<(), Error> {
    let config = Config {
        nest_limit: cli.nest_limit,
        call_depth_limit: cli.call_depth_limit,
    };
    let mut session = Session::new(config);

    let mut sources: Vec<_> = cli.files.into_iter().map(Source::from_path).collect();
    sources.extend(cli.code.into_iter().map(Source::Inline));
    let interactive = cli.interactive || (sources.is_empty() && !cli.emit);

    if cli.prelude {
        print!("{PRELUDE}");
    }

    for source in &sources {
        let code = source.read()?;
        debug!(%source, bytes = code.len(), "loading unit");
        if cli.emit {
            let text = session
                .emit(&code)
                .map_err(|error| source.lang_error(&error, &code))?;
            print!("{text}");
        } else {
            let value = run_unit(&mut session, &code, cli.debug)
                .map_err(|error| source.lang_error(&error, &code))?;
            if let Source::Inline(_) = source {
                println!("{value}");
            }
        }
    }

    if interactive {
        repl::run(&mut session, cli.debug)
            .map_err(ErrorKind::from)
            .map_err(|kind| Source::Stdin.error(kind))?;
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log.as_deref());
    if let Err(error) = try_main(cli) {
        eprintln!("{error}");
        let mut next = error.kind.source();
        while let Some(current) = next {
            eprintln!("Caused by:");
            eprintln!("  {current}");
            next = current.source();
        }
        process::exit(1);
    }
}
