//! Creates the compilation artifacts file for other tools to leverage.

use clap::Parser;
use ethers_artifacts::{Project, ProjectPathsConfig, Solc};
use eyre::WrapErr;
use std::path::PathBuf;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Create compilation artifacts file for other tools to leverage.
#[derive(Debug, Parser)]
#[command(name = "ethers-artifacts", version, about)]
struct Opts {
    /// Directory that is searched for contract sources.
    #[arg(long, value_name = "DIR", default_value = "./")]
    contracts_directory: PathBuf,

    /// The artifacts file to create or update.
    ///
    /// Concurrent runs are serialized through a `<FILE>.lock` file next to it, which is kept.
    #[arg(long, value_name = "FILE", default_value = "./contracts.json")]
    artifacts_file: PathBuf,

    /// Path to the `solc` binary, defaults to `$SOLC_PATH` or `solc`.
    #[arg(long, value_name = "PATH")]
    solc: Option<PathBuf>,

    /// Increase logging verbosity, can be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Opts {
    fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR
        }
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

fn init_tracing(level: LevelFilter) {
    let filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> eyre::Result<()> {
    let opts = Opts::parse();
    init_tracing(opts.level());

    let paths = ProjectPathsConfig::builder()
        .root(&opts.contracts_directory)
        .artifacts(&opts.artifacts_file)
        .build()?;
    let solc = opts.solc.clone().map(Solc::new).unwrap_or_default();
    match solc.version() {
        Ok(version) => tracing::debug!("using solc {} at {}", version, solc.0.display()),
        Err(err) => tracing::debug!("could not determine solc version: {}", err),
    }

    let project = Project::builder().paths(paths).solc(solc).build()?;
    project.compile().wrap_err_with(|| {
        format!("failed to regenerate \"{}\"", opts.artifacts_file.display())
    })?;
    Ok(())
}
