use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use humansize::{format_size, BINARY};
use portpack::error::{EXIT_FAILURES, EXIT_MAPPING};
use portpack::{
    AcceptAll, Artifact, BuildOptions, DecisionSource, IgnoreOracle, Outcome, OverwriteAll,
    OverwritePolicy, PackError, ProjectConfig, ReconstructOptions, TerminalPrompt,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Package selected project files into a portable artifact, with reversible redaction",
    long_about = None
)]
struct Args {
    /// Show debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select files and write an artifact plus its selection record
    Build {
        /// Project root to package
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Artifact to write (defaults to <project>.portpack.json)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Mapping specification with substitutions to apply
        #[arg(long, short)]
        mapping: Option<PathBuf>,

        /// Include VCS metadata (.git, .gitignore, ...)
        #[arg(long, overrides_with = "no_include_vcs")]
        include_vcs: bool,

        /// Leave VCS metadata out even if portpack.toml includes it
        #[arg(long, overrides_with = "include_vcs")]
        no_include_vcs: bool,

        /// Include files matched by ignore rules
        #[arg(long, overrides_with = "no_include_ignored")]
        include_ignored: bool,

        /// Leave ignored files out even if portpack.toml includes them
        #[arg(long, overrides_with = "include_ignored")]
        no_include_ignored: bool,

        /// How ignore rules are evaluated
        #[arg(long, value_enum)]
        ignore_oracle: Option<IgnoreOracle>,

        /// Include every eligible file without asking
        #[arg(long, short)]
        all: bool,

        /// Do not write the selection record
        #[arg(long)]
        no_record: bool,
    },

    /// Rebuild files from an artifact
    Reconstruct {
        /// Artifact to read
        artifact: PathBuf,

        /// Original mapping specification, to restore substituted values
        #[arg(long, short)]
        mapping: Option<PathBuf>,

        /// Directory to write into
        #[arg(long, short, default_value = ".")]
        target: PathBuf,

        /// Overwrite existing files without asking
        #[arg(long, short)]
        yes: bool,
    },

    /// Show the files and tree stored in an artifact
    List {
        /// Artifact to read
        artifact: PathBuf,
    },
}

/// Resolve a `--flag`/`--no-flag` pair; `None` when neither was given.
fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "portpack=debug" } else { "portpack=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[allow(clippy::too_many_arguments)]
fn run_build(
    root: PathBuf,
    output: Option<PathBuf>,
    mapping: Option<PathBuf>,
    include_vcs: Option<bool>,
    include_ignored: Option<bool>,
    ignore_oracle: Option<IgnoreOracle>,
    all: bool,
    no_record: bool,
) -> Result<i32> {
    let config = ProjectConfig::load(&root)?;
    let project = portpack::pack::project_name(&root);

    let output = output
        .or(config.output)
        .unwrap_or_else(|| PathBuf::from(format!("{}.portpack.json", project)));
    let mut options = BuildOptions::new(&root, &output);
    options.mapping = mapping.or(config.mapping);
    options.include_vcs = include_vcs.unwrap_or(config.include_vcs);
    options.include_ignored = include_ignored.unwrap_or(config.include_ignored);
    options.ignore_oracle = ignore_oracle.or(config.ignore_oracle).unwrap_or_default();
    options.write_record = !no_record;
    options.progress = true;

    let mut source: Box<dyn DecisionSource> = if all {
        Box::new(AcceptAll)
    } else {
        Box::new(TerminalPrompt::new())
    };

    let summary = portpack::build(&options, source.as_mut())
        .with_context(|| format!("Failed to package {}", root.display()))?;

    println!(
        "{} {} files ({}) into {}",
        "Packaged".green().bold(),
        summary.files,
        format_size(summary.total_bytes, BINARY),
        summary.output.display()
    );
    if let Some(record_path) = &summary.record_path {
        println!("Selection record: {}", record_path.display());
    }
    for failure in &summary.failures {
        eprintln!("{} {}: {}", "Failed".red().bold(), failure.path, failure.error);
    }

    Ok(if summary.failures.is_empty() { 0 } else { EXIT_FAILURES })
}

fn run_reconstruct(
    artifact: PathBuf,
    mapping: Option<PathBuf>,
    target: PathBuf,
    yes: bool,
) -> Result<i32> {
    let options = ReconstructOptions {
        artifact,
        mapping,
        target,
    };
    let mut policy: Box<dyn OverwritePolicy> = if yes {
        Box::new(OverwriteAll)
    } else {
        Box::new(TerminalPrompt::new())
    };

    let report = portpack::reconstruct(&options, policy.as_mut())
        .with_context(|| format!("Failed to reconstruct {}", options.artifact.display()))?;

    for file in &report.files {
        match &file.outcome {
            Outcome::Written => println!("{} {}", "wrote".green(), file.path),
            Outcome::Skipped => println!("{} {} (already exists)", "skipped".yellow(), file.path),
            Outcome::Failed(err) => eprintln!("{} {}: {}", "failed".red().bold(), file.path, err),
        }
    }
    for (path, ambiguity) in &report.ambiguities {
        eprintln!(
            "{} {}: '{}' restored as '{}', could not restore {:?}",
            "ambiguous".yellow().bold(),
            path,
            ambiguity.placeholder,
            ambiguity.kept,
            ambiguity.dropped
        );
    }
    println!(
        "{} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failed()
    );

    Ok(if report.failed() == 0 { 0 } else { EXIT_FAILURES })
}

fn run_list(artifact: PathBuf) -> Result<i32> {
    let artifact = Artifact::read(&artifact)
        .with_context(|| format!("Failed to read {}", artifact.display()))?;

    println!("{} {} ({})", "Project".bold(), artifact.project, artifact.created);
    let mut failed = false;
    for entry in &artifact.files {
        match entry.decode() {
            Ok(content) => println!(
                "{:>10}  {}",
                format_size(content.len() as u64, BINARY),
                entry.path
            ),
            Err(err) => {
                failed = true;
                eprintln!("{} {}", "invalid".red().bold(), err);
            }
        }
    }
    println!();
    print!("{}", artifact.tree_description());

    Ok(if failed { EXIT_FAILURES } else { 0 })
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PackError>())
        .map(PackError::exit_code)
        .unwrap_or(EXIT_FAILURES)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = match args.command {
        Command::Build {
            root,
            output,
            mapping,
            include_vcs,
            no_include_vcs,
            include_ignored,
            no_include_ignored,
            ignore_oracle,
            all,
            no_record,
        } => run_build(
            root,
            output,
            mapping,
            flag_pair(include_vcs, no_include_vcs),
            flag_pair(include_ignored, no_include_ignored),
            ignore_oracle,
            all,
            no_record,
        ),
        Command::Reconstruct {
            artifact,
            mapping,
            target,
            yes,
        } => run_reconstruct(artifact, mapping, target, yes),
        Command::List { artifact } => run_list(artifact),
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            let code = exit_code_for(&err);
            if code == EXIT_MAPPING {
                eprintln!("Check the mapping specification format: {{\"map\": [{{\"scope\": \".\", \"list\": [{{\"from\": \"to\"}}]}}]}}");
            }
            ExitCode::from(code as u8)
        }
    }
}
