//! dredge - Recover class declarations from binary serialization streams
//!
//! This tool scans arbitrary files (save games, memory dumps, caches) for
//! embedded binary-serialized class metadata and writes one C# declaration
//! per recovered class.

mod overwrite;
mod registry;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser};
use dredge_core::{
    ClassSchema, RenderConfig, ScanMode, ScanStats, Scanner, ScannerConfig, StatsWriter,
};
use overwrite::OverwritePolicy;
use registry::{ClassRegistry, ConflictStrategy};
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Recover class declarations from binary serialization streams
#[derive(Parser, Debug)]
#[command(name = "dredge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    #[command(flatten)]
    mode: ModeArgs,

    /// Output directory for recovered declarations [default: <input>.generated]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Root namespace wrapping every declaration (empty for none)
    #[arg(short, long, env = "DREDGE_NAMESPACE", default_value = "Recovered")]
    namespace: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Maximum number of classes to recover per file (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_classes: usize,

    /// Reject inputs that do not start with a serialization header
    #[arg(long)]
    require_header: bool,

    /// Dry run - don't write files, just show what would be written
    #[arg(long)]
    dry_run: bool,

    /// Overwrite existing files without prompting
    #[arg(long, conflicts_with = "no_clobber")]
    force: bool,

    /// Keep existing files without prompting
    #[arg(long)]
    no_clobber: bool,

    /// Only list recovered classes (offset and name) without writing
    #[arg(long)]
    list_only: bool,

    /// Conflict resolution strategy for same-name different-content classes
    #[arg(long, value_enum, default_value = "hash-suffix")]
    conflict_strategy: ConflictStrategy,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single file to scan
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of files to scan
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct ModeArgs {
    /// Try every record discriminator byte (slow, finds everything)
    #[arg(long)]
    full_scan: bool,

    /// Start of a fully qualified class name to search for, e.g. "Game."
    #[arg(short = 'p', long = "class-prefix", value_name = "PREFIX", num_args = 1..)]
    class_prefixes: Vec<String>,
}

impl Cli {
    fn scanner_config(&self) -> ScannerConfig {
        let mode = if self.mode.full_scan {
            ScanMode::Full
        } else {
            ScanMode::Prefixes(self.mode.class_prefixes.clone())
        };
        ScannerConfig::new()
            .mode(mode)
            .require_header(self.require_header)
            .max_results(self.max_classes)
    }

    fn render_config(&self) -> RenderConfig {
        RenderConfig::new().root_namespace(self.namespace.as_str())
    }

    fn output_dir(&self, input: &Path) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_dir(input))
    }
}

/// State of one run, shared by every scanned file
struct Run<'a> {
    cli: &'a Cli,
    output_dir: PathBuf,
    render: RenderConfig,
    registry: ClassRegistry,
    policy: OverwritePolicy,
    prompt_input: Box<dyn BufRead + 'a>,
    prompt_output: Box<dyn Write + 'a>,
    scan_stats: ScanStats,
    written: StatsWriter,
}

impl<'a> Run<'a> {
    fn new(
        cli: &'a Cli,
        output_dir: PathBuf,
        policy: OverwritePolicy,
        prompt_input: Box<dyn BufRead + 'a>,
        prompt_output: Box<dyn Write + 'a>,
    ) -> Self {
        Self {
            cli,
            output_dir,
            render: cli.render_config(),
            registry: ClassRegistry::new(),
            policy,
            prompt_input,
            prompt_output,
            scan_stats: ScanStats::default(),
            written: StatsWriter::default(),
        }
    }

    /// Scan one file and emit every class recovered from it
    fn process_file(&mut self, path: &Path) -> Result<()> {
        trace!("Reading {}", path.display());
        let data = fs::read(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        trace!("Read {} bytes from {}", data.len(), path.display());

        let scanner = Scanner::with_config(self.cli.scanner_config());
        let mut session = scanner
            .session(&data)
            .with_context(|| format!("Failed to scan file: {}", path.display()))?;

        let mut progress = Progress::new(path, session.len());
        let mut recovered = Vec::new();
        loop {
            progress.report(session.position());
            let Some(outcome) = session.next() else {
                break;
            };
            if let Some(result) = outcome.into_result() {
                recovered.push(result);
            }
        }

        let stats = session.stats();
        info!(
            candidates = stats.candidates,
            peek_rejections = stats.peek_rejections,
            decode_failures = stats.decode_failures,
            build_failures = stats.build_failures,
            "Recovered {} classes from {}",
            stats.recovered,
            path.display()
        );
        self.add_scan_stats(stats);

        for result in &recovered {
            if self.cli.list_only {
                println!("{}\t{}", result.offset(), result.schema.full_name());
                continue;
            }
            for class in result.schema.declaration_order() {
                self.emit(class, path)?;
            }
        }

        Ok(())
    }

    /// Write one declaration, subject to deduplication and overwrite policy
    fn emit(&mut self, class: &ClassSchema, source: &Path) -> Result<()> {
        let relative = match class.relative_path() {
            Ok(relative) => relative,
            Err(e) => {
                warn!("Skipping {}: {}", class.full_name(), e);
                return Ok(());
            }
        };

        let content = class.render(&self.render);
        let content_hash = ClassRegistry::content_hash(&content);
        let Some(relative) = self.registry.register(
            &relative,
            &content_hash,
            Some(source),
            self.cli.conflict_strategy,
        ) else {
            return Ok(());
        };
        let output_path = self.output_dir.join(relative);

        if self.cli.dry_run {
            println!("Would write: {}", output_path.display());
            if self.cli.verbose > 0 {
                println!("---");
                println!("{}", content);
                println!("---");
            }
            return Ok(());
        }

        match self.write_class_file(&output_path, &content) {
            Ok(true) => {
                println!("Wrote {}", output_path.display());
                self.registry.stats.written += 1;
                class.visit(&mut self.written)?;
            }
            Ok(false) => {
                info!("Keeping existing {}", output_path.display());
                self.registry.stats.kept_existing += 1;
            }
            Err(e) => {
                error!("Failed to write {}: {:#}", output_path.display(), e);
            }
        }
        Ok(())
    }

    /// Returns false when an existing file was kept
    fn write_class_file(&mut self, output_path: &Path, content: &str) -> Result<bool> {
        if output_path.exists()
            && !self.policy.allows_overwrite(
                output_path,
                &mut *self.prompt_input,
                &mut *self.prompt_output,
            )?
        {
            return Ok(false);
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut file = fs::File::create(output_path)
            .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

        Ok(true)
    }

    fn add_scan_stats(&mut self, stats: ScanStats) {
        self.scan_stats.candidates += stats.candidates;
        self.scan_stats.peek_rejections += stats.peek_rejections;
        self.scan_stats.decode_failures += stats.decode_failures;
        self.scan_stats.build_failures += stats.build_failures;
        self.scan_stats.recovered += stats.recovered;
    }

    fn print_summary(&self) {
        if self.cli.list_only || self.cli.dry_run {
            return;
        }
        self.registry.print_summary();
        info!(
            "Wrote {} classes: {} members ({} properties, {} of unrecognized type)",
            self.written.class_count,
            self.written.member_count,
            self.written.property_count,
            self.written.unrecognized_count
        );
        debug!("Scan totals: {:?}", self.scan_stats);
    }
}

/// Logs scan progress whenever the whole percentage changes
struct Progress<'p> {
    path: &'p Path,
    total: usize,
    last_percent: Option<usize>,
}

impl<'p> Progress<'p> {
    fn new(path: &'p Path, total: usize) -> Self {
        Self {
            path,
            total,
            last_percent: None,
        }
    }

    fn report(&mut self, index: usize) {
        if self.total == 0 {
            return;
        }
        let percent = index * 100 / self.total;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            info!(
                "Scanning {}: {}% ({}/{} candidates)",
                self.path.display(),
                percent,
                index,
                self.total
            );
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let policy = OverwritePolicy::from_flags(cli.force, cli.no_clobber, io::stdin().is_terminal());
    let prompt_input: Box<dyn BufRead> = Box::new(io::stdin().lock());
    let prompt_output: Box<dyn Write> = Box::new(io::stderr());

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        let mut run = Run::new(&cli, cli.output_dir(file), policy, prompt_input, prompt_output);
        process_single_file(&mut run, file)
    } else if let Some(ref directory) = cli.input.directory {
        let mut run = Run::new(
            &cli,
            cli.output_dir(directory),
            policy,
            prompt_input,
            prompt_output,
        );
        process_directory(&mut run, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Process a single input file
fn process_single_file(run: &mut Run<'_>, file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    run.process_file(file)?;
    run.print_summary();
    Ok(())
}

/// Process a directory of inputs recursively
fn process_directory(run: &mut Run<'_>, directory: &Path) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut files_processed = 0;
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if run.output_dir.exists() && path.starts_with(&run.output_dir) {
            trace!("Skipping output file: {}", path.display());
            continue;
        }

        debug!("Processing file: {}", path.display());
        if let Err(e) = run.process_file(path) {
            // Log error but continue with other files
            warn!("Error processing {}: {:#}", path.display(), e);
        }
        files_processed += 1;
    }

    info!("Processed {} files", files_processed);
    run.print_summary();
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// `<input>.generated` next to the input
fn default_output_dir(input: &Path) -> PathBuf {
    match input.file_name() {
        Some(name) => {
            let mut name = OsString::from(name);
            name.push(".generated");
            input.with_file_name(name)
        }
        None => PathBuf::from("dredge.generated"),
    }
}
