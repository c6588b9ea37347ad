use std::collections::HashSet;
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, error::ErrorKind};

use crate::config::AnnotatorConfig;
use crate::constants::tables::{EVALUATIONS, QUESTIONS};
use crate::data::Choice;
use crate::filters::{SessionFilters, compute_available, domain_label, language_options};
use crate::identity::{IdentityStore, MemoryIdentityStore, open_identity_store};
use crate::join::Joiner;
use crate::loader::{WorkingSet, load_working_set};
use crate::oracle::{CompletionOracle, HttpCompletionOracle, StaticCompletionOracle};
use crate::sampler::BatchSampler;
use crate::session::{DoneReason, SessionController, SessionState};
use crate::source::table_source;
use crate::submit::{HttpSubmissionSink, SubmissionHandle};

const INSTRUCTIONS: &str = "\
Compare two answers to the same prompt and pick the better one.
Choose A, B, or tie when both are equally good.
Each answer is recorded immediately and the next comparison appears.";

#[derive(Debug, Parser)]
#[command(
    name = "rater",
    disable_help_subcommand = true,
    about = "Annotate pairwise model comparisons from the terminal",
    long_about = "Load the evaluation and question tables, sample batches this rater has not seen, and submit one choice per comparison.",
    after_help = "Sources accept HTTP(S) URLs or local CSV paths."
)]
struct RaterCli {
    #[command(flatten)]
    data: DataArgs,
    #[arg(
        long = "batch-size",
        value_parser = parse_positive_usize,
        help = "Comparisons per batch"
    )]
    batch_size: Option<usize>,
    #[arg(
        long = "max-per-base-id",
        value_parser = parse_positive_usize,
        help = "Comparisons sharing a question allowed in one batch"
    )]
    max_per_base_id: Option<usize>,
    #[arg(long, help = "Seed for reproducible batch order")]
    seed: Option<u64>,
    #[arg(
        long = "store-path",
        value_name = "PATH",
        help = "Identity store location (defaults to .annotator_store/identity.bin)"
    )]
    store_path: Option<PathBuf>,
    #[arg(long, help = "Keep identity in memory only for this run")]
    ephemeral: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "estimate_pool",
    disable_help_subcommand = true,
    about = "Report how much annotation work remains",
    long_about = "Join the evaluation and question tables and print join skips plus pool sizes per language and domain, without annotating.",
    after_help = "Sources accept HTTP(S) URLs or local CSV paths."
)]
struct EstimatePoolCli {
    #[command(flatten)]
    data: DataArgs,
    #[arg(long, help = "Skip the completed-list fetch")]
    offline: bool,
}

#[derive(Debug, clap::Args)]
struct DataArgs {
    #[arg(long, value_name = "URL|PATH", help = "Evaluations table")]
    evaluations: Option<String>,
    #[arg(long, value_name = "URL|PATH", help = "Questions table")]
    questions: Option<String>,
    #[arg(
        long = "proxy-url",
        value_name = "URL",
        help = "Proxy endpoint for the completed list and submissions"
    )]
    proxy_url: Option<String>,
    #[arg(
        long = "saturation-threshold",
        help = "Drop rows with at least this many prior human judgments"
    )]
    saturation_threshold: Option<u32>,
    #[arg(
        long = "no-saturation-gate",
        conflicts_with = "saturation_threshold",
        help = "Keep rows regardless of prior human judgments"
    )]
    no_saturation_gate: bool,
}

impl DataArgs {
    fn apply(self, config: &mut AnnotatorConfig) {
        if let Some(evaluations) = self.evaluations {
            config.evaluations_source = evaluations;
        }
        if let Some(questions) = self.questions {
            config.questions_source = questions;
        }
        if let Some(proxy_url) = self.proxy_url {
            config.proxy_url = proxy_url;
        }
        if self.no_saturation_gate {
            config.saturation_threshold = None;
        } else if let Some(threshold) = self.saturation_threshold {
            config.saturation_threshold = Some(threshold);
        }
    }
}

/// Run the terminal rater against stdin/stdout.
pub fn run_rater<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();

    let Some(cli) = parse_cli::<RaterCli, _>(std::iter::once("rater".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let mut config = AnnotatorConfig::default();
    cli.data.apply(&mut config);
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(max_per_base_id) = cli.max_per_base_id {
        config.max_per_base_id = max_per_base_id;
    }
    if let Some(store_path) = cli.store_path {
        config.store_path = store_path;
    }
    config.seed = cli.seed;
    config.validate()?;

    let oracle: Arc<dyn CompletionOracle> =
        Arc::new(HttpCompletionOracle::new(config.proxy_url.clone()));
    let working_set = match load_from_config(&config, oracle.as_ref()) {
        Ok(working_set) => working_set,
        Err(err) => {
            let stdout = std::io::stdout();
            write_load_failure(err.as_ref(), &mut stdout.lock())?;
            return Ok(());
        }
    };
    let identity: Box<dyn IdentityStore> = if cli.ephemeral {
        Box::new(MemoryIdentityStore::new())
    } else {
        open_identity_store(config.store_path.clone())
    };
    let mut session = SessionController::new(
        working_set,
        identity,
        oracle,
        Arc::new(HttpSubmissionSink::new(config.proxy_url.clone())),
        BatchSampler::from_config(&config),
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let pending = drive_session(&mut session, stdin.lock(), stdout.lock())?;
    let failed = pending
        .into_iter()
        .filter_map(|handle| handle.wait().err())
        .count();
    if failed > 0 {
        eprintln!("{failed} submission(s) failed; those comparisons stay marked as done locally.");
    }
    Ok(())
}

/// Run the pool estimate and print it to stdout.
pub fn run_estimate_pool<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();

    let Some(cli) = parse_cli::<EstimatePoolCli, _>(
        std::iter::once("estimate_pool".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let mut config = AnnotatorConfig::default();
    cli.data.apply(&mut config);
    config.validate()?;

    let oracle: Box<dyn CompletionOracle> = if cli.offline {
        Box::new(StaticCompletionOracle::default())
    } else {
        Box::new(HttpCompletionOracle::new(config.proxy_url.clone()))
    };
    let working_set = load_from_config(&config, oracle.as_ref())?;
    let stdout = std::io::stdout();
    write_pool_estimate(&working_set, &mut stdout.lock())?;
    Ok(())
}

fn load_from_config(
    config: &AnnotatorConfig,
    oracle: &dyn CompletionOracle,
) -> Result<WorkingSet, Box<dyn Error>> {
    let evaluations = table_source(EVALUATIONS, &config.evaluations_source);
    let questions = table_source(QUESTIONS, &config.questions_source);
    let joiner = Joiner::from_config(config);
    Ok(load_working_set(
        evaluations.as_ref(),
        questions.as_ref(),
        oracle,
        &joiner,
    )?)
}

/// Tell the rater the data could not be loaded; annotation does not start.
pub fn write_load_failure<W: Write>(err: &dyn Error, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "Could not load the annotation data: {err}")?;
    writeln!(out, "Annotation cannot start. Run the rater again to retry.")?;
    out.flush()
}

/// Print the join report and remaining pool sizes for a fresh rater.
pub fn write_pool_estimate<W: Write>(working_set: &WorkingSet, out: &mut W) -> std::io::Result<()> {
    let report = &working_set.report;
    let none = HashSet::new();
    writeln!(out, "=== annotation pool estimate ===")?;
    writeln!(out, "evaluation rows: {}", report.total_rows)?;
    writeln!(out, "joined: {}", report.joined)?;
    writeln!(out, "completed (global): {}", working_set.completed.len())?;
    writeln!(out)?;

    writeln!(out, "[SKIPPED]")?;
    if report.skipped.is_empty() {
        writeln!(out, "  none")?;
    }
    for (reason, count) in &report.skipped {
        writeln!(out, "  {reason:?}: {count}")?;
    }
    writeln!(out)?;

    writeln!(out, "[BY LANGUAGE]")?;
    for (value, label) in language_options() {
        let pool = compute_available(
            &working_set.items,
            &SessionFilters::new(Vec::<String>::new(), value),
            &none,
            &working_set.completed,
        );
        let questions: HashSet<&str> = pool.iter().map(|item| item.base_id.as_str()).collect();
        writeln!(
            out,
            "  {label} ({value}): {} comparisons across {} questions",
            pool.len(),
            questions.len()
        )?;
    }
    writeln!(out)?;

    writeln!(out, "[BY DOMAIN]")?;
    for domain in crate::filters::domain_options(&working_set.items, &working_set.completed) {
        let pool = compute_available(
            &working_set.items,
            &SessionFilters::new([domain.clone()], crate::constants::sampler::ANY_LANGUAGE),
            &none,
            &working_set.completed,
        );
        writeln!(out, "  {}: {}", domain_label(&domain), pool.len())?;
    }
    Ok(())
}

/// Drive `session` with line-oriented commands from `input`.
///
/// Returns the handles of submissions dispatched during the run so the caller
/// can wait for them before exiting. End of input stops the loop.
pub fn drive_session<R, W>(
    session: &mut SessionController,
    mut input: R,
    mut out: W,
) -> Result<Vec<SubmissionHandle>, Box<dyn Error>>
where
    R: BufRead,
    W: Write,
{
    let mut pending = Vec::new();
    loop {
        match session.state() {
            SessionState::Instructions => {
                writeln!(out, "{INSTRUCTIONS}")?;
                writeln!(out, "Type 'start' to continue.")?;
                let Some(line) = read_command(&mut input)? else {
                    break;
                };
                if line == "start" {
                    session.show_setup()?;
                }
            }
            SessionState::Setup => {
                let domains = session.domain_options();
                writeln!(out, "Domains:")?;
                for (idx, domain) in domains.iter().enumerate() {
                    writeln!(out, "  {}) {}", idx + 1, domain_label(domain))?;
                }
                writeln!(out, "Select domains by number, comma separated (blank for all):")?;
                let Some(domain_line) = read_command(&mut input)? else {
                    break;
                };
                writeln!(out, "Languages:")?;
                for (value, label) in language_options() {
                    writeln!(out, "  {value}) {label}")?;
                }
                writeln!(out, "Select a language (blank for {}):", language_options()[0].0)?;
                let Some(language_line) = read_command(&mut input)? else {
                    break;
                };
                let language = if language_line.is_empty() {
                    language_options()[0].0.to_string()
                } else {
                    language_line
                };
                session.set_filters(SessionFilters::new(
                    select_domains(&domain_line, &domains),
                    &language,
                ))?;
                writeln!(out, "Type 'start' to begin or 'end' to finish.")?;
                let Some(line) = read_command(&mut input)? else {
                    break;
                };
                match line.as_str() {
                    "start" => {
                        session.start()?;
                    }
                    "end" => session.end_session()?,
                    _ => writeln!(out, "Unknown command '{line}'.")?,
                }
            }
            SessionState::Annotating => {
                let (Some(item), Some(progress)) = (session.current(), session.progress()) else {
                    break;
                };
                let item_id = item.id.clone();
                writeln!(out)?;
                writeln!(out, "Sample {} of {}", progress.position, progress.total)?;
                writeln!(out, "Prompt:\n{}", item.prompt)?;
                writeln!(out, "\n[A]\n{}", item.response_a)?;
                writeln!(out, "\n[B]\n{}", item.response_b)?;
                writeln!(out, "Choose a, b, or tie:")?;
                let Some(line) = read_command(&mut input)? else {
                    break;
                };
                match line.parse::<Choice>() {
                    Ok(choice) => pending.push(session.choose(&item_id, choice)?),
                    Err(_) => writeln!(out, "Unknown choice '{line}'.")?,
                }
            }
            SessionState::BatchComplete => {
                writeln!(
                    out,
                    "Batch complete. You have annotated {} comparisons in total ({} this session).",
                    session.annotated_total(),
                    session.annotated_this_session()
                )?;
                writeln!(out, "Type 'continue' for another batch or 'end' to finish.")?;
                let Some(line) = read_command(&mut input)? else {
                    break;
                };
                match line.as_str() {
                    "continue" => session.show_setup()?,
                    "end" => session.end_session()?,
                    _ => writeln!(out, "Unknown command '{line}'.")?,
                }
            }
            SessionState::AllDone(reason) => {
                match reason {
                    DoneReason::NoSamplesAvailable => writeln!(
                        out,
                        "No comparisons left for the selected filters. Thank you!"
                    )?,
                    DoneReason::EndedByRater => writeln!(
                        out,
                        "Session ended after {} comparisons. Thank you!",
                        session.annotated_this_session()
                    )?,
                }
                break;
            }
        }
    }
    out.flush()?;
    Ok(pending)
}

/// Logs go to stderr; stdout carries the rater screens.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_command<R: BufRead>(input: &mut R) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_lowercase()))
}

/// Resolve setup-screen domain picks: 1-based indexes into `options` or literal names.
fn select_domains(raw: &str, options: &[String]) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<usize>() {
            Ok(idx) => options.get(idx.checked_sub(1)?).cloned(),
            Err(_) => Some(token.to_string()),
        })
        .collect()
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
