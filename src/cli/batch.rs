//! Batch command implementation.

use super::output::{JsonBatchResult, format_batch_text};
use super::{CliError, OutputFormat, clock_seed, load_config};
use duskfall::tournament::{MatchOptions, run_batch};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments of the batch command.
#[derive(Debug)]
pub(crate) struct BatchArgs {
    pub(crate) games: u64,
    pub(crate) seed: Option<u64>,
    pub(crate) threads: Option<usize>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) max_turns: Option<u32>,
    pub(crate) format: OutputFormat,
    pub(crate) progress: bool,
}

/// Execute the batch command.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded, any match breaks an
/// invariant, or the output cannot be produced.
pub(crate) fn execute(args: BatchArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;

    // Set thread pool size if specified
    if let Some(num_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let base_seed = args.seed.unwrap_or_else(clock_seed);

    let pb = if args.progress {
        let pb = ProgressBar::new(args.games);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} games ({per_sec})")
            .map_err(|e| CliError::new(format!("Invalid progress template: {e}")))?
            .progress_chars("=>-");
        pb.set_style(style);
        Some(pb)
    } else {
        None
    };

    let options = MatchOptions {
        max_turns: args.max_turns,
        check_invariants: true,
        record: false,
    };

    let start = Instant::now();
    let stats = run_batch(&config, base_seed, args.games, &options, || {
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    });
    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }
    let duration = start.elapsed();

    match args.format {
        OutputFormat::Text => {
            println!();
            print!("{}", format_batch_text(base_seed, &stats));
            println!();
            println!("Duration: {:.2}s", duration.as_secs_f64());
        }
        OutputFormat::Json => {
            let json_result = JsonBatchResult::from_stats(base_seed, &stats);
            let json = serde_json::to_string_pretty(&json_result)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    if stats.failures > 0 {
        return Err(CliError::new(format!(
            "{} of {} matches aborted, see the warnings above",
            stats.failures,
            stats.games + stats.failures
        )));
    }

    Ok(())
}
