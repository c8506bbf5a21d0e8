mod config;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use primespan::{MAX_SEGMENT_BYTES, MIN_SEGMENT_BYTES};

#[derive(Serialize)]
struct Summary {
    start: u64,
    stop: u64,
    count: u64,
    seconds: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let segment_bytes = config.segment_size_kb * 1024;
    if !segment_bytes.is_power_of_two()
        || !(MIN_SEGMENT_BYTES..=MAX_SEGMENT_BYTES).contains(&segment_bytes)
    {
        eprintln!("Error: --segment-size-kb must be a power of two between 16 and 8192.");
        std::process::exit(1);
    }
    if config.start > config.stop {
        eprintln!("Error: --start must not exceed STOP.");
        std::process::exit(1);
    }

    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build_global()?;
    }
    info!(
        start = config.start,
        stop = config.stop,
        segment_kb = config.segment_size_kb,
        threads = rayon::current_num_threads(),
        "primespan starting"
    );

    let started = Instant::now();

    if let Some(n) = config.nth {
        let prime = primespan::nth_prime(n, config.start)?;
        println!("{prime}");
    } else if config.print {
        print_primes(&config, segment_bytes)?;
    } else {
        let count = count_with_progress(&config, segment_bytes)?;
        let seconds = started.elapsed().as_secs_f64();
        info!(count, seconds, "count finished");
        if config.json {
            let summary =
                Summary { start: config.start, stop: config.stop, count, seconds };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("{count}");
        }
    }

    Ok(())
}

/// Counts over parallel chunks, ticking a progress bar as chunks finish.
fn count_with_progress(
    config: &Config,
    segment_bytes: usize,
) -> Result<u64, Box<dyn std::error::Error>> {
    let chunks =
        primespan::split_range(config.start, config.stop, rayon::current_num_threads() * 4);

    let bar = if config.quiet || config.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(chunks.len() as u64)
    };
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>4}/{len:4} ({eta})")?
            .progress_chars("#>-"),
    );

    let counts = chunks
        .into_par_iter()
        .map(|(lo, hi)| {
            let mut sieve = primespan::Sieve::new(lo, hi, segment_bytes)?;
            let count = sieve.count()?;
            bar.inc(1);
            Ok::<u64, primespan::Error>(count)
        })
        .collect::<Result<Vec<_>, _>>()?;
    bar.finish_and_clear();

    Ok(counts.iter().sum())
}

/// Streams the primes of the interval to stdout, one per line.
fn print_primes(config: &Config, segment_bytes: usize) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut primes = primespan::PrimeIterator::new(config.start, config.stop, segment_bytes)?;
    for p in primes.by_ref() {
        writeln!(out, "{p}")?;
    }
    if let Some(e) = primes.take_error() {
        return Err(e.into());
    }
    out.flush()?;
    Ok(())
}
