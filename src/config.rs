use clap::Parser;

/// A fast segmented sieve of Eratosthenes for counting, printing, and
/// locating primes in 64-bit intervals.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Upper bound of the sieving interval (inclusive). Accepts plain
    /// integers, '_' separators, and scientific notation like 1e12.
    #[arg(value_parser = parse_number)]
    pub stop: u64,

    /// Lower bound of the sieving interval (inclusive).
    #[arg(short, long, default_value = "0", value_parser = parse_number)]
    pub start: u64,

    /// Print the primes, one per line, instead of counting them.
    #[arg(short, long)]
    pub print: bool,

    /// Print the n-th prime greater than the lower bound.
    #[arg(short, long, value_parser = parse_number)]
    pub nth: Option<u64>,

    /// Sieve segment size in KiB (power of two between 16 and 8192).
    #[arg(long, default_value_t = 256)]
    pub segment_size_kb: usize,

    /// Number of worker threads (default: all cores).
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Emit the result as a JSON record.
    #[arg(long)]
    pub json: bool,

    /// Suppress the progress bar.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Parses "123", "1_000_000", and "1e12" style numbers.
pub fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.replace('_', "");
    if let Some((mantissa, exponent)) = s.split_once(['e', 'E']) {
        let mantissa: u64 = mantissa.parse().map_err(|_| format!("invalid number: {s}"))?;
        let exponent: u32 = exponent.parse().map_err(|_| format!("invalid exponent: {s}"))?;
        10u64
            .checked_pow(exponent)
            .and_then(|pow| mantissa.checked_mul(pow))
            .ok_or_else(|| format!("number out of range: {s}"))
    } else {
        s.parse().map_err(|_| format!("invalid number: {s}"))
    }
}
