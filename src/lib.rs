//! # primespan
//!
//! A segmented sieve of Eratosthenes for 64-bit intervals, built around a
//! bucketed crossing-off engine for large sieving primes:
//!
//! 1. **Counting and generation** over arbitrary `[start, stop]` windows —
//!    no need to sieve from zero to reach 10^12.
//! 2. **Modulo-30 bitmap** (8 candidate residues per byte) with wheel-30
//!    and wheel-210 state machines for crossing off.
//! 3. **Bucket lists per future segment** ([`EratBig`]): a sieving prime
//!    larger than the segment is parked under the segment containing its
//!    next multiple, so a segment only ever touches the primes that strike
//!    it. Buckets come from a slab allocator with a free-list stock.
//! 4. **Parallel counting**: large ranges split into per-worker chunks,
//!    each sieved by an independent [`Sieve`] (the engines themselves are
//!    single-threaded and share nothing).

pub mod bucket;
pub mod erat_big;
pub mod erat_small;
pub mod sieve;
pub mod wheel;

pub use erat_big::EratBig;
pub use sieve::{PrimeIterator, Segment, Sieve};

use rayon::prelude::*;
use std::collections::TryReserveError;

/// Smallest accepted segment size in bytes (16 KiB).
pub const MIN_SEGMENT_BYTES: usize = 1 << 14;
/// Largest accepted segment size in bytes (8 MiB).
pub const MAX_SEGMENT_BYTES: usize = 1 << 23;
/// Default segment size in bytes (256 KiB, sized for L2 cache).
pub const DEFAULT_SEGMENT_BYTES: usize = 1 << 18;
/// Largest supported sieving bound.
pub const MAX_STOP: u64 = 1 << 63;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bucket slab allocation failed; the sieve is unusable but safe to drop.
    #[error("out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    /// A caller-supplied argument violated an API precondition.
    #[error("precondition violated: {0}")]
    Precondition(&'static str),
}

/// Number of primes in `[start, stop]`. Ranges large enough to amortize the
/// per-chunk base-prime sieve are counted in parallel, one independent
/// [`Sieve`] per chunk.
pub fn count_primes(start: u64, stop: u64) -> Result<u64, Error> {
    const PARALLEL_THRESHOLD: u64 = 1 << 24;
    if start > stop {
        return Err(Error::Precondition("start must not exceed stop"));
    }
    if stop - start < PARALLEL_THRESHOLD {
        return Sieve::new(start, stop, DEFAULT_SEGMENT_BYTES)?.count();
    }
    let chunks = split_range(start, stop, rayon::current_num_threads() * 4);
    let counts = chunks
        .into_par_iter()
        .map(|(lo, hi)| Sieve::new(lo, hi, DEFAULT_SEGMENT_BYTES)?.count())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(counts.iter().sum())
}

/// All primes in `[start, stop]`, in ascending order.
pub fn generate_primes(start: u64, stop: u64) -> Result<Vec<u64>, Error> {
    let mut out = Vec::new();
    Sieve::new(start, stop, DEFAULT_SEGMENT_BYTES)?.collect_into(&mut out)?;
    Ok(out)
}

/// The n-th prime greater than `start`, n >= 1; `nth_prime(1, 0) == 2`.
pub fn nth_prime(n: u64, start: u64) -> Result<u64, Error> {
    if n == 0 {
        return Err(Error::Precondition("n must be at least 1"));
    }
    if start >= MAX_STOP {
        return Err(Error::Precondition("start must be below 2^63"));
    }
    let mut bound = nth_prime_bound(n, start);
    loop {
        let mut iter = PrimeIterator::new(start + 1, bound, DEFAULT_SEGMENT_BYTES)?;
        let mut seen = 0;
        for p in iter.by_ref() {
            seen += 1;
            if seen == n {
                return Ok(p);
            }
        }
        if let Some(e) = iter.take_error() {
            return Err(e);
        }
        // The analytic bound fell short (possible for tiny n near a large
        // prime gap); widen and retry.
        if bound >= MAX_STOP {
            return Err(Error::Precondition("n-th prime exceeds the supported range"));
        }
        bound = bound.saturating_mul(2).min(MAX_STOP);
    }
}

/// Upper-bound guess for the n-th prime above `start`: the average prime
/// gap near the target times n, padded for maximal gaps. Verified by the
/// search itself, which widens on a miss.
fn nth_prime_bound(n: u64, start: u64) -> u64 {
    let nf = n.max(6) as f64;
    let hint = (start as f64).max(nf * nf.ln());
    let gap = nf * (hint.ln() + hint.ln().ln() + 2.0) + 1000.0;
    start.saturating_add(gap as u64).min(MAX_STOP)
}

/// Splits `[start, stop]` into at most `parts` disjoint chunks whose sizes
/// are multiples of 30 (except the last), covering the range exactly.
pub fn split_range(start: u64, stop: u64, parts: usize) -> Vec<(u64, u64)> {
    let span = stop - start + 1;
    let chunk = (span / parts.max(1) as u64).max(1);
    let chunk = chunk + (30 - chunk % 30) % 30;
    let mut out = Vec::new();
    let mut lo = start;
    loop {
        let hi = stop.min(lo.saturating_add(chunk - 1));
        out.push((lo, hi));
        if hi == stop {
            break;
        }
        lo = hi + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_range_covers_exactly() {
        for (start, stop, parts) in
            [(0u64, 999u64, 4usize), (17, 10_000_000, 16), (5, 5, 3), (0, 29, 100)]
        {
            let chunks = split_range(start, stop, parts);
            assert!(chunks.len() <= parts.max(1) + 1);
            assert_eq!(chunks.first().map(|c| c.0), Some(start));
            assert_eq!(chunks.last().map(|c| c.1), Some(stop));
            for w in chunks.windows(2) {
                assert_eq!(w[0].1 + 1, w[1].0);
            }
            for &(lo, hi) in &chunks[..chunks.len() - 1] {
                assert_eq!((hi - lo + 1) % 30, 0);
            }
        }
    }

    #[test]
    fn count_rejects_inverted_range() {
        assert!(count_primes(10, 5).is_err());
    }

    #[test]
    fn nth_prime_known_values() {
        assert_eq!(nth_prime(1, 0).unwrap(), 2);
        assert_eq!(nth_prime(4, 0).unwrap(), 7);
        assert_eq!(nth_prime(25, 0).unwrap(), 97);
        assert_eq!(nth_prime(168, 0).unwrap(), 997);
        assert_eq!(nth_prime(1229, 0).unwrap(), 9973);
        // First primes above offsets.
        assert_eq!(nth_prime(1, 2).unwrap(), 3);
        assert_eq!(nth_prime(1, 1_000_000).unwrap(), 1_000_003);
        assert_eq!(nth_prime(3, 89).unwrap(), 103);
    }

    #[test]
    fn nth_prime_rejects_zero() {
        assert!(nth_prime(0, 0).is_err());
    }

    #[test]
    fn generate_matches_count() {
        let primes = generate_primes(0, 10_000).unwrap();
        assert_eq!(primes.len() as u64, count_primes(0, 10_000).unwrap());
        assert_eq!(primes.len(), 1229);
    }
}
