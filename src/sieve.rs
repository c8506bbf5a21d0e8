//! Segmented sieve driver: base primes, per-segment crossing, counting and
//! collection.
//!
//! The bitmap hands 30 numbers to each byte (see [`crate::wheel`]), so a
//! 256 KiB segment covers 7.86 million numbers and stays cache resident.
//! Sieving primes up to `SMALL_PRIME_FACTOR * segment_bytes` go to the flat
//! small-prime engine; everything above goes to the bucketed large-prime
//! engine. Primes are fed to the engines lazily, once the segment reaching
//! their square is about to be sieved.

use crate::erat_big::EratBig;
use crate::erat_small::EratSmall;
use crate::wheel::BIT_VALUES;
use crate::{Error, MAX_STOP};
use bitvec::prelude::*;
use tracing::debug;

/// Primes up to this multiple of the segment size strike a segment often
/// enough that bucket routing would cost more than it saves.
const SMALL_PRIME_FACTOR: u64 = 9;

/// One-shot segmented sieve over `[start, stop]`.
pub struct Sieve {
    start: u64,
    stop: u64,
    /// Base value of the next segment; always a multiple of 30.
    low: u64,
    sieve: Vec<u8>,
    small: EratSmall,
    big: EratBig,
    base_primes: Vec<u64>,
    cursor: usize,
    max_small: u64,
    done: bool,
}

/// A sieved segment: bit `b` of `bits[i]` set means
/// `low + 30*i + BIT_VALUES[b]` is prime (for in-range values).
pub struct Segment<'a> {
    pub low: u64,
    pub bits: &'a [u8],
}

impl Sieve {
    pub fn new(start: u64, stop: u64, segment_bytes: usize) -> Result<Self, Error> {
        if start > stop {
            return Err(Error::Precondition("start must not exceed stop"));
        }
        if stop > MAX_STOP {
            return Err(Error::Precondition("stop must not exceed 2^63"));
        }
        let sqrt = isqrt(stop);
        // Align so that start lands at or after the first represented value
        // (byte 0 covers low+7 ..= low+31; residues 0..=6 live in the byte
        // before their block).
        let low = start.saturating_sub(byte_remainder(start));
        let big = EratBig::new(stop, segment_bytes, sqrt.max(7), low)?;
        let base_primes = simple_sieve(sqrt);
        debug!(start, stop, segment_bytes, base_primes = base_primes.len(), "sieve initialized");
        Ok(Sieve {
            start,
            stop,
            low,
            sieve: vec![0u8; segment_bytes],
            small: EratSmall::new(stop),
            big,
            base_primes,
            cursor: 0,
            max_small: SMALL_PRIME_FACTOR * segment_bytes as u64,
            done: false,
        })
    }

    /// Sieves and returns the next segment, or `None` once the segment
    /// containing `stop` has been handed out.
    pub fn sieve_segment(&mut self) -> Result<Option<Segment<'_>>, Error> {
        if self.done {
            return Ok(None);
        }
        let span = 30 * self.sieve.len() as u64;
        // Largest value this segment's bitmap represents: the last byte's
        // top bit stands for low + span + 1.
        let high = self.low + span + 1;

        // Feed primes whose square this segment reaches.
        while self.cursor < self.base_primes.len() {
            let p = self.base_primes[self.cursor];
            if p >= 7 {
                if p.saturating_mul(p) > high {
                    break;
                }
                if p <= self.max_small {
                    self.small.add_sieving_prime(p, self.low);
                } else {
                    self.big.add_sieving_prime(p)?;
                }
            }
            self.cursor += 1;
        }

        self.sieve.fill(0xFF);
        self.small.cross_off(&mut self.sieve);
        self.big.cross_off(&mut self.sieve)?;

        let segment_low = self.low;
        self.low += span;
        if high >= self.stop {
            self.done = true;
        }
        Ok(Some(Segment { low: segment_low, bits: &self.sieve }))
    }

    /// Number of primes in `[start, stop]`. Consumes the sieve's segments.
    pub fn count(&mut self) -> Result<u64, Error> {
        let (start, stop) = (self.start, self.stop);
        let mut count = tiny_primes(start, stop).count() as u64;
        while let Some(segment) = self.sieve_segment()? {
            count += count_segment(segment.low, segment.bits, start, stop);
        }
        Ok(count)
    }

    /// Appends every prime in `[start, stop]` to `out`, in order.
    pub fn collect_into(&mut self, out: &mut Vec<u64>) -> Result<(), Error> {
        let (start, stop) = (self.start, self.stop);
        out.extend(tiny_primes(start, stop));
        while let Some(segment) = self.sieve_segment()? {
            collect_segment(segment.low, segment.bits, start, stop, out);
        }
        Ok(())
    }

    /// Direct access to the large-prime engine's accounting, for statistics.
    pub fn erat_big(&self) -> &EratBig {
        &self.big
    }
}

/// Distance from `n` back to the base of the byte representing it:
/// `n % 30`, except that residues 0..=6 belong to the previous block.
fn byte_remainder(n: u64) -> u64 {
    let r = n % 30;
    if r <= 6 {
        r + 30
    } else {
        r
    }
}

/// The wheel factors 2, 3, 5 are not represented in the bitmap and are
/// handled by enumeration.
fn tiny_primes(start: u64, stop: u64) -> impl Iterator<Item = u64> {
    [2u64, 3, 5].into_iter().filter(move |&p| p >= start && p <= stop)
}

fn count_segment(low: u64, bits: &[u8], start: u64, stop: u64) -> u64 {
    let mut count = 0;
    for (i, &byte) in bits.iter().enumerate() {
        if byte == 0 {
            continue;
        }
        let base = low + 30 * i as u64;
        if base + 7 >= start && base + 31 <= stop {
            count += byte.count_ones() as u64;
        } else {
            for (b, &v) in BIT_VALUES.iter().enumerate() {
                if byte & (1 << b) != 0 && base + v >= start && base + v <= stop {
                    count += 1;
                }
            }
        }
    }
    count
}

fn collect_segment(low: u64, bits: &[u8], start: u64, stop: u64, out: &mut Vec<u64>) {
    for (i, &byte) in bits.iter().enumerate() {
        if byte == 0 {
            continue;
        }
        let base = low + 30 * i as u64;
        for (b, &v) in BIT_VALUES.iter().enumerate() {
            if byte & (1 << b) != 0 && base + v >= start && base + v <= stop {
                out.push(base + v);
            }
        }
    }
}

/// Buffered iterator over the primes of `[start, stop]`.
///
/// Sieving errors (allocation failure, in practice) end the iteration; the
/// cause is retrievable with [`PrimeIterator::take_error`]. The convenience
/// wrappers in the crate root check it and propagate.
pub struct PrimeIterator {
    sieve: Sieve,
    start: u64,
    stop: u64,
    buffer: Vec<u64>,
    pos: usize,
    failed: Option<Error>,
}

impl PrimeIterator {
    pub fn new(start: u64, stop: u64, segment_bytes: usize) -> Result<Self, Error> {
        let sieve = Sieve::new(start, stop, segment_bytes)?;
        let buffer = tiny_primes(start, stop).collect();
        Ok(PrimeIterator { sieve, start, stop, buffer, pos: 0, failed: None })
    }

    pub fn take_error(&mut self) -> Option<Error> {
        self.failed.take()
    }
}

impl Iterator for PrimeIterator {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            if self.pos < self.buffer.len() {
                let p = self.buffer[self.pos];
                self.pos += 1;
                return Some(p);
            }
            self.buffer.clear();
            self.pos = 0;
            match self.sieve.sieve_segment() {
                Ok(Some(segment)) => collect_segment(
                    segment.low,
                    segment.bits,
                    self.start,
                    self.stop,
                    &mut self.buffer,
                ),
                Ok(None) => return None,
                Err(e) => {
                    self.failed = Some(e);
                    return None;
                }
            }
        }
    }
}

/// Simple bitvec sieve producing all primes up to `limit` (inclusive);
/// used for the base primes below the square root of the sieving bound.
fn simple_sieve(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return Vec::new();
    }
    let mut bits = bitvec![u8, Lsb0; 1; (limit + 1) as usize];
    bits.set(0, false);
    bits.set(1, false);
    for i in 2..=isqrt(limit) {
        if bits[i as usize] {
            for j in (i * i..=limit).step_by(i as usize) {
                bits.set(j as usize, false);
            }
        }
    }
    bits.iter_ones().map(|i| i as u64).collect()
}

/// Exact integer square root.
pub(crate) fn isqrt(n: u64) -> u64 {
    let mut r = (n as f64).sqrt() as u64;
    while r.saturating_mul(r) > n {
        r -= 1;
    }
    while (r + 1).saturating_mul(r + 1) <= n {
        r += 1;
    }
    r
}
