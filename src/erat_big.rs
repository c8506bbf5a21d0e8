//! Crossing-off engine for sieving primes larger than the segment.
//!
//! Implements Oliveira e Silva's cache-friendly bucket sieve: a prime that
//! strikes at most once per segment is parked in a bucket list belonging to
//! the future segment containing its next multiple, so crossing off a
//! segment touches exactly the primes that strike it. After each strike the
//! prime's cursor advances one wheel-210 state and the prime is re-filed
//! into the list of the segment its new multiple falls in; the lists rotate
//! logically (a base index moves, the slots never do).

use crate::bucket::{BucketPool, WheelPrime};
use crate::wheel::{first_multiple_210, prime_class_residue, MAX_FACTOR_210, WHEEL210};
use crate::{Error, MAX_SEGMENT_BYTES, MIN_SEGMENT_BYTES};

pub struct EratBig {
    stop: u64,
    max_prime: u64,
    /// Base value of the segment the next `cross_off` call sieves.
    low: u64,
    log2_segment_bytes: u32,
    /// segment_bytes - 1; multiple indexes are masked with it when re-filed.
    modulo_segment_bytes: u64,
    /// Ring of bucket chain heads, one per upcoming segment.
    lists: Vec<Option<u32>>,
    /// Ring offset of the current segment's slot.
    base: usize,
    pool: BucketPool,
    added: u64,
    dropped: u64,
}

impl EratBig {
    /// Creates an engine for sieving primes up to `max_prime` over segments
    /// of `segment_bytes` bytes, the first of which starts at `segment_low`
    /// (a multiple of 30). Sieving ends at `stop`.
    pub fn new(
        stop: u64,
        segment_bytes: usize,
        max_prime: u64,
        segment_low: u64,
    ) -> Result<Self, Error> {
        if !segment_bytes.is_power_of_two()
            || !(MIN_SEGMENT_BYTES..=MAX_SEGMENT_BYTES).contains(&segment_bytes)
        {
            return Err(Error::Precondition(
                "segment size must be a power of two between 16 KiB and 8 MiB",
            ));
        }
        if segment_low % 30 != 0 {
            return Err(Error::Precondition("segment base must be a multiple of 30"));
        }
        let segment_bytes = segment_bytes as u64;
        // One slot per segment a cursor can reach. The worst case is a
        // freshly seeded prime: its first multiple lies up to one prime
        // beyond the segment base and the seeding step adds another
        // MAX_FACTOR_210 quotients, for (MAX_FACTOR_210 + 1) * prime bytes
        // past the segment end. Re-filed cursors stay strictly below that.
        let max_sieving_prime = max_prime / 30;
        let max_next_multiple = max_sieving_prime * (MAX_FACTOR_210 + 1) + MAX_FACTOR_210;
        let max_multiple_index = (segment_bytes - 1) + max_next_multiple;
        let slots = (max_multiple_index >> segment_bytes.trailing_zeros()) + 1;
        Ok(EratBig {
            stop,
            max_prime,
            low: segment_low,
            log2_segment_bytes: segment_bytes.trailing_zeros(),
            modulo_segment_bytes: segment_bytes - 1,
            lists: vec![None; slots as usize],
            base: 0,
            pool: BucketPool::new(),
            added: 0,
            dropped: 0,
        })
    }

    /// Files a new sieving prime under the segment holding its first
    /// multiple. Primes whose first multiple exceeds `stop` are discarded;
    /// that is normal flow, not an error.
    ///
    /// The prime's square must not lie below the current segment's end,
    /// otherwise its first multiple could land past the list ring.
    pub fn add_sieving_prime(&mut self, prime: u64) -> Result<(), Error> {
        debug_assert!(prime > 7 && prime <= self.max_prime);
        self.added += 1;
        match first_multiple_210(prime, self.low, self.stop) {
            Some((multiple_index, wheel_index)) => {
                self.store(prime / 30, multiple_index, wheel_index)
            }
            None => {
                self.dropped += 1;
                Ok(())
            }
        }
    }

    fn store(&mut self, prime_div_30: u64, multiple_index: u64, wheel_index: u32) -> Result<(), Error> {
        let segment = (multiple_index >> self.log2_segment_bytes) as usize;
        assert!(
            segment < self.lists.len(),
            "sieving prime filed before its square entered the segment ring"
        );
        let multiple_index = multiple_index & self.modulo_segment_bytes;
        self.push(segment, WheelPrime::new(prime_div_30, multiple_index, wheel_index))
    }

    /// Appends to the head bucket of the slot `segments_ahead` from now,
    /// linking in a fresh bucket when the head is full or missing.
    fn push(&mut self, segments_ahead: usize, prime: WheelPrime) -> Result<(), Error> {
        debug_assert!(segments_ahead < self.lists.len());
        let slot = (self.base + segments_ahead) % self.lists.len();
        let head = self.lists[slot];
        let idx = match head {
            Some(b) if !self.pool.bucket(b).is_full() => b,
            _ => {
                let b = self.pool.acquire()?;
                self.pool.bucket_mut(b).set_next(head);
                self.lists[slot] = Some(b);
                b
            }
        };
        self.pool.bucket_mut(idx).push(prime);
        Ok(())
    }

    /// Crosses off this segment's multiples in `sieve`, re-filing each prime
    /// under the segment of its next multiple, then rotates the ring.
    ///
    /// A prime whose advanced multiple still lands in the current segment
    /// re-enters slot 0 and is drained by the outer loop, so all strikes of
    /// the segment happen in this one call. Primes whose next multiple can
    /// hold no value <= stop retire instead of being re-filed.
    pub fn cross_off(&mut self, sieve: &mut [u8]) -> Result<(), Error> {
        debug_assert_eq!(sieve.len() as u64, self.modulo_segment_bytes + 1);
        // Last byte offset (relative to this segment's base) whose smallest
        // represented value is still <= stop.
        let last_byte = match self.stop.checked_sub(self.low + 7) {
            Some(d) => d / 30,
            None => 0,
        };

        while let Some(head) = self.lists[self.base].take() {
            let mut bucket = Some(head);
            while let Some(idx) = bucket {
                let count = self.pool.bucket(idx).len();
                for i in 0..count {
                    let entry = self.pool.bucket(idx).entry(i);
                    let mut multiple_index = entry.multiple_index();
                    let wheel = &WHEEL210[entry.wheel_index() as usize];
                    let sieving_prime = entry.prime_div_30();

                    sieve[multiple_index as usize] &= wheel.unset_bit;
                    multiple_index +=
                        wheel.next_multiple_factor as u64 * sieving_prime + wheel.correct as u64;

                    if multiple_index > last_byte {
                        self.dropped += 1;
                        continue;
                    }
                    let segment = (multiple_index >> self.log2_segment_bytes) as usize;
                    multiple_index &= self.modulo_segment_bytes;
                    self.push(
                        segment,
                        WheelPrime::new(sieving_prime, multiple_index, wheel.next as u32),
                    )?;
                }
                bucket = self.pool.bucket(idx).next();
            }
            self.pool.release(head);
        }

        self.base = (self.base + 1) % self.lists.len();
        self.low += 30 * (self.modulo_segment_bytes + 1);
        Ok(())
    }

    /// Base value of the segment the next `cross_off` call sieves.
    pub fn low(&self) -> u64 {
        self.low
    }

    /// Primes filed via [`EratBig::add_sieving_prime`].
    pub fn added(&self) -> u64 {
        self.added
    }

    /// Primes retired because their next multiple exceeded `stop`.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Snapshot of every parked prime as
    /// `(segments_ahead, multiple_index, prime)`, in list order.
    pub fn resident_primes(&self) -> Vec<(usize, u64, u64)> {
        let mut out = Vec::new();
        for ahead in 0..self.lists.len() {
            let slot = (self.base + ahead) % self.lists.len();
            let mut bucket = self.lists[slot];
            while let Some(idx) = bucket {
                for entry in self.pool.bucket(idx).entries() {
                    let residue = prime_class_residue(entry.wheel_index());
                    out.push((
                        ahead,
                        entry.multiple_index(),
                        entry.prime_div_30() * 30 + residue,
                    ));
                }
                bucket = self.pool.bucket(idx).next();
            }
        }
        out
    }

    pub fn allocated_buckets(&self) -> usize {
        self.pool.allocated_buckets()
    }

    pub fn stocked_buckets(&self) -> usize {
        self.pool.stocked_buckets()
    }

    /// Buckets currently linked into the segment lists.
    pub fn listed_buckets(&self) -> usize {
        let mut n = 0;
        for slot in &self.lists {
            let mut bucket = *slot;
            while let Some(idx) = bucket {
                n += 1;
                bucket = self.pool.bucket(idx).next();
            }
        }
        n
    }
}
