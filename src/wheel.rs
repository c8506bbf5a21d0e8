//! Modulo-30 sieve layout and wheel factorization tables.
//!
//! The sieve bitmap packs 30 numbers into each byte: bit `b` of byte `i`
//! stands for the value `low + 30*i + BIT_VALUES[b]`, the eight residues
//! coprime to 30. Crossing off composites runs on precomputed wheel tables
//! that skip multiples of the wheel factors: wheel-30 (2, 3, 5) for the
//! small-prime engine and wheel-210 (2, 3, 5, 7) for the bucketed
//! large-prime engine.
//!
//! A sieving prime's cursor is the residue class of the *quotient* of its
//! current multiple. Advancing one wheel state moves the multiple to the
//! next quotient coprime to the modulo; the [`WheelElement`] for a state
//! carries the bit mask of the current multiple, the quotient step to the
//! next one, the byte carry of that step, and the next table index. Tables
//! are built by `const fn` and never mutated.

/// Values represented by the 8 bits of a sieve byte, as offsets from the
/// byte's base value. Bit 7 is the `1 (mod 30)` residue of the *next* block.
pub const BIT_VALUES: [u64; 8] = [7, 11, 13, 17, 19, 23, 29, 31];

/// Prime residue classes mod 30, in wheel-table block order.
const CLASS_RESIDUES: [u64; 8] = [7, 11, 13, 17, 19, 23, 29, 1];

/// residue mod 30 -> bit position in a sieve byte (invalid residues 0xFF).
const BIT_INDEX: [u8; 30] = {
    let mut t = [0xFFu8; 30];
    t[7] = 0;
    t[11] = 1;
    t[13] = 2;
    t[17] = 3;
    t[19] = 4;
    t[23] = 5;
    t[29] = 6;
    t[1] = 7;
    t
};

/// prime % 30 -> wheel-table block index (rows of CLASS_RESIDUES).
const WHEEL_OFFSETS: [usize; 30] = {
    let mut t = [0usize; 30];
    let mut b = 0;
    while b < 8 {
        t[CLASS_RESIDUES[b] as usize] = b;
        b += 1;
    }
    t
};

/// Seeding entry: for a quotient residue `m`, the distance to the next
/// residue coprime to the wheel modulo and that residue's state index.
#[derive(Clone, Copy, Debug)]
pub struct WheelInit {
    pub next_multiple_factor: u8,
    pub wheel_index: u8,
}

/// One state of the wheel state machine (per prime class and quotient
/// residue): strike mask plus the advance to the next multiple.
#[derive(Clone, Copy, Debug)]
pub struct WheelElement {
    /// AND mask clearing the current multiple's bit.
    pub unset_bit: u8,
    /// Quotient distance to the next multiple coprime to the modulo.
    pub next_multiple_factor: u8,
    /// Byte carry of the advance beyond `next_multiple_factor * (prime / 30)`.
    pub correct: u8,
    /// Table index of the next state.
    pub next: u16,
}

const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

const fn coprime_residues<const M: u64, const N: usize>() -> [u64; N] {
    let mut out = [0u64; N];
    let mut i = 0;
    let mut r = 1u64;
    while r < M {
        if gcd(r, M) == 1 {
            out[i] = r;
            i += 1;
        }
        r += 1;
    }
    assert!(i == N);
    out
}

const fn init_table<const M: usize, const N: usize>(res: [u64; N]) -> [WheelInit; M] {
    let mut out = [WheelInit { next_multiple_factor: 0, wheel_index: 0 }; M];
    let mut m = 0;
    while m < M {
        let mut k = 0u64;
        while gcd((m as u64 + k) % M as u64, M as u64) != 1 {
            k += 1;
        }
        let mut j = 0;
        while res[j] != (m as u64 + k) % M as u64 {
            j += 1;
        }
        out[m] = WheelInit { next_multiple_factor: k as u8, wheel_index: j as u8 };
        m += 1;
    }
    out
}

const fn wheel_table<const M: u64, const S: usize, const T: usize>(
    res: [u64; S],
) -> [WheelElement; T] {
    assert!(T == 8 * S);
    let mut out = [WheelElement { unset_bit: 0, next_multiple_factor: 0, correct: 0, next: 0 }; T];
    let mut b = 0;
    while b < 8 {
        // beta: the sieving prime's residue mod 30
        let beta = CLASS_RESIDUES[b];
        let mut j = 0;
        while j < S {
            // c: the multiple's quotient residue; alpha: the multiple mod 30
            let c = res[j];
            let f = (res[(j + 1) % S] + M - c) % M;
            let alpha = (beta * c) % 30;
            // byte offsets are measured from low + 6, hence the -6 shift
            let r = (alpha + 24) % 30;
            out[b * S + j] = WheelElement {
                unset_bit: !(1u8 << BIT_INDEX[alpha as usize]),
                next_multiple_factor: f as u8,
                correct: ((r + f * beta) / 30) as u8,
                next: (b * S + (j + 1) % S) as u16,
            };
            j += 1;
        }
        b += 1;
    }
    out
}

const fn max_gap<const S: usize>(res: [u64; S], modulo: u64) -> u64 {
    let mut max = 0;
    let mut j = 0;
    while j < S {
        let f = (res[(j + 1) % S] + modulo - res[j]) % modulo;
        if f > max {
            max = f;
        }
        j += 1;
    }
    max
}

const WHEEL30_RESIDUES: [u64; 8] = coprime_residues::<30, 8>();
const WHEEL210_RESIDUES: [u64; 48] = coprime_residues::<210, 48>();

/// Wheel-30 seeding table, indexed by quotient % 30.
pub static WHEEL30_INIT: [WheelInit; 30] = init_table::<30, 8>(WHEEL30_RESIDUES);
/// Wheel-210 seeding table, indexed by quotient % 210.
pub static WHEEL210_INIT: [WheelInit; 210] = init_table::<210, 48>(WHEEL210_RESIDUES);
/// Wheel-30 state machine: 8 prime classes x 8 quotient states.
pub static WHEEL30: [WheelElement; 64] = wheel_table::<30, 8, 64>(WHEEL30_RESIDUES);
/// Wheel-210 state machine: 8 prime classes x 48 quotient states.
pub static WHEEL210: [WheelElement; 384] = wheel_table::<210, 48, 384>(WHEEL210_RESIDUES);

/// Largest quotient step in the wheel-210 cycle; bounds how far a single
/// advance can carry a multiple (used to size the bucket list ring).
pub const MAX_FACTOR_210: u64 = max_gap(WHEEL210_RESIDUES, 210);

/// Prime residue class (mod 30) encoded in a wheel-210 state index.
pub fn prime_class_residue(wheel_index: u32) -> u64 {
    CLASS_RESIDUES[wheel_index as usize / 48]
}

/// Computes the seed cursor of `prime` for the wheel-210 engine: the byte
/// index (relative to `segment_low`) and wheel state of the first multiple
/// that is `>= max(prime^2, segment_low + 7)`, coprime to 210, and
/// `<= stop`. Returns `None` when no such multiple exists, in which case
/// the prime takes no part in sieving this range.
pub fn first_multiple_210(prime: u64, segment_low: u64, stop: u64) -> Option<(u64, u32)> {
    first_multiple(prime, segment_low, stop, &WHEEL210_INIT, 210, 48)
}

/// Wheel-30 counterpart of [`first_multiple_210`]; valid for primes >= 7.
pub fn first_multiple_30(prime: u64, segment_low: u64, stop: u64) -> Option<(u64, u32)> {
    first_multiple(prime, segment_low, stop, &WHEEL30_INIT, 30, 8)
}

fn first_multiple(
    prime: u64,
    segment_low: u64,
    stop: u64,
    init: &[WheelInit],
    modulo: u64,
    states: usize,
) -> Option<(u64, u32)> {
    debug_assert!(prime >= 7);
    debug_assert!(segment_low % 30 == 0);
    let low = segment_low + 6;
    // Crossing off starts at prime^2: smaller multiples have a smaller
    // prime factor and are handled by that prime (quotient = prime also
    // guards against striking the prime itself).
    let quotient = u64::max(prime, low / prime + 1);
    let multiple = prime.checked_mul(quotient)?;
    if multiple > stop {
        return None;
    }
    let entry = init[(quotient % modulo) as usize];
    let advance = prime * entry.next_multiple_factor as u64;
    if advance > stop - multiple {
        return None;
    }
    let multiple_index = (multiple + advance - low) / 30;
    let wheel_index = WHEEL_OFFSETS[(prime % 30) as usize] * states + entry.wheel_index as usize;
    Some((multiple_index, wheel_index as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residue_tables() {
        assert_eq!(WHEEL30_RESIDUES, [1, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(WHEEL210_RESIDUES[0], 1);
        assert_eq!(WHEEL210_RESIDUES[1], 11);
        assert_eq!(WHEEL210_RESIDUES[47], 209);
        assert_eq!(MAX_FACTOR_210, 10);
    }

    #[test]
    fn init_tables_pick_next_coprime() {
        // A coprime residue maps to itself with factor 0.
        for &r in &WHEEL210_RESIDUES {
            let e = WHEEL210_INIT[r as usize];
            assert_eq!(e.next_multiple_factor, 0);
            assert_eq!(WHEEL210_RESIDUES[e.wheel_index as usize], r);
        }
        // Residue 0 steps one quotient to reach 1.
        assert_eq!(WHEEL210_INIT[0].next_multiple_factor, 1);
        let e = WHEEL30_INIT[24];
        assert_eq!(e.next_multiple_factor, 5);
        assert_eq!(WHEEL30_RESIDUES[e.wheel_index as usize], 29);
    }

    /// Replays the wheel state machine for a prime and checks that the
    /// sequence of struck values matches a naive enumeration of the
    /// prime's multiples with quotients coprime to the wheel modulo.
    fn check_strike_sequence(prime: u64, segment_low: u64, modulo: u64) {
        let stop = u64::MAX / 4;
        let (table, states): (&[WheelElement], usize) = match modulo {
            30 => (&WHEEL30, 8),
            _ => (&WHEEL210, 48),
        };
        let seed = match modulo {
            30 => first_multiple_30(prime, segment_low, stop),
            _ => first_multiple_210(prime, segment_low, stop),
        };
        let (mut mi, mut wi) = seed.expect("seed within range");
        assert_eq!(wi as usize / states, WHEEL_OFFSETS[(prime % 30) as usize]);

        let sieving_prime = prime / 30;
        let mut struck = Vec::new();
        for _ in 0..64 {
            let e = table[wi as usize];
            let bit = (!e.unset_bit).trailing_zeros() as usize;
            struck.push(segment_low + 30 * mi + BIT_VALUES[bit]);
            mi += e.next_multiple_factor as u64 * sieving_prime + e.correct as u64;
            wi = e.next as u32;
        }

        let q0 = u64::max(prime, (segment_low + 6) / prime + 1);
        let expected: Vec<u64> = (q0..)
            .filter(|q| gcd(*q, modulo) == 1)
            .map(|q| prime * q)
            .take(64)
            .collect();
        assert_eq!(struck, expected, "prime {} mod {}", prime, modulo);
    }

    #[test]
    fn strike_sequences_cover_all_prime_classes() {
        // One prime per residue class mod 30 (37 = 7, 41 = 11, ... 31 = 1).
        for &p in &[37, 41, 13, 17, 19, 23, 29, 31, 1009, 999983] {
            check_strike_sequence(p, 0, 210);
            check_strike_sequence(p, 0, 30);
        }
        // 7 shares a factor with 210, so only the wheel-30 engine takes it.
        check_strike_sequence(7, 0, 30);
        // Non-zero segment bases.
        check_strike_sequence(101, 1_000_020, 210);
        check_strike_sequence(11, 990, 30);
    }

    #[test]
    fn first_multiple_starts_at_prime_square() {
        // 101^2 = 10201: first struck multiple from a low base.
        let (mi, _) = first_multiple_210(101, 0, 1 << 40).unwrap();
        assert_eq!((10201 - 6) / 30, mi);
        // Never seeds at the prime itself.
        let (mi, wi) = first_multiple_30(7, 0, 1 << 40).unwrap();
        let e = WHEEL30[wi as usize];
        let bit = (!e.unset_bit).trailing_zeros() as usize;
        assert_eq!(30 * mi + BIT_VALUES[bit], 49);
    }

    #[test]
    fn first_multiple_past_stop_is_none() {
        assert!(first_multiple_210(1009, 0, 1000).is_none());
        // p^2 > stop
        assert!(first_multiple_210(101, 0, 10_000).is_none());
        assert!(first_multiple_30(999_983, 0, 1_000_000).is_none());
        // In range just above p^2.
        assert!(first_multiple_210(101, 0, 10_201).is_some());
    }

    #[test]
    fn bit_layout_roundtrip() {
        for (b, &v) in BIT_VALUES.iter().enumerate() {
            assert_eq!(BIT_INDEX[(v % 30) as usize] as usize, b);
        }
    }
}
