// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

// Counter-based random streams. Every stochastic decision draws from a generator seeded by
// (seed, step, stream, entity), so results do not depend on which worker thread ran the entity
// or in which order.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub(crate) enum Stream {
    Thermal = 1,
    BondBreak = 2,
    BondForm = 3,
}

/// SplitMix64 finalizer.
#[inline]
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

pub(crate) fn stream_rng(seed: u64, step: u64, stream: Stream, entity: u64) -> SmallRng {
    let key = mix(mix(mix(seed) ^ step) ^ stream as u64) ^ entity;
    SmallRng::seed_from_u64(mix(key))
}

/// Entity key of an unordered particle pair.
#[inline]
pub(crate) fn pair_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    (lo as u64) << 32 | hi as u64
}

/// One uniform draw in `[0, 1)` from the given stream.
pub(crate) fn uniform(seed: u64, step: u64, stream: Stream, entity: u64) -> f32 {
    stream_rng(seed, step, stream, entity).gen::<f32>()
}
