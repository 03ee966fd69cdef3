//! N-gram chunk permutation used to test sensitivity to token order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Shuffles the order of consecutive `width`-token chunks while keeping each chunk intact.
///
/// `None` returns the tokens unchanged and does not touch the random source.
#[must_use]
pub fn permute_chunks<T, R>(tokens: Vec<T>, width: Option<usize>, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    let Some(width) = width else {
        return tokens;
    };
    if width == 0 || tokens.len() <= width {
        return tokens;
    }

    let total = tokens.len();
    let mut chunks: Vec<Vec<T>> = Vec::with_capacity(total.div_ceil(width));
    let mut remaining = tokens.into_iter();
    loop {
        let chunk: Vec<T> = remaining.by_ref().take(width).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    chunks.shuffle(rng);

    let mut permuted = Vec::with_capacity(total);
    for chunk in chunks {
        permuted.extend(chunk);
    }
    permuted
}

/// Derives the random stream of one work unit from the run seed and its position.
///
/// Every unit owns its generator, so results do not depend on which worker runs it.
#[must_use]
pub fn unit_rng(seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(mix(seed ^ mix(index as u64)))
}

// splitmix64 finaliser
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
