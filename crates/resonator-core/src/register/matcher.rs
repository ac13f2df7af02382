use rayon::prelude::*;

use super::features::Descriptor;

/// A correspondence between a query (subject) and train (basis) descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub query: usize,
    pub train: usize,
    pub distance: u32,
}

pub fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

fn nearest(d: &Descriptor, candidates: &[Descriptor]) -> Option<(usize, u32)> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, hamming(d, c)))
        .min_by_key(|&(i, dist)| (dist, i))
}

/// Brute-force nearest neighbour for every query descriptor.
///
/// With `cross_check`, a pair is kept only when each side is the other's
/// nearest neighbour.
pub fn match_descriptors(query: &[Descriptor], train: &[Descriptor], cross_check: bool) -> Vec<Match> {
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }

    let forward: Vec<Match> = query
        .par_iter()
        .enumerate()
        .filter_map(|(qi, d)| {
            nearest(d, train).map(|(ti, distance)| Match {
                query: qi,
                train: ti,
                distance,
            })
        })
        .collect();

    if !cross_check {
        return forward;
    }

    let backward: Vec<Option<usize>> = train
        .par_iter()
        .map(|d| nearest(d, query).map(|(qi, _)| qi))
        .collect();
    forward
        .into_iter()
        .filter(|m| backward[m.train] == Some(m.query))
        .collect()
}

/// Sort by ascending distance and keep the best `fraction` of matches
/// (rounded down).
pub fn retain_best(mut matches: Vec<Match>, fraction: f64) -> Vec<Match> {
    matches.sort_by_key(|m| (m.distance, m.query));
    let keep = (matches.len() as f64 * fraction.clamp(0.0, 1.0)) as usize;
    matches.truncate(keep);
    matches
}
