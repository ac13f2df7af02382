//! Planar homography estimation: normalized DLT inside RANSAC.

use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::consts::{EPSILON, MIN_HOMOGRAPHY_POINTS};
use crate::error::{ResonatorError, Result};

/// A 3x3 projective transform acting on `[x, y, 1]` column vectors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            matrix: Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0),
        }
    }

    /// Wrap a matrix, scaling it so that `h[2][2] == 1` where possible.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        let scale = matrix[(2, 2)];
        if scale.abs() > EPSILON {
            Self {
                matrix: matrix / scale,
            }
        } else {
            Self { matrix }
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Map a point, including the perspective divide. `None` when the point
    /// lands on the line at infinity.
    pub fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if p[2].abs() < EPSILON || !p.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some((p[0] / p[2], p[1] / p[2]))
    }

    /// Translation part (`h02`, `h12`) of the normalized matrix.
    pub fn translation_component(&self) -> (f64, f64) {
        (self.matrix[(0, 2)], self.matrix[(1, 2)])
    }

    pub fn is_degenerate(&self) -> bool {
        !self.matrix.iter().all(|v| v.is_finite()) || self.matrix.determinant().abs() < EPSILON
    }

    pub fn inverse(&self) -> Result<Self> {
        self.matrix
            .try_inverse()
            .filter(|_| !self.is_degenerate())
            .map(Self::from_matrix)
            .ok_or_else(|| ResonatorError::Registration("homography is not invertible".into()))
    }

    /// Euclidean distance between `project(src)` and `dst`.
    pub fn reprojection_error(&self, src: [f64; 2], dst: [f64; 2]) -> f64 {
        match self.project(src[0], src[1]) {
            Some((x, y)) => ((x - dst[0]).powi(2) + (y - dst[1]).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }
}

impl std::fmt::Display for Homography {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for r in 0..3 {
            writeln!(
                f,
                "[{:>12.6} {:>12.6} {:>12.6}]",
                self.matrix[(r, 0)],
                self.matrix[(r, 1)],
                self.matrix[(r, 2)]
            )?;
        }
        Ok(())
    }
}

/// Translate the centroid to the origin and scale to a mean distance of sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > EPSILON {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();
    (t, normalized)
}

/// Direct linear transform from at least four correspondences, such that
/// `dst ≈ H * src`.
pub fn estimate_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Homography> {
    let n = src.len().min(dst.len());
    if n < MIN_HOMOGRAPHY_POINTS || src.len() != dst.len() {
        return Err(ResonatorError::TooFewMatches {
            needed: MIN_HOMOGRAPHY_POINTS,
            found: n,
        });
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for i in 0..n {
        let [sx, sy] = src_n[i];
        let [dx, dy] = dst_n[i];

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A = eigenvector of A^T A with the smallest eigenvalue.
    let eig = SymmetricEigen::new(a.transpose() * &a);
    let min_idx = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let h = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| ResonatorError::Registration("point normalization failed".into()))?;
    let homography = Homography::from_matrix(t_dst_inv * h_norm * t_src);
    if homography.is_degenerate() {
        return Err(ResonatorError::Registration(
            "degenerate homography (collinear or coincident points)".into(),
        ));
    }
    Ok(homography)
}

#[derive(Clone, Debug)]
pub struct RansacConfig {
    pub max_iterations: usize,
    /// Inlier threshold on reprojection error, in pixels.
    pub threshold: f64,
    pub seed: u64,
    /// Stop early once this probability of an outlier-free sample is reached.
    pub confidence: f64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            threshold: 3.0,
            seed: 0,
            confidence: 0.995,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RansacFit {
    pub homography: Homography,
    pub inlier_mask: Vec<bool>,
    pub inlier_count: usize,
}

/// Robust homography fit tolerant of outlier correspondences.
///
/// The final model is refit by DLT on all inliers of the best hypothesis.
pub fn fit_ransac(src: &[[f64; 2]], dst: &[[f64; 2]], config: &RansacConfig) -> Result<RansacFit> {
    let n = src.len().min(dst.len());
    if n < MIN_HOMOGRAPHY_POINTS {
        return Err(ResonatorError::TooFewMatches {
            needed: MIN_HOMOGRAPHY_POINTS,
            found: n,
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut needed_iterations = config.max_iterations;
    let mut iteration = 0;

    while iteration < needed_iterations.min(config.max_iterations) {
        iteration += 1;
        let sample = rand::seq::index::sample(&mut rng, n, MIN_HOMOGRAPHY_POINTS).into_vec();
        let s_src: Vec<[f64; 2]> = sample.iter().map(|&i| src[i]).collect();
        let s_dst: Vec<[f64; 2]> = sample.iter().map(|&i| dst[i]).collect();
        if has_collinear_triple(&s_src) || has_collinear_triple(&s_dst) {
            continue;
        }
        let Ok(candidate) = estimate_dlt(&s_src, &s_dst) else {
            continue;
        };

        let mask: Vec<bool> = (0..n)
            .map(|i| candidate.reprojection_error(src[i], dst[i]) < config.threshold)
            .collect();
        let count = mask.iter().filter(|&&m| m).count();

        if best.as_ref().map_or(true, |(_, _, c)| count > *c) {
            let inlier_ratio = count as f64 / n as f64;
            needed_iterations = adaptive_iterations(inlier_ratio, config.confidence);
            best = Some((candidate, mask, count));
        }
    }

    let Some((model, mask, count)) = best else {
        return Err(ResonatorError::Registration(
            "RANSAC found no non-degenerate sample".into(),
        ));
    };
    if count < MIN_HOMOGRAPHY_POINTS {
        return Err(ResonatorError::TooFewMatches {
            needed: MIN_HOMOGRAPHY_POINTS,
            found: count,
        });
    }

    let in_src: Vec<[f64; 2]> = (0..n).filter(|&i| mask[i]).map(|i| src[i]).collect();
    let in_dst: Vec<[f64; 2]> = (0..n).filter(|&i| mask[i]).map(|i| dst[i]).collect();
    let homography = estimate_dlt(&in_src, &in_dst).unwrap_or(model);

    debug!(
        iterations = iteration,
        inliers = count,
        total = n,
        "RANSAC homography fit"
    );

    Ok(RansacFit {
        homography,
        inlier_mask: mask,
        inlier_count: count,
    })
}

fn adaptive_iterations(inlier_ratio: f64, confidence: f64) -> usize {
    let w4 = inlier_ratio.powi(MIN_HOMOGRAPHY_POINTS as i32);
    if w4 >= 1.0 - EPSILON {
        return 1;
    }
    if w4 <= EPSILON {
        return usize::MAX;
    }
    ((1.0 - confidence).ln() / (1.0 - w4).ln()).ceil().max(1.0) as usize
}

fn has_collinear_triple(pts: &[[f64; 2]]) -> bool {
    for i in 0..pts.len() {
        for j in (i + 1)..pts.len() {
            for k in (j + 1)..pts.len() {
                let [ax, ay] = pts[i];
                let [bx, by] = pts[j];
                let [cx, cy] = pts[k];
                let cross = (bx - ax) * (cy - ay) - (by - ay) * (cx - ax);
                if cross.abs() < 1e-6 {
                    return true;
                }
            }
        }
    }
    false
}
