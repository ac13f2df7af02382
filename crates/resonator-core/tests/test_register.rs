mod common;

use approx::assert_abs_diff_eq;
use nalgebra::Matrix3;
use resonator_core::error::ResonatorError;
use resonator_core::frame::Frame;
use resonator_core::pipeline::config::RegistrationConfig;
use resonator_core::register::features::{detect_and_describe, fast_corners, KeypointParams};
use resonator_core::register::homography::{estimate_dlt, fit_ransac, Homography, RansacConfig};
use resonator_core::register::matcher::{hamming, match_descriptors, retain_best, Match};
use resonator_core::register::{estimate_homography, match_features, register, FeatureMatches};
use resonator_core::roi::{map_roi, RoiRect};

use common::{block_texture, window};

// ---------------------------------------------------------------------------
// Homography estimation
// ---------------------------------------------------------------------------

fn grid_points() -> Vec<[f64; 2]> {
    let mut pts = Vec::new();
    for y in 0..6 {
        for x in 0..8 {
            pts.push([x as f64 * 17.0 + 3.0, y as f64 * 13.0 + 5.0]);
        }
    }
    pts
}

fn known_homography() -> Homography {
    Homography::from_matrix(Matrix3::new(
        1.02, 0.03, 12.0, -0.02, 0.98, -7.5, 1e-5, -2e-5, 1.0,
    ))
}

#[test]
fn test_dlt_recovers_exact_homography() {
    let h = known_homography();
    let src = grid_points();
    let dst: Vec<[f64; 2]> = src
        .iter()
        .map(|p| {
            let (x, y) = h.project(p[0], p[1]).unwrap();
            [x, y]
        })
        .collect();
    let fit = estimate_dlt(&src, &dst).unwrap();
    for (a, b) in fit.matrix().iter().zip(h.matrix().iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
}

#[test]
fn test_ransac_rejects_outliers() {
    let h = Homography::translation(4.0, -9.0);
    let src = grid_points();
    let mut dst: Vec<[f64; 2]> = src.iter().map(|p| [p[0] + 4.0, p[1] - 9.0]).collect();
    for (i, d) in dst.iter_mut().enumerate().filter(|(i, _)| i % 5 == 0) {
        *d = [d[0] + 40.0 + i as f64, d[1] - 25.0];
    }

    let fit = fit_ransac(&src, &dst, &RansacConfig::default()).unwrap();
    let outliers = src.len().div_ceil(5);
    assert_eq!(fit.inlier_count, src.len() - outliers);
    assert!(!fit.inlier_mask[0]);
    for (a, b) in fit.homography.matrix().iter().zip(h.matrix().iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
}

#[test]
fn test_ransac_needs_four_points() {
    let pts = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    let err = fit_ransac(&pts, &pts, &RansacConfig::default()).unwrap_err();
    assert!(matches!(err, ResonatorError::TooFewMatches { needed: 4, found: 3 }));
}

#[test]
fn test_inverse_round_trips() {
    let h = known_homography();
    let inv = h.inverse().unwrap();
    let (x, y) = h.project(50.0, 40.0).unwrap();
    let (bx, by) = inv.project(x, y).unwrap();
    assert_abs_diff_eq!(bx, 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(by, 40.0, epsilon = 1e-9);
}

// ---------------------------------------------------------------------------
// Features and matching
// ---------------------------------------------------------------------------

#[test]
fn test_fast_finds_square_corners() {
    let mut gray = ndarray::Array2::<u8>::from_elem((80, 80), 20);
    gray.slice_mut(ndarray::s![30..50, 30..50]).fill(220);
    let corners = fast_corners(&gray, 20);
    assert!(!corners.is_empty());
    for &(x, y, _) in &corners {
        let near_corner = [(30, 30), (49, 30), (30, 49), (49, 49)]
            .iter()
            .any(|&(cx, cy): &(usize, usize)| x.abs_diff(cx) <= 2 && y.abs_diff(cy) <= 2);
        assert!(near_corner, "unexpected corner at ({x}, {y})");
    }
}

#[test]
fn test_flat_image_has_no_features() {
    let frame = Frame::new(ndarray::Array2::from_elem((100, 100), 0.5), 8);
    let params = KeypointParams {
        max_features: 100,
        fast_threshold: 20,
        pyramid_levels: 3,
    };
    assert!(detect_and_describe(&frame, &params).is_empty());
}

#[test]
fn test_hamming_distance() {
    let a = [0u64, 0, 0, 0];
    let b = [0b1011u64, 0, u64::MAX, 0];
    assert_eq!(hamming(&a, &b), 3 + 64);
}

#[test]
fn test_matcher_pairs_identical_descriptors() {
    let q = vec![[1u64, 2, 3, 4], [u64::MAX, 0, 0, 0]];
    let t = vec![[u64::MAX, 0, 0, 1], [1u64, 2, 3, 4]];
    let matches = match_descriptors(&q, &t, true);
    assert_eq!(matches.len(), 2);
    assert!(matches.contains(&Match { query: 0, train: 1, distance: 0 }));
    assert!(matches.contains(&Match { query: 1, train: 0, distance: 1 }));
}

#[test]
fn test_retain_best_keeps_fraction_in_order() {
    let matches: Vec<Match> = [5u32, 1, 9, 3]
        .iter()
        .enumerate()
        .map(|(i, &d)| Match { query: i, train: i, distance: d })
        .collect();
    let kept = retain_best(matches, 0.5);
    assert_eq!(kept.iter().map(|m| m.distance).collect::<Vec<_>>(), vec![1, 3]);
}

#[test]
fn test_too_few_matches_is_registration_failure() {
    let matches = FeatureMatches {
        subject: Default::default(),
        basis: Default::default(),
        matches: Vec::new(),
    };
    let err = estimate_homography(&matches, &RegistrationConfig::default()).unwrap_err();
    assert!(matches!(err, ResonatorError::TooFewMatches { found: 0, .. }));
}

#[test]
fn test_featureless_images_fail_registration() {
    let flat = Frame::new(ndarray::Array2::from_elem((120, 120), 0.3), 8);
    assert!(register(&flat, &flat, &RegistrationConfig::default()).is_err());
}

// ---------------------------------------------------------------------------
// Translated texture end to end
// ---------------------------------------------------------------------------

#[test]
fn test_translation_recovered_and_roi_shifted() {
    let (dx, dy) = (8usize, 4usize);
    let tex = block_texture(360, 280, 6, 7);
    let (ox, oy, w, h) = (20usize, 20usize, 320usize, 240usize);
    // A basis point p appears in the subject at p + (dx, dy).
    let basis = Frame::new(window(&tex, ox, oy, w, h), 8);
    let subject = Frame::new(window(&tex, ox - dx, oy - dy, w, h), 8);

    let config = RegistrationConfig::default();
    let matches = match_features(&subject, &basis, &config);
    assert!(matches.matches.len() >= 20, "only {} matches", matches.matches.len());

    let reg = estimate_homography(&matches, &config).unwrap();
    let (tx, ty) = reg.basis_to_subject.translation_component();
    assert_abs_diff_eq!(tx, dx as f64, epsilon = 0.5);
    assert_abs_diff_eq!(ty, dy as f64, epsilon = 0.5);

    let (sx, sy) = reg.subject_to_basis.translation_component();
    assert_abs_diff_eq!(sx, -(dx as f64), epsilon = 0.5);
    assert_abs_diff_eq!(sy, -(dy as f64), epsilon = 0.5);

    let roi = RoiRect::new(100, 60, 40, 100);
    let mapped = map_roi(&roi, &reg.basis_to_subject, w as u32, h as u32).unwrap();
    assert_eq!(mapped, RoiRect::new(100 + dx as u32, 60 + dy as u32, 40, 100));
}
