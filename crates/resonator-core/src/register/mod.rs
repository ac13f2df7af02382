//! Feature-based registration of a subject frame against the basis image.
//!
//! Direction contract: keypoints of the subject frame are the *source* and
//! keypoints of the basis image the *destination*, so the fitted transform is
//! `subject_to_basis`. ROI mapping must use [`Registration::basis_to_subject`].

pub mod features;
pub mod homography;
pub mod matcher;
pub mod visualize;

use tracing::{debug, info};

use crate::consts::MIN_HOMOGRAPHY_POINTS;
use crate::error::{ResonatorError, Result};
use crate::filters::gaussian::gaussian_blur;
use crate::frame::Frame;
use crate::pipeline::config::RegistrationConfig;

use features::{detect_and_describe, Features, KeypointParams};
use homography::{fit_ransac, Homography, RansacConfig};
use matcher::{match_descriptors, retain_best, Match};

/// Keypoints of both images and the retained (best-first) matches.
#[derive(Clone, Debug)]
pub struct FeatureMatches {
    pub subject: Features,
    pub basis: Features,
    pub matches: Vec<Match>,
}

#[derive(Clone, Debug)]
pub struct Registration {
    /// Maps subject-frame pixels onto basis-image pixels.
    pub subject_to_basis: Homography,
    /// Maps basis-image pixels onto subject-frame pixels.
    pub basis_to_subject: Homography,
    pub match_count: usize,
    pub inlier_count: usize,
}

/// Detect, describe and match features between the two images.
pub fn match_features(subject: &Frame, basis: &Frame, config: &RegistrationConfig) -> FeatureMatches {
    let subject = gaussian_blur(subject, config.blur_sigma);
    let basis = gaussian_blur(basis, config.blur_sigma);

    let params = KeypointParams {
        max_features: config.max_features,
        fast_threshold: config.fast_threshold,
        pyramid_levels: config.pyramid_levels,
    };
    let subject_features = detect_and_describe(&subject, &params);
    let basis_features = detect_and_describe(&basis, &params);

    let all = match_descriptors(
        &subject_features.descriptors,
        &basis_features.descriptors,
        config.cross_check,
    );
    let total = all.len();
    let matches = retain_best(all, config.good_match_percent);

    debug!(
        subject_keypoints = subject_features.len(),
        basis_keypoints = basis_features.len(),
        matches = total,
        retained = matches.len(),
        "Matched features"
    );

    FeatureMatches {
        subject: subject_features,
        basis: basis_features,
        matches,
    }
}

/// Fit the homography from retained matches.
pub fn estimate_homography(
    matches: &FeatureMatches,
    config: &RegistrationConfig,
) -> Result<Registration> {
    if matches.matches.len() < MIN_HOMOGRAPHY_POINTS {
        return Err(ResonatorError::TooFewMatches {
            needed: MIN_HOMOGRAPHY_POINTS,
            found: matches.matches.len(),
        });
    }

    let (src, dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = matches
        .matches
        .iter()
        .map(|m| {
            let s = &matches.subject.keypoints[m.query];
            let b = &matches.basis.keypoints[m.train];
            ([s.x, s.y], [b.x, b.y])
        })
        .unzip();

    let ransac = RansacConfig {
        max_iterations: config.ransac_iterations,
        threshold: config.ransac_threshold,
        seed: config.seed,
        ..RansacConfig::default()
    };
    let fit = fit_ransac(&src, &dst, &ransac)?;
    let subject_to_basis = fit.homography;
    let basis_to_subject = subject_to_basis.inverse()?;

    let (tx, ty) = basis_to_subject.translation_component();
    info!(
        matches = src.len(),
        inliers = fit.inlier_count,
        tx = format!("{tx:.2}"),
        ty = format!("{ty:.2}"),
        "Registered subject against basis"
    );

    Ok(Registration {
        subject_to_basis,
        basis_to_subject,
        match_count: src.len(),
        inlier_count: fit.inlier_count,
    })
}

/// Match features and fit the homography in one call.
pub fn register(subject: &Frame, basis: &Frame, config: &RegistrationConfig) -> Result<Registration> {
    let matches = match_features(subject, basis, config);
    estimate_homography(&matches, config)
}
