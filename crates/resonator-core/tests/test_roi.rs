use nalgebra::Matrix3;
use resonator_core::error::ResonatorError;
use resonator_core::register::homography::Homography;
use resonator_core::roi::{map_roi, RoiRect};

#[test]
fn test_identity_leaves_roi_unchanged() {
    let roi = RoiRect::new(10, 20, 30, 40);
    let mapped = map_roi(&roi, &Homography::identity(), 200, 100).unwrap();
    assert_eq!(mapped, roi);
}

#[test]
fn test_translation_shifts_roi() {
    let roi = RoiRect::new(10, 20, 30, 40);
    let mapped = map_roi(&roi, &Homography::translation(5.0, -3.0), 200, 100).unwrap();
    assert_eq!(mapped, RoiRect::new(15, 17, 30, 40));
}

#[test]
fn test_scale_grows_bounding_box() {
    let roi = RoiRect::new(10, 10, 20, 20);
    let h = Homography::from_matrix(Matrix3::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0));
    let mapped = map_roi(&roi, &h, 200, 200).unwrap();
    assert_eq!(mapped, RoiRect::new(20, 20, 40, 40));
}

#[test]
fn test_rotation_uses_bounding_box() {
    // 90 degrees about the origin, then shifted back into the frame.
    let h = Homography::from_matrix(Matrix3::new(0.0, -1.0, 100.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0));
    let roi = RoiRect::new(10, 20, 30, 10);
    let mapped = map_roi(&roi, &h, 200, 200).unwrap();
    assert_eq!(mapped, RoiRect::new(70, 10, 10, 30));
}

#[test]
fn test_partial_overlap_is_clipped() {
    let roi = RoiRect::new(0, 0, 50, 50);
    let mapped = map_roi(&roi, &Homography::translation(-20.0, 80.0), 100, 100).unwrap();
    assert_eq!(mapped, RoiRect::new(0, 80, 30, 20));
}

#[test]
fn test_fully_outside_is_config_error() {
    let roi = RoiRect::new(10, 10, 20, 20);
    let err = map_roi(&roi, &Homography::translation(500.0, 0.0), 100, 100).unwrap_err();
    assert!(matches!(err, ResonatorError::RoiOutOfFrame { .. }));
    assert!(err.to_string().contains("reset the basis image"));
}

#[test]
fn test_negative_side_outside_is_config_error() {
    let roi = RoiRect::new(10, 10, 20, 20);
    let err = map_roi(&roi, &Homography::translation(-40.0, -40.0), 100, 100).unwrap_err();
    assert!(matches!(err, ResonatorError::RoiOutOfFrame { .. }));
}

#[test]
fn test_collapsed_projection_is_config_error() {
    // Every point lands on the same x: zero-width box.
    let h = Homography::from_matrix(Matrix3::new(0.0, 0.0, 5.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0));
    let roi = RoiRect::new(10, 10, 20, 20);
    assert!(map_roi(&roi, &h, 100, 100).is_err());
}

#[test]
fn test_parse_roi() {
    let roi: RoiRect = "1, 2,3,4".parse().unwrap();
    assert_eq!(roi, RoiRect::new(1, 2, 3, 4));
    assert!("1,2,3".parse::<RoiRect>().is_err());
    assert!("1,2,0,4".parse::<RoiRect>().is_err());
    assert!("a,b,c,d".parse::<RoiRect>().is_err());
}

#[test]
fn test_fits() {
    let roi = RoiRect::new(90, 0, 10, 10);
    assert!(roi.fits(100, 10));
    assert!(!roi.fits(99, 10));
}

#[test]
fn test_edges_near_u32_max_do_not_overflow() {
    let roi = RoiRect::new(u32::MAX - 5, 0, 10, 10);
    assert_eq!(roi.right(), u32::MAX as u64 + 5);
    assert!(!roi.in_pixel_range());
    assert!(!roi.fits(100, 100));
    let err = map_roi(&roi, &Homography::identity(), 100, 100).unwrap_err();
    assert!(matches!(err, ResonatorError::RoiOutOfFrame { .. }));
}

#[test]
fn test_parse_rejects_roi_past_pixel_range() {
    assert!("4294967290,0,10,10".parse::<RoiRect>().is_err());
    assert!("0,4294967295,1,1".parse::<RoiRect>().is_err());
    assert!("0,4294967294,1,1".parse::<RoiRect>().is_ok());
}
