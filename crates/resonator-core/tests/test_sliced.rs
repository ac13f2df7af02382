use ndarray::{array, Array2};
use resonator_core::error::ResonatorError;
use resonator_core::io::sliced::{read_sliced, write_sliced};

#[test]
fn test_round_trip_is_exact() {
    let signal = Array2::from_shape_fn((7, 5), |(r, c)| {
        (r as f64 + 1.0) / 3.0 - c as f64 * 1e-7 + (r * c) as f64 * std::f64::consts::PI
    });
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sliced.csv");
    write_sliced(&path, signal.view()).unwrap();
    let back = read_sliced(&path).unwrap();
    assert_eq!(back, signal);
}

#[test]
fn test_file_is_comma_delimited_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sliced.csv");
    write_sliced(&path, array![[1.0, 2.5], [-3.0, 0.125]].view()).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "1,2.5\n-3,0.125\n");
}

#[test]
fn test_reads_numpy_style_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sliced.csv");
    std::fs::write(&path, "1.000000000000000000e+00,2.5e-01\n3.0,4.0\n").unwrap();
    assert_eq!(read_sliced(&path).unwrap(), array![[1.0, 0.25], [3.0, 4.0]]);
}

#[test]
fn test_ragged_rows_rejected_with_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sliced.csv");
    std::fs::write(&path, "1,2,3\n4,5\n").unwrap();
    match read_sliced(&path) {
        Err(ResonatorError::SlicedFormat { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected SlicedFormat, got {other:?}"),
    }
}

#[test]
fn test_non_numeric_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sliced.csv");
    std::fs::write(&path, "1,2\n3,x\n").unwrap();
    assert!(matches!(
        read_sliced(&path),
        Err(ResonatorError::SlicedFormat { line: 2, .. })
    ));
}
