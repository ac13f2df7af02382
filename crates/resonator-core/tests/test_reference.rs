use approx::assert_abs_diff_eq;
use resonator_core::io::export::{write_columns, Column};
use resonator_core::io::reference::{read_reference, Reference, TimeSeries};

/// Lay out workbook cells on a 14-column (A..N) grid and join as CSV.
fn workbook_csv(cells: &[(usize, usize, &str)]) -> String {
    let rows = cells.iter().map(|c| c.0).max().unwrap_or(0) + 1;
    let mut grid = vec![vec![String::new(); 14]; rows];
    for &(row, col, text) in cells {
        grid[row][col] = text.to_string();
    }
    grid.iter().map(|r| r.join(",")).collect::<Vec<_>>().join("\n")
}

const A: usize = 0;
const C: usize = 2;
const G: usize = 6;
const I: usize = 8;
const M: usize = 12;
const N: usize = 13;

fn full_workbook() -> String {
    workbook_csv(&[
        (0, A, "Concentration cells"),
        (1, A, "t"),
        (1, A + 1, "count"),
        (2, A, "0"),
        (2, A + 1, "10"),
        (3, A, "1"),
        (3, A + 1, "20"),
        (0, C, "Concentration sensor"),
        (1, C, "t"),
        (1, C + 1, "value"),
        (2, C, "0.5"),
        (2, C + 1, "3.5"),
        (0, G, "Washing cells"),
        (1, G, "t"),
        (1, G + 1, "count"),
        (2, G, "0"),
        (2, G + 1, "15"),
        (0, I, "Washing sensor"),
        (1, I, "t"),
        (1, I + 1, "value"),
        (2, I, "2"),
        (2, I + 1, "1.25"),
        (0, M, "Marker"),
        (0, N, "Time"),
        (1, M, "Start of concentration"),
        (1, N, "Start of video"),
        (2, M, "Start of washing"),
        (2, N, "12:30"),
    ])
}

#[test]
fn test_reads_all_series_on_video_clock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.csv");
    std::fs::write(&path, full_workbook()).unwrap();

    let wb = read_reference(&path).unwrap();
    assert_abs_diff_eq!(wb.washing_start(), 750.0);
    assert_eq!(wb.markers.get("Start of concentration"), Some(&0.0));

    let cells = wb.concentration.cells.as_present().unwrap();
    assert_eq!(cells.times, vec![0.0, 60.0]);
    assert_eq!(cells.values, vec![10.0, 20.0]);

    let sensor = wb.concentration.sensor.as_present().unwrap();
    assert_eq!(sensor.times, vec![30.0]);

    // Washing series are offset by the washing start marker.
    let w_cells = wb.washing.cells.as_present().unwrap();
    assert_eq!(w_cells.times, vec![750.0]);
    assert_eq!(w_cells.values, vec![15.0]);
    let w_sensor = wb.washing.sensor.as_present().unwrap();
    assert_eq!(w_sensor.times, vec![870.0]);
    assert_eq!(w_sensor.values, vec![1.25]);
}

#[test]
fn test_bad_series_is_absent_others_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.csv");
    let text = workbook_csv(&[
        (2, A, "0"),
        (2, A + 1, "lots"),
        (2, C, "1"),
        (2, C + 1, "4"),
        (1, M, "Start of concentration"),
        (1, N, "0:10"),
    ]);
    std::fs::write(&path, text).unwrap();

    let wb = read_reference(&path).unwrap();
    assert_eq!(wb.concentration.cells, Reference::Absent);
    let sensor = wb.concentration.sensor.as_present().unwrap();
    assert_eq!(sensor.times, vec![70.0]);
}

#[test]
fn test_missing_phase_marker_drops_series() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.csv");
    let text = workbook_csv(&[
        (2, G, "0"),
        (2, G + 1, "5"),
        (1, M, "Start of concentration"),
        (1, N, "0:00"),
    ]);
    std::fs::write(&path, text).unwrap();

    let wb = read_reference(&path).unwrap();
    assert!(!wb.washing.cells.is_present());
    assert_eq!(wb.washing_start(), 0.0);
}

#[test]
fn test_blank_rows_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.csv");
    let text = workbook_csv(&[
        (2, A, "0"),
        (2, A + 1, "1"),
        (4, A, "2"),
        (4, A + 1, "3"),
        (1, M, "Start of concentration"),
        (1, N, "0:0"),
    ]);
    std::fs::write(&path, text).unwrap();

    let wb = read_reference(&path).unwrap();
    assert_eq!(wb.concentration.cells.as_present().unwrap().times, vec![0.0, 120.0]);
    // A column with no samples at all counts as missing.
    assert_eq!(wb.concentration.sensor, Reference::Absent);
}

#[test]
fn test_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_reference(&dir.path().join("absent.csv")).is_err());
}

#[test]
fn test_union_merges_by_time() {
    let a = Reference::Present(TimeSeries::new(vec![0.0, 2.0], vec![1.0, 3.0]));
    let b = Reference::Present(TimeSeries::new(vec![1.0], vec![2.0]));
    let merged = a.union(&b);
    let series = merged.as_present().unwrap();
    assert_eq!(series.times, vec![0.0, 1.0, 2.0]);
    assert_eq!(series.values, vec![1.0, 2.0, 3.0]);
    assert_eq!(series.span(), Some((0.0, 2.0)));
    assert_eq!(Reference::Absent.union(&Reference::Absent), Reference::Absent);
}

#[test]
fn test_export_pads_short_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.csv");
    write_columns(
        &path,
        &[
            Column::new("time", vec![0.0, 0.5, 1.0]),
            Column::new("cells, counted", vec![4.0]),
        ],
    )
    .unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["time,\"cells, counted\"", "0,4", "0.5,", "1,"]);
}
