use std::path::Path;

use console::Style;
use resonator_core::pipeline::config::ResonatorConfig;
use resonator_core::pipeline::{PhaseResult, Reconciled, ResonatorOutput};

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_config_summary(title: &str, input: &Path, config: &ResonatorConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to(title));
    println!();
    println!("  {:<14}{}", s.label.apply_to("Input"), s.path.apply_to(input.display()));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Basis"),
        s.path.apply_to(config.video.basis_image.display())
    );
    println!("  {:<14}{}", s.label.apply_to("ROI"), s.value.apply_to(config.roi));
    match config.video.downscale_height {
        Some(h) => println!("  {:<14}{}", s.label.apply_to("Downscale"), s.value.apply_to(format!("{h} px"))),
        None => println!("  {:<14}{}", s.label.apply_to("Downscale"), s.disabled.apply_to("disabled")),
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Bins"),
        s.value.apply_to(format!(
            "{} px along {}, {} frames per row",
            config.extraction.spatial_bin, config.extraction.axis, config.reduction.slice_freq
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Calibration"),
        s.value.apply_to(format!(
            "{} * x + {}",
            config.calibration.alpha, config.calibration.beta
        ))
    );
    println!();
}

pub fn print_resonator_output(out: &ResonatorOutput) {
    let s = Styles::new();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(format!(
            "{} read, {} rows x {} bins",
            out.frames_read,
            out.signal.nrows(),
            out.signal.ncols()
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Matches"),
        s.value.apply_to(format!(
            "{} ({} inliers)",
            out.registration.match_count, out.registration.inlier_count
        ))
    );
    println!("  {:<14}{}", s.label.apply_to("Subject ROI"), s.value.apply_to(out.roi));
    println!("  {:<14}{}", s.label.apply_to("Sliced"), s.path.apply_to(out.sliced_path.display()));
    println!("  {:<14}{}", s.label.apply_to("Preview"), s.path.apply_to(out.preview_path.display()));
    println!("  {:<14}{}", s.label.apply_to("Matches img"), s.path.apply_to(out.matches_path.display()));
}

pub fn print_reconciled(result: &Reconciled, export: &Path, plot: &Path) {
    let s = Styles::new();
    let span = match (result.times.first(), result.times.last()) {
        (Some(a), Some(b)) => format!("{a:.2} - {b:.2} min ({} samples)", result.times.len()),
        _ => "empty".into(),
    };
    println!("  {:<14}{}", s.label.apply_to("Span"), s.value.apply_to(span));
    if !result.truncated {
        println!("  {:<14}{}", s.label.apply_to("References"), s.disabled.apply_to("none"));
    }
    println!("  {:<14}{}", s.label.apply_to("Export"), s.path.apply_to(export.display()));
    println!("  {:<14}{}", s.label.apply_to("Plot"), s.path.apply_to(plot.display()));
}

pub fn print_phase_result(result: &PhaseResult) {
    let s = Styles::new();
    println!();
    println!("  {}", s.title.apply_to(result.phase.name().to_uppercase()));
    print_resonator_output(&result.resonator);
    print_reconciled(&result.reconciled, &result.export_path, &result.plot_path);
}
