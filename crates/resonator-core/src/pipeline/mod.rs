pub mod config;
pub mod plot;
pub mod reconcile;
pub mod resonator;
pub mod run;
mod types;

pub use reconcile::{reconcile, reconcile_file, ReconcileParams, Reconciled};
pub use resonator::{run_resonator, run_resonator_reported, ResonatorOutput};
pub use run::{run_inlet, PhaseResult};
pub use types::{NoOpReporter, Phase, PipelineStage, ProgressReporter};
