/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Downscaling,
    Registering,
    MappingRoi,
    Background,
    Streaming,
    Reducing,
    Persisting,
    Reconciling,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Downscaling => write!(f, "Downscaling video"),
            Self::Registering => write!(f, "Registering against basis"),
            Self::MappingRoi => write!(f, "Mapping ROI"),
            Self::Background => write!(f, "Measuring background"),
            Self::Streaming => write!(f, "Extracting brightness"),
            Self::Reducing => write!(f, "Reducing signal"),
            Self::Persisting => write!(f, "Writing sliced signal"),
            Self::Reconciling => write!(f, "Reconciling with references"),
        }
    }
}

/// Part of the run a video or result belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Concentration,
    Washing,
    /// Unsplit recording of the whole run.
    Total,
}

impl Phase {
    /// Lowercase name used as the output file prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Concentration => "concentration",
            Self::Washing => "washing",
            Self::Total => "total",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "concentration" => Ok(Self::Concentration),
            "washing" => Ok(Self::Washing),
            "total" => Ok(Self::Total),
            other => Err(format!("unknown phase '{other}'")),
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., frame count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Progress reporter that discards everything.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
