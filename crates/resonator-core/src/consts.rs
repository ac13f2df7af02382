/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-12;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.114;

/// Number of channels in a color frame (R, G, B).
pub const COLOR_CHANNEL_COUNT: usize = 3;

/// Frame used for registration; earlier frames of the recordings are often corrupt.
pub const DEFAULT_REGISTRATION_FRAME: usize = 99;

/// Nominal capture interval of the resonator camera, in seconds.
pub const DEFAULT_SECONDS_PER_FRAME: f64 = 0.033_701_279_491_161_897;

/// SER timestamps count 100 ns ticks.
pub const SER_TICKS_PER_SECOND: f64 = 10_000_000.0;

/// Suffix appended to the stem of a downscaled copy of a video.
pub const DOWNSCALED_SUFFIX: &str = "_small";

/// Minimum number of correspondences for a homography.
pub const MIN_HOMOGRAPHY_POINTS: usize = 4;

/// Side of the square BRIEF sampling patch.
pub const BRIEF_PATCH_SIZE: i32 = 31;

/// Bits per BRIEF descriptor.
pub const BRIEF_BITS: usize = 256;

/// Radius of the disc used for the intensity-centroid orientation.
pub const ORIENTATION_RADIUS: i32 = 15;

/// Keypoints closer than this to the border cannot hold a rotated patch.
pub const KEYPOINT_BORDER: usize = 22;

/// Sigma of the blur applied before sampling BRIEF pairs.
pub const BRIEF_SMOOTHING_SIGMA: f32 = 2.0;

/// Gaussian blur sigma used when building the detection pyramid.
pub const PYRAMID_BLUR_SIGMA: f32 = 1.0;

/// Kernel radius of the temporal Gaussian filter, in standard deviations.
pub const GAUSSIAN_TRUNCATE: f64 = 4.0;
