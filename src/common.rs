use std::ops::Range;
use thiserror::Error;

/// Errors returned by the engines in this crate.
///
/// None of them is transient. Re-running with the same input and configuration reproduces the
/// same error, so the caller has to change one of them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Label propagation needed more provisional labels than `LabelingConfig::max_components`.
    #[error("number of provisional labels exceeded the configured maximum of {max_components}")]
    CapacityExceeded { max_components: u32 },
    /// Parameter out of its domain (zero clusters, empty image, degenerate grid interval...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Input raster has the wrong number of channels for the entry point.
    #[error("expected {expected}-channel raster, got {found} channel(s)")]
    PreconditionViolation { expected: usize, found: usize },
    /// Buffer length does not match `width * height * channels`.
    #[error("buffer length {found} does not match raster dimensions (expected {expected})")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Changes between parallelization schemas of the SLIC assignment step.
#[derive(Clone, PartialEq, Debug, Copy)]
pub enum AssignThreadingStrategy {
    /// No threading - used for correctness checks and very small images.
    SingleThread,
    /// The label and distance grids are split into disjoint bands of rows and every band is
    /// processed by one rayon task. Every band visits clusters in the same order as the single
    /// threaded sweep, so the output is identical to `SingleThread`.
    ///
    /// This is the default.
    RowBased,
}

/// Config of the connected-component labeling.
#[derive(Clone, Debug)]
pub struct LabelingConfig {
    /// Maximal number of provisional labels the first pass may hand out. Exceeding it is a hard
    /// error ([`Error::CapacityExceeded`]), the output is never truncated.
    ///
    /// Connectivity is always 8.
    pub max_components: u32,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            max_components: 1000,
        }
    }
}

/// Config of the graph-based segmentation.
#[derive(Clone, Debug)]
pub struct SegmentationConfig {
    /// Standard deviation of the Gaussian blur applied before computing edge weights.
    /// Zero disables smoothing.
    pub sigma: f32,
    /// Merge constant _c_. Bigger means bigger components.
    pub threshold: f32,
    /// Components smaller than this are merged with their neighbours in a clean-up pass.
    pub min_component_size: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            sigma: 0.5,
            threshold: 1500.0,
            min_component_size: 20,
        }
    }
}

/// Main config for the SLIC superpixel processing.
#[derive(Clone, Debug)]
pub struct SlicConfig {
    /// Requested number of superpixels _K_. This directly influences the grid interval (_S_)
    ///
    /// Which is calculated using: _S = floor(sqrt((image width * height) / num_of_superpixels))_
    pub num_of_superpixels: u32,
    /// Weight _m_ of the spatial distance against the color distance.
    /// Higher means more compact superpixels.
    pub compactness: f32,
    /// How many assign/update iterations are done. There is no early exit.
    pub max_iterations: u16,
    /// Threading strategy for the assign step.
    pub assign_threading_strategy: AssignThreadingStrategy,
    /// When set, connected fragments smaller than _S * S * factor_ pixels are relabelled to a
    /// neighbouring superpixel after the last iteration.
    ///
    /// `None` keeps the raw clustering.
    pub min_size_factor: Option<f32>,
}

impl Default for SlicConfig {
    fn default() -> Self {
        Self {
            num_of_superpixels: 400,
            compactness: 10f32,
            max_iterations: 10,
            assign_threading_strategy: AssignThreadingStrategy::RowBased,
            min_size_factor: None,
        }
    }
}

pub(crate) fn split_length_to_ranges(length: usize, splits: usize) -> Vec<Range<usize>> {
    let splits = splits.max(1);
    let chunk_size = length / splits;
    let rem = length % splits;
    (0..splits)
        .scan((rem, 0usize), |(r, acc), _split| {
            let mut size = chunk_size;
            if *r > 0 {
                *r -= 1;
                size += 1;
            }
            let out = (*acc, *acc + size);
            *acc += size;
            Some(out.0..out.1)
        })
        .filter(|r| !r.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{split_length_to_ranges, Error};

    #[test]
    fn split_ranges_cover_length() {
        let ranges = split_length_to_ranges(10, 3);
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);
    }

    #[test]
    fn split_ranges_drop_empty_tail() {
        let ranges = split_length_to_ranges(2, 4);
        assert_eq!(ranges, vec![0..1, 1..2]);
    }

    #[test]
    fn capacity_error_reports_limit() {
        let err = Error::CapacityExceeded { max_components: 7 };
        assert!(err.to_string().contains('7'));
    }
}
