use thiserror::Error;

/// Reason why a string couldn't be read as a `Metric`.
#[derive(Debug, Error, PartialEq)]
#[error("unknown error metric `{0}`; expected variance, mad, max-diff, entropy, ssim or 1-5")]
pub struct ParseMetricError(pub String);

/// Reason why the size oracle couldn't measure a reconstruction.
#[derive(Debug, Error)]
pub enum OracleError {
	/// The underlying codec refused to encode the image.
	#[error("encoding failed: {0}")]
	Encode(#[from] image::ImageError),
	/// Any other failure reported by a caller-supplied oracle.
	#[error("{0}")]
	Other(String),
}

/// Reason why a threshold couldn't be calibrated.
///
/// Failing to converge within the iteration budget is *not* an error;
/// see `Calibration::converged`.
#[derive(Debug, Error)]
pub enum CalibrateError {
	/// The image has zero width or height.
	#[error("cannot calibrate on an empty image")]
	InvalidInput,
	/// The original size is zero, so no ratio can be computed.
	#[error("original size must be non-zero")]
	ZeroOriginalSize,
	/// The target ratio is outside of `[0, 1]`.
	#[error("target ratio {0} is outside of [0, 1]")]
	TargetOutOfRange(f64),
	/// The size oracle failed; there is no sensible size to substitute.
	#[error("size oracle failed at threshold {threshold}: {source}")]
	Oracle {
		threshold: f64,
		#[source]
		source: OracleError,
	},
}
