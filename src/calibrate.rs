//! Searching for the threshold that gives a wanted compression ratio.

use crate::node::error::{CalibrateError, OracleError};
use crate::node::metric::Metric;
use crate::node::Quadtree;

/// Most decompositions tried before settling for the last one.
pub const MAX_ITERATIONS: usize = 20;

/// How far the achieved ratio may be from the target to count as a hit.
pub const TOLERANCE: f64 = 0.01;

/// Something that can tell how many bytes an image takes once encoded.
///
/// This typically runs a real encoder, so it may be slow.
pub trait SizeOracle {
	fn encoded_size(&mut self, img: &image::RgbImage) -> Result<u64, OracleError>;
}

impl<F> SizeOracle for F
where
	F: FnMut(&image::RgbImage) -> Result<u64, OracleError>,
{
	fn encoded_size(&mut self, img: &image::RgbImage) -> Result<u64, OracleError> {
		self(img)
	}
}

/// Measures images by encoding them into memory with the `image` crate.
#[derive(Clone, Debug)]
pub struct EncodedSizeOracle {
	pub format: image::ImageOutputFormat,
}

impl EncodedSizeOracle {
	pub fn new(format: image::ImageOutputFormat) -> Self {
		EncodedSizeOracle { format }
	}
}

impl Default for EncodedSizeOracle {
	/// JPEG at quality 90.
	fn default() -> Self {
		EncodedSizeOracle::new(image::ImageOutputFormat::Jpeg(90))
	}
}

impl SizeOracle for EncodedSizeOracle {
	fn encoded_size(&mut self, img: &image::RgbImage) -> Result<u64, OracleError> {
		let mut buf = std::io::Cursor::new(Vec::new());
		image::write_buffer_with_format(
			&mut buf,
			img.as_raw(),
			img.width(),
			img.height(),
			image::ColorType::Rgb8,
			self.format.clone(),
		)?;
		Ok(buf.into_inner().len() as u64)
	}
}

/// Outcome of `calibrate`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
	/// Last threshold tried.
	pub threshold: f64,
	/// Ratio `1 - encoded / original` achieved at `threshold`.
	pub ratio: f64,
	/// Decompositions run.
	pub iterations: usize,
	/// Whether `ratio` is within `TOLERANCE` of the target.
	pub converged: bool,
}

/// Bisects the threshold range of `metric` until decomposing and
/// reconstructing `img` gives an encoded size `oracle` reports as
/// `1 - target_ratio` of `original_size`.
///
/// Every step rebuilds the whole tree. If no step lands within
/// `TOLERANCE` after `MAX_ITERATIONS`, the last threshold tried is returned
/// with `converged` set to `false`.
pub fn calibrate<O: SizeOracle + ?Sized>(
	img: &image::RgbImage,
	metric: Metric,
	min_block_size: u32,
	target_ratio: f64,
	original_size: u64,
	oracle: &mut O,
) -> Result<Calibration, CalibrateError> {
	let (width, height) = img.dimensions();
	if width == 0 || height == 0 {
		return Err(CalibrateError::InvalidInput);
	}
	if original_size == 0 {
		return Err(CalibrateError::ZeroOriginalSize);
	}
	if !(0. ..=1.).contains(&target_ratio) {
		return Err(CalibrateError::TargetOutOfRange(target_ratio));
	}

	let (mut low, mut high) = (0., metric.max_threshold());
	let mut last = Calibration {
		threshold: (low + high) / 2.,
		ratio: 0.,
		iterations: 0,
		converged: false,
	};
	for iteration in 1..=MAX_ITERATIONS {
		let mid = (low + high) / 2.;
		let tree = Quadtree::from_image(img, metric, mid, min_block_size);
		let size = oracle.encoded_size(&tree.to_image(width, height))
			.map_err(|source| CalibrateError::Oracle { threshold: mid, source })?;
		let ratio = 1. - size as f64 / original_size as f64;
		tracing::debug!(
			iteration,
			threshold = mid,
			size,
			ratio,
			nodes = tree.total_nodes(),
			"calibration step"
		);

		last = Calibration { threshold: mid, ratio, iterations: iteration, converged: false };
		if (ratio - target_ratio).abs() <= TOLERANCE {
			last.converged = true;
			break;
		}

		// A higher threshold merges more blocks, except for similarity
		// metrics where it splits more.
		if (ratio < target_ratio) != metric.inverted() {
			low = mid;
		} else {
			high = mid;
		}
	}

	if last.converged {
		tracing::info!(threshold = last.threshold, ratio = last.ratio, "calibrated in {} steps", last.iterations);
	} else {
		tracing::info!(
			threshold = last.threshold,
			ratio = last.ratio,
			"no threshold within {} of target {} after {} steps",
			TOLERANCE,
			target_ratio,
			last.iterations
		);
	}
	Ok(last)
}
