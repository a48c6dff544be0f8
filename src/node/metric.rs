use super::error::ParseMetricError;

pub type Color = image::Rgb<u8>;

/// Dynamic range constant used by the SSIM-style score.
const SSIM_C1: f64 = (0.03 * 255.) * (0.03 * 255.);

/// Homogeneity measure used to decide whether a block should be split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
	/// Mean squared deviation from the block average.
	Variance,
	/// Mean absolute deviation from the block average.
	MeanAbsoluteDeviation,
	/// Spread between the largest and smallest channel value.
	MaxDifference,
	/// Shannon entropy of each channel's value histogram, in bits.
	Entropy,
	/// Similarity of the block to a flat fill of its average color.
	///
	/// Higher means more uniform, so this is the one metric that splits
	/// when the score is *below* the threshold.
	Ssim,
}

impl Metric {
	pub const ALL: [Metric; 5] = [
		Metric::Variance,
		Metric::MeanAbsoluteDeviation,
		Metric::MaxDifference,
		Metric::Entropy,
		Metric::Ssim,
	];

	/// Scores a set of pixels whose average color is `avg`.
	pub fn error(self, pixels: &[Color], avg: Color) -> f64 {
		match self {
			Metric::Variance => variance(pixels, avg),
			Metric::MeanAbsoluteDeviation => mean_absolute_deviation(pixels, avg),
			Metric::MaxDifference => max_difference(pixels),
			Metric::Entropy => entropy(pixels),
			Metric::Ssim => ssim(pixels, avg),
		}
	}

	/// Whether a block with score `error` should be subdivided.
	pub fn splits(self, error: f64, threshold: f64) -> bool {
		if self.inverted() {
			error < threshold
		} else {
			error > threshold
		}
	}

	/// `true` for similarity-style metrics, where a larger score means
	/// a more uniform block.
	pub fn inverted(self) -> bool {
		self == Metric::Ssim
	}

	/// Upper end of the meaningful threshold range; the lower end is 0.
	pub fn max_threshold(self) -> f64 {
		match self {
			Metric::Variance => 128. * 128.,
			Metric::MeanAbsoluteDeviation | Metric::MaxDifference => 255.,
			Metric::Entropy => 8.,
			Metric::Ssim => 1.,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Metric::Variance => "variance",
			Metric::MeanAbsoluteDeviation => "mad",
			Metric::MaxDifference => "max-diff",
			Metric::Entropy => "entropy",
			Metric::Ssim => "ssim",
		}
	}
}

impl Default for Metric {
	fn default() -> Self {
		Metric::Variance
	}
}

impl std::fmt::Display for Metric {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

impl std::str::FromStr for Metric {
	type Err = ParseMetricError;

	/// Accepts the metric names as well as the numeric codes 1 to 5.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"1" | "variance" | "var" => Ok(Metric::Variance),
			"2" | "mad" | "mean-absolute-deviation" => Ok(Metric::MeanAbsoluteDeviation),
			"3" | "max-diff" | "max" | "max-difference" => Ok(Metric::MaxDifference),
			"4" | "entropy" => Ok(Metric::Entropy),
			"5" | "ssim" => Ok(Metric::Ssim),
			_ => Err(ParseMetricError(s.to_string())),
		}
	}
}

/// Per-channel integer mean, truncated toward zero.
///
/// An empty set averages to black.
pub fn average_color(pixels: &[Color]) -> Color {
	if pixels.is_empty() {
		return image::Rgb([0; 3]);
	}
	let sum = pixels.iter().fold([0u64; 3], |mut s, p| {
		s[0] += p.0[0] as u64;
		s[1] += p.0[1] as u64;
		s[2] += p.0[2] as u64;
		s
	});
	let n = pixels.len() as u64;
	image::Rgb([(sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8])
}

/// Mean of `f(pixel channel, avg channel)` over pixels, for R, G and B
/// separately. `pixels` must not be empty.
fn per_channel<F: Fn(f64, f64) -> f64>(pixels: &[Color], avg: Color, f: F) -> [f64; 3] {
	let mut sum = [0f64; 3];
	for p in pixels {
		for c in 0..3 {
			sum[c] += f(p.0[c] as f64, avg.0[c] as f64);
		}
	}
	let n = pixels.len() as f64;
	[sum[0] / n, sum[1] / n, sum[2] / n]
}

fn channel_variances(pixels: &[Color], avg: Color) -> [f64; 3] {
	per_channel(pixels, avg, |p, a| (p - a) * (p - a))
}

pub fn variance(pixels: &[Color], avg: Color) -> f64 {
	if pixels.is_empty() {
		return 0.;
	}
	channel_variances(pixels, avg).iter().sum::<f64>() / 3.
}

pub fn mean_absolute_deviation(pixels: &[Color], avg: Color) -> f64 {
	if pixels.is_empty() {
		return 0.;
	}
	per_channel(pixels, avg, |p, a| (p - a).abs()).iter().sum::<f64>() / 3.
}

pub fn max_difference(pixels: &[Color]) -> f64 {
	if pixels.is_empty() {
		return 0.;
	}
	let (min, max) = pixels.iter().fold(([u8::MAX; 3], [0u8; 3]), |(mut lo, mut hi), p| {
		for c in 0..3 {
			lo[c] = lo[c].min(p.0[c]);
			hi[c] = hi[c].max(p.0[c]);
		}
		(lo, hi)
	});
	(0..3).map(|c| (max[c] - min[c]) as f64).sum::<f64>() / 3.
}

pub fn entropy(pixels: &[Color]) -> f64 {
	if pixels.is_empty() {
		return 0.;
	}
	let mut hist = [[0u32; 256]; 3];
	for p in pixels {
		for c in 0..3 {
			hist[c][p.0[c] as usize] += 1;
		}
	}
	let n = pixels.len() as f64;
	hist.iter()
		.map(|h| h.iter()
			.filter(|&&count| count > 0)
			.map(|&count| {
				let p = count as f64 / n;
				-p * p.log2()
			})
			.sum::<f64>())
		.sum::<f64>() / 3.
}

/// Luminance-free SSIM proxy: `C1 / (variance + C1)` per channel.
///
/// A flat block scores exactly 1; an empty set scores 0.
pub fn ssim(pixels: &[Color], avg: Color) -> f64 {
	if pixels.is_empty() {
		return 0.;
	}
	channel_variances(pixels, avg).iter()
		.map(|v| SSIM_C1 / (v + SSIM_C1))
		.sum::<f64>() / 3.
}
