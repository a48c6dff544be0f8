use image::error::ImageError;

use quadtree_compress::error::CalibrateError;
use quadtree_compress::{calibrate, EncodedSizeOracle, Metric, Quadtree};

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;
use std::time::Instant;

/// Time each GIF frame stays on screen.
const FRAME_DELAY_MS: u32 = 100;

/// Helper function for `main`.
fn error_exit(msg: &str, code: i32) -> ! {
	eprintln!("{}", msg);
	std::process::exit(code)
}

/// Exits with the message and status code matching an `image` error.
fn image_error_exit(e: &ImageError) -> ! {
	let (msg, code) = match e {
		ImageError::Decoding(_) => ("Invalid image data", 4),
		ImageError::Limits(_) => ("Computation limits exceeded", 5),
		ImageError::IoError(_) => ("File not found or could not be read/written", 3),
		ImageError::Unsupported(_) => ("Unsupported image format", 2),
		_ => ("An error occurred", 10)
	};
	error_exit(&format!("{}: {}", msg, e), code)
}

/// Encoder settings for a path, chosen from its extension.
fn output_format(path: &str) -> Option<image::ImageOutputFormat> {
	let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
	match ext.as_str() {
		"png" => Some(image::ImageOutputFormat::Png),
		"jpg" | "jpeg" => Some(image::ImageOutputFormat::Jpeg(90)),
		"bmp" => Some(image::ImageOutputFormat::Bmp),
		"tga" => Some(image::ImageOutputFormat::Tga),
		_ => None
	}
}

/// Encodes and writes `img`, returning the number of bytes written.
fn save(
	img: &image::RgbImage,
	path: &str,
	format: image::ImageOutputFormat
) -> Result<u64, ImageError> {
	let mut buf = Cursor::new(Vec::new());
	image::write_buffer_with_format(
		&mut buf,
		img.as_raw(),
		img.width(),
		img.height(),
		image::ColorType::Rgb8,
		format
	)?;
	let data = buf.into_inner();
	std::fs::write(path, &data)?;
	Ok(data.len() as u64)
}

/// Writes the frames as an endlessly looping animation.
fn save_gif(frames: Vec<image::RgbImage>, path: &str) -> Result<(), ImageError> {
	use image::codecs::gif::{GifEncoder, Repeat};

	let mut encoder = GifEncoder::new(BufWriter::new(File::create(path)?));
	encoder.set_repeat(Repeat::Infinite)?;
	for frame in frames {
		let rgba = image::DynamicImage::ImageRgb8(frame).into_rgba8();
		encoder.encode_frame(image::Frame::from_parts(
			rgba,
			0,
			0,
			image::Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1)
		))?;
	}
	Ok(())
}

fn print_report(rows: &[(&str, String)]) {
	const WIDTH: usize = 52;
	let line = format!("+{}+", "-".repeat(WIDTH - 2));
	println!("{}", line);
	println!("|{:^w$}|", "QUADTREE COMPRESSION", w = WIDTH - 2);
	println!("{}", line);
	for (label, value) in rows {
		println!("| {:<22}: {:>w$} |", label, value, w = WIDTH - 28);
	}
	println!("{}", line);
}

/// Command-line interface definition.
fn cli<'a, 'b>() -> clap::App<'a, 'b> {
	clap::App::new("quadtree_compress")
		.version("0.1.0")
		.author("vkcz")
		.about("Compresses an image into flat-colored blocks using quadtree decomposition.")
		.arg_from_usage("-m, --method=[METHOD] 'Error metric: variance, mad, max-diff, entropy or ssim (or 1-5); defaults to variance'")
		.arg_from_usage("-t, --threshold=[T] 'Error threshold for splitting a block; required unless --target is given'")
		.arg_from_usage("-b, --min-block=[N] 'Blocks this wide or high are never split; defaults to 1'")
		.arg_from_usage("-c, --target=[RATIO] 'Target compression ratio from 0 to 1, overriding --threshold; --min-block still applies; 0 disables'")
		.arg_from_usage("-g, --gif=[GIF] 'Also write an animation of the refinement, one frame per tree depth'")
		.arg_from_usage("<INPUT> 'Path to input image'")
		.arg_from_usage("[OUTPUT] 'Path to output image (png, jpg, bmp or tga); defaults to INPUT with a `.qt` suffix'")
}

/// `clap`-based CLI for compressing images with a quadtree.
///
/// May exit process with status code if there are errors:
///
/// 1: `clap` error
///
/// 2: invalid arguments
///
/// 3: file I/O issues
///
/// 4: invalid image data
///
/// 5: computation limits exceeded
///
/// 10: other, potentially unknown error
fn main() {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();

	let clap_matches = cli().get_matches();

	let input_path = clap_matches.value_of("INPUT").unwrap();
	let output_path = clap_matches.value_of("OUTPUT").map(str::to_string).unwrap_or_else(|| {
		let mut parts = input_path.rsplitn(2, '.');
		match (parts.next(), parts.next()) {
			(Some(ext), Some(stem)) => format!("{}.qt.{}", stem, ext),
			_ => format!("{}.qt.png", input_path)
		}
	});
	let format = output_format(&output_path)
		.unwrap_or_else(|| error_exit("Output must end in .png, .jpg, .jpeg, .bmp or .tga", 2));

	let metric: Metric = match clap_matches.value_of("method").unwrap_or("variance").parse() {
		Ok(m) => m,
		Err(e) => error_exit(&e.to_string(), 2)
	};
	let min_block_size = match clap_matches.value_of("min-block").unwrap_or("1").parse::<u32>() {
		Ok(n) if n >= 1 => n,
		_ => error_exit("Minimum block size must be a whole number of at least 1", 2)
	};
	let target = match clap_matches.value_of("target").unwrap_or("0").parse::<f64>() {
		Ok(t) if (0. ..=1.).contains(&t) => t,
		_ => error_exit("Target ratio must be a number from 0 to 1", 2)
	};
	let threshold = match clap_matches.value_of("threshold").map(str::parse::<f64>) {
		Some(Ok(t)) if (0. ..=metric.max_threshold()).contains(&t) => Some(t),
		Some(_) => error_exit(&format!(
			"Threshold for {} must be a number from 0 to {}",
			metric,
			metric.max_threshold()
		), 2),
		None if target > 0. => None,
		None => error_exit("One of -t/--threshold and -c/--target must be present", 2)
	};

	let start = Instant::now();
	let source = match image::open(input_path) {
		Ok(i) => i,
		Err(e) => image_error_exit(&e)
	}.into_rgb8();
	let original_size = match std::fs::metadata(input_path) {
		Ok(m) => m.len(),
		Err(_) => error_exit("File not found or could not be read", 3)
	};
	let (width, height) = source.dimensions();

	let threshold = if target > 0. {
		eprintln!("Searching for a {} threshold giving {:.0}% compression...", metric, target * 100.);
		let mut oracle = EncodedSizeOracle::new(format.clone());
		match calibrate(&source, metric, min_block_size, target, original_size, &mut oracle) {
			Ok(c) => {
				if !c.converged {
					eprintln!("Closest ratio found was {:.2}% after {} tries", c.ratio * 100., c.iterations);
				}
				c.threshold
			},
			Err(CalibrateError::Oracle { source: e, .. }) => error_exit(&format!("Could not measure output size: {}", e), 10),
			Err(e) => error_exit(&e.to_string(), 4)
		}
	} else {
		// Present whenever the target is disabled; checked above.
		threshold.unwrap_or_default()
	};

	let tree = Quadtree::from_image(&source, metric, threshold, min_block_size);
	let compressed_size = match save(&tree.to_image(width, height), &output_path, format) {
		Ok(n) => n,
		Err(e) => image_error_exit(&e)
	};

	let gif_path = clap_matches.value_of("gif");
	if let Some(path) = gif_path {
		eprintln!("Writing {} frames to {}...", tree.max_depth() + 1, path);
		if let Err(e) = save_gif(tree.frames(), path) {
			image_error_exit(&e)
		}
	}

	let elapsed = start.elapsed();
	let percentage = (1. - compressed_size as f64 / original_size as f64) * 100.;
	let mut rows = vec![
		("Elapsed time", format!("{} ms", elapsed.as_millis())),
		("Metric", metric.to_string()),
		("Threshold", format!("{:.4}", threshold)),
		("Original size", format!("{} bytes", original_size)),
		("Compressed size", format!("{} bytes", compressed_size)),
		("Compression", format!("{:.2} %", percentage)),
		("Tree depth", tree.max_depth().to_string()),
		("Node count", tree.total_nodes().to_string()),
		("Leaf count", tree.leaf_count().to_string()),
		("Estimated tree size", format!("{} bytes", tree.estimated_size())),
		("Image saved to", output_path.clone()),
	];
	if let Some(path) = gif_path {
		rows.push(("GIF saved to", path.to_string()));
	}
	print_report(&rows);
}
