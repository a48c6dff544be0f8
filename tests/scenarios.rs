use pretty_assertions::assert_eq;

use quadtree_compress::{Metric, Quadtree};

fn rgb(v: u8) -> image::Rgb<u8> {
	image::Rgb([v, v, v])
}

/// Black top-left and bottom-right quadrants, white elsewhere.
fn checkerboard() -> image::RgbImage {
	image::RgbImage::from_fn(8, 8, |x, y| if (x < 4) == (y < 4) { rgb(0) } else { rgb(255) })
}

#[test]
fn uniform_image_is_a_single_leaf() {
	let img = image::RgbImage::from_pixel(4, 4, rgb(128));
	let tree = Quadtree::from_image(&img, Metric::Variance, 0., 1);

	assert_eq!(tree.total_nodes(), 1);
	assert_eq!(tree.max_depth(), 0);
	assert!(tree.root().unwrap().is_leaf());
	assert!(tree.to_image(4, 4) == img);
}

#[test]
fn quadrant_checkerboard_splits_once() {
	let img = checkerboard();
	let tree = Quadtree::from_image(&img, Metric::Variance, 0., 1);

	assert_eq!(tree.total_nodes(), 5);
	assert_eq!(tree.max_depth(), 1);

	let sections = tree.root().unwrap().sections.as_ref().unwrap();
	let summary = sections.iter()
		.map(|s| (s.x, s.y, s.width, s.height, s.color, s.is_leaf()))
		.collect::<Vec<_>>();
	assert_eq!(summary, vec![
		(0, 0, 4, 4, rgb(0), true),
		(4, 0, 4, 4, rgb(255), true),
		(0, 4, 4, 4, rgb(255), true),
		(4, 4, 4, 4, rgb(0), true),
	]);
	assert!(tree.to_image(8, 8) == img);
}

#[test]
fn checkerboard_frames_refine_progressively() {
	let img = checkerboard();
	let tree = Quadtree::from_image(&img, Metric::Variance, 0., 1);
	let frames = tree.frames();

	assert_eq!(frames.len(), 2);
	// 32 black and 32 white pixels average to 127.
	assert!(frames[0].pixels().all(|p| *p == rgb(127)));
	assert!(frames[1] == img);
}

#[test]
fn every_metric_is_lossless_on_the_checkerboard() {
	let img = checkerboard();
	for metric in Metric::ALL.iter() {
		// The similarity metric splits below its threshold, so it needs the
		// top of its range to keep splitting non-uniform blocks.
		let threshold = if metric.inverted() { metric.max_threshold() } else { 0. };
		let tree = Quadtree::from_image(&img, *metric, threshold, 1);
		assert_eq!(tree.total_nodes(), 5, "{}", metric);
		assert!(tree.to_image(8, 8) == img, "{}", metric);
	}
}

#[test]
fn odd_sized_image_keeps_its_shape() {
	let img = image::RgbImage::from_fn(7, 5, |x, y| image::Rgb([(x * 30) as u8, (y * 50) as u8, 9]));
	let tree = Quadtree::from_image(&img, Metric::MaxDifference, 0., 1);
	let full = tree.to_image(7, 5);

	assert_eq!(tree.dimensions(), (7, 5));
	assert!(tree.to_image_at_depth(tree.max_depth()) == full);
	// Single-pixel leaves keep their pixel exactly.
	for (_, leaf) in tree.iter().filter(|(_, n)| n.is_leaf() && n.width * n.height == 1) {
		assert_eq!(full.get_pixel(leaf.x, leaf.y), img.get_pixel(leaf.x, leaf.y));
	}
}
