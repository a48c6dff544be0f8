pub mod error;
pub mod metric;

use self::metric::{Color, Metric};

/// Bytes charged per node by `Quadtree::estimated_size`: two `i32` for the
/// position, two `i32` for the extent, three color bytes and a leaf flag.
pub const NODE_SIZE: usize = 4 * 4 + 3 + 1;

/// Node in a quadtree covering one rectangular block of an image.
///
/// May contain subnodes (branch node) or no subnodes (leaf node).
///
/// Every node carries the average color of its block, so that tree descent
/// can stop at any level and still give a meaningful preview.
///
/// Sections are ordered top-left, top-right, bottom-left, bottom-right.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadtreeNode {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
	pub color: Color,
	pub error: f64,
	pub sections: Option<Box<[QuadtreeNode; 4]>>,
}

/// Counters accumulated while building a tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct BuildStats {
	total_nodes: usize,
	max_depth: usize,
}

/// Parameters shared by every node of one decomposition.
#[derive(Clone, Copy, Debug)]
struct BuildParams {
	metric: Metric,
	threshold: f64,
	min_block_size: u32,
}

impl QuadtreeNode {
	/// A leaf covering the given rectangle, not yet analyzed.
	pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
		QuadtreeNode {
			x,
			y,
			width,
			height,
			color: ::image::Rgb([0; 3]),
			error: 0.,
			sections: None,
		}
	}

	pub fn is_leaf(&self) -> bool {
		self.sections.is_none()
	}

	/// The four blocks this node would be divided into.
	///
	/// Odd remainders go to the right and bottom blocks, so the children
	/// cover the parent exactly.
	pub fn split(&self) -> [QuadtreeNode; 4] {
		let (half_w, half_h) = (self.width / 2, self.height / 2);
		[
			QuadtreeNode::new(self.x, self.y, half_w, half_h),
			QuadtreeNode::new(self.x + half_w, self.y, self.width - half_w, half_h),
			QuadtreeNode::new(self.x, self.y + half_h, half_w, self.height - half_h),
			QuadtreeNode::new(
				self.x + half_w,
				self.y + half_h,
				self.width - half_w,
				self.height - half_h,
			),
		]
	}

	/// Pixels of `img` inside this node's block. Positions past the edge of
	/// the image are skipped.
	pub fn pixels(&self, img: &::image::RgbImage) -> Vec<Color> {
		let x_end = (self.x + self.width).min(img.width());
		let y_end = (self.y + self.height).min(img.height());
		(self.y..y_end)
			.flat_map(|row| (self.x..x_end).map(move |col| *img.get_pixel(col, row)))
			.collect()
	}

	/// Analyzes the block and, if the metric asks for it, divides it and
	/// recurses into the sections.
	fn mount(
		&mut self,
		img: &::image::RgbImage,
		params: &BuildParams,
		depth: usize,
		stats: &mut BuildStats,
	) {
		stats.max_depth = stats.max_depth.max(depth);

		let pixels = self.pixels(img);
		self.color = metric::average_color(&pixels);
		self.error = params.metric.error(&pixels, self.color);

		if self.width <= params.min_block_size || self.height <= params.min_block_size {
			return;
		}
		if !params.metric.splits(self.error, params.threshold) {
			return;
		}

		let mut sections = Box::new(self.split());
		stats.total_nodes += 4;
		for section in sections.iter_mut() {
			section.mount(img, params, depth + 1, stats);
		}
		self.sections = Some(sections);
	}
}

/// A decomposed image: the root node plus statistics about the build.
///
/// Read-only once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Quadtree {
	root: Option<QuadtreeNode>,
	width: u32,
	height: u32,
	total_nodes: usize,
	max_depth: usize,
}

impl Quadtree {
	/// Decomposes `img` into blocks that each pass the homogeneity test of
	/// `metric` at `threshold`.
	///
	/// Blocks whose width or height is at most `min_block_size` are never
	/// divided; a `min_block_size` of 0 is treated as 1. The root covers the
	/// image exactly, with no padding.
	///
	/// An image with zero width or height gives an empty tree.
	pub fn from_image(
		img: &::image::RgbImage,
		metric: Metric,
		threshold: f64,
		min_block_size: u32,
	) -> Self {
		let (width, height) = img.dimensions();
		if width == 0 || height == 0 {
			return Quadtree { width, height, ..Default::default() };
		}

		let params = BuildParams {
			metric,
			threshold,
			min_block_size: min_block_size.max(1),
		};
		let mut stats = BuildStats { total_nodes: 1, max_depth: 0 };
		let mut root = QuadtreeNode::new(0, 0, width, height);
		root.mount(img, &params, 0, &mut stats);

		tracing::trace!(
			metric = metric.name(),
			threshold,
			total_nodes = stats.total_nodes,
			max_depth = stats.max_depth,
			"decomposed {}x{} image",
			width,
			height
		);

		Quadtree {
			root: Some(root),
			width,
			height,
			total_nodes: stats.total_nodes,
			max_depth: stats.max_depth,
		}
	}

	pub fn root(&self) -> Option<&QuadtreeNode> {
		self.root.as_ref()
	}

	pub fn is_empty(&self) -> bool {
		self.root.is_none()
	}

	/// Dimensions of the image the tree was built from.
	pub fn dimensions(&self) -> (u32, u32) {
		(self.width, self.height)
	}

	pub fn total_nodes(&self) -> usize {
		self.total_nodes
	}

	/// Deepest level reached while building; the root is at depth 0.
	pub fn max_depth(&self) -> usize {
		self.max_depth
	}

	pub fn leaf_count(&self) -> usize {
		self.iter().filter(|(_, n)| n.is_leaf()).count()
	}

	/// Size of the tree under a fixed cost of `NODE_SIZE` bytes per node.
	pub fn estimated_size(&self) -> usize {
		self.total_nodes * NODE_SIZE
	}

	/// Pre-order traversal yielding each node with its depth.
	pub fn iter(&self) -> Iter<'_> {
		Iter { stack: self.root.iter().map(|r| (0, r)).collect() }
	}
}

/// Iterator returned by `Quadtree::iter`.
pub struct Iter<'a> {
	stack: Vec<(usize, &'a QuadtreeNode)>,
}

impl<'a> Iterator for Iter<'a> {
	type Item = (usize, &'a QuadtreeNode);

	fn next(&mut self) -> Option<Self::Item> {
		let (depth, node) = self.stack.pop()?;
		if let Some(ref sects) = node.sections {
			// Reversed so the top-left section comes out first.
			self.stack.extend(sects.iter().rev().map(|s| (depth + 1, s)));
		}
		Some((depth, node))
	}
}

pub mod image;

#[cfg(test)]
mod tests {
	use super::*;

	fn noise(width: u32, height: u32) -> ::image::RgbImage {
		let mut state = 0x2545_f491u32;
		::image::RgbImage::from_fn(width, height, |_, _| {
			state ^= state << 13;
			state ^= state >> 17;
			state ^= state << 5;
			let b = state.to_le_bytes();
			::image::Rgb([b[0], b[1], b[2]])
		})
	}

	fn covered(node: &QuadtreeNode) -> u64 {
		node.width as u64 * node.height as u64
	}

	#[test]
	fn split_tiles_parent_exactly() {
		for &(w, h) in &[(2, 2), (3, 3), (4, 7), (7, 4), (5, 2), (9, 16), (17, 33)] {
			let parent = QuadtreeNode::new(3, 5, w, h);
			let [tl, tr, bl, br] = parent.split();
			assert_eq!(covered(&tl) + covered(&tr) + covered(&bl) + covered(&br), covered(&parent));
			// Columns and rows line up with no gap or overlap.
			assert_eq!((tl.x, tl.y), (parent.x, parent.y));
			assert_eq!(tr.x, tl.x + tl.width);
			assert_eq!(br.x, bl.x + bl.width);
			assert_eq!(bl.y, tl.y + tl.height);
			assert_eq!(br.y, tr.y + tr.height);
			assert_eq!(tl.width + tr.width, w);
			assert_eq!(bl.width + br.width, w);
			assert_eq!(tl.height + bl.height, h);
			assert_eq!(tr.height + br.height, h);
			assert_eq!(tl.width, bl.width);
			assert_eq!(tl.height, tr.height);
		}
	}

	#[test]
	fn every_pixel_belongs_to_exactly_one_leaf() {
		let img = noise(13, 10);
		let tree = Quadtree::from_image(&img, Metric::Variance, 0., 1);
		let mut hits = vec![0u8; 13 * 10];
		for (_, node) in tree.iter().filter(|(_, n)| n.is_leaf()) {
			for y in node.y..node.y + node.height {
				for x in node.x..node.x + node.width {
					hits[(y * 13 + x) as usize] += 1;
				}
			}
		}
		assert!(hits.iter().all(|&h| h == 1));
	}

	#[test]
	fn node_count_matches_structure() {
		for metric in Metric::ALL.iter() {
			let img = noise(37, 21);
			let threshold = metric.max_threshold() / 4.;
			let tree = Quadtree::from_image(&img, *metric, threshold, 2);
			let internal = tree.iter().filter(|(_, n)| !n.is_leaf()).count();
			assert_eq!(tree.total_nodes(), tree.iter().count());
			assert_eq!(tree.total_nodes(), 1 + 4 * internal);
			assert_eq!(tree.leaf_count(), 1 + 3 * internal);
			assert_eq!(tree.estimated_size(), tree.total_nodes() * NODE_SIZE);
		}
	}

	#[test]
	fn max_depth_is_deepest_node() {
		let img = noise(40, 24);
		let tree = Quadtree::from_image(&img, Metric::MaxDifference, 100., 1);
		let deepest = tree.iter().map(|(d, _)| d).max().unwrap();
		assert_eq!(tree.max_depth(), deepest);
		assert!(tree.max_depth() > 0);
	}

	#[test]
	fn min_block_size_stops_splitting() {
		let img = noise(16, 16);
		let tree = Quadtree::from_image(&img, Metric::Variance, 0., 16);
		assert_eq!(tree.total_nodes(), 1);
		assert!(tree.root().unwrap().error > 0.);

		let tree = Quadtree::from_image(&img, Metric::Variance, 0., 4);
		for (_, node) in tree.iter() {
			if !node.is_leaf() {
				assert!(node.width > 4 && node.height > 4);
			}
		}
		// 16 -> 8 -> 4, and 4 is at the floor.
		assert_eq!(tree.max_depth(), 2);
	}

	#[test]
	fn zero_min_block_size_behaves_as_one() {
		let img = noise(8, 8);
		let zero = Quadtree::from_image(&img, Metric::Variance, -1., 0);
		let one = Quadtree::from_image(&img, Metric::Variance, -1., 1);
		assert_eq!(zero, one);
		assert_eq!(one.leaf_count(), 64);
	}

	#[test]
	fn thin_strip_is_a_single_leaf() {
		let img = noise(50, 1);
		let tree = Quadtree::from_image(&img, Metric::Variance, 0., 1);
		assert_eq!(tree.total_nodes(), 1);
	}

	#[test]
	fn empty_image_gives_empty_tree() {
		let img = ::image::RgbImage::new(0, 5);
		let tree = Quadtree::from_image(&img, Metric::Entropy, 1., 1);
		assert!(tree.is_empty());
		assert_eq!(tree.total_nodes(), 0);
		assert_eq!(tree.max_depth(), 0);
		assert_eq!(tree.iter().count(), 0);
		assert_eq!(tree.dimensions(), (0, 5));
	}

	#[test]
	fn ssim_splits_below_threshold() {
		let img = noise(8, 8);
		// Noise scores far below 0.9, so everything splits down to single pixels.
		let tree = Quadtree::from_image(&img, Metric::Ssim, 0.9, 1);
		assert_eq!(tree.leaf_count(), 64);
		// Nothing scores below 0, so nothing splits.
		let tree = Quadtree::from_image(&img, Metric::Ssim, 0., 1);
		assert_eq!(tree.total_nodes(), 1);
	}

	#[test]
	fn pixels_are_clipped_to_the_image() {
		let img = noise(5, 5);
		let node = QuadtreeNode::new(3, 4, 4, 4);
		assert_eq!(node.pixels(&img), vec![*img.get_pixel(3, 4), *img.get_pixel(4, 4)]);
	}
}
