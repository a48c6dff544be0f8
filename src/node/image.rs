use super::{Quadtree, QuadtreeNode};

/// Paints `node`'s color over its block, clipped to the buffer.
fn fill_block(img: &mut image::RgbImage, node: &QuadtreeNode) {
	let x_end = (node.x + node.width).min(img.width());
	let y_end = (node.y + node.height).min(img.height());
	for row in node.y..y_end {
		for col in node.x..x_end {
			img.put_pixel(col, row, node.color);
		}
	}
}

impl QuadtreeNode {
	/// Draws this node and its "branches" and "leaves" into the buffer.
	///
	/// Descent stops at leaves, or at `depth_limit` if one is given, and the
	/// node reached is painted as a flat block of its average color. Branch
	/// nodes above the limit are not painted.
	///
	/// `depth` is the depth of `self`; outside callers pass 0 for the root.
	pub fn to_image(&self, img: &mut image::RgbImage, depth_limit: Option<usize>, depth: usize) {
		match self.sections {
			Some(ref sects) if depth_limit.map_or(true, |limit| depth < limit) => {
				for section in sects.iter() {
					section.to_image(img, depth_limit, depth + 1);
				}
			}
			_ => fill_block(img, self),
		}
	}
}

impl Quadtree {
	/// Reconstructs the compressed image at full detail into a
	/// `width` by `height` buffer.
	///
	/// Leaves outside the buffer are clipped; parts of the buffer no leaf
	/// covers, including all of it for an empty tree, are black.
	pub fn to_image(&self, width: u32, height: u32) -> image::RgbImage {
		let mut img = image::RgbImage::new(width, height);
		if let Some(root) = self.root() {
			root.to_image(&mut img, None, 0);
		}
		img
	}

	/// Reconstructs the image as it looks when the tree is cut off at
	/// `depth`, at the size of the original image.
	///
	/// The buffer is first filled with the root's color. For any `depth` at
	/// or past `max_depth` this equals `to_image`.
	pub fn to_image_at_depth(&self, depth: usize) -> image::RgbImage {
		let (width, height) = self.dimensions();
		match self.root() {
			Some(root) => {
				let mut img = image::RgbImage::from_pixel(width, height, root.color);
				root.to_image(&mut img, Some(depth), 0);
				img
			}
			None => image::RgbImage::new(width, height),
		}
	}

	/// One reconstruction per depth from 0 to `max_depth` inclusive, showing
	/// the image being progressively refined.
	pub fn frames(&self) -> Vec<image::RgbImage> {
		(0..=self.max_depth())
			.map(|depth| self.to_image_at_depth(depth))
			.collect()
	}
}
