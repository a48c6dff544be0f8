//! Lossy block compression of raster images through quadtree decomposition.
//!
//! An image is divided into four blocks again and again until every block
//! is uniform enough by the chosen `Metric`; each leaf then keeps only its
//! average color. The tree can be rendered back at full detail or cut off at
//! any depth, and `calibrate` searches for the threshold that gives a
//! wanted compression ratio.

pub mod calibrate;
pub mod node;

pub use calibrate::{calibrate, Calibration, EncodedSizeOracle, SizeOracle};
pub use node::error;
pub use node::metric::{self, Color, Metric};
pub use node::{Quadtree, QuadtreeNode};
