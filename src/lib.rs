//! Pixel clustering core in Rust.
//!
//! This crate groups pixels of a raster into regions in three ways:
//!
//! - connected-component labeling of a single channel image (8-connectivity, two raster passes
//!   over a disjoint-set forest), with per-component area, centroid and eccentricity,
//! - graph-based segmentation of an RGB image (greedy merging of pixel edges sorted by color
//!   difference, followed by a small component clean-up),
//! - SLIC superpixels (iterative, spatially windowed k-means in CIELab + xy space).
//!
//! All of them take an [`arrays::Image`], an interleaved 8-bit raster as decoded by e.g. the
//! `image` crate, and return a label raster of the same size.
//!
//! The following example runs SLIC on a packed RGB24 image:
//!
//! ```rust
//! use pixel_cluster_rust::arrays::Image;
//! use pixel_cluster_rust::common::*;
//! use pixel_cluster_rust::slic::generate_superpixels;
//!
//! fn main() -> Result<(), Error> {
//!     // packed RGB24, e.g. `image::RgbImage::as_raw()`
//!     let (width, height) = (64, 48);
//!     let rgb: Vec<u8> = (0..width * height)
//!         .flat_map(|i| [(i % width * 4) as u8, (i / width * 5) as u8, 128])
//!         .collect();
//!     let image = Image::from_slice(&rgb, width, height, 3)?;
//!     // create config with defaults and override the number of superpixels
//!     let mut config = SlicConfig::default();
//!     config.num_of_superpixels = 12;
//!     let superpixels = generate_superpixels(&image, &config)?;
//!     assert!(superpixels.clusters.clusters.len() <= 12);
//!     // boundaries for an overlay and a mean color rendering
//!     let _contours = superpixels.clusters.contours();
//!     let _preview = superpixels.clusters.recolor(&superpixels.image).to_srgb();
//!     Ok(())
//! }
//! ```
//!
//! The SLIC steps can also be driven one by one (`slic::Clusters::initialize_clusters()`,
//! `assign::assign()`, `slic::update()`), e.g. to use custom seeds or to inspect the distance map
//! after every iteration.
//!
//! This crate has also benchmarks and tests. It's strongly recommended to use this in release
//! build. The SLIC assign loop uses `assume!` macro to avoid boundary checks in release builds.
//!

pub mod arrays;
pub mod assign;
pub mod cielab;
pub mod cluster;
pub mod common;
pub mod connectivity;
pub mod disjoint_set;
pub mod filter;
pub mod labeling;
pub mod moments;
pub mod segmentation;
pub mod slic;
