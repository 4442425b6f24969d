//! Graph-based image segmentation (Felzenszwalb & Huttenlocher style greedy merging).
//!
//! Every pixel is a vertex, edges connect it to its right, bottom, bottom-right and top-right
//! neighbours and are weighted by the L2 distance of the smoothed colors. Edges are processed
//! in non-decreasing weight order and two components are merged when the edge is not heavier
//! than the merge threshold of either of them. The threshold of a merged component becomes
//! `weight + c / size`.

use crate::arrays::{Array2D, Image};
use crate::common::{Error, SegmentationConfig};
use crate::disjoint_set::DisjointSetForest;
use crate::filter::gaussian_blur;
use crate::labeling::LabelMap;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Edge between two flattened pixel indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub a: u32,
    pub b: u32,
    pub weight: f32,
}

/// How [`Segmentation::recolor`] paints the components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecolorMode {
    /// Mean source color of every component.
    MeanColor,
    /// One random color per component, reproducible through the seed.
    Random { seed: u64 },
}

/// Result of [`segment_image`].
#[derive(Debug)]
pub struct Segmentation {
    /// Components labelled `1..=num_labels` in raster order of their first pixel.
    pub labels: LabelMap,
    /// Mean RGB color of every component, index `label - 1`.
    pub mean_colors: Vec<[u8; 3]>,
}

impl Segmentation {
    pub fn num_components(&self) -> usize {
        self.labels.num_labels as usize
    }

    /// Paints every pixel with the color of its component.
    pub fn recolor(&self, mode: RecolorMode) -> Image {
        let palette: Vec<[u8; 3]> = match mode {
            RecolorMode::MeanColor => self.mean_colors.clone(),
            RecolorMode::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..self.num_components())
                    .map(|_| {
                        [
                            rng.gen_range(0..255),
                            rng.gen_range(0..255),
                            rng.gen_range(0..255),
                        ]
                    })
                    .collect()
            }
        };
        let width = self.labels.width();
        let mut output = Image::from_fill(0, width, self.labels.height(), 3);
        if width == 0 {
            return output;
        }
        output
            .data
            .par_chunks_mut(width * 3)
            .zip(self.labels.labels.data.par_chunks(width))
            .for_each(|(row_out, row_labels)| {
                for (px, label) in row_out.chunks_exact_mut(3).zip(row_labels) {
                    px.copy_from_slice(&palette[*label as usize - 1]);
                }
            });
        output
    }
}

/// Builds the forward-looking edges of a smoothed image. Rows are processed in parallel, the
/// output order is the sequential scan order.
pub fn build_edges(smoothed: &Array2D<[f32; 3]>) -> Vec<Edge> {
    let width = smoothed.width;
    let height = smoothed.height;
    let diff = |x1: usize, y1: usize, x2: usize, y2: usize| -> Edge {
        let p1 = smoothed[(x1, y1)];
        let p2 = smoothed[(x2, y2)];
        let d2: f32 = p1.iter().zip(p2).map(|(a, b)| (a - b) * (a - b)).sum();
        Edge {
            a: smoothed.get_index(x1, y1) as u32,
            b: smoothed.get_index(x2, y2) as u32,
            weight: d2.sqrt(),
        }
    };
    (0..height)
        .into_par_iter()
        .flat_map_iter(|y| {
            let mut row_edges = Vec::with_capacity(width * 4);
            for x in 0..width {
                if x + 1 < width {
                    row_edges.push(diff(x, y, x + 1, y));
                }
                if y + 1 < height {
                    row_edges.push(diff(x, y, x, y + 1));
                }
                if x + 1 < width && y + 1 < height {
                    row_edges.push(diff(x, y, x + 1, y + 1));
                }
                if x + 1 < width && y > 0 {
                    row_edges.push(diff(x, y, x + 1, y - 1));
                }
            }
            row_edges
        })
        .collect()
}

/// Greedy merge over edges already sorted by weight. `forest` must hold one singleton per
/// vertex.
pub fn segment_graph(forest: &mut DisjointSetForest, sorted_edges: &[Edge], c: f32) {
    let mut thresholds = vec![c; forest.len()];
    for edge in sorted_edges {
        let a = forest.find(edge.a);
        let b = forest.find(edge.b);
        if a == b {
            continue;
        }
        if edge.weight <= thresholds[a as usize] && edge.weight <= thresholds[b as usize] {
            forest.union(a, b);
            let root = forest.find(a);
            thresholds[root as usize] = edge.weight + c / forest.size(root) as f32;
        }
    }
}

/// Merges across every edge that touches a component smaller than `min_size`, regardless of
/// the edge weight.
pub fn merge_small_components(forest: &mut DisjointSetForest, sorted_edges: &[Edge], min_size: u32) {
    for edge in sorted_edges {
        let a = forest.find(edge.a);
        let b = forest.find(edge.b);
        if a != b && (forest.size(a) < min_size || forest.size(b) < min_size) {
            forest.union(a, b);
        }
    }
}

/// Segments a 3-channel image.
pub fn segment_image(image: &Image, config: &SegmentationConfig) -> Result<Segmentation, Error> {
    image.require_channels(3)?;
    if image.is_empty() {
        return Err(Error::InvalidArgument("image has no pixels".to_string()));
    }
    if !config.threshold.is_finite() || config.threshold < 0.0 {
        return Err(Error::InvalidArgument(format!(
            "threshold must be finite and non-negative, got {}",
            config.threshold
        )));
    }
    let smoothed = gaussian_blur(image, config.sigma)?;
    let mut edges = build_edges(&smoothed);
    edges.par_sort_by(|a, b| a.weight.total_cmp(&b.weight));

    let num_vertices = image.width * image.height;
    let mut forest = DisjointSetForest::new(num_vertices);
    segment_graph(&mut forest, &edges, config.threshold);
    let after_merge = forest.no_of_elements();
    merge_small_components(&mut forest, &edges, config.min_component_size);
    debug!(
        "segmented {}x{} image: {} edges, {after_merge} components before and {} after small component merge",
        image.width,
        image.height,
        edges.len(),
        forest.no_of_elements()
    );

    let num_labels = forest.no_of_elements() as u32;
    let dense: Vec<u32> = forest.flatten().into_iter().map(|l| l + 1).collect();
    let labels = LabelMap {
        labels: Array2D::from_slice(&dense, image.width, image.height)?,
        num_labels,
    };
    let mean_colors = mean_colors(image, &labels);
    Ok(Segmentation {
        labels,
        mean_colors,
    })
}

fn mean_colors(image: &Image, labels: &LabelMap) -> Vec<[u8; 3]> {
    let n = labels.num_labels as usize;
    let mut sums = vec![[0f64; 3]; n];
    let mut counts = vec![0u32; n];
    for (px, label) in image.data.chunks_exact(3).zip(labels.labels.data.iter()) {
        let i = *label as usize - 1;
        counts[i] += 1;
        for c in 0..3 {
            sums[i][c] += px[c] as f64;
        }
    }
    sums.iter()
        .zip(counts)
        .map(|(sum, count)| sum.map(|s| (s / count as f64) as u8))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{build_edges, segment_image, RecolorMode};
    use crate::arrays::Image;
    use crate::common::{Error, SegmentationConfig};
    use crate::filter::gaussian_blur;

    fn two_tone(width: usize, height: usize) -> Image {
        let mut image = Image::from_fill(20, width, height, 3);
        for y in 0..height {
            for x in width / 2..width {
                image.get_pixel_mut(x, y).copy_from_slice(&[220, 200, 30]);
            }
        }
        image
    }

    #[test]
    fn edge_count_and_order() {
        let image = Image::from_fill(0, 3, 2, 3);
        let edges = build_edges(&gaussian_blur(&image, 0.0).unwrap());
        // per pixel: right, down, down-right, up-right
        assert_eq!(edges.len(), 2 * 2 + 3 + 2 + 2);
        assert_eq!((edges[0].a, edges[0].b), (0, 1));
        assert_eq!((edges[1].a, edges[1].b), (0, 3));
        assert_eq!((edges[2].a, edges[2].b), (0, 4));
        assert!(edges.iter().all(|e| e.weight == 0.0));
    }

    #[test]
    fn equal_to_threshold_merges() {
        let image = Image::from_slice(&[0, 0, 0, 3, 4, 0], 2, 1, 3).unwrap();
        let mut config = SegmentationConfig {
            sigma: 0.0,
            threshold: 5.0,
            min_component_size: 0,
        };
        assert_eq!(segment_image(&image, &config).unwrap().num_components(), 1);
        config.threshold = 4.99;
        assert_eq!(segment_image(&image, &config).unwrap().num_components(), 2);
    }

    #[test]
    fn two_tone_image_gives_two_regions() {
        let image = two_tone(8, 6);
        let config = SegmentationConfig {
            sigma: 0.0,
            threshold: 50.0,
            min_component_size: 2,
        };
        let seg = segment_image(&image, &config).unwrap();
        assert_eq!(seg.num_components(), 2);
        assert_eq!(seg.labels.get(0, 0), 1);
        assert_eq!(seg.labels.get(7, 5), 2);
        assert_eq!(seg.mean_colors[0], [20, 20, 20]);
        assert_eq!(seg.mean_colors[1], [220, 200, 30]);
        let recolored = seg.recolor(RecolorMode::MeanColor);
        assert_eq!(recolored.data.as_slice(), image.data.as_slice());
    }

    #[test]
    fn min_component_size_is_monotone() {
        let data: Vec<u8> = (0..12 * 9 * 3)
            .map(|i: usize| (i.wrapping_mul(2654435761) >> 7) as u8)
            .collect();
        let image = Image::from_slice(&data, 12, 9, 3).unwrap();
        let mut last = usize::MAX;
        for min_component_size in [0, 1, 2, 4, 8, 16, 64, 200] {
            let config = SegmentationConfig {
                sigma: 0.5,
                threshold: 100.0,
                min_component_size,
            };
            let count = segment_image(&image, &config).unwrap().num_components();
            assert!(count <= last, "{count} > {last} for {min_component_size}");
            last = count;
        }
        assert_eq!(last, 1);
    }

    #[test]
    fn vanishing_sigma_keeps_flat_image_whole() {
        let image = Image::from_fill(10, 4, 4, 3);
        let config = SegmentationConfig {
            sigma: 1e-23,
            threshold: 100.0,
            min_component_size: 0,
        };
        assert_eq!(segment_image(&image, &config).unwrap().num_components(), 1);
    }

    #[test]
    fn random_recolor_is_reproducible() {
        let image = two_tone(6, 4);
        let config = SegmentationConfig {
            sigma: 0.0,
            threshold: 10.0,
            min_component_size: 1,
        };
        let seg = segment_image(&image, &config).unwrap();
        let a = seg.recolor(RecolorMode::Random { seed: 7 });
        let b = seg.recolor(RecolorMode::Random { seed: 7 });
        assert_eq!(a.data.as_slice(), b.data.as_slice());
        assert_eq!(a.get_pixel(0, 0), a.get_pixel(2, 3));
    }

    #[test]
    fn rejects_grey_input() {
        let image = Image::from_fill(0, 4, 4, 1);
        assert_eq!(
            segment_image(&image, &SegmentationConfig::default()).err(),
            Some(Error::PreconditionViolation {
                expected: 3,
                found: 1
            })
        );
    }
}
