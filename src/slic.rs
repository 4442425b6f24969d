use crate::arrays::{Array2D, Image, LABImage};
use crate::assign::{assign, count_unassigned};
use crate::cluster::Cluster;
use crate::common::{Error, SlicConfig};
use crate::connectivity::enforce_connectivity;
use log::{debug, trace, warn};
use rayon::prelude::*;

/// Assignment of pixels no cluster has claimed yet.
pub const UNASSIGNED: u32 = u32::MAX;

/// Convenient struct for passing values around.
pub struct Clusters {
    /// For every pixel in image this stores to which cluster it belongs (see `Cluster.number`).
    pub assignments: Array2D<u32>,
    pub clusters: Vec<Cluster>,
    /// Grid interval _S_, half size of the search window.
    pub search_region_size: usize,
}

/// Result of [`generate_superpixels`].
pub struct Superpixels {
    /// The input converted to Lab.
    pub image: LABImage,
    pub clusters: Clusters,
    /// Distance of every pixel to its cluster from the last assign step.
    pub min_distances: Array2D<f32>,
}

/// `S = floor(sqrt(N / K))`
///
/// Fails when `K == 0`, when the image is empty or when the grid interval would not fit into the
/// image in one of the axes.
pub fn grid_interval(width: usize, height: usize, num_of_superpixels: u32) -> Result<usize, Error> {
    if num_of_superpixels == 0 {
        return Err(Error::InvalidArgument(
            "number of superpixels must be positive".to_string(),
        ));
    }
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument(format!(
            "image {width}x{height} has no pixels"
        )));
    }
    let s = ((width * height) as f64 / num_of_superpixels as f64).sqrt() as usize;
    if s == 0 {
        return Err(Error::InvalidArgument(format!(
            "{num_of_superpixels} superpixels requested for {} pixels",
            width * height
        )));
    }
    if s > width || s > height {
        return Err(Error::InvalidArgument(format!(
            "image {width}x{height} is smaller than the grid interval {s}"
        )));
    }
    Ok(s)
}

/// Position with the lowest `|dL/dx| + |dL/dy|` in the 3x3 neighborhood, first one in raster
/// order on ties. Neighbours outside the image are clamped to the border.
fn find_local_minimum(image: &LABImage, x: usize, y: usize) -> (usize, usize) {
    let mut minimum = (x, y);
    let mut min_gradient = f32::MAX;
    for ny in y.saturating_sub(1)..(y + 2).min(image.height) {
        for nx in x.saturating_sub(1)..(x + 2).min(image.width) {
            let l = image.get_pixel(nx, ny)[0] as f32;
            let l_dy = image.get_pixel(nx, (ny + 1).min(image.height - 1))[0] as f32;
            let l_dx = image.get_pixel((nx + 1).min(image.width - 1), ny)[0] as f32;
            let gradient = (l_dy - l).abs() + (l_dx - l).abs();
            if gradient < min_gradient {
                min_gradient = gradient;
                minimum = (nx, ny);
            }
        }
    }
    minimum
}

/// Seed positions along one axis, `count` of them `step` apart, centred in `length`.
///
/// With `length >= step` the first seed sits at an offset in `[step / 2, step)`, not at `step` as
/// in the classic SLIC seeding that starts at `S` and stops before `length - S / 2`, so seed
/// positions (and the resulting superpixels) differ from that layout even when the step is not
/// widened.
fn lattice(length: usize, step: usize) -> impl Iterator<Item = usize> {
    let count = (length / step).max(1);
    let offset = (length - (count - 1) * step) / 2;
    (0..count).map(move |i| offset + i * step)
}

impl Clusters {
    /// Default initialize clusters function.
    ///
    /// Seeds lie on a lattice with step _S_ centred in the image. The step is widened while the
    /// lattice would hold more than `num_of_superpixels` seeds, so there are never more clusters
    /// than requested. Every seed is moved to the lowest gradient position of its 3x3
    /// neighborhood.
    ///
    /// For custom implementations the needed filled fields in new cluster are `x`, `y`, `l`, `a`,
    /// `b` and unique `number` equal to the index in `clusters`.
    pub fn initialize_clusters(image: &LABImage, config: &SlicConfig) -> Result<Clusters, Error> {
        let search_region_size =
            grid_interval(image.width, image.height, config.num_of_superpixels)?;
        if !config.compactness.is_finite() || config.compactness < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "compactness must be finite and non-negative, got {}",
                config.compactness
            )));
        }
        let mut step = search_region_size;
        let seeds_for = |step: usize| (image.width / step).max(1) * (image.height / step).max(1);
        while seeds_for(step) > config.num_of_superpixels as usize {
            step += 1;
        }

        let mut clusters = Vec::with_capacity(seeds_for(step));
        for y in lattice(image.height, step) {
            for x in lattice(image.width, step) {
                let (sx, sy) = find_local_minimum(image, x, y);
                clusters.push(Cluster::from_pixel(
                    clusters.len() as u32,
                    sx,
                    sy,
                    image.get_pixel(sx, sy),
                ));
            }
        }
        debug!(
            "SLIC on {}x{}: grid interval {search_region_size}, seed step {step}, {} seeds for {} requested",
            image.width,
            image.height,
            clusters.len(),
            config.num_of_superpixels
        );
        Ok(Clusters {
            assignments: Array2D::from_fill(UNASSIGNED, image.width, image.height),
            clusters,
            search_region_size,
        })
    }

    /// Integer (truncated) cluster centers, in cluster order.
    pub fn cluster_centers(&self) -> Vec<(usize, usize)> {
        self.clusters
            .iter()
            .map(|c| (c.x as usize, c.y as usize))
            .collect()
    }

    /// Clusters which own at least one pixel.
    pub fn num_non_empty(&self) -> usize {
        self.clusters.iter().filter(|c| c.num_members > 0).count()
    }

    /// Boundary points between superpixels.
    ///
    /// A pixel is a boundary point when at least two of its 8 neighbours that are not boundary
    /// points already carry a different cluster. The image is scanned once in raster order, so
    /// the result is sorted by `(y, x)` and the boundary stays about one pixel thick.
    pub fn contours(&self) -> Vec<(usize, usize)> {
        const DX: [isize; 8] = [-1, -1, 0, 1, 1, 1, 0, -1];
        const DY: [isize; 8] = [0, -1, -1, -1, 0, 1, 1, 1];
        let width = self.assignments.width;
        let height = self.assignments.height;
        let mut taken = vec![false; width * height];
        let mut contours = vec![];
        for y in 0..height {
            for x in 0..width {
                let label = self.assignments[(x, y)];
                let mut differing = 0;
                for (dx, dy) in DX.iter().zip(DY.iter()) {
                    let nx = x as isize + dx;
                    let ny = y as isize + dy;
                    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                        continue;
                    }
                    let (nx, ny) = (nx as usize, ny as usize);
                    if !taken[ny * width + nx] && self.assignments[(nx, ny)] != label {
                        differing += 1;
                        if differing > 1 {
                            break;
                        }
                    }
                }
                if differing > 1 {
                    contours.push((x, y));
                    taken[y * width + x] = true;
                }
            }
        }
        contours
    }

    /// Paints every pixel with the (rounded) mean color of its cluster. Unassigned pixels keep
    /// their color.
    pub fn recolor(&self, image: &LABImage) -> LABImage {
        let palette: Vec<[u8; 3]> = self
            .clusters
            .iter()
            .map(|c| [c.l, c.a, c.b].map(|v| v.round().clamp(0.0, 255.0) as u8))
            .collect();
        let mut output = LABImage {
            lab_data: image.lab_data.clone(),
            width: image.width,
            height: image.height,
        };
        for y in 0..image.height {
            for x in 0..image.width {
                let k = self.assignments[(x, y)];
                if let Some(color) = palette.get(k as usize) {
                    output.set_pixel(x, y, *color);
                }
            }
        }
        output
    }
}

/// This function does the update step.
///
/// Every cluster moves to the mean position and mean color of its pixels. Rows are accumulated in
/// parallel and the partial sums reduced afterwards. A cluster without pixels keeps its previous
/// center and color, only `num_members` is zeroed.
pub fn update(clusters: &mut Clusters, image: &LABImage) {
    let num_clusters = clusters.clusters.len();
    let width = image.width;
    if width == 0 {
        return;
    }
    // count, x, y, l, a, b
    let sums: Vec<[f64; 6]> = clusters
        .assignments
        .data
        .par_chunks(width)
        .zip(image.lab_data.par_chunks(width * 4))
        .enumerate()
        .fold(
            || vec![[0f64; 6]; num_clusters],
            |mut acc, (y, (assignments_row, image_row))| {
                for (x, (k, pixel)) in assignments_row
                    .iter()
                    .zip(image_row.chunks_exact(4))
                    .enumerate()
                {
                    if let Some(sum) = acc.get_mut(*k as usize) {
                        sum[0] += 1.0;
                        sum[1] += x as f64;
                        sum[2] += y as f64;
                        sum[3] += pixel[0] as f64;
                        sum[4] += pixel[1] as f64;
                        sum[5] += pixel[2] as f64;
                    }
                }
                acc
            },
        )
        .reduce(
            || vec![[0f64; 6]; num_clusters],
            |mut a, b| {
                for (a, b) in a.iter_mut().zip(&b) {
                    for (a, b) in a.iter_mut().zip(b) {
                        *a += b;
                    }
                }
                a
            },
        );

    for (cluster, sum) in clusters.clusters.iter_mut().zip(&sums) {
        let count = sum[0];
        if count == 0.0 {
            if cluster.num_members != 0 {
                warn!(
                    "cluster {} at ({}, {}) lost all its pixels, keeping its last center",
                    cluster.number, cluster.x, cluster.y
                );
            }
            cluster.num_members = 0;
            continue;
        }
        cluster.num_members = count as u32;
        cluster.x = (sum[1] / count) as f32;
        cluster.y = (sum[2] / count) as f32;
        cluster.l = (sum[3] / count) as f32;
        cluster.a = (sum[4] / count) as f32;
        cluster.b = (sum[5] / count) as f32;
        debug_assert!(cluster.x < image.width as f32, "{cluster:?} x out of bounds");
        debug_assert!(cluster.y < image.height as f32, "{cluster:?} y out of bounds");
    }
}

/// This function is the main loop.
///
/// The steps are:
/// - `max_iterations` times
///     - assign
///     - update
/// - enforce_connectivity and update (only with `SlicConfig::min_size_factor`)
///
/// There is no convergence check, the full iteration budget is always spent. Returns the
/// distances of the last assign step.
pub fn iterate(image: &LABImage, config: &SlicConfig, clusters: &mut Clusters) -> Array2D<f32> {
    let mut min_distances = Array2D::from_fill(f32::INFINITY, image.width, image.height);
    for i in 0..config.max_iterations {
        assign(image, config, clusters, &mut min_distances);
        update(clusters, image);
        trace!(
            "iteration {i}: {} non-empty clusters, {} unassigned pixels",
            clusters.num_non_empty(),
            count_unassigned(&clusters.assignments)
        );
    }
    if let Some(factor) = config.min_size_factor {
        let s = clusters.search_region_size as f32;
        let min_size = (s * s * factor).round().max(0.0) as u32;
        enforce_connectivity(clusters, min_size);
        update(clusters, image);
    }
    min_distances
}

/// Converts an RGB image, seeds the clusters and runs [`iterate`].
pub fn generate_superpixels(image: &Image, config: &SlicConfig) -> Result<Superpixels, Error> {
    let lab = LABImage::from_image(image)?;
    let mut clusters = Clusters::initialize_clusters(&lab, config)?;
    let min_distances = iterate(&lab, config, &mut clusters);
    Ok(Superpixels {
        image: lab,
        clusters,
        min_distances,
    })
}
