use crate::arrays::{Array2D, LABImage};
use crate::cluster::{Cluster, Window};
use crate::common::{split_length_to_ranges, AssignThreadingStrategy, SlicConfig};
use crate::slic::{Clusters, UNASSIGNED};
use assume::assume;
use multiversion::multiversion;
use rayon::current_num_threads;
use rayon::prelude::*;
use std::ops::Range;

/// One band of rows owned by a single task.
struct Band<'a> {
    rows: Range<usize>,
    assignments: &'a mut [u32],
    min_distances: &'a mut [f32],
}

/// This function implements the assign step in SLIC algorithm.
///
/// Every pixel gets the label of the closest cluster among those whose search window contains
/// it. Distances are reset to infinity first and a pixel is only relabelled on strict
/// improvement, so within the step the recorded distance of a pixel never increases. Pixels no
/// window reaches (possible near the border or with a widened seed lattice) are given to the
/// nearest cluster over the whole image.
///
/// The grids are split into disjoint row bands (one per rayon thread with
/// `AssignThreadingStrategy::RowBased`). Each band visits the clusters in index order, so the
/// result does not depend on the threading strategy.
pub fn assign(
    image: &LABImage,
    config: &SlicConfig,
    clusters: &mut Clusters,
    min_distances: &mut Array2D<f32>,
) {
    debug_assert_eq!(min_distances.width, image.width);
    debug_assert_eq!(min_distances.height, image.height);
    min_distances.fill(f32::INFINITY);
    let width = image.width;
    let search_region_size = clusters.search_region_size;
    let spatial_weight = spatial_weight(config.compactness, search_region_size);

    let windows: Vec<(Window, &Cluster)> = clusters
        .clusters
        .iter()
        .map(|c| (c.window(width, image.height, search_region_size), c))
        .filter(|(w, _)| !w.is_empty())
        .collect();

    let splits = match config.assign_threading_strategy {
        AssignThreadingStrategy::SingleThread => 1,
        AssignThreadingStrategy::RowBased => current_num_threads(),
    };
    let mut bands: Vec<Band> = Vec::with_capacity(splits);
    let mut assignments_rest: &mut [u32] = &mut clusters.assignments.data;
    let mut distances_rest: &mut [f32] = &mut min_distances.data;
    for rows in split_length_to_ranges(image.height, splits) {
        let (assignments, a_rest) = assignments_rest.split_at_mut(rows.len() * width);
        let (min_distances, d_rest) = distances_rest.split_at_mut(rows.len() * width);
        assignments_rest = a_rest;
        distances_rest = d_rest;
        bands.push(Band {
            rows,
            assignments,
            min_distances,
        });
    }

    bands
        .into_par_iter()
        .for_each(|band| assign_band(image, &windows, band, spatial_weight));
}

/// `m^2 / S^2`
pub(crate) fn spatial_weight(compactness: f32, search_region_size: usize) -> f32 {
    let s = search_region_size as f32;
    (compactness * compactness) / (s * s)
}

fn assign_band(
    image: &LABImage,
    windows: &[(Window, &Cluster)],
    mut band: Band,
    spatial_weight: f32,
) {
    let width = image.width;
    for (window, cluster) in windows {
        let top = window.top.max(band.rows.start);
        let bottom = window.bottom.min(band.rows.end);
        for y in top..bottom {
            let local_start = (y - band.rows.start) * width;
            let start = local_start + window.left;
            let end = local_start + window.right;
            assume!(unsafe: end <= band.assignments.len(), "end: {end} > {}", band.assignments.len());
            assume!(unsafe: end <= band.min_distances.len(), "end: {end} > {}", band.min_distances.len());
            let image_row = &image.get_row(y)[window.left * 4..window.right * 4];
            assign_row(
                image_row,
                cluster,
                window.left,
                y,
                spatial_weight,
                &mut band.min_distances[start..end],
                &mut band.assignments[start..end],
            );
        }
    }

    for (i, (min_dist, assignment)) in band
        .min_distances
        .iter_mut()
        .zip(band.assignments.iter_mut())
        .enumerate()
        .filter(|(_, (d, _))| **d == f32::INFINITY)
    {
        let x = i % width;
        let y = band.rows.start + i / width;
        let pixel = image.get_pixel(x, y);
        for (_, cluster) in windows {
            let dist = cluster.distance(pixel, x, y, spatial_weight);
            if dist < *min_dist {
                *min_dist = dist;
                *assignment = cluster.number;
            }
        }
    }
}

#[multiversion(targets = "simd")]
fn assign_row(
    image_row: &[u8],
    cluster: &Cluster,
    left: usize,
    y: usize,
    spatial_weight: f32,
    min_dist_row: &mut [f32],
    assign_row: &mut [u32],
) {
    for (x, ((pixel, min_dist), assign)) in (left..).zip(
        image_row
            .chunks_exact(4)
            .zip(min_dist_row.iter_mut())
            .zip(assign_row.iter_mut()),
    ) {
        let dist = cluster.distance(pixel, x, y, spatial_weight);
        if dist < *min_dist {
            *min_dist = dist;
            *assign = cluster.number;
        }
    }
}

/// Pixels never claimed by any cluster.
pub fn count_unassigned(assignments: &Array2D<u32>) -> usize {
    assignments
        .data
        .par_iter()
        .filter(|a| **a == UNASSIGNED)
        .count()
}
