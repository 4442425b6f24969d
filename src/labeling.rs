use crate::arrays::{Array2D, Image};
use crate::common::{Error, LabelingConfig};
use crate::disjoint_set::DisjointSetForest;
use crate::moments::{component_properties, ComponentProperty};
use log::debug;
use rayon::prelude::*;

/// Output of a labeling pass: a raster of labels `0..=num_labels` where 0 is background.
#[derive(Debug)]
pub struct LabelMap {
    pub labels: Array2D<u32>,
    pub num_labels: u32,
}

impl LabelMap {
    pub fn width(&self) -> usize {
        self.labels.width
    }

    pub fn height(&self) -> usize {
        self.labels.height
    }

    /// Label of the pixel at column `x` and row `y`.
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.labels[(x, y)]
    }

    /// Area, centroid and eccentricity of every label, ordered by label.
    pub fn properties(&self) -> Vec<ComponentProperty> {
        component_properties(self)
    }
}

/// Two-pass 8-connected component labeling of a single-channel raster.
///
/// Non-zero pixels are foreground. The first pass looks at the four neighbours already visited
/// in scan order (left, top-left, top, top-right), takes the smallest label among them and
/// records the equivalences in a [`DisjointSetForest`]. The second pass resolves every
/// provisional label to its root and renumbers the roots densely, so the first component met in
/// raster order is 1, the next one 2 and so on.
///
/// Fails with [`Error::CapacityExceeded`] when more than `config.max_components` provisional
/// labels are needed.
pub fn label_components(image: &Image, config: &LabelingConfig) -> Result<LabelMap, Error> {
    image.require_channels(1)?;
    let width = image.width;
    let height = image.height;
    let mut labels = Array2D::from_fill(0u32, width, height);
    // element 0 stands for the background and is never merged
    let mut forest = DisjointSetForest::with_capacity(config.max_components.min(4096) as usize + 1);
    forest.make_set();
    let mut next_label: u32 = 1;

    for y in 0..height {
        let image_row = image.get_row(y);
        for x in 0..width {
            if image_row[x] == 0 {
                continue;
            }
            let neighbors = visited_neighbors(&labels, x, y);
            let min_label = neighbors.iter().copied().filter(|l| *l != 0).min();
            let label = match min_label {
                None => {
                    if next_label > config.max_components {
                        return Err(Error::CapacityExceeded {
                            max_components: config.max_components,
                        });
                    }
                    let created = forest.make_set();
                    debug_assert_eq!(created, next_label);
                    next_label += 1;
                    created
                }
                Some(min_label) => {
                    for neighbor in neighbors {
                        if neighbor != 0 && neighbor != min_label {
                            forest.union(min_label, neighbor);
                        }
                    }
                    min_label
                }
            };
            labels[(x, y)] = label;
        }
    }

    // Provisional labels are handed out in raster order, so walking them in increasing order
    // meets the roots in the same order as a raster scan would.
    let mut root_to_final = vec![0u32; next_label as usize];
    let mut resolved = vec![0u32; next_label as usize];
    let mut num_labels = 0;
    for provisional in 1..next_label {
        let root = forest.find(provisional) as usize;
        if root_to_final[root] == 0 {
            num_labels += 1;
            root_to_final[root] = num_labels;
        }
        resolved[provisional as usize] = root_to_final[root];
    }

    labels.data.par_iter_mut().for_each(|label| {
        *label = resolved[*label as usize];
    });

    debug!(
        "labeled {width}x{height} raster: {} provisional labels, {num_labels} components",
        next_label - 1
    );
    Ok(LabelMap { labels, num_labels })
}

/// Labels of the left, top-left, top and top-right neighbours (0 when outside or background).
#[inline(always)]
fn visited_neighbors(labels: &Array2D<u32>, x: usize, y: usize) -> [u32; 4] {
    let mut neighbors = [0u32; 4];
    if x > 0 {
        neighbors[0] = labels[(x - 1, y)];
    }
    if y > 0 {
        if x > 0 {
            neighbors[1] = labels[(x - 1, y - 1)];
        }
        neighbors[2] = labels[(x, y - 1)];
        if x + 1 < labels.width {
            neighbors[3] = labels[(x + 1, y - 1)];
        }
    }
    neighbors
}

#[cfg(test)]
mod tests {
    use super::label_components;
    use crate::arrays::Image;
    use crate::common::{Error, LabelingConfig};

    fn binary(rows: &[&[u8]]) -> Image {
        let data: Vec<u8> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Image::from_slice(&data, rows[0].len(), rows.len(), 1).unwrap()
    }

    #[test]
    fn two_blobs_get_two_labels() {
        let image = binary(&[
            &[1, 1, 0, 0, 0],
            &[1, 1, 0, 0, 0],
            &[0, 0, 0, 1, 1],
            &[0, 0, 0, 1, 1],
        ]);
        let map = label_components(&image, &LabelingConfig::default()).unwrap();
        assert_eq!(map.num_labels, 2);
        assert_eq!(map.get(0, 0), 1);
        assert_eq!(map.get(1, 1), 1);
        assert_eq!(map.get(3, 2), 2);
        assert_eq!(map.get(4, 3), 2);
        assert_eq!(map.get(2, 2), 0);
    }

    #[test]
    fn diagonal_touch_is_connected() {
        let image = binary(&[&[1, 0, 0], &[0, 1, 0], &[0, 0, 1]]);
        let map = label_components(&image, &LabelingConfig::default()).unwrap();
        assert_eq!(map.num_labels, 1);
    }

    #[test]
    fn anti_diagonal_merges_through_top_right() {
        let image = binary(&[&[0, 0, 1], &[0, 1, 0], &[1, 0, 0]]);
        let map = label_components(&image, &LabelingConfig::default()).unwrap();
        assert_eq!(map.num_labels, 1);
        assert_eq!(map.get(0, 2), 1);
    }

    #[test]
    fn u_shape_resolves_equivalence() {
        let image = binary(&[&[1, 0, 1], &[1, 0, 1], &[1, 1, 1]]);
        let map = label_components(&image, &LabelingConfig::default()).unwrap();
        assert_eq!(map.num_labels, 1);
        assert!(map.labels.data.iter().all(|l| *l <= 1));
        assert_eq!(map.get(2, 0), 1);
    }

    #[test]
    fn empty_raster_has_no_labels() {
        let image = Image::from_fill(0, 6, 4, 1);
        let map = label_components(&image, &LabelingConfig::default()).unwrap();
        assert_eq!(map.num_labels, 0);
        assert!(map.labels.data.iter().all(|l| *l == 0));
    }

    #[test]
    fn capacity_exceeded_is_an_error() {
        let image = binary(&[&[1, 0, 1, 0, 1]]);
        let config = LabelingConfig { max_components: 2 };
        assert_eq!(
            label_components(&image, &config).err(),
            Some(Error::CapacityExceeded { max_components: 2 })
        );
        let config = LabelingConfig { max_components: 3 };
        assert_eq!(label_components(&image, &config).unwrap().num_labels, 3);
    }

    #[test]
    fn rejects_multichannel_input() {
        let image = Image::from_fill(1, 2, 2, 3);
        assert_eq!(
            label_components(&image, &LabelingConfig::default()).err(),
            Some(Error::PreconditionViolation {
                expected: 1,
                found: 3
            })
        );
    }

    #[test]
    fn labels_are_dense() {
        let image = binary(&[
            &[1, 0, 1, 0, 1, 0, 1],
            &[0, 0, 0, 0, 0, 0, 0],
            &[1, 1, 1, 1, 1, 1, 1],
            &[0, 0, 0, 0, 0, 0, 0],
            &[1, 0, 0, 1, 0, 0, 1],
        ]);
        let map = label_components(&image, &LabelingConfig::default()).unwrap();
        assert_eq!(map.num_labels, 8);
        let mut seen = vec![false; map.num_labels as usize + 1];
        for l in map.labels.data.iter() {
            seen[*l as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
