use crate::disjoint_set::DisjointSetForest;
use crate::slic::Clusters;
use log::debug;
use rayon::prelude::*;

/// Joins 4-adjacent pixels with the same assignment. Returns the dense fragment index of every
/// pixel, fragments numbered in raster order of their first pixel.
fn label_fragments(clusters: &Clusters) -> (Vec<u32>, usize) {
    let assignments = &clusters.assignments;
    let width = assignments.width;
    let mut forest = DisjointSetForest::new(assignments.data.len());
    for y in 0..assignments.height {
        for x in 0..width {
            let index = assignments.get_index(x, y);
            let label = assignments.data[index];
            if x > 0 && assignments.data[index - 1] == label {
                forest.union(index as u32 - 1, index as u32);
            }
            if y > 0 && assignments.data[index - width] == label {
                forest.union((index - width) as u32, index as u32);
            }
        }
    }
    let num_fragments = forest.no_of_elements();
    (forest.flatten(), num_fragments)
}

/// Relabels connected fragments smaller than `min_size` pixels.
///
/// Every small fragment takes the (already resolved) cluster of the pixel left of its first
/// pixel, or of the pixel above when it starts in the first column. A small fragment starting at
/// the origin keeps its cluster. Cluster statistics are not touched, run `slic::update()`
/// afterwards.
pub fn enforce_connectivity(clusters: &mut Clusters, min_size: u32) {
    let width = clusters.assignments.width;
    if width == 0 || clusters.assignments.height == 0 {
        return;
    }
    let (fragments, num_fragments) = label_fragments(clusters);

    let mut sizes = vec![0u32; num_fragments];
    let mut leaders = vec![usize::MAX; num_fragments];
    for (index, fragment) in fragments.iter().enumerate() {
        let fragment = *fragment as usize;
        sizes[fragment] += 1;
        if leaders[fragment] == usize::MAX {
            leaders[fragment] = index;
        }
    }

    // fragments are numbered by their leader, so the neighbour of a leader always belongs to an
    // earlier fragment with its substitute already known
    let mut substitute = vec![0u32; num_fragments];
    let mut num_relabelled = 0;
    for fragment in 0..num_fragments {
        let leader = leaders[fragment];
        let own = clusters.assignments.data[leader];
        substitute[fragment] = if sizes[fragment] >= min_size {
            own
        } else if leader % width > 0 {
            num_relabelled += 1;
            substitute[fragments[leader - 1] as usize]
        } else if leader >= width {
            num_relabelled += 1;
            substitute[fragments[leader - width] as usize]
        } else {
            own
        };
    }

    clusters
        .assignments
        .data
        .par_iter_mut()
        .zip(fragments.par_iter())
        .for_each(|(assignment, fragment)| *assignment = substitute[*fragment as usize]);
    debug!(
        "connectivity: {num_fragments} fragments, {num_relabelled} smaller than {min_size} pixels relabelled"
    );
}

#[cfg(test)]
mod tests {
    use super::{enforce_connectivity, label_fragments};
    use crate::arrays::Array2D;
    use crate::slic::Clusters;

    fn clusters_from(labels: &[u32], width: usize, height: usize) -> Clusters {
        Clusters {
            assignments: Array2D::from_slice(labels, width, height).unwrap(),
            clusters: vec![],
            search_region_size: 2,
        }
    }

    #[test]
    fn fragments_use_four_adjacency() {
        #[rustfmt::skip]
        let labels = [
            0, 1, 1,
            1, 0, 1,
            1, 1, 0,
        ];
        let (fragments, n) = label_fragments(&clusters_from(&labels, 3, 3));
        // diagonal zeros are separate fragments, the ones form two
        assert_eq!(n, 5);
        assert_eq!(fragments, vec![0, 1, 1, 2, 3, 1, 2, 2, 4]);
    }

    #[test]
    fn small_fragment_takes_left_neighbour() {
        #[rustfmt::skip]
        let labels = [
            0, 0, 0, 0, 1, 1,
            0, 0, 2, 0, 1, 1,
            0, 0, 0, 0, 1, 1,
        ];
        let mut clusters = clusters_from(&labels, 6, 3);
        enforce_connectivity(&mut clusters, 2);
        #[rustfmt::skip]
        let expected = [
            0, 0, 0, 0, 1, 1,
            0, 0, 0, 0, 1, 1,
            0, 0, 0, 0, 1, 1,
        ];
        assert_eq!(clusters.assignments.data.as_slice(), &expected);
    }

    #[test]
    fn small_fragment_in_first_column_takes_upper_neighbour() {
        #[rustfmt::skip]
        let labels = [
            3, 3, 3,
            4, 3, 3,
            3, 3, 3,
        ];
        let mut clusters = clusters_from(&labels, 3, 3);
        enforce_connectivity(&mut clusters, 2);
        assert!(clusters.assignments.data.iter().all(|l| *l == 3));
    }

    #[test]
    fn relabelling_follows_resolved_neighbour() {
        // the lone 5 at the origin is kept, the lone 6 follows it
        let labels = [5, 6, 7, 7, 7, 7];
        let mut clusters = clusters_from(&labels, 6, 1);
        enforce_connectivity(&mut clusters, 2);
        assert_eq!(clusters.assignments.data.as_slice(), &[5, 5, 7, 7, 7, 7]);
    }

    #[test]
    fn zero_min_size_is_identity() {
        let labels = [1, 2, 1, 2, 1, 2];
        let mut clusters = clusters_from(&labels, 3, 2);
        enforce_connectivity(&mut clusters, 0);
        assert_eq!(clusters.assignments.data.as_slice(), &labels);
    }
}
