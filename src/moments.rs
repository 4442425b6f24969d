//! Raw and central image moments of labeled components.

use crate::labeling::LabelMap;
use rayon::prelude::*;

/// Shape descriptors of one connected component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentProperty {
    pub label: u32,
    /// Number of pixels.
    pub area: u32,
    /// (x, y) mean position.
    pub centroid: (f32, f32),
    /// 0 for a disc (or a single pixel), approaching 1 for a line.
    pub eccentricity: f32,
}

#[derive(Clone, Copy, Default)]
struct Moments {
    m00: f64,
    m10: f64,
    m01: f64,
    m20: f64,
    m11: f64,
    m02: f64,
}

impl Moments {
    fn add(&mut self, x: f64, y: f64) {
        self.m00 += 1.0;
        self.m10 += x;
        self.m01 += y;
        self.m20 += x * x;
        self.m11 += x * y;
        self.m02 += y * y;
    }

    fn merge(&mut self, other: &Moments) {
        self.m00 += other.m00;
        self.m10 += other.m10;
        self.m01 += other.m01;
        self.m20 += other.m20;
        self.m11 += other.m11;
        self.m02 += other.m02;
    }

    fn centroid(&self) -> (f64, f64) {
        (self.m10 / self.m00, self.m01 / self.m00)
    }

    fn eccentricity(&self) -> f64 {
        let (cx, cy) = self.centroid();
        let mu20 = self.m20 / self.m00 - cx * cx;
        let mu02 = self.m02 / self.m00 - cy * cy;
        let mu11 = self.m11 / self.m00 - cx * cy;
        let common = ((mu20 - mu02) * (mu20 - mu02) + 4.0 * mu11 * mu11).sqrt();
        let lambda_max = (mu20 + mu02 + common) / 2.0;
        let lambda_min = (mu20 + mu02 - common) / 2.0;
        if lambda_max <= f64::EPSILON {
            return 0.0;
        }
        (1.0 - (lambda_min / lambda_max).max(0.0)).clamp(0.0, 1.0).sqrt()
    }
}

/// Computes the properties of labels `1..=num_labels`. Rows are accumulated in parallel.
pub fn component_properties(label_map: &LabelMap) -> Vec<ComponentProperty> {
    let num_labels = label_map.num_labels as usize;
    let width = label_map.width();
    if num_labels == 0 || width == 0 {
        return vec![];
    }
    let moments = label_map
        .labels
        .data
        .par_chunks(width)
        .enumerate()
        .fold(
            || vec![Moments::default(); num_labels + 1],
            |mut acc, (y, row)| {
                for (x, label) in row.iter().enumerate() {
                    if *label != 0 {
                        acc[*label as usize].add(x as f64, y as f64);
                    }
                }
                acc
            },
        )
        .reduce(
            || vec![Moments::default(); num_labels + 1],
            |mut a, b| {
                a.iter_mut().zip(&b).for_each(|(a, b)| a.merge(b));
                a
            },
        );

    moments
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, m)| m.m00 > 0.0)
        .map(|(label, m)| {
            let (cx, cy) = m.centroid();
            ComponentProperty {
                label: label as u32,
                area: m.m00 as u32,
                centroid: (cx as f32, cy as f32),
                eccentricity: m.eccentricity() as f32,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::arrays::Image;
    use crate::common::LabelingConfig;
    use crate::labeling::label_components;

    #[test]
    fn square_block_properties() {
        let mut image = Image::from_fill(0, 4, 4, 1);
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            image.get_pixel_mut(x, y)[0] = 1;
        }
        let map = label_components(&image, &LabelingConfig::default()).unwrap();
        let props = map.properties();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].label, 1);
        assert_eq!(props[0].area, 4);
        assert_eq!(props[0].centroid, (1.5, 1.5));
        assert!(props[0].eccentricity.abs() < 1e-6);
    }

    #[test]
    fn line_is_fully_eccentric() {
        let image = Image::from_slice(&[0, 1, 1, 1, 1, 0], 6, 1, 1).unwrap();
        let map = label_components(&image, &LabelingConfig::default()).unwrap();
        let props = map.properties();
        assert_eq!(props[0].area, 4);
        assert_eq!(props[0].centroid, (2.5, 0.0));
        assert!((props[0].eccentricity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn single_pixel_has_zero_eccentricity() {
        let image = Image::from_slice(&[0, 0, 0, 0, 9, 0], 3, 2, 1).unwrap();
        let map = label_components(&image, &LabelingConfig::default()).unwrap();
        let props = map.properties();
        assert_eq!(props[0].centroid, (1.0, 1.0));
        assert_eq!(props[0].eccentricity, 0.0);
    }
}
