/// Struct of SLIC cluster/superpixel.
///
/// Fields `x`, `y`, `l`, `a`, `b`, `num_members` are updated by `slic::update()`, they hold the
/// mean position and mean Lab color of the pixels assigned to the cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
    /// x position of center (column, not necessarily integral)
    pub x: f32,
    /// y position of center
    pub y: f32,
    /// Average L color of cluster
    pub l: f32,
    /// Average a color of cluster
    pub a: f32,
    /// Average b color of cluster
    pub b: f32,
    /// Number of cluster (index in `Clusters::clusters`, used in assignment)
    pub number: u32,
    /// Number of pixels inside cluster
    pub num_members: u32,
}

/// Search window of a cluster, `top..bottom` rows and `left..right` columns, clipped to the
/// image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Window {
    pub(crate) fn is_empty(&self) -> bool {
        self.top >= self.bottom || self.left >= self.right
    }
}

impl Cluster {
    pub(crate) fn from_pixel(number: u32, x: usize, y: usize, lab: &[u8]) -> Self {
        Self {
            x: x as f32,
            y: y as f32,
            l: lab[0] as f32,
            a: lab[1] as f32,
            b: lab[2] as f32,
            number,
            num_members: 0,
        }
    }

    /// The `2S x 2S` window `[c - S, c + S)` around the (truncated) center.
    #[inline(always)]
    pub(crate) fn window(&self, width: usize, height: usize, search_region_size: usize) -> Window {
        let s = search_region_size as i64;
        let cx = self.x as i64;
        let cy = self.y as i64;
        Window {
            top: (cy - s).max(0) as usize,
            bottom: (cy + s).clamp(0, height as i64) as usize,
            left: (cx - s).max(0) as usize,
            right: (cx + s).clamp(0, width as i64) as usize,
        }
    }

    /// `sqrt(d_lab^2 + d_xy^2 * m^2 / S^2)`, `spatial_weight` being `m^2 / S^2`.
    #[inline(always)]
    pub(crate) fn distance(&self, lab: &[u8], x: usize, y: usize, spatial_weight: f32) -> f32 {
        let dl = self.l - lab[0] as f32;
        let da = self.a - lab[1] as f32;
        let db = self.b - lab[2] as f32;
        let dx = self.x - x as f32;
        let dy = self.y - y as f32;
        (dl * dl + da * da + db * db + (dx * dx + dy * dy) * spatial_weight).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::{Cluster, Window};

    #[test]
    fn window_is_clipped() {
        let c = Cluster::from_pixel(0, 2, 9, &[0, 0, 0]);
        assert_eq!(
            c.window(20, 12, 5),
            Window {
                top: 4,
                bottom: 12,
                left: 0,
                right: 7
            }
        );
    }

    #[test]
    fn window_truncates_fractional_center() {
        let mut c = Cluster::from_pixel(0, 0, 0, &[0, 0, 0]);
        c.x = 10.9;
        c.y = 10.2;
        let w = c.window(100, 100, 4);
        assert_eq!((w.left, w.right, w.top, w.bottom), (6, 14, 6, 14));
        assert!(!w.is_empty());
    }

    #[test]
    fn distance_weights_space() {
        let c = Cluster::from_pixel(0, 0, 0, &[10, 10, 10]);
        assert_eq!(c.distance(&[10, 10, 10], 0, 0, 1.0), 0.0);
        assert_eq!(c.distance(&[13, 14, 10], 0, 0, 1.0), 5.0);
        // 3-4-5 in space with m / S = 2
        assert_eq!(c.distance(&[10, 10, 10], 3, 4, 4.0), 10.0);
    }
}
