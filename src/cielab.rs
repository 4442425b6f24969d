use assume::assume;
use tables::{C_B, LAB_SHIFT, LAB_TBL, OUTPUT_SHIFT, SRGB_GAMMA_TBL, SRGB_SHIFT, XYZ_TO_SRGB};

pub(crate) mod tables {
    use static_init::dynamic;
    pub const SRGB_SHIFT: u8 = 13;
    const SRGB_MAX: usize = 1 << SRGB_SHIFT;
    pub const OUTPUT_SHIFT: u8 = 1;
    pub const LAB_SHIFT: u8 = 16;
    /// sRGB -> XYZ matrix normalized by the D65 white point, in 16-bit fixed point.
    pub const C_B: [u32; 9] = [28440, 24656, 12442, 13938, 46868, 4730, 1164, 7175, 57202];
    #[dynamic(65535)]
    pub static SRGB_GAMMA_TBL: [u32; 256] =
        core::array::from_fn(|i| (calculate_xyz_nonlin(i as u8) * SRGB_MAX as f32) as u32);
    #[dynamic(65535)]
    pub static LAB_TBL: [i32; SRGB_MAX + 1] = core::array::from_fn(|i| {
        (calculate_lab_nonlin(i as f32 / SRGB_MAX as f32) * SRGB_MAX as f32).round() as i32
    });
    #[dynamic(65535)]
    pub static XYZ_TO_SRGB: [f32; 9] = invert_3x3(&C_B.map(|c| c as f32 / (1 << LAB_SHIFT) as f32));

    fn calculate_xyz_nonlin(a: u8) -> f32 {
        let v: f64 = a as f64 / 255.0;
        if v <= 0.04045 {
            return (v / 12.92) as f32;
        }
        ((v + 0.055) / 1.055).powf(2.4) as f32
    }

    fn calculate_lab_nonlin(a: f32) -> f32 {
        debug_assert!(a >= 0.0);
        if a < 0.008856 {
            return 7.787 * a + 0.137931;
        }
        a.powf(0.333333)
    }

    fn invert_3x3(m: &[f32; 9]) -> [f32; 9] {
        let det = m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
            + m[2] * (m[3] * m[7] - m[4] * m[6]);
        debug_assert!(det.abs() > f32::EPSILON);
        let inv_det = 1.0 / det;
        [
            (m[4] * m[8] - m[5] * m[7]) * inv_det,
            (m[2] * m[7] - m[1] * m[8]) * inv_det,
            (m[1] * m[5] - m[2] * m[4]) * inv_det,
            (m[5] * m[6] - m[3] * m[8]) * inv_det,
            (m[0] * m[8] - m[2] * m[6]) * inv_det,
            (m[2] * m[3] - m[0] * m[5]) * inv_det,
            (m[3] * m[7] - m[4] * m[6]) * inv_det,
            (m[1] * m[6] - m[0] * m[7]) * inv_det,
            (m[0] * m[4] - m[1] * m[3]) * inv_det,
        ]
    }
}

/// Convert pixel in RGB24 to Lab24. This is an approximation.
///
/// The output range is for:
///  - L - from 0 to 200
///  - a - from 0 to 255 (some values are clamped)
///  - b - from 0 to 255 (some values are clamped)
#[inline(always)]
pub fn srgb_to_cielab_pixel(rgb: &[u8]) -> [u8; 3] {
    let sr = unsafe { SRGB_GAMMA_TBL[rgb[0] as usize] };
    let sg = unsafe { SRGB_GAMMA_TBL[rgb[1] as usize] };
    let sb = unsafe { SRGB_GAMMA_TBL[rgb[2] as usize] };
    let xr = (C_B[0] * sr + C_B[1] * sg + C_B[2] * sb) >> LAB_SHIFT;
    let yr = (C_B[3] * sr + C_B[4] * sg + C_B[5] * sb) >> LAB_SHIFT;
    let zr = (C_B[6] * sr + C_B[7] * sg + C_B[8] * sb) >> LAB_SHIFT;
    assume!(unsafe: xr < LAB_TBL.len() as u32);
    assume!(unsafe: yr < LAB_TBL.len() as u32);
    assume!(unsafe: zr < LAB_TBL.len() as u32);
    let fx = unsafe { LAB_TBL[xr as usize] };
    let fy = unsafe { LAB_TBL[yr as usize] };
    let fz = unsafe { LAB_TBL[zr as usize] };
    let ciel = 116 * fy - (16 << SRGB_SHIFT);
    let ciea = 500 * (fx - fy) + (128 << SRGB_SHIFT);
    let cieb = 200 * (fy - fz) + (128 << SRGB_SHIFT);
    assume!(unsafe: ciel >= 0);
    assume!(unsafe: ciea >= 0);
    assume!(unsafe: cieb >= 0);
    let l: u8 = (ciel as u32 >> (SRGB_SHIFT - OUTPUT_SHIFT)) as u8;
    let a: u8 = ((ciea >> (SRGB_SHIFT - OUTPUT_SHIFT)) - (64 << OUTPUT_SHIFT)).clamp(0, 255) as u8;
    let b: u8 = ((cieb >> (SRGB_SHIFT - OUTPUT_SHIFT)) - (64 << OUTPUT_SHIFT)).clamp(0, 255) as u8;
    [l, a, b]
}

/// Inverse of [`srgb_to_cielab_pixel`]. Only meant for visualisation, clamped colors do not
/// come back.
pub fn cielab_to_srgb_pixel(lab: &[u8]) -> [u8; 3] {
    let scale = (1 << OUTPUT_SHIFT) as f32;
    let offset = (64 << OUTPUT_SHIFT) as f32;
    let l = lab[0] as f32 / scale;
    let a = (lab[1] as f32 - offset) / scale;
    let b = (lab[2] as f32 - offset) / scale;
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let xyz = [lab_nonlin_inv(fx), lab_nonlin_inv(fy), lab_nonlin_inv(fz)];
    let m: &[f32; 9] = unsafe { &XYZ_TO_SRGB };
    core::array::from_fn(|i| {
        let linear = m[i * 3] * xyz[0] + m[i * 3 + 1] * xyz[1] + m[i * 3 + 2] * xyz[2];
        (srgb_gamma(linear.clamp(0.0, 1.0)) * 255.0).round() as u8
    })
}

fn lab_nonlin_inv(t: f32) -> f32 {
    if t > 0.206893 {
        return t * t * t;
    }
    (t - 0.137931) / 7.787
}

fn srgb_gamma(v: f32) -> f32 {
    if v <= 0.0031308 {
        return 12.92 * v;
    }
    1.055 * v.powf(1.0 / 2.4) - 0.055
}
