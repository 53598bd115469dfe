use std::sync::OnceLock;

/// Magma colour map control points, every 16th entry of the 256-entry table
/// plus the last one.
const MAGMA_STOPS: [[f32; 3]; 17] = [
    [0.001462, 0.000466, 0.013866],
    [0.039608, 0.031090, 0.133515],
    [0.113094, 0.065492, 0.276784],
    [0.211718, 0.061992, 0.418647],
    [0.316654, 0.071690, 0.485380],
    [0.414709, 0.110431, 0.504662],
    [0.512831, 0.148179, 0.507648],
    [0.613617, 0.181811, 0.498536],
    [0.716387, 0.214982, 0.475290],
    [0.816914, 0.255895, 0.436461],
    [0.904281, 0.319610, 0.388137],
    [0.960949, 0.418323, 0.359630],
    [0.985315, 0.528444, 0.382900],
    [0.995131, 0.641514, 0.436573],
    [0.996341, 0.755889, 0.507929],
    [0.992440, 0.868793, 0.596442],
    [0.987053, 0.991438, 0.749504],
];

static MAGMA_LUT: OnceLock<[[u8; 3]; 256]> = OnceLock::new();

fn build_magma_lut() -> [[u8; 3]; 256] {
    let mut lut = [[0u8; 3]; 256];
    let segments = (MAGMA_STOPS.len() - 1) as f32;
    for (i, entry) in lut.iter_mut().enumerate() {
        let pos = i as f32 / 255.0 * segments;
        let lo = (pos.floor() as usize).min(MAGMA_STOPS.len() - 2);
        let t = pos - lo as f32;
        for c in 0..3 {
            let v = MAGMA_STOPS[lo][c] + (MAGMA_STOPS[lo + 1][c] - MAGMA_STOPS[lo][c]) * t;
            entry[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    lut
}

/// Look up the magma colour for a value already normalized to [0, 1].
#[inline]
pub fn magma(t: f32) -> [u8; 3] {
    let lut = MAGMA_LUT.get_or_init(build_magma_lut);
    let idx = if t.is_nan() {
        0
    } else {
        ((t * 256.0) as isize).clamp(0, 255) as usize
    };
    lut[idx]
}

/// Map a dB value onto the colour map, normalized to `[min_db, max_db]`.
/// A zero-width range maps everything to the bottom colour.
pub fn db_to_rgb(db: f32, min_db: f32, max_db: f32) -> [u8; 3] {
    let span = max_db - min_db;
    if span <= 0.0 || !span.is_finite() {
        return magma(0.0);
    }
    magma((db - min_db) / span)
}
