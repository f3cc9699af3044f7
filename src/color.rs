use palette::{Hsl, IntoColor, Srgb};

/// Gray used for points without a value.
pub const NAN_COLOR: [u8; 3] = [128, 128, 128];

const TABLE_SIZE: usize = 256;

// ---------------------------------------------------------------------------
// Color ramp generator
// ---------------------------------------------------------------------------

/// `n` colors sweeping hue from blue (low) to red (high), a rainbow ramp.
pub fn generate_ramp(n: usize) -> Vec<[u8; 3]> {
    if n == 0 {
        return Vec::new();
    }
    let last = (n - 1).max(1) as f32;
    (0..n)
        .map(|i| {
            let hue = 240.0 * (1.0 - i as f32 / last);
            let hsl = Hsl::new(hue, 0.9, 0.5);
            let rgb: Srgb = hsl.into_color();
            [
                (rgb.red * 255.0).round() as u8,
                (rgb.green * 255.0).round() as u8,
                (rgb.blue * 255.0).round() as u8,
            ]
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: scalar value → RGB
// ---------------------------------------------------------------------------

/// Maps values of one attribute within `[min, max]` onto the ramp.
/// Values outside the range clamp to the end colors.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarColorMap {
    pub column: String,
    pub range: (f64, f64),
    table: Vec<[u8; 3]>,
}

impl ScalarColorMap {
    pub fn new(column: &str, range: (f64, f64)) -> Self {
        ScalarColorMap {
            column: column.to_string(),
            range,
            table: generate_ramp(TABLE_SIZE),
        }
    }

    pub fn color_for(&self, value: f64) -> [u8; 3] {
        if value.is_nan() {
            return NAN_COLOR;
        }
        let (min, max) = self.range;
        let t = if max > min {
            ((value - min) / (max - min)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let last = self.table.len() - 1;
        self.table[(t * last as f64).round() as usize]
    }

    /// `samples` RGBA pixels spanning the range, for drawing a color bar.
    pub fn uint8_table(&self, samples: usize) -> Vec<u8> {
        let (min, max) = self.range;
        let step = if samples > 1 {
            (max - min) / (samples - 1) as f64
        } else {
            0.0
        };
        (0..samples)
            .flat_map(|i| {
                let [r, g, b] = self.color_for(min + step * i as f64);
                [r, g, b, 255]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_runs_blue_to_red() {
        let ramp = generate_ramp(5);
        assert_eq!(ramp.len(), 5);
        let [r0, _, b0] = ramp[0];
        let [r4, _, b4] = ramp[4];
        assert!(b0 > r0);
        assert!(r4 > b4);
        assert!(generate_ramp(0).is_empty());
        assert_eq!(generate_ramp(1).len(), 1);
    }

    #[test]
    fn values_clamp_to_range_ends() {
        let map = ScalarColorMap::new("rop", (10.0, 20.0));
        assert_eq!(map.color_for(10.0), map.color_for(-50.0));
        assert_eq!(map.color_for(20.0), map.color_for(1e6));
        assert_ne!(map.color_for(10.0), map.color_for(20.0));
        assert_eq!(map.color_for(f64::NAN), NAN_COLOR);
    }

    #[test]
    fn degenerate_range_uses_low_color() {
        let map = ScalarColorMap::new("rop", (3.0, 3.0));
        assert_eq!(map.color_for(3.0), map.color_for(100.0));
    }

    #[test]
    fn color_bar_is_rgba() {
        let map = ScalarColorMap::new("rop", (0.0, 1.0));
        let bar = map.uint8_table(4);
        assert_eq!(bar.len(), 16);
        assert!(bar.chunks(4).all(|px| px[3] == 255));
        assert_eq!(bar[..3], map.color_for(0.0));
        assert_eq!(bar[12..15], map.color_for(1.0));
    }
}
