use std::path::PathBuf;

use anyhow::{Context, Result};

const HEADER: [&str; 16] = [
    "Hole ID",
    "Bench",
    "Pattern",
    "Northing (Actual)",
    "Easting (Actual)",
    "Collar Elevation",
    "computed_elevation",
    "end_depth",
    "air_pressure",
    "blastability",
    "rop",
    "rpm",
    "torque",
    "vibration",
    "weight_on_bit",
    "MSE",
];

const BENCHES: [f64; 3] = [1200.0, 1215.0, 1230.0];
const PATTERNS_PER_BENCH: usize = 4;
const HOLES_PER_SIDE: usize = 12;
const HOLE_SPACING: f64 = 6.5;
const SAMPLE_STEP: f64 = 0.1;
const HOLE_DEPTH: f64 = 15.0;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Drilling response of one sample. Harder rock slows penetration and
/// raises torque and specific energy.
fn measurements(hardness: f64, rng: &mut SimpleRng) -> [f64; 8] {
    let rpm = rng.gauss(90.0, 4.0);
    let weight_on_bit = rng.gauss(20.0 + 10.0 * hardness, 1.5);
    let rop = (rng.gauss(45.0 - 30.0 * hardness, 3.0)).max(1.0);
    let torque = rng.gauss(3.0 + 4.0 * hardness, 0.4);
    let air_pressure = rng.gauss(60.0, 2.5);
    let vibration = rng.gauss(0.5 + hardness, 0.1).abs();
    // Teale's mechanical specific energy, MPa-ish scale.
    let mse = weight_on_bit / 0.07 + (120.0 * std::f64::consts::PI * rpm * torque) / (0.07 * rop);
    let blastability = (100.0 * (1.0 - hardness) + rng.gauss(0.0, 5.0)).clamp(0.0, 100.0);
    [
        air_pressure,
        blastability,
        rop,
        rpm,
        torque,
        vibration,
        weight_on_bit,
        mse / 1000.0,
    ]
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let output_path = PathBuf::from(args.next().unwrap_or_else(|| "sample_mwd.csv".to_string()));
    let max_rows: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("invalid row count {n:?}"))?,
        None => usize::MAX,
    };

    let mut rng = SimpleRng::new(42);
    let mut writer = csv::Writer::from_path(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;
    writer.write_record(HEADER).context("writing header")?;

    let samples_per_hole = (HOLE_DEPTH / SAMPLE_STEP) as usize;
    let mut rows = 0usize;
    let mut hole_id = 0usize;

    'benches: for (b, &bench) in BENCHES.iter().enumerate() {
        log::debug!("bench {bench}: {rows} rows written so far");
        for pattern_no in 0..PATTERNS_PER_BENCH {
            let pattern = (b * 100 + pattern_no) as f64;
            let origin_n = 7_400_000.0 + pattern_no as f64 * HOLES_PER_SIDE as f64 * HOLE_SPACING;
            let origin_e = 650_000.0 + b as f64 * 250.0;

            for row in 0..HOLES_PER_SIDE {
                for col in 0..HOLES_PER_SIDE {
                    hole_id += 1;
                    let northing = origin_n + row as f64 * HOLE_SPACING + rng.gauss(0.0, 0.2);
                    let easting = origin_e + col as f64 * HOLE_SPACING + rng.gauss(0.0, 0.2);
                    let collar = bench + HOLE_DEPTH + rng.gauss(0.0, 0.3);
                    let base_hardness = rng.next_f64();

                    for s in 1..=samples_per_hole {
                        if rows == max_rows {
                            break 'benches;
                        }
                        let depth = s as f64 * SAMPLE_STEP;
                        let hardness = (base_hardness + 0.3 * (depth / HOLE_DEPTH)).min(1.0);
                        let m = measurements(hardness, &mut rng);

                        // A few survey dropouts leave the northing blank.
                        let northing = if rng.next_f64() < 0.001 {
                            String::new()
                        } else {
                            format!("{northing:.2}")
                        };

                        let mut record = vec![
                            format!("H{hole_id:05}"),
                            format!("{bench}"),
                            format!("{pattern}"),
                            northing,
                            format!("{easting:.2}"),
                            format!("{collar:.2}"),
                            format!("{:.2}", collar - depth),
                            format!("{depth:.1}"),
                        ];
                        record.extend(m.iter().map(|v| format!("{v:.3}")));
                        writer.write_record(&record).context("writing row")?;
                        rows += 1;
                    }
                }
            }
        }
    }

    writer.flush().context("flushing output")?;
    log::info!(
        "wrote {rows} drill samples from {hole_id} holes to {}",
        output_path.display()
    );
    Ok(())
}
