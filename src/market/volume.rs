//! Tick volume model: log-normal draws shaped by an hour-of-day activity
//! curve with occasional spike and quiet multipliers.

use rand::Rng;
use rand_distr::{Distribution, LogNormal};

/// Relative intraday activity per UTC hour. U-shaped: heavier near the
/// open and close, lighter overnight.
const HOURLY_ACTIVITY: [f64; 24] = [
    0.3, 0.25, 0.2, 0.2, 0.25, 0.3, 0.4, 0.6, 0.9, 1.3, 1.5, 1.2, 1.0, 1.1, 1.3, 1.6, 1.4, 1.0,
    0.8, 0.6, 0.5, 0.45, 0.4, 0.35,
];

#[derive(Debug, Clone)]
pub(crate) struct VolumeModel {
    distribution: LogNormal<f64>,
    spike_probability: f64,
    spike_multiplier: f64,
    quiet_probability: f64,
    quiet_multiplier: f64,
}

impl VolumeModel {
    /// Build a model whose median tick volume is `base_volume`.
    pub fn new(base_volume: f64) -> Self {
        let location = base_volume.max(1.0).ln();
        Self {
            // sigma 0.5 gives a realistic right-skewed tick distribution.
            distribution: LogNormal::new(location, 0.5).expect("finite log-normal parameters"),
            spike_probability: 0.05,
            spike_multiplier: 4.0,
            quiet_probability: 0.10,
            quiet_multiplier: 0.25,
        }
    }

    /// Draw one tick volume for the given UTC hour.
    pub fn sample<R: Rng + ?Sized>(&self, hour: u32, rng: &mut R) -> u64 {
        let mut volume = self.distribution.sample(rng) * HOURLY_ACTIVITY[(hour % 24) as usize];

        let roll: f64 = rng.random();
        if roll < self.spike_probability {
            volume *= self.spike_multiplier;
        } else if roll < self.spike_probability + self.quiet_probability {
            volume *= self.quiet_multiplier;
        }

        volume.round().max(1.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn samples_are_positive() {
        let model = VolumeModel::new(1_000.0);
        let mut rng = StdRng::seed_from_u64(7);
        for hour in 0..24 {
            assert!(model.sample(hour, &mut rng) >= 1);
        }
    }

    #[test]
    fn busy_hours_draw_more_on_average() {
        let model = VolumeModel::new(1_000.0);
        let mut rng = StdRng::seed_from_u64(42);
        let mean = |hour: u32, rng: &mut StdRng| -> f64 {
            (0..500).map(|_| model.sample(hour, rng) as f64).sum::<f64>() / 500.0
        };
        let overnight = mean(3, &mut rng);
        let afternoon = mean(15, &mut rng);
        assert!(afternoon > overnight);
    }
}
