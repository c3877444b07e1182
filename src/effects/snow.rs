use super::{Effect, range_ok, sample};
use crate::surface::{Rgb, Surface};
use noise::{NoiseFn, Perlin};
use std::f32::consts::{PI, TAU};

const WHITE: Rgb = (255, 255, 255);

/// Tuning for the snowfall. Per-flake values are drawn once at start; the
/// population never changes after that.
#[derive(Clone)]
pub struct SnowConfig {
    pub count: usize,
    pub radius: (f32, f32),
    pub fall_speed: (f32, f32),
    pub opacity: (f32, f32),
    pub swing_speed: (f32, f32),
    pub rotation_speed: (f32, f32),
    pub sway_amplitude: f32,
    pub wind: f32,
}

impl SnowConfig {
    /// Light, slow, translucent snowfall.
    pub fn calm() -> Self {
        Self {
            count: 25,
            radius: (0.5, 2.5),
            fall_speed: (0.15, 0.55),
            opacity: (0.15, 0.5),
            swing_speed: (0.005, 0.02),
            rotation_speed: (-0.005, 0.005),
            sway_amplitude: 0.5,
            wind: 0.15,
        }
    }

    pub fn validated(mut self) -> Self {
        let defaults = Self::calm();
        if self.count == 0 {
            self.count = defaults.count;
        }
        if !range_ok(self.radius) || self.radius.0 <= 0.0 {
            self.radius = defaults.radius;
        }
        if !range_ok(self.fall_speed) || self.fall_speed.0 <= 0.0 {
            self.fall_speed = defaults.fall_speed;
        }
        if !range_ok(self.opacity) {
            self.opacity = defaults.opacity;
        }
        if !range_ok(self.swing_speed) {
            self.swing_speed = defaults.swing_speed;
        }
        if !range_ok(self.rotation_speed) {
            self.rotation_speed = defaults.rotation_speed;
        }
        if !self.sway_amplitude.is_finite() {
            self.sway_amplitude = defaults.sway_amplitude;
        }
        if !self.wind.is_finite() {
            self.wind = defaults.wind;
        }
        self
    }
}

struct Snowflake {
    x: f32,
    y: f32,
    radius: f32,
    speed: f32,
    opacity: f32,
    swing: f32,
    swing_speed: f32,
    rotation: f32,
    rotation_speed: f32,
}

/// Drift engine: a fixed population of flakes that fall, sway, spin, and
/// recycle to the top the moment they leave the surface. Nothing ever dies.
pub struct SnowEffect {
    width: f32,
    height: f32,
    config: SnowConfig,
    flakes: Vec<Snowflake>,
    wind_noise: Perlin,
    rng: fastrand::Rng,
}

impl SnowEffect {
    pub fn new(config: SnowConfig, width: f32, height: f32) -> Self {
        Self::seeded(config, width, height, fastrand::Rng::new())
    }

    pub fn seeded(config: SnowConfig, width: f32, height: f32, mut rng: fastrand::Rng) -> Self {
        let config = config.validated();
        let flakes = (0..config.count)
            .map(|_| Snowflake {
                x: rng.f32() * width,
                y: rng.f32() * height,
                radius: sample(&mut rng, config.radius),
                speed: sample(&mut rng, config.fall_speed),
                opacity: sample(&mut rng, config.opacity),
                swing: rng.f32() * TAU,
                swing_speed: sample(&mut rng, config.swing_speed),
                rotation: rng.f32() * TAU,
                rotation_speed: sample(&mut rng, config.rotation_speed),
            })
            .collect();
        let wind_noise = Perlin::new(rng.u32(..));
        Self {
            width,
            height,
            config,
            flakes,
            wind_noise,
            rng,
        }
    }
}

impl Effect for SnowEffect {
    fn update(&mut self, now_ms: f64) {
        let t = now_ms * 0.0003;
        for flake in &mut self.flakes {
            flake.y += flake.speed;
            flake.swing += flake.swing_speed;
            let gust =
                self.wind_noise.get([flake.x as f64 * 0.02, t]) as f32 * self.config.wind;
            flake.x += flake.swing.sin() * self.config.sway_amplitude + gust;
            flake.rotation += flake.rotation_speed;

            // Recycle, never retire: past the bottom goes back above the top
            // with a fresh x, off either side wraps around.
            let margin = flake.radius * 2.5;
            if flake.y > self.height + margin {
                flake.y = -margin;
                flake.x = self.rng.f32() * self.width;
            }
            if flake.x > self.width + margin {
                flake.x = -margin;
            } else if flake.x < -margin {
                flake.x = self.width + margin;
            }
        }
    }

    fn render(&mut self, surface: &mut Surface) {
        for flake in &self.flakes {
            let size = flake.radius * 2.5;
            let intensity = flake.opacity * 3.0;

            // Six arms, branched when the flake is large enough to show it.
            for arm in 0..6 {
                let angle = flake.rotation + arm as f32 * (PI / 3.0);
                let (dx, dy) = (angle.cos(), angle.sin());
                surface.draw_line(
                    flake.x,
                    flake.y,
                    flake.x + dx * size,
                    flake.y + dy * size,
                    intensity,
                    WHITE,
                );
                if size > 2.0 {
                    let bx = flake.x + dx * size * 0.4;
                    let by = flake.y + dy * size * 0.4;
                    let (px, py) = (-dy, dx);
                    let fx = dx * size * 0.2;
                    let fy = dy * size * 0.2;
                    let sx = px * size * 0.3;
                    let sy = py * size * 0.3;
                    surface.draw_line(bx, by, bx + fx + sx, by + fy + sy, intensity, WHITE);
                    surface.draw_line(bx, by, bx + fx - sx, by + fy - sy, intensity, WHITE);
                }
            }
        }
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(count: usize) -> SnowEffect {
        let config = SnowConfig {
            count,
            ..SnowConfig::calm()
        };
        SnowEffect::seeded(config, 120.0, 80.0, fastrand::Rng::with_seed(11))
    }

    #[test]
    fn population_is_invariant_across_ticks() {
        let mut snow = engine(25);
        for tick in 0..2000 {
            snow.update(tick as f64 * 16.0);
            assert_eq!(snow.flakes.len(), 25);
        }
    }

    #[test]
    fn flake_past_the_bottom_recycles_on_the_same_tick() {
        let mut snow = engine(5);
        snow.flakes[0].y = snow.height + 100.0;
        snow.update(0.0);
        let flake = &snow.flakes[0];
        assert!(flake.y < 0.0);
        assert!(flake.x >= 0.0 && flake.x <= snow.width);
    }

    #[test]
    fn flake_off_either_side_wraps_around() {
        let mut snow = engine(5);
        snow.flakes[0].x = snow.width + 100.0;
        snow.flakes[1].x = -100.0;
        snow.update(0.0);
        assert!(snow.flakes[0].x < 0.0);
        assert!(snow.flakes[1].x > snow.width);
    }

    #[test]
    fn resize_preserves_in_flight_state() {
        let mut snow = engine(10);
        for tick in 0..20 {
            snow.update(tick as f64 * 16.0);
        }
        let before: Vec<_> = snow
            .flakes
            .iter()
            .map(|f| (f.x, f.y, f.swing, f.rotation))
            .collect();
        snow.resize(33.0, 21.0);
        let after: Vec<_> = snow
            .flakes
            .iter()
            .map(|f| (f.x, f.y, f.swing, f.rotation))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn bad_config_falls_back_to_defaults() {
        let config = SnowConfig {
            count: 0,
            radius: (2.0, 1.0),
            fall_speed: (0.0, 0.0),
            wind: f32::INFINITY,
            ..SnowConfig::calm()
        }
        .validated();
        assert!(config.count > 0);
        assert!(config.radius.1 >= config.radius.0 && config.radius.0 > 0.0);
        assert!(config.fall_speed.0 > 0.0);
        assert!(config.wind.is_finite());
    }
}
