use super::{Effect, range_ok, sample};
use crate::surface::{PreDraw, Rgb, Surface};
use crossterm::event::{Event, KeyCode, MouseEventKind};
use std::f32::consts::TAU;

const COLORS: [Rgb; 7] = [
    (255, 107, 107), // coral red
    (255, 217, 61),  // gold
    (107, 203, 119), // green
    (77, 150, 255),  // blue
    (255, 110, 180), // pink
    (155, 89, 182),  // violet
    (255, 255, 255), // white
];

// Ascent speed of a freshly launched shell, cells per tick.
const ASCENT_SPEED: (f32, f32) = (4.0, 7.0);

/// Tuning for one fireworks variant. The state machine is shared; variants
/// differ only in these numbers.
#[derive(Clone)]
pub struct FireworksConfig {
    pub interval_ms: f64,
    pub max_concurrent: usize,
    pub particle_count: (usize, usize),
    pub speed: (f32, f32),
    pub max_life: (f32, f32),
    pub gravity: f32,
    pub friction: f32,
    pub palette: Vec<Rgb>,
    pub glow: bool,
}

impl FireworksConfig {
    /// Frequent, big, glowing bursts.
    pub fn dense() -> Self {
        Self {
            interval_ms: 800.0,
            max_concurrent: 3,
            particle_count: (40, 70),
            speed: (2.0, 6.0),
            max_life: (80.0, 130.0),
            gravity: 0.04,
            friction: 0.99,
            palette: COLORS.to_vec(),
            glow: true,
        }
    }

    /// Sparse, small, soft bursts.
    pub fn gentle() -> Self {
        Self {
            interval_ms: 2500.0,
            max_concurrent: 2,
            particle_count: (20, 35),
            speed: (1.0, 3.0),
            max_life: (60.0, 90.0),
            gravity: 0.03,
            friction: 0.98,
            palette: COLORS.to_vec(),
            glow: false,
        }
    }

    /// Substitute safe defaults for anything that would produce NaN positions
    /// or an unsatisfiable draw: empty palette, inverted or zero ranges,
    /// non-finite constants.
    pub fn validated(mut self) -> Self {
        let defaults = Self::dense();
        if self.palette.is_empty() {
            self.palette = defaults.palette;
        }
        if self.particle_count.0 == 0 || self.particle_count.1 < self.particle_count.0 {
            self.particle_count = defaults.particle_count;
        }
        if !range_ok(self.speed) {
            self.speed = defaults.speed;
        }
        if !range_ok(self.max_life) || self.max_life.0 < 1.0 {
            self.max_life = defaults.max_life;
        }
        if !self.gravity.is_finite() {
            self.gravity = defaults.gravity;
        }
        if !self.friction.is_finite() || self.friction <= 0.0 || self.friction > 1.0 {
            self.friction = defaults.friction;
        }
        if !self.interval_ms.is_finite() || self.interval_ms < 0.0 {
            self.interval_ms = defaults.interval_ms;
        }
        self
    }
}

struct Particle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    life: f32,
    max_life: f32,
    size: f32,
    color: Rgb,
}

struct Emitter {
    x: f32,
    y: f32,
    target_y: f32,
    speed: f32,
    exploded: bool,
    particles: Vec<Particle>,
    color: Rgb,
}

/// Rising-emitter engine: shells climb to a target altitude, detonate once
/// into a radially even burst, and retire when every fragment has burned out.
pub struct FireworksEffect {
    width: f32,
    height: f32,
    config: FireworksConfig,
    emitters: Vec<Emitter>,
    last_spawn_ms: f64,
    volley: Vec<f64>,
    rng: fastrand::Rng,
}

impl FireworksEffect {
    pub fn new(config: FireworksConfig, width: f32, height: f32) -> Self {
        Self::seeded(config, width, height, fastrand::Rng::new())
    }

    pub fn seeded(config: FireworksConfig, width: f32, height: f32, rng: fastrand::Rng) -> Self {
        Self {
            width,
            height,
            config: config.validated(),
            emitters: Vec::new(),
            last_spawn_ms: 0.0,
            volley: Vec::new(),
            rng,
        }
    }

    /// Pre-schedule launches at the given timestamps so a cold start does not
    /// sit dark for a full spawn interval.
    pub fn schedule_volley(&mut self, times_ms: &[f64]) {
        self.volley.extend_from_slice(times_ms);
        self.volley.sort_by(|a, b| a.total_cmp(b));
    }

    /// One-shot burst at a caller-chosen point. This is the hook the host
    /// fires when the wheel lands on a prize.
    pub fn detonate_at(&mut self, x: f32, y: f32) {
        let color = self.config.palette[self.rng.usize(0..self.config.palette.len())];
        let mut emitter = Emitter {
            x,
            y,
            target_y: y,
            speed: 0.0,
            exploded: false,
            particles: Vec::new(),
            color,
        };
        explode(&mut emitter, &self.config, &mut self.rng);
        self.emitters.push(emitter);
    }

    /// The big finish: a center burst flanked by two lower side bursts.
    pub fn celebrate(&mut self) {
        self.detonate_at(self.width * 0.5, self.height * 0.45);
        self.detonate_at(self.width * 0.15, self.height * 0.6);
        self.detonate_at(self.width * 0.85, self.height * 0.6);
    }

    fn spawn_emitter(&mut self) {
        let x = self.rng.f32() * self.width;
        let target_y = self.height * 0.1 + self.rng.f32() * (self.height * 0.5);
        let speed = sample(&mut self.rng, ASCENT_SPEED);
        let color = self.config.palette[self.rng.usize(0..self.config.palette.len())];
        self.emitters.push(Emitter {
            x,
            y: self.height,
            target_y,
            speed,
            exploded: false,
            particles: Vec::new(),
            color,
        });
    }
}

fn explode(emitter: &mut Emitter, config: &FireworksConfig, rng: &mut fastrand::Rng) {
    let count = rng.usize(config.particle_count.0..=config.particle_count.1);
    for i in 0..count {
        let angle = TAU * i as f32 / count as f32;
        let speed = sample(rng, config.speed);
        emitter.particles.push(Particle {
            x: emitter.x,
            y: emitter.y,
            vx: angle.cos() * speed,
            vy: angle.sin() * speed,
            life: 1.0,
            max_life: sample(rng, config.max_life),
            size: 2.0 + rng.f32() * 2.0,
            color: emitter.color,
        });
    }
    emitter.exploded = true;
}

impl Effect for FireworksEffect {
    fn update(&mut self, now_ms: f64) {
        // Pre-scheduled launches, then the regular interval check.
        while self.volley.first().is_some_and(|&t| t <= now_ms) {
            self.volley.remove(0);
            if self.emitters.len() < self.config.max_concurrent {
                self.spawn_emitter();
            }
        }
        if now_ms - self.last_spawn_ms >= self.config.interval_ms
            && self.emitters.len() < self.config.max_concurrent
        {
            self.spawn_emitter();
            self.last_spawn_ms = now_ms;
        }

        let config = &self.config;
        let rng = &mut self.rng;

        // Back to front so swap_remove never skips an entry.
        let mut i = self.emitters.len();
        while i > 0 {
            i -= 1;
            let emitter = &mut self.emitters[i];
            let retired = if !emitter.exploded {
                emitter.y -= emitter.speed;
                if emitter.y <= emitter.target_y {
                    // Detonate at the overshot position, no snap-back.
                    explode(emitter, config, rng);
                }
                false
            } else {
                let mut all_dead = true;
                for p in &mut emitter.particles {
                    if p.life > 0.0 {
                        all_dead = false;
                        p.x += p.vx;
                        p.y += p.vy;
                        p.vy += config.gravity;
                        p.vx *= config.friction;
                        p.life = (p.life - 1.0 / p.max_life).max(0.0);
                    }
                }
                all_dead
            };
            if retired {
                self.emitters.swap_remove(i);
            }
        }
    }

    fn render(&mut self, surface: &mut Surface) {
        for emitter in &self.emitters {
            if !emitter.exploded {
                let x = emitter.x as i32;
                let y = emitter.y as i32;
                if self.config.glow {
                    surface.plot_glow(x, y, 3.0, emitter.color);
                } else {
                    surface.plot(x, y, 3.0, emitter.color);
                }
                // Short trail beneath the climbing shell.
                for i in 1..5 {
                    surface.plot(x, y + i, (1.0 - i as f32 * 0.2) * 2.0, emitter.color);
                }
            } else {
                for p in &emitter.particles {
                    if p.life <= 0.0 {
                        continue;
                    }
                    let intensity = p.life * 2.5;
                    if self.config.glow && p.size * p.life > 1.0 {
                        surface.plot_glow(p.x as i32, p.y as i32, intensity, p.color);
                    } else {
                        surface.plot(p.x as i32, p.y as i32, intensity, p.color);
                    }
                }
            }
        }
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn pre_draw(&self) -> PreDraw {
        PreDraw::Fade(0.85)
    }

    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::Key(key) if key.code == KeyCode::Char(' ') => self.celebrate(),
            Event::Mouse(mouse) => {
                if matches!(mouse.kind, MouseEventKind::Down(_)) {
                    self.detonate_at(mouse.column as f32, mouse.row as f32 * 2.0);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> FireworksConfig {
        // Interval high enough that the scheduler never fires during a test.
        FireworksConfig {
            interval_ms: 1e12,
            ..FireworksConfig::dense()
        }
    }

    fn engine(config: FireworksConfig) -> FireworksEffect {
        FireworksEffect::seeded(config, 200.0, 100.0, fastrand::Rng::with_seed(7))
    }

    #[test]
    fn emitter_detonates_exactly_once_at_or_below_target() {
        let mut fw = engine(quiet_config());
        fw.spawn_emitter();
        assert!(fw.emitters[0].y > fw.emitters[0].target_y);
        assert!(!fw.emitters[0].exploded);

        let mut t = 0.0;
        while !fw.emitters[0].exploded {
            assert!(fw.emitters[0].y > fw.emitters[0].target_y);
            fw.update(t);
            t += 16.0;
        }
        assert!(fw.emitters[0].y <= fw.emitters[0].target_y);

        // Once detonated, no further particles are synthesized.
        let count = fw.emitters[0].particles.len();
        fw.update(t);
        assert_eq!(fw.emitters[0].particles.len(), count);
    }

    #[test]
    fn burst_is_evenly_spaced_with_full_life() {
        let mut fw = engine(FireworksConfig {
            particle_count: (40, 40),
            ..quiet_config()
        });
        fw.detonate_at(100.0, 200.0);

        let particles = &fw.emitters[0].particles;
        assert_eq!(particles.len(), 40);
        for (i, p) in particles.iter().enumerate() {
            assert_eq!(p.life, 1.0);
            let expected = TAU * i as f32 / 40.0;
            let actual = p.vy.atan2(p.vx).rem_euclid(TAU);
            let diff = (actual - expected).abs();
            assert!(diff < 1e-4 || (diff - TAU).abs() < 1e-4, "angle {i}: {actual} vs {expected}");
        }
    }

    #[test]
    fn one_shot_burst_centers_on_the_requested_point() {
        let mut fw = engine(quiet_config());
        fw.detonate_at(100.0, 200.0);
        let particles = &fw.emitters[0].particles;
        let n = particles.len() as f32;
        let avg_x: f32 = particles.iter().map(|p| p.x).sum::<f32>() / n;
        let avg_y: f32 = particles.iter().map(|p| p.y).sum::<f32>() / n;
        assert_eq!(avg_x, 100.0);
        assert_eq!(avg_y, 200.0);
    }

    #[test]
    fn life_decreases_strictly_and_never_goes_negative() {
        let mut fw = engine(FireworksConfig {
            max_life: (80.0, 80.0),
            ..quiet_config()
        });
        fw.detonate_at(50.0, 50.0);

        let mut prev: Vec<f32> = fw.emitters[0].particles.iter().map(|p| p.life).collect();
        for tick in 0..82 {
            fw.update(tick as f64 * 16.0);
            if fw.emitters.is_empty() {
                break;
            }
            for (p, &before) in fw.emitters[0].particles.iter().zip(&prev) {
                assert!(p.life >= 0.0);
                if before > 0.0 {
                    assert!(p.life < before, "life did not decrease on tick {tick}");
                }
            }
            prev = fw.emitters[0].particles.iter().map(|p| p.life).collect();
        }
    }

    #[test]
    fn emitter_retires_once_every_particle_burns_out() {
        let mut fw = engine(FireworksConfig {
            particle_count: (40, 40),
            max_life: (60.0, 90.0),
            ..quiet_config()
        });
        fw.detonate_at(50.0, 50.0);

        let longest = fw.emitters[0]
            .particles
            .iter()
            .map(|p| p.max_life)
            .fold(0.0f32, f32::max);
        // One tick past the longest fuse to burn out, one more to retire.
        for tick in 0..(longest.ceil() as usize + 2) {
            fw.update(tick as f64 * 16.0);
        }
        assert!(fw.emitters.is_empty());
    }

    #[test]
    fn scheduler_spawns_once_at_the_interval() {
        let mut fw = engine(FireworksConfig {
            interval_ms: 800.0,
            max_concurrent: 3,
            ..FireworksConfig::dense()
        });
        for t in (0..800).step_by(100) {
            fw.update(t as f64);
            assert!(fw.emitters.is_empty(), "spawned before the interval at t={t}");
        }
        fw.update(800.0);
        assert_eq!(fw.emitters.len(), 1);
        fw.update(900.0);
        assert_eq!(fw.emitters.len(), 1);
    }

    #[test]
    fn scheduler_respects_the_concurrency_cap() {
        let mut fw = engine(FireworksConfig {
            interval_ms: 0.0,
            max_concurrent: 3,
            max_life: (500.0, 500.0),
            ..FireworksConfig::dense()
        });
        for t in 1..20 {
            fw.update(t as f64 * 16.0);
        }
        assert_eq!(fw.emitters.len(), 3);
    }

    #[test]
    fn resize_preserves_in_flight_state() {
        let mut fw = engine(quiet_config());
        fw.spawn_emitter();
        fw.detonate_at(30.0, 40.0);
        for t in 0..5 {
            fw.update(t as f64 * 16.0);
        }

        let before: Vec<_> = fw
            .emitters
            .iter()
            .flat_map(|e| {
                std::iter::once((e.x, e.y, e.target_y))
                    .chain(e.particles.iter().map(|p| (p.x, p.y, p.life)))
            })
            .collect();
        fw.resize(37.0, 11.0);
        let after: Vec<_> = fw
            .emitters
            .iter()
            .flat_map(|e| {
                std::iter::once((e.x, e.y, e.target_y))
                    .chain(e.particles.iter().map(|p| (p.x, p.y, p.life)))
            })
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn bad_config_falls_back_to_defaults() {
        let config = FireworksConfig {
            palette: Vec::new(),
            particle_count: (0, 0),
            speed: (5.0, 1.0),
            gravity: f32::NAN,
            friction: 0.0,
            ..FireworksConfig::dense()
        }
        .validated();
        assert!(!config.palette.is_empty());
        assert!(config.particle_count.0 > 0);
        assert!(config.speed.1 >= config.speed.0);
        assert!(config.gravity.is_finite());
        assert!(config.friction > 0.0 && config.friction <= 1.0);
    }
}
