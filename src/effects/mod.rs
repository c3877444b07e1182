use crossterm::event::Event;

use crate::surface::{PreDraw, Surface};

pub mod fireworks;
pub mod snow;

/// A frame-driven particle effect.
///
/// `update` is one simulation tick; decay is counted in ticks, the timestamp
/// only feeds spawn scheduling. The first tick of a run receives a synthetic
/// 0.0 so scheduling never depends on the wall-clock epoch. `resize` re-fits
/// the bounds entities are checked against without disturbing any in-flight
/// entity.
pub trait Effect {
    fn update(&mut self, now_ms: f64);
    fn render(&mut self, surface: &mut Surface);
    fn resize(&mut self, width: f32, height: f32);
    fn pre_draw(&self) -> PreDraw {
        PreDraw::Clear
    }
    fn handle_event(&mut self, _event: &Event) {}
}

/// Uniform draw from an inclusive f32 range.
pub(crate) fn sample(rng: &mut fastrand::Rng, range: (f32, f32)) -> f32 {
    range.0 + rng.f32() * (range.1 - range.0)
}

pub(crate) fn range_ok(range: (f32, f32)) -> bool {
    range.0.is_finite() && range.1.is_finite() && range.1 >= range.0
}
