use crossterm::{
    cursor::{Hide, Show},
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::env;
use std::io::{self, BufWriter, stdout};
use std::time::{Duration, Instant};

mod effects;
mod surface;

use effects::Effect;
use effects::fireworks::{FireworksConfig, FireworksEffect};
use effects::snow::{SnowConfig, SnowEffect};
use surface::{Rgb, Surface};

const TICK: Duration = Duration::from_micros(16_667);

fn print_usage() {
    eprintln!("wheelfx - prize-wheel celebration overlays for the terminal");
    eprintln!();
    eprintln!("Usage: wheelfx [EFFECT] [OPTIONS]");
    eprintln!();
    eprintln!("Effects:");
    eprintln!("  fireworks  Rising shells bursting into colored sparks (default)");
    eprintln!("  snow       Gentle endless snowfall");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --variant dense|gentle  Fireworks intensity preset (default: dense)");
    eprintln!("  --flakes N              Snowflake count (default: 25)");
    eprintln!("  --bg-color RRGGBB       Background color as hex (e.g., --bg-color 1a1b26)");
    eprintln!();
    eprintln!("Fireworks controls: space = celebration volley, click = burst at cursor");
    eprintln!("Press 'q', ESC, or Ctrl+C to exit");
}

/// Scoped terminal state: raw mode and the alternate screen are released on
/// every exit path, error or not.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            EnterAlternateScreen,
            Hide,
            Clear(ClearType::All),
            EnableMouseCapture
        )?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), Show, LeaveAlternateScreen, DisableMouseCapture);
        let _ = terminal::disable_raw_mode();
    }
}

fn run(mut effect: Box<dyn Effect>, bg: Rgb) -> io::Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut out = BufWriter::with_capacity(1024 * 64, stdout());

    let (cols, rows) = terminal::size()?;
    let mut surface = Surface::new(cols as usize, rows as usize * 2, bg);

    let mut epoch: Option<Instant> = None;
    let mut next_tick = Instant::now();

    loop {
        let timeout = next_tick.saturating_duration_since(Instant::now());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if key.code == KeyCode::Char('q')
                        || key.code == KeyCode::Esc
                        || (key.code == KeyCode::Char('c')
                            && key.modifiers.contains(event::KeyModifiers::CONTROL))
                    {
                        break;
                    }
                    effect.handle_event(&Event::Key(key));
                }
                Event::Resize(cols, rows) => {
                    // Re-fit bounds only; in-flight entities keep their state.
                    surface.resize(cols as usize, rows as usize * 2);
                    effect.resize(cols as f32, rows as f32 * 2.0);
                }
                ev => effect.handle_event(&ev),
            }
            continue;
        }

        // First tick gets a synthetic time zero so spawn scheduling never
        // depends on the wall-clock epoch.
        let now_ms = match epoch {
            None => {
                epoch = Some(Instant::now());
                0.0
            }
            Some(start) => start.elapsed().as_secs_f64() * 1000.0,
        };

        surface.begin_frame(effect.pre_draw());
        effect.update(now_ms);
        effect.render(&mut surface);
        surface.render(&mut out)?;

        next_tick += TICK;
        let now = Instant::now();
        if next_tick < now {
            // Fell behind; resume from now instead of bursting ticks.
            next_tick = now;
        }
    }

    Ok(())
}

fn parse_hex_color(hex: &str) -> Option<Rgb> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut effect_name = "fireworks";
    let mut variant = "dense";
    let mut flakes: Option<usize> = None;
    let mut bg: Rgb = (0, 0, 0);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--variant" => {
                if i + 1 < args.len() {
                    variant = match args[i + 1].as_str() {
                        v @ ("dense" | "gentle") => v,
                        other => {
                            eprintln!("Unknown variant: {other} (expected dense or gentle)");
                            std::process::exit(1);
                        }
                    };
                    i += 2;
                } else {
                    eprintln!("--variant requires a value");
                    std::process::exit(1);
                }
            }
            "--flakes" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse() {
                        Ok(n) => {
                            flakes = Some(n);
                            i += 2;
                        }
                        Err(_) => {
                            eprintln!("Invalid flake count: {}", args[i + 1]);
                            std::process::exit(1);
                        }
                    }
                } else {
                    eprintln!("--flakes requires a count");
                    std::process::exit(1);
                }
            }
            "--bg-color" => {
                if i + 1 < args.len() {
                    if let Some(color) = parse_hex_color(&args[i + 1]) {
                        bg = color;
                        i += 2;
                    } else {
                        eprintln!("Invalid hex color: {}", args[i + 1]);
                        eprintln!("Expected format: RRGGBB (e.g., 1a1b26)");
                        std::process::exit(1);
                    }
                } else {
                    eprintln!("--bg-color requires a hex color value");
                    std::process::exit(1);
                }
            }
            "help" | "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            arg => {
                if !arg.starts_with('-') {
                    effect_name = arg;
                    i += 1;
                } else {
                    eprintln!("Unknown option: {arg}");
                    eprintln!();
                    print_usage();
                    std::process::exit(1);
                }
            }
        }
    }

    let (cols, rows) = terminal::size()?;
    let width = cols as f32;
    let height = rows as f32 * 2.0;

    let effect: Box<dyn Effect> = match effect_name {
        "fireworks" => {
            let config = match variant {
                "gentle" => FireworksConfig::gentle(),
                _ => FireworksConfig::dense(),
            };
            let mut fireworks = FireworksEffect::new(config, width, height);
            // Opening volley so the sky is not empty for a full interval.
            fireworks.schedule_volley(&[0.0, 300.0, 600.0]);
            Box::new(fireworks)
        }
        "snow" => {
            let mut config = SnowConfig::calm();
            if let Some(count) = flakes {
                config.count = count;
            }
            Box::new(SnowEffect::new(config, width, height))
        }
        other => {
            eprintln!("Unknown effect: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    run(effect, bg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse_with_and_without_hash() {
        assert_eq!(parse_hex_color("1a1b26"), Some((0x1a, 0x1b, 0x26)));
        assert_eq!(parse_hex_color("#ffffff"), Some((255, 255, 255)));
        assert_eq!(parse_hex_color("fff"), None);
        assert_eq!(parse_hex_color("zzzzzz"), None);
    }
}
