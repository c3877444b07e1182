use std::io::Write;

pub type Rgb = (u8, u8, u8);

/// What happens to the framebuffer before an effect draws its frame.
#[derive(Clone, Copy)]
pub enum PreDraw {
    /// Zero every cell. Crisp redraw, no trails.
    Clear,
    /// Multiply every cell's intensity by the factor. Leaves fading trails.
    Fade(f32),
}

/// Per-cell intensity framebuffer rendered with half-block glyphs.
///
/// Cells hold an (intensity, color) pair; intensity is blended against the
/// background at output time, so effects only ever write light, never pixels.
/// One terminal row carries two cells vertically via "▄".
pub struct Surface {
    width: usize,
    height: usize,
    cells: Vec<(f32, Rgb)>,
    bg: Rgb,
    output_buf: Vec<u8>,
}

impl Surface {
    pub fn new(width: usize, height: usize, bg: Rgb) -> Self {
        Self {
            width,
            height,
            cells: vec![(0.0, bg); width * height],
            bg,
            output_buf: Vec::with_capacity(width * height * 25),
        }
    }

    /// Re-fit the framebuffer to new dimensions. Idempotent; entity state
    /// lives in the effects and is untouched by this.
    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells.resize(width * height, (0.0, self.bg));
    }

    pub fn begin_frame(&mut self, policy: PreDraw) {
        match policy {
            PreDraw::Clear => {
                for cell in &mut self.cells {
                    *cell = (0.0, self.bg);
                }
            }
            PreDraw::Fade(factor) => {
                for cell in &mut self.cells {
                    cell.0 *= factor;
                    if cell.0 < 0.02 {
                        cell.0 = 0.0;
                    }
                }
            }
        }
    }

    /// Max-blend a single cell. Out-of-bounds writes are dropped.
    pub fn plot(&mut self, x: i32, y: i32, intensity: f32, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if intensity > self.cells[idx].0 {
            self.cells[idx] = (intensity, color);
        }
    }

    /// A bright cell with a soft 3x3 halo around it.
    pub fn plot_glow(&mut self, x: i32, y: i32, intensity: f32, color: Rgb) {
        self.plot(x, y, intensity, color);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                self.plot(x + dx, y + dy, intensity * 0.32, color);
            }
        }
    }

    /// DDA line between two points in cell space.
    pub fn draw_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, intensity: f32, color: Rgb) {
        let dx = x1 - x0;
        let dy = y1 - y0;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.plot((x0 + dx * t) as i32, (y0 + dy * t) as i32, intensity, color);
        }
    }

    /// Write the frame as truecolor half-blocks. A zero-area surface emits
    /// nothing at all.
    pub fn render(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }

        self.output_buf.clear();
        self.output_buf.extend_from_slice(b"\x1b[H");

        let bg = self.bg;
        let mut prev_top: Rgb = (255, 255, 255);
        let mut prev_bot: Rgb = (255, 255, 255);

        for y in (0..self.height).step_by(2) {
            for x in 0..self.width {
                let top_idx = y * self.width + x;
                let bot_idx = if y + 1 < self.height {
                    (y + 1) * self.width + x
                } else {
                    top_idx
                };

                let top_color = Self::blend(bg, self.cells[top_idx]);
                let bot_color = Self::blend(bg, self.cells[bot_idx]);

                if top_color != prev_top {
                    write!(
                        self.output_buf,
                        "\x1b[48;2;{};{};{}m",
                        top_color.0, top_color.1, top_color.2
                    )?;
                    prev_top = top_color;
                }
                if bot_color != prev_bot {
                    write!(
                        self.output_buf,
                        "\x1b[38;2;{};{};{}m",
                        bot_color.0, bot_color.1, bot_color.2
                    )?;
                    prev_bot = bot_color;
                }

                self.output_buf.extend_from_slice("▄".as_bytes());
            }
            self.output_buf.extend_from_slice(b"\x1b[0m");
            prev_top = (255, 255, 255);
            prev_bot = (255, 255, 255);
            if y + 2 < self.height {
                self.output_buf.extend_from_slice(b"\r\n");
            }
        }

        out.write_all(&self.output_buf)?;
        out.flush()?;
        Ok(())
    }

    fn blend(bg: Rgb, cell: (f32, Rgb)) -> Rgb {
        let (intensity, color) = cell;
        if intensity <= 0.05 {
            return bg;
        }
        let blend = (intensity / 3.0).min(1.0);
        (
            (bg.0 as f32 * (1.0 - blend) + color.0 as f32 * blend) as u8,
            (bg.1 as f32 * (1.0 - blend) + color.1 as f32 * blend) as u8,
            (bg.2 as f32 * (1.0 - blend) + color.2 as f32 * blend) as u8,
        )
    }
}
