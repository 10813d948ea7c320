//! Minimal raster drawing on an `RgbImage`: lines, rectangles and a 3×5
//! uppercase font for titles, axis labels and tick labels.

use image::{Rgb, RgbImage};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const RED_DARK: Rgb<u8> = Rgb([220, 38, 38]);
pub const BLUE_DARK: Rgb<u8> = Rgb([30, 64, 175]);
pub const GREY: Rgb<u8> = Rgb([150, 150, 150]);
pub const GREY_GRID: Rgb<u8> = Rgb([232, 234, 238]);
pub const DARK_TEXT: Rgb<u8> = Rgb([51, 51, 51]);

/// Glyph rows, three bits each (MSB = left column). Letters are matched
/// case-insensitively.
fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        _ => return None,
    };
    Some(rows)
}

pub struct Canvas {
    img: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb<u8>) -> Canvas {
        Canvas { img: RgbImage::from_pixel(width, height, background) }
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    /// Sets one pixel; coordinates outside the image are ignored.
    pub fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.img.width() && (y as u32) < self.img.height() {
            self.img.put_pixel(x as u32, y as u32, color);
        }
    }

    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.put(xx, yy, color);
            }
        }
    }

    pub fn stroke_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
        let (x1, y1) = (x + w - 1, y + h - 1);
        self.line((x as f64, y as f64), (x1 as f64, y as f64), color, 1);
        self.line((x as f64, y1 as f64), (x1 as f64, y1 as f64), color, 1);
        self.line((x as f64, y as f64), (x as f64, y1 as f64), color, 1);
        self.line((x1 as f64, y as f64), (x1 as f64, y1 as f64), color, 1);
    }

    /// Bresenham line, thickened by drawing a square brush at each step.
    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb<u8>, thickness: u32) {
        self.pattern_line(from, to, color, thickness, None);
    }

    /// Like `line`, alternating `dash` drawn pixels with `gap` skipped ones.
    pub fn dashed_line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb<u8>, thickness: u32, dash: u32, gap: u32) {
        self.pattern_line(from, to, color, thickness, Some((dash, gap)));
    }

    fn pattern_line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb<u8>, thickness: u32, pattern: Option<(u32, u32)>) {
        let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
        let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let half = thickness as i64 / 2;
        let mut step: u32 = 0;

        loop {
            let draw = match pattern {
                Some((dash, gap)) => step % (dash + gap).max(1) < dash,
                None => true,
            };
            if draw {
                self.fill_rect(x0 - half, y0 - half, thickness.max(1) as i64, thickness.max(1) as i64, color);
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
            step += 1;
        }
    }

    /// Connects consecutive points.
    pub fn polyline(&mut self, points: &[(f64, f64)], color: Rgb<u8>, thickness: u32) {
        for pair in points.windows(2) {
            self.line(pair[0], pair[1], color, thickness);
        }
    }

    /// Pixel width of `text` at `scale`.
    pub fn text_width(text: &str, scale: u32) -> i64 {
        let n = text.chars().count() as i64;
        if n == 0 { 0 } else { (n * 4 - 1) * scale as i64 }
    }

    /// Draws `text` with the top-left corner at `(x, y)`. Characters
    /// without a glyph (space included) advance the cursor without drawing.
    pub fn text(&mut self, x: i64, y: i64, text: &str, color: Rgb<u8>, scale: u32) {
        let s = scale.max(1) as i64;
        for (i, c) in text.chars().enumerate() {
            let Some(rows) = glyph(c) else { continue };
            let left = x + i as i64 * 4 * s;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..3 {
                    if bits & (0b100 >> col) != 0 {
                        self.fill_rect(left + col * s, y + row as i64 * s, s, s, color);
                    }
                }
            }
        }
    }

    /// Draws `text` rotated a quarter turn counter-clockwise (read bottom to
    /// top), centered on `(cx, cy)`.
    pub fn text_vertical(&mut self, cx: i64, cy: i64, text: &str, color: Rgb<u8>, scale: u32) {
        let s = scale.max(1) as i64;
        let len = Canvas::text_width(text, scale);
        let left = cx - 5 * s / 2;
        let bottom = cy + len / 2;
        for (i, c) in text.chars().enumerate() {
            let Some(rows) = glyph(c) else { continue };
            let base = bottom - i as i64 * 4 * s;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..3 {
                    if bits & (0b100 >> col) != 0 {
                        self.fill_rect(left + row as i64 * s, base - (col + 1) * s, s, s, color);
                    }
                }
            }
        }
    }

    /// Draws `text` centered on `(cx, cy)`.
    pub fn text_centered(&mut self, cx: i64, cy: i64, text: &str, color: Rgb<u8>, scale: u32) {
        let w = Canvas::text_width(text, scale);
        let h = 5 * scale.max(1) as i64;
        self.text(cx - w / 2, cy - h / 2, text, color, scale);
    }

    pub fn into_image(self) -> RgbImage {
        self.img
    }
}

/// Maps data coordinates into a pixel rectangle (y grows upward in data space).
#[derive(Debug, Clone, Copy)]
pub struct PlotArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

impl PlotArea {
    pub fn to_px(&self, x: f64, y: f64) -> (f64, f64) {
        let (x_min, x_max) = self.x_range;
        let (y_min, y_max) = self.y_range;
        let px = self.left + (x - x_min) / (x_max - x_min + 1e-12) * self.width;
        let py = self.top + (y_max - y) / (y_max - y_min + 1e-12) * self.height;
        (px, py)
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Piecewise-linear approximation of matplotlib's `Blues` colormap.
pub fn blues(t: f64) -> Rgb<u8> {
    const STOPS: [[f64; 3]; 9] = [
        [247.0, 251.0, 255.0],
        [222.0, 235.0, 247.0],
        [198.0, 219.0, 239.0],
        [158.0, 202.0, 225.0],
        [107.0, 174.0, 214.0],
        [66.0, 146.0, 198.0],
        [33.0, 113.0, 181.0],
        [8.0, 81.0, 156.0],
        [8.0, 48.0, 107.0],
    ];
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (STOPS.len() - 1) as f64;
    let i = (pos.floor() as usize).min(STOPS.len() - 2);
    let f = pos - i as f64;
    let mix = |c: usize| (STOPS[i][c] * (1.0 - f) + STOPS[i + 1][c] * f).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_line_covers_endpoints() {
        let mut c = Canvas::new(10, 3, WHITE);
        c.line((1.0, 1.0), (8.0, 1.0), BLACK, 1);
        let img = c.into_image();
        assert_eq!(img.get_pixel(1, 1), &BLACK);
        assert_eq!(img.get_pixel(8, 1), &BLACK);
        assert_eq!(img.get_pixel(9, 1), &WHITE);
        assert_eq!(img.get_pixel(4, 0), &WHITE);
    }

    #[test]
    fn dashed_line_leaves_gaps() {
        let mut c = Canvas::new(20, 1, WHITE);
        c.dashed_line((0.0, 0.0), (19.0, 0.0), BLACK, 1, 3, 2);
        let img = c.into_image();
        assert_eq!(img.get_pixel(0, 0), &BLACK);
        assert_eq!(img.get_pixel(3, 0), &WHITE);
        assert_eq!(img.get_pixel(5, 0), &BLACK);
    }

    #[test]
    fn drawing_off_canvas_is_clipped() {
        let mut c = Canvas::new(4, 4, WHITE);
        c.line((-10.0, -10.0), (10.0, 10.0), BLACK, 3);
        c.text(-3, 2, "100%", BLACK, 2);
        assert_eq!(c.into_image().dimensions(), (4, 4));
    }

    #[test]
    fn letters_are_drawn_case_insensitively() {
        let mut upper = Canvas::new(16, 8, WHITE);
        upper.text(0, 0, "AUROC", BLACK, 1);
        let mut lower = Canvas::new(16, 8, WHITE);
        lower.text(0, 0, "auroc", BLACK, 1);
        let (upper, lower) = (upper.into_image(), lower.into_image());
        assert_eq!(upper, lower);
        // Top row of 'A' is its middle column only.
        assert_eq!(upper.get_pixel(0, 0), &WHITE);
        assert_eq!(upper.get_pixel(1, 0), &BLACK);
        assert!(glyph('Z').is_some() && glyph('=').is_some() && glyph('?').is_none());
    }

    #[test]
    fn vertical_text_is_taller_than_wide() {
        let mut c = Canvas::new(20, 40, WHITE);
        c.text_vertical(10, 20, "LOSS", BLACK, 1);
        let img = c.into_image();
        let inked: Vec<(u32, u32)> = img.enumerate_pixels().filter(|(_, _, p)| **p == BLACK).map(|(x, y, _)| (x, y)).collect();
        let (min_x, max_x) = (inked.iter().map(|p| p.0).min().unwrap(), inked.iter().map(|p| p.0).max().unwrap());
        let (min_y, max_y) = (inked.iter().map(|p| p.1).min().unwrap(), inked.iter().map(|p| p.1).max().unwrap());
        assert!(max_x - min_x < 5);
        assert!(max_y - min_y > 10);
    }

    #[test]
    fn plot_area_maps_corners() {
        let area = PlotArea { left: 10.0, top: 5.0, width: 100.0, height: 50.0, x_range: (0.0, 1.0), y_range: (0.0, 1.0) };
        let (x, y) = area.to_px(0.0, 0.0);
        assert!((x - 10.0).abs() < 1e-6 && (y - 55.0).abs() < 1e-6);
        let (x, y) = area.to_px(1.0, 1.0);
        assert!((x - 110.0).abs() < 1e-6 && (y - 5.0).abs() < 1e-6);
    }

    #[test]
    fn blues_runs_light_to_dark() {
        assert_eq!(blues(0.0), Rgb([247, 251, 255]));
        assert_eq!(blues(1.0), Rgb([8, 48, 107]));
        assert!(blues(0.3).0[0] > blues(0.7).0[0]);
    }
}
