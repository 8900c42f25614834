use std::io::{self, Write};

use anyhow::Result;
use indicatif::ProgressBar;

use tpm2::structs::color::Rgbw;

const RESET: &str = "\x1b[0m";

/// Draws the strip as rows of 24-bit colored cells, redrawn in place.
pub struct Preview {
    width: Option<usize>,
    lines_drawn: usize,
}

impl Preview {
    /// `width` wraps the strip into rows, as for a matrix.
    pub fn new(width: Option<usize>) -> Self {
        Self {
            width,
            lines_drawn: 0,
        }
    }

    pub fn draw(&mut self, pixels: &[Rgbw], pb: Option<&ProgressBar>) -> Result<()> {
        let rows = render_rows(pixels, self.width);

        // the bar owns the cursor, so frames are printed above it instead
        if let Some(pb) = pb {
            pb.println(rows.join("\n"));
            return Ok(());
        }

        let mut out = io::stdout().lock();
        if self.lines_drawn > 0 {
            write!(out, "\x1b[{}A", self.lines_drawn)?;
        }
        for row in &rows {
            writeln!(out, "\r{row}")?;
        }
        out.flush()?;

        self.lines_drawn = rows.len();
        Ok(())
    }
}

pub fn render_rows(pixels: &[Rgbw], width: Option<usize>) -> Vec<String> {
    let width = width.filter(|&w| w > 0).unwrap_or(pixels.len().max(1));

    pixels
        .chunks(width)
        .map(|row| {
            let mut line: String = row.iter().map(cell).collect();
            line.push_str(RESET);
            line
        })
        .collect()
}

/// White is shown mixed into the color channels.
fn cell(pixel: &Rgbw) -> String {
    format!(
        "\x1b[48;2;{};{};{}m  ",
        pixel.r.saturating_add(pixel.w),
        pixel.g.saturating_add(pixel.w),
        pixel.b.saturating_add(pixel.w)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_wrap_at_matrix_width() {
        let pixels = [
            Rgbw::rgb(255, 0, 0),
            Rgbw::OFF,
            Rgbw::new(0, 0, 10, 250),
            Rgbw::rgb(1, 2, 3),
        ];

        let rows = render_rows(&pixels, Some(2));
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("\x1b[48;2;255;0;0m  \x1b[48;2;0;0;0m  "));
        assert!(rows[1].starts_with("\x1b[48;2;250;250;255m"));
        assert!(rows.iter().all(|r| r.ends_with(RESET)));

        assert_eq!(render_rows(&pixels, None).len(), 1);
        assert!(render_rows(&[], None).is_empty());
    }
}
