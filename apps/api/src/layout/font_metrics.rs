//! Static font-metric tables for the two standard PDF faces the renderer uses.
//!
//! Character widths are in em units (relative to font size), taken from the
//! Adobe core-font AFM files for Helvetica and Helvetica-Bold. Both faces ship
//! with every PDF viewer, so nothing is embedded and the tables are exact for
//! ASCII. Everything outside 0x20..=0x7E falls back to `average_char_width`.
//! Index = (char as usize) - 32.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Font style enum
// ────────────────────────────────────────────────────────────────────────────

/// Weight of a text run. Regular maps to Helvetica, Bold to Helvetica-Bold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontStyle {
    Regular,
    Bold,
}

// ────────────────────────────────────────────────────────────────────────────
// Page configuration
// ────────────────────────────────────────────────────────────────────────────

/// Page geometry and typography shared by every renderer.
///
/// All values are PDF points. `y` grows downward from the top edge of the page,
/// so the writable band is `margin..=bottom_limit()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    /// Band below the top margin holding the running header on content pages.
    pub title_reserve: f32,
    pub body_size: f32,
    pub line_height: f32,
    pub heading_size: f32,
    pub subheading_size: f32,
    /// Vertical gap after a heading or sub-heading.
    pub heading_gap: f32,
    /// Vertical gap after a paragraph or bullet item.
    pub paragraph_gap: f32,
    pub bullet_indent: f32,
    pub table_font_size: f32,
    pub table_row_height: f32,
    pub image_gap: f32,
    /// Number of leading sections whose opening page gets the ornate chrome.
    pub ornate_sections: usize,
}

impl PageConfig {
    pub fn usable_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    pub fn bottom_limit(&self) -> f32 {
        self.page_height - self.margin
    }

    /// First writable `y` on a freshly opened page.
    pub fn content_top(&self) -> f32 {
        self.margin + self.title_reserve
    }
}

/// Returns the default page config: A4 portrait, 50pt margins, 11pt body on 20pt lines.
///
/// usable width = 595.28 - 2 × 50 ≈ 495pt; bottom_limit - margin ≈ 742pt.
pub fn default_page_config() -> PageConfig {
    PageConfig {
        page_width: 595.28,
        page_height: 841.89,
        margin: 50.0,
        title_reserve: 24.0,
        body_size: 11.0,
        line_height: 20.0,
        heading_size: 18.0,
        subheading_size: 14.0,
        heading_gap: 10.0,
        paragraph_gap: 8.0,
        bullet_indent: 14.0,
        table_font_size: 10.0,
        table_row_height: 22.0,
        image_gap: 12.0,
        ornate_sections: 3,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Static character-width table for one face.
///
/// `widths[i]` = width of ASCII character `(i + 32)` in em, covering 0x20 (space)
/// through 0x7E (~).
pub struct FontMetricTable {
    pub style: FontStyle,
    widths: [f32; 95],
    /// Fallback width for non-ASCII characters (codepoints > 0x7E).
    pub average_char_width: f32,
    pub space_width: f32,
}

impl FontMetricTable {
    /// Measures the rendered width of a string in em units.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars()
            .map(|c| {
                let code = c as usize;
                if (32..=126).contains(&code) {
                    self.widths[code - 32]
                } else {
                    self.average_char_width
                }
            })
            .sum()
    }

    /// Width of `s` in points at `size`.
    pub fn width_pt(&self, s: &str, size: f32) -> f32 {
        self.measure_str(s) * size
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Static width tables  (95 ASCII printable characters each)
// ────────────────────────────────────────────────────────────────────────────

static HELVETICA_TABLE: FontMetricTable = FontMetricTable {
    style: FontStyle::Regular,
    #[rustfmt::skip]
    widths: [
        // sp    !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.278, 0.355, 0.556, 0.556, 0.889, 0.667, 0.191, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.584, 0.584, 0.584, 0.556, 1.015,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.667, 0.667, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.500, 0.667, 0.556, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.278, 0.278, 0.278, 0.469, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.556, 0.500, 0.556, 0.556, 0.278, 0.556, 0.556, 0.222, 0.222, 0.500, 0.222, 0.833,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.556, 0.556, 0.556, 0.556, 0.333, 0.500, 0.278, 0.556, 0.500, 0.722, 0.500, 0.500, 0.500,
        // {      |      }      ~
        0.334, 0.260, 0.334, 0.584,
    ],
    average_char_width: 0.556,
    space_width: 0.278,
};

static HELVETICA_BOLD_TABLE: FontMetricTable = FontMetricTable {
    style: FontStyle::Bold,
    #[rustfmt::skip]
    widths: [
        // sp    !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.333, 0.474, 0.556, 0.556, 0.889, 0.722, 0.238, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.333, 0.333, 0.584, 0.584, 0.584, 0.611, 0.975,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.722, 0.722, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.556, 0.722, 0.611, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.333, 0.278, 0.333, 0.584, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.611, 0.556, 0.611, 0.556, 0.333, 0.611, 0.611, 0.278, 0.278, 0.556, 0.278, 0.889,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.611, 0.611, 0.611, 0.611, 0.389, 0.556, 0.333, 0.611, 0.556, 0.778, 0.556, 0.556, 0.500,
        // {      |      }      ~
        0.389, 0.280, 0.389, 0.584,
    ],
    average_char_width: 0.611,
    space_width: 0.278,
};

/// Returns the static metric table for a given style.
pub fn get_metrics(style: FontStyle) -> &'static FontMetricTable {
    match style {
        FontStyle::Regular => &HELVETICA_TABLE,
        FontStyle::Bold => &HELVETICA_BOLD_TABLE,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
