//! Static font-metric tables for the five families the resume templates use.
//!
//! Character widths are in em units (relative to font size). Static tables are an
//! approximation of real glyph advances; the page-fitting engine only needs line
//! counts to be right to within a word, and the danger-zone buffers absorb the rest.
//! All tables cover ASCII 0x20..=0x7E (95 printable characters).
//! Index = (char as usize) - 32.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Font family enum
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    /// Modern archetype: clean humanist sans-serif.
    #[default]
    Inter,
    /// Classic archetype: old-style serif.
    EbGaramond,
    /// Minimalist archetype: geometric humanist sans-serif.
    Lato,
    /// Creative archetype: condensed display sans-serif.
    Oswald,
    /// Executive archetype: traditional TeX serif.
    ComputerModern,
}

impl FontFamily {
    pub fn is_serif(&self) -> bool {
        matches!(self, FontFamily::EbGaramond | FontFamily::ComputerModern)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Static character-width table for a font family.
///
/// `widths[i]` = width of ASCII character `(i + 32)`, covering 0x20 (space) through 0x7E (~).
///
/// Width array slot layout:
/// ```text
/// [0]=sp  [1]=!   [2]="   [3]=#   [4]=$   [5]=%   [6]=&   [7]='
/// [8]=(   [9]=)   [10]=*  [11]=+  [12]=,  [13]=-  [14]=.  [15]=/
/// [16..25]=0-9
/// [26]=:  [27]=;  [28]=<  [29]==  [30]=>  [31]=?  [32]=@
/// [33..58]=A-Z
/// [59]=[  [60]=\  [61]=]  [62]=^  [63]=_  [64]=`
/// [65..90]=a-z
/// [91]={  [92]=|  [93]=}  [94]=~
/// ```
pub struct FontMetricTable {
    widths: [f32; 95],
    /// Fallback width for non-ASCII characters (codepoints > 0x7E).
    pub average_char_width: f32,
    pub space_width: f32,
}

/// A wrapped line: its text and its width in layout units.
#[derive(Debug, Clone, PartialEq)]
pub struct WrappedLine {
    pub text: String,
    pub width: f32,
}

impl FontMetricTable {
    /// Measures the rendered width of a string in em units.
    ///
    /// Non-ASCII characters fall back to `average_char_width`.
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

    /// Width of a string in layout units at `font_size`, including letter spacing.
    pub fn measure(&self, s: &str, font_size: f32, letter_spacing: f32) -> f32 {
        self.measure_str(s) * font_size + letter_spacing * s.chars().count() as f32
    }

    /// Greedy word-wrap at `max_width` layout units.
    ///
    /// A word wider than the line is placed on its own line rather than broken.
    /// Whitespace-only text yields no lines.
    pub fn wrap_lines(
        &self,
        text: &str,
        max_width: f32,
        font_size: f32,
        letter_spacing: f32,
    ) -> Vec<WrappedLine> {
        let space_w = self.space_width * font_size + letter_spacing;
        let mut lines: Vec<WrappedLine> = Vec::new();
        let mut current = String::new();
        let mut current_width = 0.0_f32;

        for word in text.split_whitespace() {
            let word_w = self.measure(word, font_size, letter_spacing);

            if !current.is_empty() && current_width + space_w + word_w > max_width {
                // Current line is full, push it and start a new line with this word.
                lines.push(WrappedLine {
                    text: std::mem::take(&mut current),
                    width: current_width,
                });
                current_width = 0.0;
            }

            if current.is_empty() {
                current.push_str(word);
                current_width = word_w;
            } else {
                current.push(' ');
                current.push_str(word);
                current_width += space_w + word_w;
            }
        }

        if !current.is_empty() {
            lines.push(WrappedLine {
                text: current,
                width: current_width,
            });
        }
        lines
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Static width tables  (95 ASCII printable characters each)
// ────────────────────────────────────────────────────────────────────────────

/// Inter: humanist sans-serif (modern archetype).
static INTER_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.25, 0.30, 0.38, 0.56, 0.56, 0.89, 0.67, 0.22, 0.33, 0.33, 0.39, 0.59, 0.28, 0.33, 0.28, 0.31,
        // 0     1     2     3     4     5     6     7     8     9
        0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56,
        // :     ;     <     =     >     ?     @
        0.28, 0.28, 0.59, 0.59, 0.59, 0.50, 1.02,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.67, 0.61, 0.61, 0.67, 0.56, 0.50, 0.67, 0.67, 0.25, 0.39, 0.61, 0.53, 0.78,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.67, 0.72, 0.56, 0.72, 0.61, 0.50, 0.56, 0.67, 0.67, 0.89, 0.61, 0.61, 0.56,
        // [     \     ]     ^     _     `
        0.28, 0.31, 0.28, 0.47, 0.56, 0.34,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.56, 0.56, 0.50, 0.56, 0.56, 0.31, 0.56, 0.56, 0.22, 0.22, 0.53, 0.22, 0.83,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.56, 0.56, 0.56, 0.56, 0.33, 0.44, 0.39, 0.56, 0.50, 0.72, 0.50, 0.50, 0.44,
        // {     |     }     ~
        0.33, 0.26, 0.33, 0.59,
    ],
    average_char_width: 0.52,
    space_width: 0.25,
};

/// EB Garamond: old-style serif (classic archetype). Approx. 85% of Inter.
static EB_GARAMOND_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.21, 0.26, 0.32, 0.48, 0.48, 0.76, 0.57, 0.19, 0.28, 0.28, 0.33, 0.50, 0.24, 0.28, 0.24, 0.26,
        // 0     1     2     3     4     5     6     7     8     9
        0.48, 0.48, 0.48, 0.48, 0.48, 0.48, 0.48, 0.48, 0.48, 0.48,
        // :     ;     <     =     >     ?     @
        0.24, 0.24, 0.50, 0.50, 0.50, 0.43, 0.87,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.57, 0.52, 0.52, 0.57, 0.48, 0.43, 0.57, 0.57, 0.21, 0.33, 0.52, 0.45, 0.66,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.57, 0.61, 0.48, 0.61, 0.52, 0.43, 0.48, 0.57, 0.57, 0.76, 0.52, 0.52, 0.48,
        // [     \     ]     ^     _     `
        0.24, 0.26, 0.24, 0.40, 0.48, 0.29,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.48, 0.48, 0.43, 0.48, 0.48, 0.26, 0.48, 0.48, 0.19, 0.19, 0.45, 0.19, 0.71,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.48, 0.48, 0.48, 0.48, 0.28, 0.37, 0.33, 0.48, 0.43, 0.61, 0.43, 0.43, 0.37,
        // {     |     }     ~
        0.28, 0.22, 0.28, 0.50,
    ],
    average_char_width: 0.44,
    space_width: 0.21,
};

/// Lato: geometric humanist sans-serif (minimalist archetype). Approx. 105% of Inter.
static LATO_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.26, 0.32, 0.40, 0.59, 0.59, 0.94, 0.70, 0.23, 0.35, 0.35, 0.41, 0.62, 0.29, 0.35, 0.29, 0.33,
        // 0     1     2     3     4     5     6     7     8     9
        0.59, 0.59, 0.59, 0.59, 0.59, 0.59, 0.59, 0.59, 0.59, 0.59,
        // :     ;     <     =     >     ?     @
        0.29, 0.29, 0.62, 0.62, 0.62, 0.53, 1.07,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.70, 0.64, 0.64, 0.70, 0.59, 0.53, 0.70, 0.70, 0.26, 0.41, 0.64, 0.56, 0.82,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.70, 0.76, 0.59, 0.76, 0.64, 0.53, 0.59, 0.70, 0.70, 0.94, 0.64, 0.64, 0.59,
        // [     \     ]     ^     _     `
        0.29, 0.33, 0.29, 0.49, 0.59, 0.36,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.59, 0.59, 0.53, 0.59, 0.59, 0.33, 0.59, 0.59, 0.23, 0.23, 0.56, 0.23, 0.87,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.59, 0.59, 0.59, 0.59, 0.35, 0.46, 0.41, 0.59, 0.53, 0.76, 0.53, 0.53, 0.46,
        // {     |     }     ~
        0.35, 0.27, 0.35, 0.62,
    ],
    average_char_width: 0.55,
    space_width: 0.26,
};

/// Oswald: condensed display sans-serif (creative archetype). Approx. 68% of Inter.
static OSWALD_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.17, 0.20, 0.26, 0.38, 0.38, 0.61, 0.46, 0.15, 0.23, 0.23, 0.27, 0.40, 0.19, 0.23, 0.19, 0.21,
        // 0     1     2     3     4     5     6     7     8     9
        0.38, 0.38, 0.38, 0.38, 0.38, 0.38, 0.38, 0.38, 0.38, 0.38,
        // :     ;     <     =     >     ?     @
        0.19, 0.19, 0.40, 0.40, 0.40, 0.34, 0.69,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.46, 0.41, 0.41, 0.46, 0.38, 0.34, 0.46, 0.46, 0.17, 0.27, 0.41, 0.36, 0.53,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.46, 0.49, 0.38, 0.49, 0.41, 0.34, 0.38, 0.46, 0.46, 0.61, 0.41, 0.41, 0.38,
        // [     \     ]     ^     _     `
        0.19, 0.21, 0.19, 0.32, 0.38, 0.23,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.38, 0.38, 0.34, 0.38, 0.38, 0.21, 0.38, 0.38, 0.15, 0.15, 0.36, 0.15, 0.56,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.38, 0.38, 0.38, 0.38, 0.23, 0.30, 0.27, 0.38, 0.34, 0.49, 0.34, 0.34, 0.30,
        // {     |     }     ~
        0.23, 0.18, 0.23, 0.40,
    ],
    average_char_width: 0.35,
    space_width: 0.17,
};

/// Computer Modern: traditional TeX font (executive archetype). Approx. 90% of Inter.
static COMPUTER_MODERN_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
        0.23, 0.27, 0.34, 0.50, 0.50, 0.80, 0.60, 0.20, 0.30, 0.30, 0.35, 0.53, 0.25, 0.30, 0.25, 0.28,
        // 0     1     2     3     4     5     6     7     8     9
        0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50, 0.50,
        // :     ;     <     =     >     ?     @
        0.25, 0.25, 0.53, 0.53, 0.53, 0.45, 0.92,
        // A     B     C     D     E     F     G     H     I     J     K     L     M
        0.60, 0.55, 0.55, 0.60, 0.50, 0.45, 0.60, 0.60, 0.23, 0.35, 0.55, 0.48, 0.70,
        // N     O     P     Q     R     S     T     U     V     W     X     Y     Z
        0.60, 0.65, 0.50, 0.65, 0.55, 0.45, 0.50, 0.60, 0.60, 0.80, 0.55, 0.55, 0.50,
        // [     \     ]     ^     _     `
        0.25, 0.28, 0.25, 0.42, 0.50, 0.31,
        // a     b     c     d     e     f     g     h     i     j     k     l     m
        0.50, 0.50, 0.45, 0.50, 0.50, 0.28, 0.50, 0.50, 0.20, 0.20, 0.48, 0.20, 0.75,
        // n     o     p     q     r     s     t     u     v     w     x     y     z
        0.50, 0.50, 0.50, 0.50, 0.30, 0.40, 0.35, 0.50, 0.45, 0.65, 0.45, 0.45, 0.40,
        // {     |     }     ~
        0.30, 0.23, 0.30, 0.53,
    ],
    average_char_width: 0.47,
    space_width: 0.23,
};

/// Returns the static metric table for a given font family.
pub fn get_metrics(font: &FontFamily) -> &'static FontMetricTable {
    match font {
        FontFamily::Inter => &INTER_TABLE,
        FontFamily::EbGaramond => &EB_GARAMOND_TABLE,
        FontFamily::Lato => &LATO_TABLE,
        FontFamily::Oswald => &OSWALD_TABLE,
        FontFamily::ComputerModern => &COMPUTER_MODERN_TABLE,
    }
}


// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_str_empty_returns_zero() {
        let metrics = get_metrics(&FontFamily::Inter);
        assert_eq!(metrics.measure_str(""), 0.0);
    }

    #[test]
    fn test_measure_str_ascii_characters() {
        let metrics = get_metrics(&FontFamily::Inter);
        // "Rust" = R(0.61) + u(0.56) + s(0.44) + t(0.39) = 2.00
        let width = metrics.measure_str("Rust");
        assert!(
            (width - 2.00).abs() < 1e-3,
            "Rust width should be ~2.00, got {width}"
        );
    }

    #[test]
    fn test_measure_scales_with_font_size_and_spacing() {
        let metrics = get_metrics(&FontFamily::Inter);
        let at_ten = metrics.measure("Rust", 10.0, 0.0);
        assert!((at_ten - 20.0).abs() < 1e-3);
        // Four characters, one unit of tracking each.
        let tracked = metrics.measure("Rust", 10.0, 1.0);
        assert!((tracked - 24.0).abs() < 1e-3);
    }

    #[test]
    fn test_measure_str_non_ascii_falls_back() {
        let metrics = get_metrics(&FontFamily::Inter);
        let width = metrics.measure_str("é");
        assert!(
            (width - metrics.average_char_width).abs() < 1e-4,
            "non-ASCII should use average_char_width"
        );
    }

    #[test]
    fn test_wrap_lines_empty_text_has_no_lines() {
        let metrics = get_metrics(&FontFamily::Inter);
        assert!(metrics.wrap_lines("   ", 100.0, 10.0, 0.0).is_empty());
    }

    #[test]
    fn test_wrap_lines_respects_max_width() {
        let metrics = get_metrics(&FontFamily::Inter);
        let text = "Architected a distributed caching layer using Redis and consistent hashing";
        let lines = metrics.wrap_lines(text, 200.0, 10.0, 0.0);
        assert!(lines.len() > 1, "text should wrap at 200 units");
        for line in &lines {
            assert!(line.width <= 200.0 + 1e-3, "line too wide: {line:?}");
        }
        let rejoined: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(rejoined.join(" "), text);
    }

    #[test]
    fn test_wrap_lines_overlong_word_gets_own_line() {
        let metrics = get_metrics(&FontFamily::Inter);
        let lines = metrics.wrap_lines("a supercalifragilistic b", 30.0, 10.0, 0.0);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].text, "supercalifragilistic");
    }

    #[test]
    fn test_wider_viewport_never_needs_more_lines() {
        let metrics = get_metrics(&FontFamily::Lato);
        let text = "word ".repeat(60);
        let mut previous = usize::MAX;
        for width in [150.0, 300.0, 600.0, 1200.0] {
            let count = metrics.wrap_lines(&text, width, 10.0, 0.0).len();
            assert!(count <= previous, "line count grew at width {width}");
            previous = count;
        }
    }

    #[test]
    fn test_condensed_font_narrower_than_wide_font() {
        let text = "Architected distributed caching layer";
        let oswald = get_metrics(&FontFamily::Oswald);
        let lato = get_metrics(&FontFamily::Lato);
        assert!(oswald.measure_str(text) < lato.measure_str(text));
    }
}
