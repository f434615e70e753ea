//! Text utilities for terminal rendering.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Truncates a string with ellipsis if it exceeds `max_width` columns.
///
/// Uses unicode width, so wide characters are measured correctly.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width <= 1 {
        return "…".to_string();
    }
    let mut truncated = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width + 1 > max_width {
            break;
        }
        width += ch_width;
        truncated.push(ch);
    }
    truncated.push('…');
    truncated
}

/// Pads (or truncates) `text` to exactly `width` columns, centered.
pub fn center(text: &str, width: usize) -> String {
    let text = truncate_with_ellipsis(text, width);
    let pad = width.saturating_sub(text.width());
    let left = pad / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(pad - left))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("ABC123DEF.01", 20), "ABC123DEF.01");
        assert_eq!(truncate_with_ellipsis("ABC123DEF.01", 6), "ABC12…");
        assert_eq!(truncate_with_ellipsis("ABC", 1), "…");
    }

    #[test]
    fn test_center_pads_both_sides() {
        assert_eq!(center("L1", 6), "  L1  ");
        assert_eq!(center("L1-B1", 6), "L1-B1 ");
        assert_eq!(center("ABCDEFGH", 4).width(), 4);
    }
}
