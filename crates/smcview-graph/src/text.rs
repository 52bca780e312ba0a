//! Label cleaning helpers.
//!
//! Terms printed by the interpreter may carry ANSI color sequences and any
//! character the user's signature allows, so everything that ends up inside a
//! DOT label goes through these first.

use std::borrow::Cow;

/// Edge labels longer than this many characters are truncated.
pub const MAX_LABEL_CHARS: usize = 20;

/// Appended to truncated labels.
pub const ELLIPSIS: &str = "...";

/// Remove ANSI control sequences (`ESC ... m`).
#[must_use]
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip up to and including the terminating 'm'.
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Escape HTML special characters.
#[must_use]
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&#39;")
        .replace('"', "&#34;")
}

/// ANSI-stripped and HTML-escaped, for legend table cells.
#[must_use]
pub fn clean_html(s: &str) -> String {
    escape_html(&strip_ansi(s))
}

/// Like [`clean_html`], but also safe inside a quoted DOT string.
#[must_use]
pub fn clean_quoted(s: &str) -> String {
    clean_html(s).replace('\\', "\\\\").replace('\n', "\\n")
}

/// Keep the first [`MAX_LABEL_CHARS`] characters and append [`ELLIPSIS`].
///
/// Applied to the raw label, before [`clean_quoted`], so an entity is never
/// cut in half. The escaped DOT text of a truncated label can therefore be
/// longer than 23 bytes while GraphViz still shows 23 characters.
#[must_use]
pub fn truncate_label(label: &str) -> Cow<'_, str> {
    match label.char_indices().nth(MAX_LABEL_CHARS) {
        Some((cut, _)) => Cow::Owned(format!("{}{ELLIPSIS}", &label[..cut])),
        None => Cow::Borrowed(label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_codes() {
        assert_eq!(strip_ansi("\x1b[1;31mred\x1b[0m term"), "red term");
        assert!(matches!(strip_ansi("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn escapes_html_specials() {
        assert_eq!(clean_html("a < b & \"c\""), "a &lt; b &amp; &#34;c&#34;");
        assert_eq!(clean_quoted("x\\y"), "x\\\\y");
    }

    #[test]
    fn truncates_to_twenty_plus_ellipsis() {
        let long = "abcdefghijklmnopqrstuvwxyz";
        let t = truncate_label(long);
        assert_eq!(t, "abcdefghijklmnopqrst...");
        assert_eq!(t.chars().count(), 23);

        let exact = "abcdefghijklmnopqrst";
        assert_eq!(truncate_label(exact), exact);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let wide = "αβγδεζηθικλμνξοπρστυφχψω";
        assert_eq!(truncate_label(wide).chars().count(), 23);
    }
}
