use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use syntect::{
    easy::HighlightLines,
    highlighting::{Color as SyntectColor, Theme, ThemeSet},
    parsing::SyntaxSet,
};

/// Lines longer than this are not syntax highlighted.
const MAX_LINE_LENGTH: usize = 10_000;

/// Renders unified diff text into styled lines for the preview pane.
///
/// Loads the bundled syntect syntaxes and themes once (~250ms); construct a
/// single instance and reuse it.
pub struct DiffHighlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl DiffHighlighter {
    pub fn new() -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .get("base16-ocean.dark")
            .or_else(|| theme_set.themes.values().next())
            .cloned()
            .unwrap_or_default();

        Self { syntax_set, theme }
    }

    /// Highlight a full diff for the given file path.
    ///
    /// Diff structure lines (headers, hunk markers) get fixed colors; added
    /// and removed lines keep a green/red marker with syntax-highlighted
    /// content where the file type is known.
    pub fn render(&self, path: &str, diff: &str) -> Vec<Line<'static>> {
        let ext = path.rsplit('.').next().unwrap_or("");
        let mut session = self
            .syntax_set
            .find_syntax_by_extension(ext)
            .map(|syntax| HighlightLines::new(syntax, &self.theme));

        diff.lines()
            .map(|line| self.render_line(line, &mut session))
            .collect()
    }

    fn render_line(&self, line: &str, session: &mut Option<HighlightLines>) -> Line<'static> {
        if is_structure_line(line) {
            let style = if line.starts_with("@@") {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            return Line::from(Span::styled(line.to_string(), style));
        }

        let (marker, marker_color) = match line.chars().next() {
            Some('+') => ("+", Color::Green),
            Some('-') => ("-", Color::Red),
            Some(' ') => (" ", Color::Reset),
            _ => return Line::from(Span::raw(line.to_string())),
        };

        let content = &line[1..];
        if content.len() > MAX_LINE_LENGTH {
            return Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(marker_color),
            ));
        }

        let Some(highlighter) = session.as_mut() else {
            return Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(marker_color),
            ));
        };

        match highlighter.highlight_line(content, &self.syntax_set) {
            Ok(regions) => {
                let mut spans = Vec::with_capacity(regions.len() + 1);
                spans.push(Span::styled(
                    marker.to_string(),
                    Style::default().fg(marker_color).add_modifier(Modifier::BOLD),
                ));
                for (style, text) in regions {
                    spans.push(Span::styled(
                        text.to_string(),
                        Style::default().fg(to_color(style.foreground)),
                    ));
                }
                Line::from(spans)
            }
            Err(_) => Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(marker_color),
            )),
        }
    }
}

impl Default for DiffHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

/// Diff metadata lines that are styled whole, not syntax highlighted.
fn is_structure_line(line: &str) -> bool {
    line.starts_with("diff --git")
        || line.starts_with("index ")
        || line.starts_with("--- ")
        || line.starts_with("+++ ")
        || line.starts_with("@@")
        || line.starts_with("new file mode")
        || line.starts_with("deleted file mode")
        || line.starts_with("rename from")
        || line.starts_with("rename to")
        || line.starts_with("similarity index")
        || line.starts_with("Binary files ")
        || line.starts_with('\\')
}

fn to_color(color: SyntectColor) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
index 1111111..2222222 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,2 +1,2 @@
 fn unchanged() {}
-fn before() {}
+fn after() {}
";

    #[test]
    fn structure_lines_detected() {
        assert!(is_structure_line("diff --git a/x b/x"));
        assert!(is_structure_line("@@ -1,2 +1,2 @@"));
        assert!(is_structure_line("+++ b/src/lib.rs"));
        assert!(is_structure_line("\\ No newline at end of file"));
        assert!(!is_structure_line("+added line"));
        assert!(!is_structure_line(" context"));
    }

    #[test]
    fn render_colors_markers() {
        let highlighter = DiffHighlighter::new();
        let lines = highlighter.render("src/lib.rs", DIFF);
        assert_eq!(lines.len(), 8);

        // hunk header is cyan
        assert_eq!(lines[4].spans[0].style.fg, Some(Color::Cyan));

        // removed line starts with a red marker, added with a green one
        assert_eq!(lines[6].spans[0].content.as_ref(), "-");
        assert_eq!(lines[6].spans[0].style.fg, Some(Color::Red));
        assert_eq!(lines[7].spans[0].content.as_ref(), "+");
        assert_eq!(lines[7].spans[0].style.fg, Some(Color::Green));

        // known file type gets syntax-highlighted content after the marker
        assert!(lines[7].spans.len() > 1);
    }

    #[test]
    fn unknown_extension_falls_back_to_plain_marker_color() {
        let highlighter = DiffHighlighter::new();
        let lines = highlighter.render("data.zzz_unknown", "+something\n");
        assert_eq!(lines[0].spans.len(), 1);
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Green));
    }

    #[test]
    fn empty_diff_renders_nothing() {
        let highlighter = DiffHighlighter::new();
        assert!(highlighter.render("src/lib.rs", "").is_empty());
    }
}
