use unicode_width::UnicodeWidthStr;

/// Column layout for plain-text tables.
pub struct TextMetrics {
    pub column_gap: usize,
    pub min_column_width: usize,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            column_gap: 2,
            min_column_width: 4,
        }
    }
}

impl TextMetrics {
    /// Terminal cells taken by `text`.
    pub fn text_width(&self, text: &str) -> usize {
        UnicodeWidthStr::width(text)
    }

    /// Widest cell of each column, at least `min_column_width`.
    pub fn column_widths<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> Vec<usize> {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..columns)
            .map(|i| {
                rows.iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| self.text_width(cell.as_ref()))
                    .fold(self.min_column_width, usize::max)
            })
            .collect()
    }

    /// `text` padded with spaces to `width` cells.
    pub fn pad(&self, text: &str, width: usize) -> String {
        let fill = width.saturating_sub(self.text_width(text));
        format!("{text}{}", " ".repeat(fill))
    }

    /// Rows laid out in aligned columns; the last column is not padded.
    pub fn render_rows<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> String {
        let widths = self.column_widths(rows);
        let gap = " ".repeat(self.column_gap);
        let mut out = String::new();
        for row in rows {
            let last = row.len().saturating_sub(1);
            let line: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    if i == last {
                        cell.as_ref().to_string()
                    } else {
                        self.pad(cell.as_ref(), widths[i])
                    }
                })
                .collect();
            out.push_str(line.join(&gap).trim_end());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_width() {
        let m = TextMetrics::default();
        assert_eq!(m.text_width("film"), 4);
    }

    #[test]
    fn test_unicode_width() {
        let m = TextMetrics::default();
        // 全角文字は幅2
        assert_eq!(m.text_width("ユーザー"), 8);
        assert_eq!(m.text_width("userテスト"), 10);
    }

    #[test]
    fn test_pad() {
        let m = TextMetrics::default();
        assert_eq!(m.pad("ab", 4), "ab  ");
        assert_eq!(m.pad("顧客", 6), "顧客  ");
        assert_eq!(m.pad("toolong", 3), "toolong");
    }

    #[test]
    fn test_render_rows() {
        let m = TextMetrics::default();
        let rows = vec![
            vec!["start", "target", "cost"],
            vec!["actor", "film", "2"],
        ];
        assert_eq!(
            m.render_rows(&rows),
            "start  target  cost\nactor  film    2\n"
        );
        let empty: Vec<Vec<&str>> = vec![];
        assert_eq!(m.render_rows(&empty), "");
    }
}
