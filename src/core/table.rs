// src/core/table.rs

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Justification {
    #[default]
    Left,
    Center,
    Right,
}

/// Lays out rows of text in aligned columns.
///
/// Each column is as wide as its widest cell across all rows. Rows may have different
/// numbers of cells.
#[derive(Debug, Clone)]
pub struct TabularTextFormatter {
    rows: Vec<Vec<String>>,
    justification: Vec<Justification>,
    padding: Vec<usize>,
    default_padding: usize,
}

impl Default for TabularTextFormatter {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            justification: Vec::new(),
            padding: Vec::new(),
            default_padding: 2,
        }
    }
}

impl TabularTextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn with_rows<R, I, S>(mut self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for row in rows {
            self.add_row(row);
        }
        self
    }

    pub fn set_justification(&mut self, column: usize, justification: Justification) {
        if self.justification.len() <= column {
            self.justification.resize(column + 1, Justification::default());
        }
        if let Some(slot) = self.justification.get_mut(column) {
            *slot = justification;
        }
    }

    /// Spaces written after `column`.
    pub fn set_padding(&mut self, column: usize, padding: usize) {
        if self.padding.len() <= column {
            self.padding.resize(column + 1, self.default_padding);
        }
        if let Some(slot) = self.padding.get_mut(column) {
            *slot = padding;
        }
    }

    fn justification_for(&self, column: usize) -> Justification {
        self.justification.get(column).copied().unwrap_or_default()
    }

    fn padding_for(&self, column: usize) -> usize {
        self.padding.get(column).copied().unwrap_or(self.default_padding)
    }

    /// Formatted lines, one per row.
    pub fn render(&self) -> Vec<String> {
        // 1. Column widths over every row.
        let mut widths: Vec<usize> = Vec::new();
        for row in &self.rows {
            if row.len() > widths.len() {
                widths.resize(row.len(), 0);
            }
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        // 2. Pad each cell.
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&widths)
                    .enumerate()
                    .map(|(column, (cell, width))| {
                        let fill = width.saturating_sub(cell.chars().count());
                        let (before, after) = match self.justification_for(column) {
                            Justification::Left => (0, fill),
                            Justification::Center => (fill / 2, fill - fill / 2),
                            Justification::Right => (fill, 0),
                        };
                        format!(
                            "{}{}{}",
                            " ".repeat(before),
                            cell,
                            " ".repeat(after + self.padding_for(column))
                        )
                    })
                    .collect::<String>()
            })
            .collect()
    }

    pub fn print(&self) {
        for line in self.render() {
            println!("{}", line);
        }
    }
}
