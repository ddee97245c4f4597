//! Terminal output helpers: a plain column-aligned table for `list` and
//! friends. Logging goes through `tracing`; this is only for tabular data.

use crossterm::style::Stylize;

/// Column-aligned table with a styled header row.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }
        widths
    }

    /// The table as plain text, one line per row.
    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut out = String::new();

        render_row(&mut out, &self.headers, &widths);
        for row in &self.rows {
            render_row(&mut out, row, &widths);
        }

        out
    }

    /// Print with a bold header row.
    pub fn print(&self) {
        let widths = self.widths();

        let mut header = String::new();
        render_row(&mut header, &self.headers, &widths);
        print!("{}", header.trim_end_matches('\n').to_string().bold());
        println!();

        for row in &self.rows {
            let mut line = String::new();
            render_row(&mut line, row, &widths);
            print!("{line}");
        }
    }
}

fn render_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let last = cells.len().saturating_sub(1);
    for (i, cell) in cells.iter().enumerate() {
        if i == last {
            out.push_str(cell);
        } else {
            out.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
        }
    }
    out.push('\n');
}
