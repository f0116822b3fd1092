//! Row windowing for the record tables.
//!
//! Only rows inside [`ViewportWindow::rows`] are materialized; the rest of
//! the table is two spacers sized so the scrollable height always equals
//! `len * row_height`.

use std::ops::Range;

const CELL_PADDING: f32 = 32.0;
const MIN_COLUMN_WIDTH: f32 = 50.0;
const MIN_LAST_COLUMN_WIDTH: f32 = 100.0;
const SCROLLBAR_ALLOWANCE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportWindow {
    pub start: usize,
    pub end: usize,
    pub top_spacer: f32,
    pub bottom_spacer: f32,
}

impl ViewportWindow {
    pub fn compute(len: usize, scroll_offset: f32, row_height: f32, viewport_height: f32) -> Self {
        if len == 0 || row_height <= 0.0 {
            return Self {
                start: 0,
                end: 0,
                top_spacer: 0.0,
                bottom_spacer: 0.0,
            };
        }

        let offset = scroll_offset.max(0.0);
        let viewport = viewport_height.max(0.0);
        let buffer = (viewport / row_height).ceil() as usize * 2;

        let first_visible = (offset / row_height).floor() as usize;
        let last_visible = ((offset + viewport) / row_height).ceil() as usize;

        let end = (last_visible + buffer).min(len);
        let start = first_visible.saturating_sub(buffer).min(end);

        Self {
            start,
            end,
            top_spacer: start as f32 * row_height,
            bottom_spacer: (len - end) as f32 * row_height,
        }
    }

    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn contains(&self, position: usize) -> bool {
        self.rows().contains(&position)
    }

    pub fn materialized_height(&self, row_height: f32) -> f32 {
        (self.end - self.start) as f32 * row_height
    }
}

/// Scroll offset that puts row `position` in the middle of the viewport.
pub fn center_offset(position: usize, row_height: f32, viewport_height: f32) -> f32 {
    (position as f32 * row_height - viewport_height / 2.0 + row_height / 2.0).max(0.0)
}

/// Column widths fitted to the header and the materialized cells.
///
/// Text width is estimated from the character count. The last column takes
/// what is left of `container_width`.
pub fn auto_fit_columns<'a, I>(
    headers: &[String],
    rows: I,
    char_width: f32,
    container_width: f32,
) -> Vec<f32>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let columns = headers.len();
    if columns == 0 {
        return Vec::new();
    }

    let mut widest: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (col, cell) in row.iter().take(columns).enumerate() {
            widest[col] = widest[col].max(cell.chars().count());
        }
    }

    let mut widths: Vec<f32> = widest[..columns - 1]
        .iter()
        .map(|&chars| (chars as f32 * char_width + CELL_PADDING).max(MIN_COLUMN_WIDTH))
        .collect();

    let used: f32 = widths.iter().sum();
    widths.push((container_width - used - SCROLLBAR_ALLOWANCE).max(MIN_LAST_COLUMN_WIDTH));
    widths
}
