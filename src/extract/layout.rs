// src/extract/layout.rs
//
// Rebuilds a cell grid from tesseract's word-level TSV output. Each OCR line
// becomes a row; wide horizontal gaps split a line into cells; cells are then
// snapped to the column positions of the widest row.

use std::collections::BTreeMap;

use super::RawTable;
use crate::error::ExtractError;

/// TSV `level` value for individual words.
const WORD_LEVEL: u32 = 5;
/// A gap wider than this many line-heights starts a new cell.
const CELL_GAP_FACTOR: f32 = 1.5;
/// Columns before `text` in a tesseract TSV row.
const FIXED_FIELDS: usize = 11;
/// Pages read below this mean word confidence are flagged in the log.
pub const LOW_CONFIDENCE: f32 = 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub block: u32,
    pub par: u32,
    pub line: u32,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub conf: f32,
    pub text: String,
}

impl Word {
    fn right(&self) -> i32 {
        self.left + self.width
    }
}

#[derive(Debug)]
struct Cell {
    left: i32,
    right: i32,
    text: String,
}

impl Cell {
    fn center(&self) -> f32 {
        (self.left + self.right) as f32 / 2.0
    }
}

/// Parse tesseract `tsv` output, keeping only non-blank words.
pub fn parse_tsv(tsv: &str) -> Result<Vec<Word>, ExtractError> {
    let mut words = Vec::new();

    for (idx, line) in tsv.lines().enumerate() {
        if idx == 0 && line.starts_with("level") {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < FIXED_FIELDS {
            return Err(ExtractError::Ocr(format!(
                "TSV line {} has {} fields, expected at least {}",
                idx + 1,
                fields.len(),
                FIXED_FIELDS
            )));
        }

        let int = |i: usize| -> Result<i32, ExtractError> {
            fields[i].trim().parse::<i32>().map_err(|_| {
                ExtractError::Ocr(format!(
                    "TSV line {} field {} is not an integer: {:?}",
                    idx + 1,
                    i + 1,
                    fields[i]
                ))
            })
        };

        let level = int(0)?;
        let text = fields.get(FIXED_FIELDS).map(|t| t.trim()).unwrap_or("");
        if level != WORD_LEVEL as i32 || text.is_empty() {
            continue;
        }

        let conf = fields[10].trim().parse::<f32>().map_err(|_| {
            ExtractError::Ocr(format!(
                "TSV line {} confidence is not a number: {:?}",
                idx + 1,
                fields[10]
            ))
        })?;

        words.push(Word {
            block: int(2)? as u32,
            par: int(3)? as u32,
            line: int(4)? as u32,
            left: int(6)?,
            top: int(7)?,
            width: int(8)?,
            height: int(9)?,
            conf,
            text: text.to_string(),
        });
    }

    Ok(words)
}

/// Mean tesseract confidence (0-100) over `words`, ignoring the `-1` it
/// reports for words it could not score.
pub fn mean_confidence(words: &[Word]) -> Option<f32> {
    let scored: Vec<f32> = words.iter().map(|w| w.conf).filter(|c| *c >= 0.0).collect();
    (!scored.is_empty()).then(|| scored.iter().sum::<f32>() / scored.len() as f32)
}

/// Group words into rows and columns. `None` when there are no words at all.
pub fn build_table(words: &[Word]) -> Option<RawTable> {
    if words.is_empty() {
        return None;
    }

    // 1) words → lines, keyed by tesseract's (block, par, line) ids
    let mut by_line: BTreeMap<(u32, u32, u32), Vec<&Word>> = BTreeMap::new();
    for w in words {
        by_line.entry((w.block, w.par, w.line)).or_default().push(w);
    }
    let mut lines: Vec<Vec<&Word>> = by_line.into_values().collect();
    for line in &mut lines {
        line.sort_by_key(|w| w.left);
    }
    // stable sort: equal tops keep (block, par, line) order
    lines.sort_by_key(|line| line.iter().map(|w| w.top).min().unwrap_or(0));

    // 2) lines → cells, splitting on wide gaps
    let rows: Vec<Vec<Cell>> = lines.iter().map(|line| split_cells(line)).collect();

    // 3) column anchors from the widest rows
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widest: Vec<&Vec<Cell>> = rows.iter().filter(|r| r.len() == columns).collect();
    let anchors: Vec<f32> = (0..columns)
        .map(|i| widest.iter().map(|r| r[i].center()).sum::<f32>() / widest.len() as f32)
        .collect();

    // 4) snap every cell to its nearest anchor
    let grid = rows
        .into_iter()
        .map(|cells| {
            let mut row: Vec<Option<String>> = vec![None; columns];
            for cell in cells {
                let col = nearest(&anchors, cell.center());
                match &mut row[col] {
                    Some(existing) => {
                        existing.push(' ');
                        existing.push_str(&cell.text);
                    }
                    slot => *slot = Some(cell.text),
                }
            }
            row
        })
        .collect();

    Some(RawTable::new(grid))
}

fn split_cells(line: &[&Word]) -> Vec<Cell> {
    let height = median_height(line);
    let max_gap = (height as f32 * CELL_GAP_FACTOR).max(1.0);

    let mut cells: Vec<Cell> = Vec::new();
    for w in line {
        match cells.last_mut() {
            Some(cell) if ((w.left - cell.right) as f32) <= max_gap => {
                cell.text.push(' ');
                cell.text.push_str(&w.text);
                cell.right = cell.right.max(w.right());
            }
            _ => cells.push(Cell {
                left: w.left,
                right: w.right(),
                text: w.text.clone(),
            }),
        }
    }
    cells
}

fn median_height(line: &[&Word]) -> i32 {
    let mut heights: Vec<i32> = line.iter().map(|w| w.height).collect();
    heights.sort_unstable();
    heights.get(heights.len() / 2).copied().unwrap_or(0)
}

fn nearest(anchors: &[f32], x: f32) -> usize {
    anchors
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
