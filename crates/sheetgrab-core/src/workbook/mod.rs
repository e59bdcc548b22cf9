//! In-memory spreadsheet model.
//!
//! Holds only what the link pass needs: cell values and external hyperlink
//! targets, addressed by zero-based (row, column). Cells changed through
//! [`Sheet::rewrite_cell`] are tracked so a loaded workbook can be saved by
//! patching just those cells into its original package.

pub mod xlsx;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Zero-based cell position; ordering is row-major.
pub type CellPos = (u32, u16);

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            // Integral numbers print without a fractional part (`42`, not `42.0`).
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub value: Option<CellValue>,
    /// External hyperlink target.
    pub hyperlink: Option<String>,
}

impl Cell {
    /// Hyperlink target if present, else the value as text.
    pub fn effective_text(&self) -> Option<String> {
        match (&self.hyperlink, &self.value) {
            (Some(link), _) => Some(link.clone()),
            (None, Some(value)) => Some(value.to_string()),
            (None, None) => None,
        }
    }

    /// A cell is scanned when its hyperlink target or its value starts with `http`.
    pub fn has_link_candidate(&self) -> bool {
        let link = self
            .hyperlink
            .as_deref()
            .is_some_and(|h| h.starts_with("http"));
        let value = self
            .value
            .as_ref()
            .is_some_and(|v| v.to_string().starts_with("http"));
        link || value
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<CellPos, Cell>,
    /// Worksheet part inside the source package (`xl/worksheets/sheet1.xml`).
    part: Option<String>,
    rewritten: BTreeSet<CellPos>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn cell(&self, pos: CellPos) -> Option<&Cell> {
        self.cells.get(&pos)
    }

    /// Cell at `pos`, created empty when absent.
    pub fn cell_mut(&mut self, pos: CellPos) -> &mut Cell {
        self.cells.entry(pos).or_default()
    }

    pub fn set_value(&mut self, pos: CellPos, value: CellValue) {
        self.cell_mut(pos).value = Some(value);
    }

    pub fn set_hyperlink(&mut self, pos: CellPos, target: impl Into<String>) {
        self.cell_mut(pos).hyperlink = Some(target.into());
    }

    /// Replaces the cell value with `text` and drops its hyperlink.
    pub fn rewrite_cell(&mut self, pos: CellPos, text: String) {
        let cell = self.cell_mut(pos);
        cell.value = Some(CellValue::Text(text));
        cell.hyperlink = None;
        self.rewritten.insert(pos);
    }

    /// Positions changed by [`Sheet::rewrite_cell`], row-major.
    pub fn rewritten(&self) -> impl Iterator<Item = CellPos> + '_ {
        self.rewritten.iter().copied()
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellPos, &Cell)> {
        self.cells.iter().map(|(pos, cell)| (*pos, cell))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
    /// Package the workbook was loaded from; saving patches it.
    source: Option<PathBuf>,
}

impl Workbook {
    /// Workbook built in memory, saved from scratch.
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self {
            sheets,
            source: None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}
