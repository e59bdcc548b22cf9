//! Workbook processing: find link cells, rewrite them, save the result.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::SheetgrabConfig;
use crate::rewrite::CellRewriter;
use crate::workbook::{self, Workbook};

/// Input workbook extensions handled by [`process_dir`].
const WORKBOOK_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

/// Where inputs are read from and outputs written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub input_dir: PathBuf,
    /// Rewritten workbooks, same file names as the inputs.
    pub documents_dir: PathBuf,
    pub assets_dir: PathBuf,
}

impl Layout {
    pub fn from_config(cfg: &SheetgrabConfig) -> Self {
        Self {
            input_dir: cfg.input_dir.clone(),
            documents_dir: cfg.output_dir.clone(),
            assets_dir: cfg.assets_dir(),
        }
    }

    /// Creates the output directories when absent.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.documents_dir, &self.assets_dir] {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn output_path(&self, input: &Path) -> Result<PathBuf> {
        let name = input
            .file_name()
            .with_context(|| format!("{} has no file name", input.display()))?;
        Ok(self.documents_dir.join(name))
    }
}

/// When the workbook is written during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStrategy {
    /// Once, after every cell has been processed.
    #[default]
    AtEnd,
    /// Also after every N rewritten cells.
    Every(usize),
}

impl SaveStrategy {
    pub fn from_checkpoint(every: Option<usize>) -> Self {
        match every {
            Some(n) if n > 0 => SaveStrategy::Every(n),
            _ => SaveStrategy::AtEnd,
        }
    }
}

/// Counters for one workbook or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: usize,
    pub cells_rewritten: usize,
    pub tokens_resolved: usize,
    pub tokens_failed: usize,
    pub files_failed: usize,
}

impl RunSummary {
    fn absorb(&mut self, other: RunSummary) {
        self.files += other.files;
        self.cells_rewritten += other.cells_rewritten;
        self.tokens_resolved += other.tokens_resolved;
        self.tokens_failed += other.tokens_failed;
        self.files_failed += other.files_failed;
    }
}

/// Rewrites every link cell of `book` in place, sheet by sheet in row-major order.
///
/// With [`SaveStrategy::Every`], `checkpoint` is called after each batch of
/// rewritten cells; the final save is left to the caller.
pub fn process_workbook(
    book: &mut Workbook,
    rewriter: &CellRewriter,
    strategy: SaveStrategy,
    mut checkpoint: impl FnMut(&Workbook) -> Result<()>,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for index in 0..book.sheets.len() {
        let candidates: Vec<_> = book.sheets[index]
            .cells()
            .filter(|(_, cell)| cell.has_link_candidate())
            .filter_map(|(pos, cell)| cell.effective_text().map(|text| (pos, text)))
            .collect();
        tracing::debug!(
            sheet = %book.sheets[index].name,
            cells = candidates.len(),
            "scanning link cells"
        );

        for (pos, text) in candidates {
            let result = rewriter.rewrite(&text);
            summary.tokens_resolved += result.resolved;
            summary.tokens_failed += result.failed;
            let Some(value) = result.value else {
                continue;
            };

            book.sheets[index].rewrite_cell(pos, value);
            summary.cells_rewritten += 1;

            if let SaveStrategy::Every(n) = strategy {
                if summary.cells_rewritten % n == 0 {
                    checkpoint(&*book)?;
                }
            }
        }
    }

    Ok(summary)
}

/// Loads `input`, rewrites it and saves it under the documents directory.
pub fn process_file(
    input: &Path,
    layout: &Layout,
    rewriter: &CellRewriter,
    strategy: SaveStrategy,
) -> Result<RunSummary> {
    let output = layout.output_path(input)?;
    let mut book = workbook::xlsx::load(input)?;

    let mut summary = process_workbook(&mut book, rewriter, strategy, |partial| {
        tracing::debug!(output = %output.display(), "checkpoint save");
        workbook::xlsx::save(partial, &output)
    })?;
    workbook::xlsx::save(&book, &output)?;

    summary.files = 1;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        cells = summary.cells_rewritten,
        failed_tokens = summary.tokens_failed,
        "workbook processed"
    );
    Ok(summary)
}

/// Workbooks directly inside `dir`, sorted by file name.
pub fn list_workbooks(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        let is_workbook = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| WORKBOOK_EXTENSIONS.iter().any(|w| e.eq_ignore_ascii_case(w)));
        if is_workbook {
            files.push(path);
        } else {
            tracing::debug!(path = %path.display(), "skipping non-workbook entry");
        }
    }
    files.sort();
    Ok(files)
}

/// Processes every workbook of the input directory. A file that fails is
/// logged and counted; the run goes on with the next one.
pub fn process_dir(
    layout: &Layout,
    rewriter: &CellRewriter,
    strategy: SaveStrategy,
) -> Result<RunSummary> {
    layout.ensure()?;
    let mut summary = RunSummary::default();

    for input in list_workbooks(&layout.input_dir)? {
        match process_file(&input, layout, rewriter, strategy) {
            Ok(file_summary) => summary.absorb(file_summary),
            Err(e) => {
                tracing::error!(input = %input.display(), error = %format!("{e:#}"), "workbook failed");
                summary.files += 1;
                summary.files_failed += 1;
            }
        }
    }

    Ok(summary)
}
