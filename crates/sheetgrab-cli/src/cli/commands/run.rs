//! `sheetgrab run` – process the input directory.

use anyhow::Result;
use sheetgrab_core::config::{CollisionPolicy, SheetgrabConfig};
use sheetgrab_core::pipeline::{self, Layout, SaveStrategy};
use sheetgrab_core::resolver::UrlResolver;
use sheetgrab_core::rewrite::CellRewriter;
use std::path::PathBuf;

use super::fetcher;

/// Command-line values that take precedence over config.toml.
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub checkpoint_every: Option<usize>,
    pub overwrite: bool,
}

impl RunOverrides {
    pub fn apply(self, mut cfg: SheetgrabConfig) -> SheetgrabConfig {
        if let Some(input) = self.input {
            cfg.input_dir = input;
        }
        if let Some(output) = self.output {
            cfg.output_dir = output;
        }
        if self.checkpoint_every.is_some() {
            cfg.checkpoint_every = self.checkpoint_every;
        }
        if self.overwrite {
            cfg.collision = CollisionPolicy::Overwrite;
        }
        cfg
    }
}

pub fn run_pipeline(cfg: SheetgrabConfig) -> Result<()> {
    let layout = Layout::from_config(&cfg);
    let strategy = SaveStrategy::from_checkpoint(cfg.checkpoint_every);
    let rewriter = CellRewriter::new(UrlResolver::from_config(Box::new(fetcher(&cfg)), &cfg)?);

    let summary = pipeline::process_dir(&layout, &rewriter, strategy)?;
    tracing::info!(?summary, "run finished");
    println!(
        "{} workbook(s), {} cell(s) rewritten, {} link(s) resolved, {} failed, {} workbook(s) failed",
        summary.files,
        summary.cells_rewritten,
        summary.tokens_resolved,
        summary.tokens_failed,
        summary.files_failed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let cfg = RunOverrides {
            input: Some("in".into()),
            output: Some("out".into()),
            checkpoint_every: Some(10),
            overwrite: true,
        }
        .apply(SheetgrabConfig::default());
        assert_eq!(cfg.input_dir, PathBuf::from("in"));
        assert_eq!(cfg.assets_dir(), PathBuf::from("out").join("images"));
        assert_eq!(cfg.checkpoint_every, Some(10));
        assert_eq!(cfg.collision, CollisionPolicy::Overwrite);
    }

    #[test]
    fn empty_overrides_keep_config() {
        let mut base = SheetgrabConfig::default();
        base.checkpoint_every = Some(3);
        let cfg = RunOverrides::default().apply(base);
        assert_eq!(cfg.input_dir, PathBuf::from("data"));
        assert_eq!(cfg.checkpoint_every, Some(3));
        assert_eq!(cfg.collision, CollisionPolicy::HashSuffix);
    }
}
