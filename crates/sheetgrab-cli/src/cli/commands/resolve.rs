//! `sheetgrab resolve` – resolve URLs outside any workbook.

use anyhow::{bail, Context, Result};
use sheetgrab_core::config::SheetgrabConfig;
use sheetgrab_core::resolver::UrlResolver;
use sheetgrab_core::rewrite::split_tokens;

use super::fetcher;

/// Resolves every token of `urls` into the assets directory, one line per token.
pub fn run_resolve(cfg: &SheetgrabConfig, urls: &[String]) -> Result<()> {
    let assets = cfg.assets_dir();
    std::fs::create_dir_all(&assets).with_context(|| format!("create {}", assets.display()))?;
    let resolver = UrlResolver::from_config(Box::new(fetcher(cfg)), cfg)?;

    let mut failed = 0usize;
    for token in urls.iter().flat_map(|u| split_tokens(u)) {
        match resolver.resolve(&token) {
            Ok(names) => println!("{}\t{}", token, names.join(" ")),
            Err(e) => {
                failed += 1;
                tracing::warn!(token = %token, error = %e, "could not resolve token");
                eprintln!("{}\t{}", token, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} token(s) could not be resolved", failed);
    }
    Ok(())
}
