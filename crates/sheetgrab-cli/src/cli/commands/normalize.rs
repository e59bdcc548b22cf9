use anyhow::Result;
use sheetgrab_core::url_model::normalize_filename;

pub fn run_normalize(name: &str) -> Result<()> {
    println!("{}", normalize_filename(name));
    Ok(())
}
