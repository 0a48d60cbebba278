//! Terminal progress bars for long-running commands

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar on stderr, or a hidden one when disabled
pub fn city_bar(total: usize, message: &str, enabled: bool) -> Result<ProgressBar> {
    if !enabled {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} | ETA: {eta}")?
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    Ok(pb)
}
