use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Open a plain, gzip, bzip2 or xz file transparently.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let (reader, _format) = niffler::get_reader(Box::new(file))
        .map_err(|e| anyhow!("Failed to create decompressor for {}: {}", path.display(), e))?;
    Ok(Box::new(BufReader::new(reader)))
}

pub fn read_to_string(path: &Path) -> Result<String> {
    let mut reader = open_input(path)?;
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(contents)
}

/// Newline-delimited sample list. Blank lines and `#` comments are skipped.
pub fn read_sample_list(path: &Path) -> Result<Vec<String>> {
    let reader = open_input(path)?;
    let mut samples = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let sample = line.trim();
        if sample.is_empty() || sample.starts_with('#') {
            continue;
        }
        samples.push(sample.to_string());
    }
    Ok(samples)
}
