//! Key-color files: `start count r g b r g b ...`
//!
//! Values are whitespace separated decimal integers. Colors are read as whole
//! triples; a trailing partial triple is ignored.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::keycolors::{KeyColorRequest, Rgb};

/// Read a key-color file, `-` meaning stdin
pub fn read_key_colors(path: &Path) -> Result<KeyColorRequest> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read key colors from stdin")?;
        text
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read key colors from {}", path.display()))?
    };
    parse_key_colors(&text).with_context(|| format!("Invalid key colors in {}", path.display()))
}

/// Parse the textual key-color description.
///
/// When fewer colors than `count` are given, `count` shrinks to match.
pub fn parse_key_colors(text: &str) -> Result<KeyColorRequest> {
    let mut items = text.split_whitespace();

    let start: usize = match items.next() {
        Some(item) => item
            .parse()
            .with_context(|| format!("Bad start key '{}'", item))?,
        None => bail!("Missing start key"),
    };
    let mut count: usize = match items.next() {
        Some(item) => item
            .parse()
            .with_context(|| format!("Bad key count '{}'", item))?,
        None => bail!("Missing key count"),
    };

    let values = items
        .map(|item| {
            item.parse::<u8>()
                .with_context(|| format!("Bad color value '{}' (expected 0-255)", item))
        })
        .collect::<Result<Vec<u8>>>()?;

    if values.len() % 3 != 0 {
        log::warn!("Ignoring {} trailing color values", values.len() % 3);
    }
    let colors: Vec<Rgb> = values
        .chunks_exact(3)
        .map(|c| Rgb::new(c[0], c[1], c[2]))
        .collect();

    if colors.len() < count {
        log::warn!(
            "Key count is {} but only {} colors were given",
            count,
            colors.len()
        );
        count = colors.len();
    }

    Ok(KeyColorRequest::new(start, count, colors)?)
}
