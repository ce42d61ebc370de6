//! Canonicalize command.

use std::io::Read;
use std::path::Path;

use anyhow::Context;

/// Read JSON from `file` (or stdin) and print its canonical form.
pub(crate) fn run(file: Option<&Path>) -> anyhow::Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        },
    };
    println!("{}", canonical(&text)?);
    Ok(())
}

fn canonical(text: &str) -> anyhow::Result<String> {
    let value: serde_json::Value = serde_json::from_str(text).context("input is not valid JSON")?;
    Ok(sigchain_crypto::canonicalize(&value))
}
