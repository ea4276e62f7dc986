use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::info;

use crate::cli::InventoryArgs;
use crate::commands::extract::DocumentFormat;
use crate::model::{PriceListEntry, PriceListInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let source_dir = args
        .source_dir
        .clone()
        .unwrap_or_else(|| args.cache_root.clone());
    let manifest = build_manifest(&source_dir)?;

    if args.dry_run {
        info!(
            document_count = manifest.document_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.cache_root
            .join("manifests")
            .join("pricelist_inventory.json")
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(document_count = manifest.document_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(source_dir: &Path) -> Result<PriceListInventoryManifest> {
    let issue_pattern = issue_regex()?;

    let mut paths = discover_documents(source_dir)?;
    paths.sort();

    if paths.is_empty() {
        bail!("no price-list documents found in {}", source_dir.display());
    }

    let documents = paths
        .iter()
        .map(|path| entry_for_path(path, &issue_pattern))
        .collect::<Result<Vec<PriceListEntry>>>()?;

    Ok(PriceListInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: source_dir.display().to_string(),
        document_count: documents.len(),
        documents,
    })
}

pub fn issue_regex() -> Result<Regex> {
    Regex::new(r"(?:^|[^0-9])((?:19|20)\d{2})[-_. ]?(0[1-9]|1[0-2])(?:[^0-9]|$)")
        .context("failed to compile issue label regex")
}

pub fn entry_for_path(path: &Path, issue_pattern: &Regex) -> Result<PriceListEntry> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

    let format = DocumentFormat::from_path(path)
        .with_context(|| format!("unsupported document type: {}", path.display()))?;

    Ok(PriceListEntry {
        issue: parse_issue(&filename, issue_pattern),
        sha256: sha256_file(path)?,
        path: path.display().to_string(),
        format: format.as_str().to_string(),
        filename,
    })
}

/// Reads a `YYYY-MM` issue label out of a file name such as `royal_2024-11.pdf`.
pub fn parse_issue(filename: &str, pattern: &Regex) -> Option<String> {
    let captures = pattern.captures(filename)?;
    let year = captures.get(1)?.as_str();
    let month = captures.get(2)?.as_str();
    Some(format!("{year}-{month}"))
}

fn discover_documents(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    let entries = fs::read_dir(source_dir)
        .with_context(|| format!("failed to read {}", source_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", source_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        if DocumentFormat::from_path(&path).is_some() {
            documents.push(path);
        }
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_issue_reads_year_and_month_from_filename() {
        let pattern = issue_regex().expect("issue regex compiles");
        assert_eq!(
            parse_issue("royal_2024-11.pdf", &pattern),
            Some("2024-11".to_string())
        );
        assert_eq!(
            parse_issue("PriceList 202403 NY.pdf", &pattern),
            Some("2024-03".to_string())
        );
        assert_eq!(parse_issue("pricelist.pdf", &pattern), None);
        assert_eq!(parse_issue("item 12345.pdf", &pattern), None);
    }

    #[test]
    fn entry_for_path_rejects_unsupported_documents_before_hashing() {
        let pattern = issue_regex().expect("issue regex compiles");
        let err = entry_for_path(Path::new("missing/royal_2024-11.xlsx"), &pattern)
            .expect_err("spreadsheets are not price-list inputs");
        assert!(err.to_string().contains("unsupported document type"));
    }
}
