use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::extract::LATEST_EXTRACT_MANIFEST;
use crate::model::{ExtractRunManifest, PriceListInventoryManifest};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let latest_run_path = manifest_dir.join(LATEST_EXTRACT_MANIFEST);
    let inventory_path = manifest_dir.join("pricelist_inventory.json");
    let default_db_path = args.cache_root.join("pricelist.sqlite");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: PriceListInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            source = %inventory.source_directory,
            document_count = inventory.document_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    let mut db_path = default_db_path;
    if latest_run_path.exists() {
        let run: ExtractRunManifest = read_json(&latest_run_path)?;
        info!(
            run_id = %run.run_id,
            status = %run.status,
            updated_at = %run.updated_at,
            documents = run.counts.processed_document_count,
            empty_documents = run.counts.empty_document_count,
            records = run.counts.records_extracted,
            inferred_names = run.counts.inferred_name_count,
            missing_names = run.counts.missing_name_count,
            unmatched_item_lines = run.counts.unmatched_item_line_count,
            orphan_discounts = run.counts.orphan_discount_count,
            caption_lines = run.counts.caption_line_count,
            "loaded latest extract run"
        );
        for document in run.documents.iter().filter(|document| document.status == "empty") {
            warn!(
                document = %document.filename,
                preview_lines = document.line_preview.len(),
                "document produced no records"
            );
        }
        db_path = run.paths.db_path.into();
    } else {
        warn!(path = %latest_run_path.display(), "no extract run recorded");
    }

    if db_path.exists() {
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let documents = query_count(&conn, "SELECT COUNT(*) FROM documents").unwrap_or(0);
        let records = query_count(&conn, "SELECT COUNT(*) FROM records").unwrap_or(0);
        let discounts = query_count(&conn, "SELECT COUNT(*) FROM record_discounts").unwrap_or(0);

        info!(
            path = %db_path.display(),
            documents,
            records,
            discounts,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

fn query_count(conn: &Connection, sql: &str) -> Result<i64> {
    let count = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}
