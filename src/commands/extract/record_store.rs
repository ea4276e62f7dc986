use super::*;

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
          doc_id TEXT PRIMARY KEY,
          filename TEXT NOT NULL,
          sha256 TEXT NOT NULL,
          format TEXT NOT NULL,
          issue TEXT,
          status TEXT NOT NULL,
          page_count INTEGER NOT NULL DEFAULT 0,
          record_count INTEGER NOT NULL DEFAULT 0,
          unmatched_item_lines INTEGER NOT NULL DEFAULT 0,
          extracted_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
          record_id TEXT PRIMARY KEY,
          doc_id TEXT NOT NULL,
          seq INTEGER NOT NULL,
          page INTEGER NOT NULL,
          region TEXT,
          brand TEXT,
          item_number TEXT NOT NULL,
          vintage TEXT NOT NULL,
          product_name TEXT NOT NULL,
          bottles_per_case INTEGER NOT NULL,
          bottle_size TEXT NOT NULL,
          case_price TEXT NOT NULL,
          bottle_price TEXT,
          name_inferred INTEGER NOT NULL,
          FOREIGN KEY(doc_id) REFERENCES documents(doc_id)
        );

        CREATE TABLE IF NOT EXISTS record_discounts (
          record_id TEXT NOT NULL,
          position INTEGER NOT NULL,
          discount TEXT NOT NULL,
          PRIMARY KEY(record_id, position),
          FOREIGN KEY(record_id) REFERENCES records(record_id)
        );

        CREATE INDEX IF NOT EXISTS idx_records_doc ON records(doc_id, seq);
        CREATE INDEX IF NOT EXISTS idx_records_item ON records(item_number);
        ",
        )
        .context("failed to create record store schema")?;

    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![DB_SCHEMA_VERSION],
        )
        .context("failed to record schema version")?;

    Ok(())
}

pub fn doc_id_for(entry: &PriceListEntry) -> String {
    let short_hash = entry.sha256.get(..12).unwrap_or(&entry.sha256);
    format!("{}-{}", file_stem_slug(&entry.filename), short_hash)
}

fn file_stem_slug(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("document");
    stem.chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Replaces everything stored for one document inside a single transaction.
pub fn replace_document_records(
    connection: &mut Connection,
    entry: &PriceListEntry,
    report: &ExtractionReport,
) -> Result<usize> {
    let doc_id = doc_id_for(entry);
    let tx = connection.transaction()?;

    tx.execute(
        "DELETE FROM record_discounts WHERE record_id IN (SELECT record_id FROM records WHERE doc_id = ?1)",
        params![doc_id],
    )?;
    tx.execute("DELETE FROM records WHERE doc_id = ?1", params![doc_id])?;

    tx.execute(
        "
        INSERT INTO documents(doc_id, filename, sha256, format, issue, status, page_count,
                              record_count, unmatched_item_lines, extracted_at)
        VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(doc_id) DO UPDATE SET
          filename=excluded.filename,
          sha256=excluded.sha256,
          format=excluded.format,
          issue=excluded.issue,
          status=excluded.status,
          page_count=excluded.page_count,
          record_count=excluded.record_count,
          unmatched_item_lines=excluded.unmatched_item_lines,
          extracted_at=excluded.extracted_at
        ",
        params![
            doc_id,
            &entry.filename,
            &entry.sha256,
            &entry.format,
            &entry.issue,
            report.status().as_str(),
            report.diagnostics.page_count as i64,
            report.records.len() as i64,
            report.diagnostics.unmatched_item_lines.len() as i64,
            now_utc_string(),
        ],
    )?;

    {
        let mut record_statement = tx.prepare(
            "
            INSERT INTO records(record_id, doc_id, seq, page, region, brand, item_number, vintage,
                                product_name, bottles_per_case, bottle_size, case_price,
                                bottle_price, name_inferred)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
        )?;
        let mut discount_statement = tx.prepare(
            "INSERT INTO record_discounts(record_id, position, discount) VALUES(?1, ?2, ?3)",
        )?;

        for (seq, record) in report.records.iter().enumerate() {
            let record_id = format!("{doc_id}:{seq:05}");
            record_statement.execute(params![
                record_id,
                doc_id,
                seq as i64,
                record.page as i64,
                &record.region,
                &record.brand,
                &record.item_number,
                &record.vintage,
                &record.product_name,
                record.bottles_per_case,
                &record.bottle_size,
                &record.case_price,
                &record.bottle_price,
                record.name_inferred,
            ])?;

            for (position, discount) in record.discounts.iter().enumerate() {
                discount_statement.execute(params![record_id, position as i64, discount])?;
            }
        }
    }

    tx.commit()
        .with_context(|| format!("failed to commit records for {}", entry.filename))?;
    Ok(report.records.len())
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}
