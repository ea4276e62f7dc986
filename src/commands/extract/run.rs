use super::*;

pub const LATEST_EXTRACT_MANIFEST: &str = "latest_extract_run.json";

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    let records_dir = cache_root.join("records");
    ensure_directory(&manifest_dir)?;

    let source_dir = args
        .source_dir
        .clone()
        .unwrap_or_else(|| cache_root.clone());
    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("pricelist_inventory.json"));
    let extract_manifest_path = args.extract_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "extract_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| cache_root.join("pricelist.sqlite"));

    info!(cache_root = %cache_root.display(), run_id = %run_id, "starting extract");

    let calibration = Calibration::load(args.calibration_path.as_deref())?.with_overrides(
        args.region_font_size,
        args.brand_font_size,
        args.name_lookback_lines,
    );
    let classifier = LineClassifier::new(calibration.clone())?;

    let entries = if args.documents.is_empty() {
        load_or_refresh_inventory(&source_dir, &inventory_manifest_path, args.refresh_inventory)?
            .documents
    } else {
        let issue_pattern = inventory::issue_regex()?;
        args.documents
            .iter()
            .map(|path| inventory::entry_for_path(path, &issue_pattern))
            .collect::<Result<Vec<PriceListEntry>>>()?
    };

    let tool_versions = collect_tool_versions(&entries);

    let mut connection = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;

    let mut counts = ExtractCounts {
        document_count: entries.len(),
        ..ExtractCounts::default()
    };
    let mut documents = Vec::with_capacity(entries.len());
    let mut warnings = Vec::new();

    for entry in &entries {
        let path = PathBuf::from(&entry.path);
        let pages = load_document_pages(&path, args.format, args.max_pages_per_doc)
            .with_context(|| format!("failed to ingest {}", path.display()))?;
        let report = extract_records(&pages, &classifier, args.preview_lines);
        let doc_id = doc_id_for(entry);

        replace_document_records(&mut connection, entry, &report)?;

        let status = report.status();
        let files = match status {
            ExtractionStatus::Extracted => {
                Some(write_record_files(&records_dir, &doc_id, &report.records)?)
            }
            ExtractionStatus::Empty => {
                warn!(
                    document = %entry.filename,
                    pages = report.diagnostics.page_count,
                    lines = report.diagnostics.line_count,
                    "no records extracted; line preview kept in run manifest"
                );
                warnings.push(format!("no records extracted from {}", entry.filename));
                None
            }
        };

        if !report.diagnostics.unmatched_item_lines.is_empty() {
            warn!(
                document = %entry.filename,
                count = report.diagnostics.unmatched_item_lines.len(),
                "item-like lines failed grammar validation"
            );
        }

        if !report.diagnostics.repeated_captions.is_empty() {
            info!(
                document = %entry.filename,
                captions = ?report.diagnostics.repeated_captions,
                skipped_lines = report.diagnostics.caption_line_count,
                "skipped repeated page captions"
            );
        }

        info!(
            document = %entry.filename,
            records = report.records.len(),
            inferred_names = report.inferred_name_count(),
            discounts = report.discount_count(),
            orphan_discounts = report.diagnostics.orphan_discounts.len(),
            "document extracted"
        );

        counts.processed_document_count += 1;
        if status == ExtractionStatus::Empty {
            counts.empty_document_count += 1;
        }
        counts.page_count += report.diagnostics.page_count;
        counts.line_count += report.diagnostics.line_count;
        counts.records_extracted += report.records.len();
        counts.discounts_attached += report.discount_count();
        counts.inferred_name_count += report.inferred_name_count();
        counts.missing_name_count += report.missing_name_count();
        counts.unmatched_item_line_count += report.diagnostics.unmatched_item_lines.len();
        counts.orphan_discount_count += report.diagnostics.orphan_discounts.len();
        counts.caption_line_count += report.diagnostics.caption_line_count;

        documents.push(DocumentSummary {
            doc_id,
            filename: entry.filename.clone(),
            status: status.as_str().to_string(),
            page_count: report.diagnostics.page_count,
            line_count: report.diagnostics.line_count,
            record_count: report.records.len(),
            inferred_name_count: report.inferred_name_count(),
            records_json_path: files
                .as_ref()
                .map(|files| files.json_path.display().to_string()),
            records_csv_path: files
                .as_ref()
                .map(|files| files.csv_path.display().to_string()),
            repeated_captions: report.diagnostics.repeated_captions,
            caption_line_count: report.diagnostics.caption_line_count,
            unmatched_item_lines: report.diagnostics.unmatched_item_lines,
            orphan_discounts: report.diagnostics.orphan_discounts,
            line_preview: report.line_preview,
        });
    }

    counts.records_total = count_rows(&connection, "SELECT COUNT(*) FROM records")?;

    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_extract_command(&args),
        tool_versions,
        paths: ExtractPaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            db_path: db_path.display().to_string(),
            records_dir: records_dir.display().to_string(),
            calibration_path: args
                .calibration_path
                .as_ref()
                .map(|path| path.display().to_string()),
        },
        calibration: serde_json::to_value(&calibration)
            .context("failed to serialize calibration")?,
        counts,
        documents,
        warnings,
        notes: vec![
            "Records are reconstructed from font size, vertical position and word order."
                .to_string(),
        ],
    };

    write_json_pretty(&extract_manifest_path, &manifest)?;
    write_json_pretty(&manifest_dir.join(LATEST_EXTRACT_MANIFEST), &manifest)?;

    info!(path = %extract_manifest_path.display(), "wrote extract run manifest");
    info!(
        documents = manifest.counts.processed_document_count,
        records = manifest.counts.records_extracted,
        unmatched = manifest.counts.unmatched_item_line_count,
        "extract completed"
    );

    Ok(())
}

fn load_or_refresh_inventory(
    source_dir: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
) -> Result<PriceListInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(source_dir)?;
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            document_count = manifest.document_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let manifest: PriceListInventoryManifest = read_json(inventory_manifest_path)?;
    info!(
        path = %inventory_manifest_path.display(),
        document_count = manifest.document_count,
        "loaded existing inventory manifest"
    );

    Ok(manifest)
}

fn collect_tool_versions(entries: &[PriceListEntry]) -> ToolVersions {
    let needs_pdftotext = entries.iter().any(|entry| entry.format == "pdf");
    ToolVersions {
        pdftotext: if needs_pdftotext {
            command_version_optional("pdftotext", &["-v"])
        } else {
            None
        },
    }
}

fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}

pub(super) fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "pricelist".to_string(),
        "extract".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(path) = &args.source_dir {
        command.push("--source-dir".to_string());
        command.push(path.display().to_string());
    }
    for path in &args.documents {
        command.push("--document".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.inventory_manifest_path {
        command.push("--inventory-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.extract_manifest_path {
        command.push("--extract-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.calibration_path {
        command.push("--calibration-path".to_string());
        command.push(path.display().to_string());
    }
    if args.format != InputFormat::Auto {
        command.push("--format".to_string());
        command.push(args.format.as_str().to_string());
    }
    if args.refresh_inventory {
        command.push("--refresh-inventory".to_string());
    }
    if let Some(max_pages) = args.max_pages_per_doc {
        command.push("--max-pages-per-doc".to_string());
        command.push(max_pages.to_string());
    }
    if let Some(size) = args.region_font_size {
        command.push("--region-font-size".to_string());
        command.push(size.to_string());
    }
    if let Some(size) = args.brand_font_size {
        command.push("--brand-font-size".to_string());
        command.push(size.to_string());
    }
    if let Some(lines) = args.name_lookback_lines {
        command.push("--name-lookback-lines".to_string());
        command.push(lines.to_string());
    }
    command.push("--preview-lines".to_string());
    command.push(args.preview_lines.to_string());

    command.join(" ")
}
