use super::*;

pub const RECORD_COLUMNS: [&str; 11] = [
    "Region",
    "Brand",
    "Item#",
    "Vintage",
    "Product Name",
    "Bottles per Case",
    "Bottle Size",
    "Case Price",
    "Bottle Price",
    "Discounts",
    "Name Inferred",
];

pub fn record_row(record: &Record) -> Vec<String> {
    vec![
        record.region_label().to_string(),
        record.brand_label().to_string(),
        record.item_number.clone(),
        record.vintage.clone(),
        record.product_name.clone(),
        record.bottles_per_case.to_string(),
        record.bottle_size.clone(),
        record.case_price.clone(),
        record.bottle_price.clone().unwrap_or_default(),
        record.discounts.join("; "),
        if record.name_inferred { "Yes" } else { "No" }.to_string(),
    ]
}

pub fn records_to_csv(records: &[Record]) -> String {
    let header = RECORD_COLUMNS
        .iter()
        .map(|column| escape_csv_cell(column))
        .collect::<Vec<String>>()
        .join(",");

    let mut lines = vec![header];
    for record in records {
        lines.push(
            record_row(record)
                .iter()
                .map(|cell| escape_csv_cell(cell))
                .collect::<Vec<String>>()
                .join(","),
        );
    }
    lines.join("\n")
}

fn escape_csv_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub struct RecordFiles {
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
}

pub fn write_record_files(records_dir: &Path, doc_id: &str, records: &[Record]) -> Result<RecordFiles> {
    let files = RecordFiles {
        json_path: records_dir.join(format!("{doc_id}.json")),
        csv_path: records_dir.join(format!("{doc_id}.csv")),
    };
    write_json_pretty(&files.json_path, &records)?;
    write_text(&files.csv_path, &records_to_csv(records))?;
    Ok(files)
}
