use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::LinesArgs;
use crate::commands::extract::{
    Calibration, ClassifiedLine, LineClassifier, classify_document, load_document_pages,
    render_classified_line,
};

pub fn run(args: LinesArgs) -> Result<()> {
    let calibration = Calibration::load(args.calibration_path.as_deref())?;
    let classifier = LineClassifier::new(calibration)?;
    let pages = load_document_pages(&args.document, args.format, args.max_pages_per_doc)
        .with_context(|| format!("failed to ingest {}", args.document.display()))?;
    let document = classify_document(&pages, &classifier);

    info!(
        document = %args.document.display(),
        pages = document.pages.len(),
        lines = document.physical_line_count,
        captions = document.repeated_captions.len(),
        "classified document lines"
    );

    let lines = document
        .pages
        .iter()
        .flat_map(|page| page.lines.iter())
        .take(args.limit)
        .collect::<Vec<&ClassifiedLine>>();

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &lines)
            .context("failed to serialize line dump")?;
        writeln!(output)?;
    } else {
        for line in &lines {
            writeln!(output, "p{}\t{}", line.line.page, render_classified_line(line))?;
        }
    }
    output.flush()?;
    Ok(())
}
