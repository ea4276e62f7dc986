use super::*;

/// How many lines at each page edge are inspected for running captions.
const EDGE_LINES_PER_PAGE: usize = 2;
const MAX_CAPTION_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Extracted,
    /// The document parsed but produced no records; callers show the line preview.
    Empty,
}

impl ExtractionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionStatus::Extracted => "extracted",
            ExtractionStatus::Empty => "empty",
        }
    }
}

#[derive(Debug, Default)]
pub struct ExtractionDiagnostics {
    pub page_count: usize,
    pub line_count: usize,
    pub repeated_captions: Vec<String>,
    /// Lines skipped because they matched a repeated caption.
    pub caption_line_count: usize,
    pub unmatched_item_lines: Vec<UnmatchedItemLine>,
    pub orphan_discounts: Vec<OrphanDiscount>,
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub records: Vec<Record>,
    pub diagnostics: ExtractionDiagnostics,
    pub line_preview: Vec<String>,
}

impl ExtractionReport {
    pub fn status(&self) -> ExtractionStatus {
        if self.records.is_empty() {
            ExtractionStatus::Empty
        } else {
            ExtractionStatus::Extracted
        }
    }

    pub fn inferred_name_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.name_inferred)
            .count()
    }

    pub fn missing_name_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.product_name == MISSING_NAME)
            .count()
    }

    pub fn discount_count(&self) -> usize {
        self.records
            .iter()
            .map(|record| record.discounts.len())
            .sum()
    }
}

#[derive(Debug)]
pub struct ClassifiedPage {
    pub page_number: usize,
    pub lines: Vec<ClassifiedLine>,
    pub unmatched_item_lines: Vec<UnmatchedItemLine>,
}

#[derive(Debug)]
pub struct ClassifiedDocument {
    pub pages: Vec<ClassifiedPage>,
    pub repeated_captions: Vec<String>,
    pub physical_line_count: usize,
}

pub fn classify_document(pages: &[PageFragments], classifier: &LineClassifier) -> ClassifiedDocument {
    let calibration = classifier.calibration();
    let assembled = pages
        .iter()
        .map(|page| assemble_lines(page, calibration.line_tolerance))
        .collect::<Vec<Vec<LogicalLine>>>();

    let captions = detect_repeated_captions(&assembled, classifier);
    let mut repeated_captions = captions.iter().cloned().collect::<Vec<String>>();
    repeated_captions.sort();

    let classified_pages = pages
        .iter()
        .zip(&assembled)
        .map(|(page, lines)| {
            let classification = classifier.classify_page(lines, &captions);
            ClassifiedPage {
                page_number: page.page_number,
                lines: classification.lines,
                unmatched_item_lines: classification.unmatched_item_lines,
            }
        })
        .collect();

    ClassifiedDocument {
        pages: classified_pages,
        repeated_captions,
        physical_line_count: assembled.iter().map(Vec::len).sum(),
    }
}

/// Runs assembly, classification and stitching over one document with a fresh stitcher.
pub fn extract_records(
    pages: &[PageFragments],
    classifier: &LineClassifier,
    preview_limit: usize,
) -> ExtractionReport {
    let document = classify_document(pages, classifier);
    let mut stitcher = RecordStitcher::new(classifier.calibration().name_lookback_lines);
    let mut unmatched_item_lines = Vec::new();

    for page in &document.pages {
        stitcher.consume_page(&page.lines);
        unmatched_item_lines.extend(page.unmatched_item_lines.iter().cloned());
    }

    let outcome = stitcher.finish();
    let caption_line_count = document
        .pages
        .iter()
        .flat_map(|page| page.lines.iter())
        .filter(|classified| {
            classified.role
                == LineRole::Skip {
                    kind: SkipKind::RepeatedCaption,
                }
        })
        .count();
    let line_preview = if outcome.records.is_empty() {
        render_line_preview(&document, preview_limit)
    } else {
        Vec::new()
    };

    ExtractionReport {
        records: outcome.records,
        diagnostics: ExtractionDiagnostics {
            page_count: document.pages.len(),
            line_count: document.physical_line_count,
            repeated_captions: document.repeated_captions,
            caption_line_count,
            unmatched_item_lines,
            orphan_discounts: outcome.orphan_discounts,
        },
        line_preview,
    }
}

pub fn render_line_preview(document: &ClassifiedDocument, limit: usize) -> Vec<String> {
    document
        .pages
        .iter()
        .flat_map(|page| page.lines.iter())
        .take(limit)
        .map(render_classified_line)
        .collect()
}

pub fn render_classified_line(classified: &ClassifiedLine) -> String {
    format!(
        "{}  | Sizes: {} | {}",
        classified.line.text,
        classified.line.sizes_label(),
        classified.role.label()
    )
}

/// Finds body-size captions repeated at page edges, such as running table headers.
///
/// A line that opens a product-name run anywhere in the document is never a caption,
/// however often it repeats.
fn detect_repeated_captions(
    pages: &[Vec<LogicalLine>],
    classifier: &LineClassifier,
) -> HashSet<String> {
    let min_pages = classifier.calibration().repeated_edge_min_pages;
    if min_pages == 0 {
        return HashSet::new();
    }

    let mut counts = HashMap::<String, usize>::new();
    for lines in pages {
        let head = lines.iter().take(EDGE_LINES_PER_PAGE);
        let tail = lines
            .iter()
            .skip(lines.len().saturating_sub(EDGE_LINES_PER_PAGE));

        let page_captions = head
            .chain(tail)
            .filter(|line| caption_eligible(line, classifier))
            .map(|line| normalize_caption(&line.text))
            .filter(|caption| !caption.is_empty() && caption.len() <= MAX_CAPTION_CHARS)
            .collect::<HashSet<String>>();

        for caption in page_captions {
            *counts.entry(caption).or_insert(0) += 1;
        }
    }

    let mut captions = counts
        .into_iter()
        .filter_map(|(caption, count)| if count >= min_pages { Some(caption) } else { None })
        .collect::<HashSet<String>>();
    if captions.is_empty() {
        return captions;
    }

    for lines in pages {
        for (index, line) in lines.iter().enumerate() {
            let caption = normalize_caption(&line.text);
            if captions.contains(&caption) && opens_name_run(lines, index, classifier) {
                debug!(page = line.page, text = %line.text, "repeated edge line names a product");
                captions.remove(&caption);
            }
        }
    }

    captions
}

/// Whether `lines[index]` is free text that the name lookback of a following item
/// header would collect.
fn opens_name_run(lines: &[LogicalLine], index: usize, classifier: &LineClassifier) -> bool {
    let no_captions = HashSet::new();
    if classifier.classify(lines, index, &no_captions).role != LineRole::FreeText {
        return false;
    }

    let window_end = (index + classifier.calibration().name_lookback_lines).min(lines.len() - 1);
    for next in index + 1..=window_end {
        match classifier.classify(lines, next, &no_captions).role {
            LineRole::FreeText
            | LineRole::Skip {
                kind: SkipKind::Badge,
            }
            | LineRole::Noise {
                kind: NoiseKind::Badge,
            } => continue,
            LineRole::ItemHeader { .. }
            | LineRole::Noise {
                kind: NoiseKind::MalformedItem,
            } => return true,
            _ => return false,
        }
    }
    false
}

fn caption_eligible(line: &LogicalLine, classifier: &LineClassifier) -> bool {
    let calibration = classifier.calibration();
    let grammar = classifier.grammar();
    let text = line.text.trim();

    !calibration.reaches(line.largest_font_size(), calibration.brand_font_size)
        && !grammar.looks_like_item(text)
        && !grammar.is_field_fragment(text)
        && !classifier.is_discount(text)
}
