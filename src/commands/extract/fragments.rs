use super::*;

/// One positioned piece of page text as handed over by an ingestion backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedFragment {
    pub top: f32,
    pub left: f32,
    pub text: String,
    pub font_size: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl PositionedFragment {
    pub fn new(top: f32, left: f32, text: &str, font_size: f32) -> Self {
        Self {
            top,
            left,
            text: text.to_string(),
            font_size,
            font_family: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFragments {
    #[serde(default)]
    pub page_number: usize,
    #[serde(default)]
    pub fragments: Vec<PositionedFragment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FragmentDocument {
    pages: Vec<PageFragments>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Fragments,
}

impl DocumentFormat {
    pub fn resolve(path: &Path, requested: InputFormat) -> Result<Self> {
        match requested {
            InputFormat::Pdf => Ok(Self::Pdf),
            InputFormat::Fragments => Ok(Self::Fragments),
            InputFormat::Auto => Self::from_path(path).with_context(|| {
                format!(
                    "cannot infer input format from extension, pass --format: {}",
                    path.display()
                )
            }),
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else if extension.eq_ignore_ascii_case("json") {
            Some(Self::Fragments)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Fragments => "fragments",
        }
    }
}

pub fn load_document_pages(
    path: &Path,
    format: InputFormat,
    max_pages_per_doc: Option<usize>,
) -> Result<Vec<PageFragments>> {
    let format = DocumentFormat::resolve(path, format)?;
    let mut pages = match format {
        DocumentFormat::Pdf => extract_fragments_with_pdftotext(path, max_pages_per_doc)?,
        DocumentFormat::Fragments => load_fragment_document(path)?,
    };

    if let Some(max_pages) = max_pages_per_doc {
        pages.truncate(max_pages);
    }

    debug!(
        path = %path.display(),
        format = format.as_str(),
        pages = pages.len(),
        "loaded document fragments"
    );
    Ok(pages)
}

fn load_fragment_document(path: &Path) -> Result<Vec<PageFragments>> {
    let document: FragmentDocument = read_json(path)?;
    let mut pages = document.pages;

    for (index, page) in pages.iter_mut().enumerate() {
        if page.page_number == 0 {
            page.page_number = index + 1;
        }
        if let Some(fragment) = page
            .fragments
            .iter()
            .find(|fragment| !fragment_coordinates_finite(fragment))
        {
            bail!(
                "non-finite coordinates in {} page {} near '{}'",
                path.display(),
                page.page_number,
                fragment.text
            );
        }
    }

    Ok(pages)
}

fn fragment_coordinates_finite(fragment: &PositionedFragment) -> bool {
    fragment.top.is_finite() && fragment.left.is_finite() && fragment.font_size.is_finite()
}

fn extract_fragments_with_pdftotext(
    pdf_path: &Path,
    max_pages_per_doc: Option<usize>,
) -> Result<Vec<PageFragments>> {
    let mut command = Command::new("pdftotext");
    command
        .arg("-bbox-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg("-f")
        .arg("1");
    if let Some(max_pages) = max_pages_per_doc {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    parse_bbox_layout(&raw)
        .with_context(|| format!("failed to parse pdftotext bbox output for {}", pdf_path.display()))
}

/// Parses `pdftotext -bbox-layout` XHTML into per-page word fragments.
///
/// Word boxes carry no font metadata, so the box height stands in for the font size.
pub(super) fn parse_bbox_layout(xhtml: &str) -> Result<Vec<PageFragments>> {
    let page_regex =
        Regex::new(r"(?s)<page\b[^>]*>(.*?)</page>").context("failed to compile page regex")?;
    let word_regex = Regex::new(
        r#"(?s)<word\s+xMin="([^"]+)"\s+yMin="([^"]+)"\s+xMax="([^"]+)"\s+yMax="([^"]+)"\s*>(.*?)</word>"#,
    )
    .context("failed to compile word regex")?;

    let mut pages = Vec::new();
    for (page_index, page_captures) in page_regex.captures_iter(xhtml).enumerate() {
        let page_body = page_captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let mut fragments = Vec::new();

        for word in word_regex.captures_iter(page_body) {
            let x_min = parse_coordinate(&word[1])?;
            let y_min = parse_coordinate(&word[2])?;
            let y_max = parse_coordinate(&word[4])?;
            let text = unescape_xml(word[5].trim());
            if text.trim().is_empty() {
                continue;
            }

            fragments.push(PositionedFragment::new(
                y_min,
                x_min,
                &text,
                (y_max - y_min).max(0.0),
            ));
        }

        pages.push(PageFragments {
            page_number: page_index + 1,
            fragments,
        });
    }

    Ok(pages)
}

fn parse_coordinate(raw: &str) -> Result<f32> {
    raw.trim()
        .parse::<f32>()
        .with_context(|| format!("invalid bbox coordinate: {raw}"))
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
