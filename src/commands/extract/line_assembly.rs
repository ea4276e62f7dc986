use super::*;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalLine {
    pub page: usize,
    pub top: f32,
    pub text: String,
    /// Distinct font sizes of the merged fragments, ascending.
    pub font_sizes: Vec<f32>,
}

impl LogicalLine {
    pub fn largest_font_size(&self) -> f32 {
        self.font_sizes.iter().copied().fold(0.0, f32::max)
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn sizes_label(&self) -> String {
        let sizes = self
            .font_sizes
            .iter()
            .map(|size| format!("{size:.2}"))
            .collect::<Vec<String>>();
        format!("[{}]", sizes.join(", "))
    }
}

/// Groups one page's fragments into reading-order lines.
///
/// Fragments whose vertical offsets round to the same `tolerance` bucket share a line.
pub fn assemble_lines(page: &PageFragments, tolerance: f32) -> Vec<LogicalLine> {
    let mut buckets = BTreeMap::<i64, Vec<&PositionedFragment>>::new();
    for fragment in &page.fragments {
        if fragment.text.trim().is_empty() {
            continue;
        }
        let key = (fragment.top / tolerance).round() as i64;
        buckets.entry(key).or_default().push(fragment);
    }

    buckets
        .into_values()
        .map(|mut fragments| {
            fragments.sort_by(|a, b| a.left.total_cmp(&b.left));

            let top = fragments
                .iter()
                .map(|fragment| fragment.top)
                .fold(f32::INFINITY, f32::min);
            let text = fragments
                .iter()
                .map(|fragment| fragment.text.trim())
                .collect::<Vec<&str>>()
                .join(" ");

            let mut font_sizes = fragments
                .iter()
                .map(|fragment| (fragment.font_size * 100.0).round() / 100.0)
                .collect::<Vec<f32>>();
            font_sizes.sort_by(f32::total_cmp);
            font_sizes.dedup();

            LogicalLine {
                page: page.page_number,
                top,
                text,
                font_sizes,
            }
        })
        .collect()
}
