use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    Boilerplate,
    Token,
    /// A skip token the name lookback steps over, such as a `NEW` badge.
    Badge,
    RepeatedCaption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    Marketing,
    /// A marketing notice the name lookback steps over, such as a `COMBINE` line.
    Badge,
    MalformedItem,
    StrayField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum LineRole {
    Skip { kind: SkipKind },
    Region,
    Brand,
    ItemHeader { fields: ItemFields },
    Discount,
    Noise { kind: NoiseKind },
    FreeText,
}

impl LineRole {
    pub fn label(&self) -> &'static str {
        match self {
            LineRole::Skip { .. } => "skip",
            LineRole::Region => "region",
            LineRole::Brand => "brand",
            LineRole::ItemHeader { .. } => "item_header",
            LineRole::Discount => "discount",
            LineRole::Noise { .. } => "noise",
            LineRole::FreeText => "free_text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedLine {
    pub line: LogicalLine,
    pub role: LineRole,
    /// Physical lines absorbed; above one only for split item headers.
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub role: LineRole,
    pub line_count: usize,
    pub malformed_reason: Option<String>,
}

impl Classification {
    fn single(role: LineRole) -> Self {
        Self {
            role,
            line_count: 1,
            malformed_reason: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PageClassification {
    pub lines: Vec<ClassifiedLine>,
    pub unmatched_item_lines: Vec<UnmatchedItemLine>,
}

/// Assigns one role per logical line, first matching rule wins:
/// skip, region, brand, item header, discount, noise, free text.
#[derive(Debug)]
pub struct LineClassifier {
    calibration: Calibration,
    grammar: ItemGrammar,
    discount: Regex,
    marketing: Vec<Regex>,
}

impl LineClassifier {
    pub fn new(calibration: Calibration) -> Result<Self> {
        calibration.validate()?;

        let marketing = calibration
            .marketing_patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("(?i){pattern}"))
                    .with_context(|| format!("failed to compile marketing pattern: {pattern}"))
            })
            .collect::<Result<Vec<Regex>>>()?;

        Ok(Self {
            grammar: ItemGrammar::new()?,
            discount: Regex::new(
                r"(?i)^\$\d+(?:\.\d{2})?\s*on\s*\d+\s*cs\b(?:\s*:?\s*\d+\.\d{2}\s*/\s*\d+\.\d{2})?",
            )
            .context("failed to compile discount regex")?,
            marketing,
            calibration,
        })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn grammar(&self) -> &ItemGrammar {
        &self.grammar
    }

    pub fn is_discount(&self, text: &str) -> bool {
        self.discount.is_match(text.trim())
    }

    /// Classifies `lines[index]`, looking ahead only when an item header spans lines.
    pub fn classify(
        &self,
        lines: &[LogicalLine],
        index: usize,
        captions: &HashSet<String>,
    ) -> Classification {
        let Some(line) = lines.get(index) else {
            return Classification::single(LineRole::Noise {
                kind: NoiseKind::StrayField,
            });
        };
        let text = line.text.trim();

        if let Some(kind) = self.skip_kind(text, captions) {
            return Classification::single(LineRole::Skip { kind });
        }
        if let Some(role) = self.heading_role(line) {
            return Classification::single(role);
        }

        match self.grammar.match_at(lines, index, &self.calibration) {
            GrammarMatch::Matched {
                fields, line_count, ..
            } => {
                return Classification {
                    role: LineRole::ItemHeader { fields },
                    line_count,
                    malformed_reason: None,
                };
            }
            GrammarMatch::Malformed { reason } => {
                return Classification {
                    role: LineRole::Noise {
                        kind: NoiseKind::MalformedItem,
                    },
                    line_count: 1,
                    malformed_reason: Some(reason),
                };
            }
            GrammarMatch::NotItem => {}
        }

        if self.is_discount(text) {
            return Classification::single(LineRole::Discount);
        }
        if self.is_transparent_notice(text) {
            return Classification::single(LineRole::Noise {
                kind: NoiseKind::Badge,
            });
        }
        if self.marketing.iter().any(|pattern| pattern.is_match(text)) {
            return Classification::single(LineRole::Noise {
                kind: NoiseKind::Marketing,
            });
        }
        if self.grammar.is_field_fragment(text) {
            return Classification::single(LineRole::Noise {
                kind: NoiseKind::StrayField,
            });
        }

        Classification::single(LineRole::FreeText)
    }

    pub fn classify_page(
        &self,
        lines: &[LogicalLine],
        captions: &HashSet<String>,
    ) -> PageClassification {
        let mut page = PageClassification::default();
        let mut index = 0usize;

        while index < lines.len() {
            let classification = self.classify(lines, index, captions);
            let consumed = classification.line_count.max(1);
            let end = (index + consumed).min(lines.len());

            if let Some(reason) = classification.malformed_reason {
                debug!(page = lines[index].page, text = %lines[index].text, %reason, "unmatched item line");
                page.unmatched_item_lines.push(UnmatchedItemLine {
                    page: lines[index].page,
                    text: lines[index].text.clone(),
                    reason,
                });
            }

            page.lines.push(ClassifiedLine {
                line: merge_lines(&lines[index..end]),
                role: classification.role,
                line_count: end - index,
            });
            index = end;
        }

        page
    }

    fn skip_kind(&self, text: &str, captions: &HashSet<String>) -> Option<SkipKind> {
        if text.is_empty() {
            return Some(SkipKind::Token);
        }
        if self
            .calibration
            .boilerplate_phrases
            .iter()
            .any(|phrase| text.contains(phrase.as_str()))
        {
            return Some(SkipKind::Boilerplate);
        }
        if self
            .calibration
            .skip_tokens
            .iter()
            .any(|token| text.eq_ignore_ascii_case(token.trim()))
        {
            let transparent = self
                .calibration
                .lookback_transparent_tokens
                .iter()
                .any(|token| text.eq_ignore_ascii_case(token.trim()));
            return Some(if transparent {
                SkipKind::Badge
            } else {
                SkipKind::Token
            });
        }
        if !captions.is_empty() && captions.contains(&normalize_caption(text)) {
            return Some(SkipKind::RepeatedCaption);
        }
        None
    }

    fn is_transparent_notice(&self, text: &str) -> bool {
        let upper = text.to_uppercase();
        self.calibration
            .lookback_transparent_phrases
            .iter()
            .map(|phrase| phrase.trim().to_uppercase())
            .any(|phrase| !phrase.is_empty() && upper.contains(&phrase))
    }

    fn heading_role(&self, line: &LogicalLine) -> Option<LineRole> {
        if line.word_count() > self.calibration.heading_max_words {
            return None;
        }

        let largest = line.largest_font_size();
        if self
            .calibration
            .reaches(largest, self.calibration.region_font_size)
        {
            Some(LineRole::Region)
        } else if self
            .calibration
            .reaches(largest, self.calibration.brand_font_size)
        {
            Some(LineRole::Brand)
        } else {
            None
        }
    }
}

pub fn normalize_caption(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_ascii_lowercase()
}

fn merge_lines(lines: &[LogicalLine]) -> LogicalLine {
    let Some(first) = lines.first() else {
        return LogicalLine {
            page: 0,
            top: 0.0,
            text: String::new(),
            font_sizes: Vec::new(),
        };
    };
    if lines.len() == 1 {
        return first.clone();
    }

    let mut font_sizes = lines
        .iter()
        .flat_map(|line| line.font_sizes.iter().copied())
        .collect::<Vec<f32>>();
    font_sizes.sort_by(f32::total_cmp);
    font_sizes.dedup();

    LogicalLine {
        page: first.page,
        top: first.top,
        text: lines
            .iter()
            .map(|line| line.text.trim())
            .collect::<Vec<&str>>()
            .join(" "),
        font_sizes,
    }
}
