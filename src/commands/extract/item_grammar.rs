use super::*;

const ITEM_NUMBER: &str = r"\d{5}";
const VINTAGE: &str = r"\d{4}|(?i:NV)";
/// No leading zero, so the parsed count prints back exactly as read.
const BOTTLES: &str = r"[1-9]\d{0,2}";
const BOTTLE_SIZE: &str = r"\d+(?:\.\d+)?(?:\s?[A-Za-z]+)?";
const PRICE: &str = r"\d+\.\d{2}";

/// Maximum number of physical lines one item header may be spread over.
pub const MAX_ITEM_HEADER_LINES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFields {
    pub item_number: String,
    pub vintage: String,
    pub bottles_per_case: u32,
    pub bottle_size: String,
    pub case_price: String,
    pub bottle_price: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarStrategy {
    /// All fields already sit on the item-number line.
    Merged,
    /// Fields continue over the following lines.
    Split,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarMatch {
    Matched {
        fields: ItemFields,
        line_count: usize,
        strategy: GrammarStrategy,
    },
    Malformed {
        reason: String,
    },
    NotItem,
}

#[derive(Debug)]
pub struct ItemGrammar {
    item_prefix: Regex,
    full_header: Regex,
    field_tokens: Regex,
}

impl ItemGrammar {
    pub fn new() -> Result<Self> {
        Ok(Self {
            item_prefix: Regex::new(&format!(r"^{ITEM_NUMBER}(?:\s|$)"))
                .context("failed to compile item number prefix regex")?,
            full_header: Regex::new(&format!(
                r"^(?P<item>{ITEM_NUMBER})\s+(?P<vintage>{VINTAGE})\s+(?P<bottles>{BOTTLES})\s*/\s*(?P<size>{BOTTLE_SIZE})\s+(?P<case>{PRICE})(?:\s+(?P<bottle>{PRICE}))?$"
            ))
            .context("failed to compile item header regex")?,
            field_tokens: Regex::new(&format!(
                r"^(?:(?:{VINTAGE}|\d{{1,3}}\s*/\s*{BOTTLE_SIZE}|{PRICE})(?:\s+|$))+$"
            ))
            .context("failed to compile item field token regex")?,
        })
    }

    /// Whether the line starts with a 5-digit item number.
    pub fn looks_like_item(&self, text: &str) -> bool {
        self.item_prefix.is_match(text.trim())
    }

    /// Whether the line only holds vintage, case-configuration or price tokens.
    pub fn is_field_fragment(&self, text: &str) -> bool {
        self.field_tokens.is_match(text.trim())
    }

    /// Matches the item grammar starting at `lines[index]`.
    ///
    /// The merged strategy is tried first; the split strategy then joins up to
    /// [`MAX_ITEM_HEADER_LINES`] consecutive lines and keeps the longest window that
    /// parses, so a trailing bottle price on its own line is still picked up.
    pub fn match_at(
        &self,
        lines: &[LogicalLine],
        index: usize,
        calibration: &Calibration,
    ) -> GrammarMatch {
        let Some(first) = lines.get(index) else {
            return GrammarMatch::NotItem;
        };
        if !self.looks_like_item(&first.text) {
            return GrammarMatch::NotItem;
        }

        if let Some(captures) = self.full_header.captures(first.text.trim()) {
            return validate_fields(&captures, 1, GrammarStrategy::Merged, calibration);
        }

        let window_end = (index + MAX_ITEM_HEADER_LINES).min(lines.len());
        let mut joined = first.text.trim().to_string();
        let mut best = None;
        for (offset, line) in lines[index + 1..window_end].iter().enumerate() {
            joined.push(' ');
            joined.push_str(line.text.trim());
            if let Some(captures) = self.full_header.captures(&joined) {
                best = Some(validate_fields(
                    &captures,
                    offset + 2,
                    GrammarStrategy::Split,
                    calibration,
                ));
            }
        }

        best.unwrap_or_else(|| GrammarMatch::Malformed {
            reason: "item number without a complete vintage, case configuration and price"
                .to_string(),
        })
    }
}

fn validate_fields(
    captures: &regex::Captures<'_>,
    line_count: usize,
    strategy: GrammarStrategy,
    calibration: &Calibration,
) -> GrammarMatch {
    let capture = |name: &str| {
        captures
            .name(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    let vintage = capture("vintage");
    if !vintage.eq_ignore_ascii_case("NV") {
        match vintage.parse::<u16>() {
            Ok(year) if calibration.vintage_in_range(year) => {}
            _ => {
                return GrammarMatch::Malformed {
                    reason: format!(
                        "vintage {vintage} outside {}..={}",
                        calibration.vintage_min_year, calibration.vintage_max_year
                    ),
                };
            }
        }
    }

    let bottles_raw = capture("bottles");
    let bottles_per_case = match bottles_raw.parse::<u32>() {
        Ok(count) if calibration.bottles_allowed(count) => count,
        _ => {
            return GrammarMatch::Malformed {
                reason: format!("bottles per case {bottles_raw} not in calibrated set"),
            };
        }
    };

    GrammarMatch::Matched {
        fields: ItemFields {
            item_number: capture("item"),
            vintage,
            bottles_per_case,
            bottle_size: capture("size"),
            case_price: capture("case"),
            bottle_price: captures.name("bottle").map(|m| m.as_str().to_string()),
        },
        line_count,
        strategy,
    }
}
