use super::*;

/// Tunable thresholds and phrase sets for one family of price-list layouts.
///
/// Every field has a default taken from the Royal Wine calibration, so a
/// profile file only needs to name the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Case-sensitive substrings marking running headers, footers and contact lines.
    pub boilerplate_phrases: Vec<String>,
    /// Whole-line tokens (case-insensitive) that are skipped.
    pub skip_tokens: Vec<String>,
    /// Skip tokens the name lookback steps over instead of stopping at.
    pub lookback_transparent_tokens: Vec<String>,
    /// Case-insensitive substrings marking marketing notices the name lookback steps over.
    pub lookback_transparent_phrases: Vec<String>,
    /// Case-insensitive regexes for marketing qualifiers that are never product names.
    pub marketing_patterns: Vec<String>,
    pub region_font_size: f32,
    pub brand_font_size: f32,
    pub font_size_tolerance: f32,
    pub heading_max_words: usize,
    pub line_tolerance: f32,
    pub name_lookback_lines: usize,
    pub vintage_min_year: u16,
    pub vintage_max_year: u16,
    pub valid_bottles_per_case: Vec<u32>,
    /// Minimum pages an edge caption must repeat on before it is skipped; 0 disables.
    pub repeated_edge_min_pages: usize,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            boilerplate_phrases: [
                "ROYAL WINE CORP",
                "BEVERAGE MEDIA",
                "ORDER DEPT",
                "WWW.ROYALWINES.COM",
                "TEL:",
                "FAX:",
                "NASSAU",
            ]
            .iter()
            .map(|phrase| phrase.to_string())
            .collect(),
            skip_tokens: vec!["NEW".to_string()],
            lookback_transparent_tokens: vec!["NEW".to_string()],
            lookback_transparent_phrases: vec!["COMBINE".to_string()],
            marketing_patterns: vec![
                r"\bCOMBO\b".to_string(),
                r"\bCOMBINE\b".to_string(),
                r"\bGIFT\s+(?:PACK|BOX|SET)\b".to_string(),
                r"\b\d{2,3}\s*(?:PTS|POINTS)\b".to_string(),
                r"\b(?:GOLD|SILVER|BRONZE|DOUBLE\s+GOLD)\s+MEDAL\b".to_string(),
                r"\bBEST\s+(?:BUY|IN\s+SHOW)\b".to_string(),
            ],
            region_font_size: 21.95,
            brand_font_size: 11.04,
            font_size_tolerance: 0.05,
            heading_max_words: 8,
            line_tolerance: 1.0,
            name_lookback_lines: 9,
            vintage_min_year: 1900,
            vintage_max_year: 2099,
            valid_bottles_per_case: vec![1, 2, 3, 4, 6, 8, 12, 24],
            repeated_edge_min_pages: 3,
        }
    }
}

impl Calibration {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let calibration = match path {
            Some(path) => {
                let calibration: Calibration = read_json(path)?;
                info!(path = %path.display(), "loaded calibration profile");
                calibration
            }
            None => Calibration::default(),
        };
        Ok(calibration)
    }

    pub fn with_overrides(
        mut self,
        region_font_size: Option<f32>,
        brand_font_size: Option<f32>,
        name_lookback_lines: Option<usize>,
    ) -> Self {
        if let Some(size) = region_font_size {
            self.region_font_size = size;
        }
        if let Some(size) = brand_font_size {
            self.brand_font_size = size;
        }
        if let Some(lines) = name_lookback_lines {
            self.name_lookback_lines = lines;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.brand_font_size <= 0.0 {
            bail!("brand_font_size must be positive, got {}", self.brand_font_size);
        }
        if self.brand_font_size >= self.region_font_size {
            bail!(
                "brand_font_size ({}) must be below region_font_size ({})",
                self.brand_font_size,
                self.region_font_size
            );
        }
        if self.font_size_tolerance < 0.0 || self.line_tolerance <= 0.0 {
            bail!("font_size_tolerance must be >= 0 and line_tolerance must be > 0");
        }
        if self.name_lookback_lines == 0 {
            bail!("name_lookback_lines must be at least 1");
        }
        if self.vintage_min_year > self.vintage_max_year {
            bail!(
                "vintage year range is empty: {}..={}",
                self.vintage_min_year,
                self.vintage_max_year
            );
        }
        if self.valid_bottles_per_case.is_empty()
            || self.valid_bottles_per_case.iter().any(|count| *count == 0)
        {
            bail!("valid_bottles_per_case must list positive bottle counts");
        }
        for pattern in &self.marketing_patterns {
            Regex::new(pattern)
                .with_context(|| format!("invalid marketing pattern: {pattern}"))?;
        }
        Ok(())
    }

    pub(super) fn reaches(&self, largest_size: f32, threshold: f32) -> bool {
        largest_size + self.font_size_tolerance >= threshold
    }

    pub(super) fn vintage_in_range(&self, year: u16) -> bool {
        (self.vintage_min_year..=self.vintage_max_year).contains(&year)
    }

    pub(super) fn bottles_allowed(&self, count: u32) -> bool {
        self.valid_bottles_per_case.contains(&count)
    }
}
