use super::*;

pub const UNKNOWN_REGION: &str = "[UNKNOWN REGION]";
pub const UNKNOWN_BRAND: &str = "[UNKNOWN BRAND]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub page: usize,
    pub region: Option<String>,
    pub brand: Option<String>,
    pub item_number: String,
    pub vintage: String,
    pub product_name: String,
    pub bottles_per_case: u32,
    pub bottle_size: String,
    pub case_price: String,
    pub bottle_price: Option<String>,
    pub discounts: Vec<String>,
    pub name_inferred: bool,
}

impl Record {
    fn from_fields(
        page: usize,
        fields: &ItemFields,
        context: &CarriedContext,
        name: ResolvedName,
    ) -> Self {
        // Single-bottle cases print only the case price.
        let bottle_price = match &fields.bottle_price {
            Some(price) => Some(price.clone()),
            None if fields.bottles_per_case == 1 => Some(fields.case_price.clone()),
            None => None,
        };

        Self {
            page,
            region: context.region.clone(),
            brand: context.brand.clone(),
            item_number: fields.item_number.clone(),
            vintage: fields.vintage.clone(),
            product_name: name.name,
            bottles_per_case: fields.bottles_per_case,
            bottle_size: fields.bottle_size.clone(),
            case_price: fields.case_price.clone(),
            bottle_price,
            discounts: Vec::new(),
            name_inferred: name.inferred,
        }
    }

    pub fn region_label(&self) -> &str {
        self.region.as_deref().unwrap_or(UNKNOWN_REGION)
    }

    pub fn brand_label(&self) -> &str {
        self.brand.as_deref().unwrap_or(UNKNOWN_BRAND)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StitcherState {
    /// No record is accepting discount lines.
    NoRecord,
    /// The latest record is open for a contiguous discount run.
    InRecord,
}

/// Region and brand in effect for the next item header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarriedContext {
    pub region: Option<String>,
    pub brand: Option<String>,
}

#[derive(Debug, Default)]
pub struct StitchOutcome {
    pub records: Vec<Record>,
    pub orphan_discounts: Vec<OrphanDiscount>,
}

/// Turns classified lines into records. One instance per document; context
/// carries across pages, lines do not.
#[derive(Debug)]
pub struct RecordStitcher {
    name_lookback_lines: usize,
    context: CarriedContext,
    names: NameResolver,
    state: StitcherState,
    outcome: StitchOutcome,
}

impl RecordStitcher {
    pub fn new(name_lookback_lines: usize) -> Self {
        Self {
            name_lookback_lines,
            context: CarriedContext::default(),
            names: NameResolver::default(),
            state: StitcherState::NoRecord,
            outcome: StitchOutcome::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> StitcherState {
        self.state
    }

    #[cfg(test)]
    pub fn context(&self) -> &CarriedContext {
        &self.context
    }

    pub fn consume_page(&mut self, lines: &[ClassifiedLine]) {
        for (index, classified) in lines.iter().enumerate() {
            let text = classified.line.text.trim();
            match &classified.role {
                LineRole::Region => {
                    self.context.region = Some(text.to_string());
                    self.state = StitcherState::NoRecord;
                }
                LineRole::Brand => {
                    self.context.brand = Some(text.to_string());
                    self.names.reset();
                    self.state = StitcherState::NoRecord;
                }
                LineRole::ItemHeader { fields } => {
                    let candidate = self.lookback_name(lines, index);
                    let name = self.names.resolve(&candidate);
                    let record =
                        Record::from_fields(classified.line.page, fields, &self.context, name);
                    debug!(
                        page = record.page,
                        item = %record.item_number,
                        name = %record.product_name,
                        inferred = record.name_inferred,
                        "opened record"
                    );
                    self.outcome.records.push(record);
                    self.state = StitcherState::InRecord;
                }
                LineRole::Discount => match (self.state, self.outcome.records.last_mut()) {
                    (StitcherState::InRecord, Some(record)) => {
                        record.discounts.push(text.to_string());
                    }
                    _ => {
                        self.outcome.orphan_discounts.push(OrphanDiscount {
                            page: classified.line.page,
                            text: text.to_string(),
                        });
                    }
                },
                LineRole::Skip { .. } | LineRole::Noise { .. } | LineRole::FreeText => {
                    self.state = StitcherState::NoRecord;
                }
            }
        }

        // Discount runs never continue onto the next page's first lines.
        self.state = StitcherState::NoRecord;
    }

    pub fn finish(self) -> StitchOutcome {
        self.outcome
    }

    /// Collects the contiguous free-text run directly above `index`.
    fn lookback_name(&self, lines: &[ClassifiedLine], index: usize) -> String {
        let start = index.saturating_sub(self.name_lookback_lines);
        let mut collected = Vec::<&str>::new();

        for classified in lines[start..index].iter().rev() {
            match classified.role {
                LineRole::FreeText => collected.push(classified.line.text.trim()),
                LineRole::Skip {
                    kind: SkipKind::Badge,
                }
                | LineRole::Noise {
                    kind: NoiseKind::Badge,
                } => continue,
                _ => break,
            }
        }

        collected.reverse();
        collected.join(" ")
    }
}
