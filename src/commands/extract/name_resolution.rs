pub const MISSING_NAME: &str = "[MISSING NAME]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub inferred: bool,
}

/// Decides product names for item headers, remembering the last name read
/// directly from text within the current brand.
#[derive(Debug, Default)]
pub struct NameResolver {
    last_known: Option<String>,
}

impl NameResolver {
    pub fn resolve(&mut self, candidate: &str) -> ResolvedName {
        let candidate = candidate.trim();
        if !candidate.is_empty() {
            self.last_known = Some(candidate.to_string());
            return ResolvedName {
                name: candidate.to_string(),
                inferred: false,
            };
        }

        ResolvedName {
            name: self
                .last_known
                .clone()
                .unwrap_or_else(|| MISSING_NAME.to_string()),
            inferred: true,
        }
    }

    pub fn reset(&mut self) {
        self.last_known = None;
    }
}
