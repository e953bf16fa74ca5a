//! Deterministic line heuristics: section detection, junk filtering, alternate
//! normalisation and candidate cleanup.
//!
//! Nothing here calls the oracle. Every rule is a regex in [`ExtractionRules`],
//! which callers build once and pass in, so tuning never touches code paths.

use regex::Regex;

use crate::model::{EvidenceFragment, Qualifications};
use crate::text::{
    capitalize_first, collapse_whitespace, find_dollar_amount, split_delimited,
    strip_dollar_amounts, truncate_chars,
};
use crate::CoreError;

/// Longest candidate kept, in characters.
pub const MAX_CANDIDATE_CHARS: usize = 150;
/// Shortest candidate kept, in characters.
pub const MIN_CANDIDATE_CHARS: usize = 3;

/// Bid-document section a line falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    None,
    Scope,
    Inclusions,
    Exclusions,
    Allowances,
    Alternates,
    Equipment,
    Services,
    Terms,
    Notes,
}

impl Section {
    /// Sections whose lines are harvested as scope candidates.
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Scope | Self::Inclusions | Self::Equipment)
    }
}

/// A priced alternate found in the text, sign already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternateLine {
    /// Normalised `Alternate: <description>` form.
    pub label: String,
    pub price: f64,
    pub source_line: String,
}

/// Shape of one line after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Blank,
    Header {
        section: Section,
        remainder: Option<String>,
    },
    Alternate(AlternateLine),
    TableRow(Vec<String>),
    Prose(String),
}

/// Everything the heuristics pulled out of one contractor's fragments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractorCandidates {
    pub contractor_id: String,
    /// Cleaned candidate lines, first-seen order, not yet canonicalised.
    pub lines: Vec<String>,
    pub alternates: Vec<AlternateLine>,
    /// Lines from inclusion/exclusion/allowance/alternate/terms/notes sections.
    pub hints: Qualifications,
}

const HEADER_KEYWORDS: &[(Section, &str)] = &[
    (
        Section::Exclusions,
        r"exclusions?|excluded|excludes|not included|items not included|we exclude|items excluded|work by others|by others|not in contract",
    ),
    (
        Section::Inclusions,
        r"inclusions?|included|includes|we include|work includes|items included",
    ),
    (
        Section::Scope,
        r"scope of work|scope|work included|base scope|scope summary|description of work",
    ),
    (Section::Allowances, r"allowances?"),
    (
        Section::Alternates,
        r"alternates|alternate pricing|alternate prices|add alternates|deduct alternates|voluntary alternates|options",
    ),
    (
        Section::Equipment,
        r"equipment|equipment list|equipment schedule|equipment summary|major equipment",
    ),
    (Section::Services, r"services|maintenance services"),
    (
        Section::Terms,
        r"payment terms|terms and conditions|terms|payment|retainage|billing",
    ),
    (
        Section::Notes,
        r"notes|general notes|clarifications|qualifications|conditions|general conditions|fine print",
    ),
];

const CONTACT_DENY: &[&str] = &[
    r"[\w.+-]+@[\w-]+\.[\w.]+",
    r"(?i)\bwww\.|https?://",
    r"\(?\b\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b",
    r"(?i)^(phone|tel|telephone|fax|cell|mobile|office)\b",
    r"(?i)^\d{2,6}\s+(\w+\s+){0,4}(st|street|ave|avenue|rd|road|blvd|boulevard|dr|drive|suite|ste|ln|lane|way|pkwy|parkway|hwy|highway)\b\.?",
    r"\b[A-Z]{2}\s+\d{5}(-\d{4})?\b",
    r"(?i)\b(license|licence|lic)\.?\s*(no\.?|#|number)",
    r"(?i)^(dear|to whom|attn|attention|re:|subject:|sincerely|regards|respectfully|thank you|thanks|best regards|yours truly|cc:|from:|to:|date:|project:|bid date|job name|job #|estimator)",
];

const HARD_DENY: &[&str] = &[
    // references to other documents
    r"(?i)\bpage\s+\d+(\s+of\s+\d+)?\b",
    r"(?i)^(sheet|page)\s+[a-z]{0,2}-?\d",
    r"(?i)\baddend(um|a)\s*(no\.?|#)?\s*\d",
    r"(?i)\b(drawings?|dwgs?|plans|specifications|specs)\s+(dated|list|index|issued)\b",
    r"(?i)^(based on|per|reference|ref\.?|in accordance with)\b.*\b(drawings?|plans|specifications|specs)\b",
    // totals
    r"(?i)\b(base bid|total amount|total price|grand total|sub-?total|total bid|bid amount|contract sum|lump sum total|total cost)\b",
    r"(?i)^total\b",
];

const SOFT_DENY: &[&str] = &[
    r"(?i)^(we|our|this|these|thank|please|should you|if you|the above|pricing|prices|this proposal|this quote|quotation|proposal)\b",
    r"(?i)\b(valid for|days from|hesitate|pleased to|look forward|opportunity to|do not include|subject to)\b",
];

const ALLOW: &[&str] = &[
    r"(?i)^(furnish|install|provide|supply|replace|relocate|connect|remove)\b",
    r"(?i)^we (will )?(furnish|install|provide|supply)\b",
];

const HEADER_CELL_WORDS: &[&str] = &[
    "item", "items", "description", "qty", "quantity", "unit", "units", "price", "amount",
    "total", "cost", "status", "notes", "included", "excluded", "no", "#", "ref", "uom",
];

#[derive(Debug, Clone)]
struct HeaderRule {
    section: Section,
    qualified: Regex,
    bare: Regex,
    inline: Regex,
}

/// Compiled allow/deny tables and section keywords.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    headers: Vec<HeaderRule>,
    contact: Vec<Regex>,
    hard_deny: Vec<Regex>,
    soft_deny: Vec<Regex>,
    allow: Vec<Regex>,
    alternate_keyword: Regex,
    alternate_prefix: Regex,
    deduct: Regex,
    enumerator: Regex,
    scope_verb_prefix: Regex,
    status_suffix: Regex,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        let headers = HEADER_KEYWORDS
            .iter()
            .map(|(section, keywords)| {
                HeaderRule {
                    section: *section,
                    qualified: compile(&format!(r"(?i)^(?:[a-z/&]+\s+){{0,2}}(?:{keywords})\s*:?$")),
                    bare: compile(&format!(r"(?i)^(?:{keywords})$")),
                    inline: compile(&format!(r"(?i)^(?:{keywords})\s*:\s*(.+)$")),
                }
            })
            .collect();

        Self {
            headers,
            contact: CONTACT_DENY.iter().map(|p| compile(p)).collect(),
            hard_deny: HARD_DENY.iter().map(|p| compile(p)).collect(),
            soft_deny: SOFT_DENY.iter().map(|p| compile(p)).collect(),
            allow: ALLOW.iter().map(|p| compile(p)).collect(),
            alternate_keyword: compile(r"(?i)\balt(ernate)?s?\b\.?"),
            alternate_prefix: compile(
                r"(?i)^(?:(?:add|deduct|credit|voluntary)\s+)?alt(?:ernate)?\b\.?\s*(?:#|no\.?)?\s*\d*\s*(?:\(\s*(?:add|deduct|credit)\s*\))?\s*(?:[:\-–.]\s*)?(?:(?:add|deduct|credit)\b\s*[:\-–]?\s*)?",
            ),
            deduct: compile(r"(?i)\b(deduct|credit|delete)\b"),
            enumerator: compile(
                r"^\s*(?:[-•*·▪–]+\s*|\(\d{1,3}\)\s*|\d{1,3}[.)]\s+|\d{1,3}(?:\.\d{1,3}){2,}\.?\s+|\d{1,3}\.\d{1,3}\.\s+|\(?[a-zA-Z][.)]\s+|\([ivxIVX]{1,4}\)\s*|[ivxIVX]{1,4}\.\s+)",
            ),
            scope_verb_prefix: compile(
                r"(?i)^(?:we\s+(?:will\s+)?)?(?:(?:furnish|provide|supply)\s+(?:and|&)\s+install|furnish|install|provide|supply)\s+(?:(?:new|all|the)\s+)?",
            ),
            status_suffix: compile(
                r"(?i)\s*[:\-–=]\s*(included|incl\.?|excluded|excl\.?|by others|not included|nic|n/a|yes|no)\b.*$",
            ),
        }
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in extraction pattern compiles")
}

impl ExtractionRules {
    /// Add a deny pattern that always drops matching lines.
    pub fn with_deny(mut self, pattern: &str) -> Result<Self, CoreError> {
        self.hard_deny.push(try_compile(pattern)?);
        Ok(self)
    }

    /// Add an allow pattern that rescues lines from the narrative filter.
    pub fn with_allow(mut self, pattern: &str) -> Result<Self, CoreError> {
        self.allow.push(try_compile(pattern)?);
        Ok(self)
    }

    /// Strip a leading enumerator (`1.`, `a.`, `(i)`, bullets) once.
    pub fn strip_enumerator<'a>(&self, line: &'a str) -> &'a str {
        match self.enumerator.find(line) {
            Some(m) => line[m.end()..].trim(),
            None => line.trim(),
        }
    }

    /// Section header on this line, with any inline content after a colon.
    pub fn detect_header(&self, line: &str) -> Option<(Section, Option<String>)> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.len() > 80 {
            return None;
        }
        let ends_with_colon = trimmed.ends_with(':');
        let shouting = trimmed.chars().any(|c| c.is_alphabetic())
            && !trimmed.chars().any(|c| c.is_lowercase());

        for rule in &self.headers {
            if rule.qualified.is_match(trimmed) {
                // Qualified headers ("HVAC Equipment") need a colon or capitals.
                let bare = trimmed.trim_end_matches(':').trim();
                if ends_with_colon || shouting || rule.bare.is_match(bare) {
                    return Some((rule.section, None));
                }
            }
            if let Some(caps) = rule.inline.captures(trimmed) {
                let rest = caps[1].trim().to_string();
                return Some((rule.section, (!rest.is_empty()).then_some(rest)));
            }
        }
        None
    }

    /// Letterhead, addresses, phone numbers and correspondence boilerplate.
    pub fn is_contact_noise(&self, line: &str) -> bool {
        self.contact.iter().any(|re| re.is_match(line.trim()))
    }

    /// True when a line is letterhead, contact info, a document reference, a
    /// totals line, or narrative prose rather than scope.
    pub fn is_junk(&self, line: &str) -> bool {
        let letters = line.chars().filter(|c| c.is_alphabetic()).count();
        if letters < MIN_CANDIDATE_CHARS {
            return true;
        }
        if self.is_contact_noise(line) || self.hard_deny.iter().any(|re| re.is_match(line)) {
            return true;
        }
        let allowed = self.allow.iter().any(|re| re.is_match(line));
        if allowed {
            return false;
        }
        if self.soft_deny.iter().any(|re| re.is_match(line)) {
            return true;
        }
        line.split_whitespace().count() > 30
    }

    /// Parse a priced alternate. `section` lets unlabelled priced lines under an
    /// "Alternates" header count too.
    pub fn parse_alternate(&self, line: &str, section: Section) -> Option<AlternateLine> {
        let labelled = self.alternate_keyword.is_match(line);
        if !labelled && section != Section::Alternates {
            return None;
        }
        let amount = find_dollar_amount(line)?;
        let sign = if self.deduct.is_match(line) { -1.0 } else { 1.0 };

        let without_amounts = strip_dollar_amounts(line);
        let description = self.alternate_prefix.replace(&without_amounts, "");
        let description = description
            .trim()
            .trim_matches(|c: char| matches!(c, '.' | ':' | '-' | '–' | '=' | ',' | ';'))
            .trim();
        let description = if description.is_empty() {
            "unspecified".to_string()
        } else {
            truncate_chars(&capitalize_first(description), MAX_CANDIDATE_CHARS)
        };

        Some(AlternateLine {
            label: format!("Alternate: {description}"),
            price: sign * amount,
            source_line: line.to_string(),
        })
    }

    /// Classify one raw line in the context of the current section.
    pub fn classify(&self, raw: &str, section: Section) -> LineKind {
        let collapsed = collapse_whitespace(raw);
        if collapsed.is_empty() {
            return LineKind::Blank;
        }
        let line = self.strip_enumerator(&collapsed);
        if let Some(alternate) = self.parse_alternate(line, section) {
            return LineKind::Alternate(alternate);
        }
        if let Some((section, remainder)) = self.detect_header(line) {
            return LineKind::Header { section, remainder };
        }
        let cells: Vec<String> = split_delimited(line)
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect();
        if cells.len() >= 2 {
            LineKind::TableRow(cells)
        } else {
            LineKind::Prose(line.to_string())
        }
    }

    /// Cleanup for a candidate: enumerators, scope verbs, status suffixes,
    /// whitespace, capitalisation and length limits.
    pub fn clean_candidate(&self, raw: &str) -> Option<String> {
        let collapsed = collapse_whitespace(raw);
        let stripped = self.strip_enumerator(&collapsed);
        let without_status = self.status_suffix.replace(stripped, "");
        let without_verb = self.scope_verb_prefix.replace(without_status.trim(), "");
        let trimmed = without_verb
            .trim()
            .trim_matches(|c: char| matches!(c, '.' | ':' | ';' | ',' | '-' | '–' | '*'))
            .trim();
        if trimmed.chars().count() < MIN_CANDIDATE_CHARS {
            return None;
        }
        Some(truncate_chars(&capitalize_first(trimmed), MAX_CANDIDATE_CHARS))
    }

    /// Status wording hung off a line (`Ductwork: excluded`), if any.
    pub fn trailing_status(&self, line: &str) -> Option<&'static str> {
        let caps = self.status_suffix.captures(line)?;
        let word = caps[1].to_ascii_lowercase();
        match word.as_str() {
            "included" | "incl" | "incl." | "yes" => Some("included"),
            "excluded" | "excl" | "excl." | "by others" | "not included" | "nic" | "no" => {
                Some("excluded")
            }
            _ => None,
        }
    }

    /// Harvest candidates, alternates and structured hints from one contractor.
    pub fn harvest(
        &self,
        contractor_id: &str,
        fragments: &[EvidenceFragment],
    ) -> ContractorCandidates {
        let mut out = ContractorCandidates {
            contractor_id: contractor_id.to_string(),
            ..Default::default()
        };

        for fragment in fragments {
            let mut section = Section::None;
            for raw in fragment.raw_text.lines() {
                match self.classify(raw, section) {
                    LineKind::Blank => {}
                    LineKind::Alternate(alternate) => {
                        push_unique(&mut out.hints.alternates, &alternate.source_line);
                        if !out.alternates.iter().any(|a| a.label == alternate.label) {
                            out.alternates.push(alternate);
                        }
                    }
                    LineKind::Header { section: next, remainder } => {
                        section = next;
                        if let Some(rest) = remainder {
                            self.take_content(&rest, section, &mut out);
                        }
                    }
                    LineKind::TableRow(_) | LineKind::Prose(_) => {
                        let collapsed = collapse_whitespace(raw);
                        let line = self.strip_enumerator(&collapsed);
                        self.take_content(line, section, &mut out);
                    }
                }
            }
        }
        out
    }

    fn take_content(&self, line: &str, section: Section, out: &mut ContractorCandidates) {
        if self.is_junk(line) {
            return;
        }
        let hint = truncate_chars(line, MAX_CANDIDATE_CHARS);
        match section {
            Section::Inclusions => push_unique(&mut out.hints.includes, &hint),
            Section::Exclusions => push_unique(&mut out.hints.excludes, &hint),
            Section::Allowances => push_unique(&mut out.hints.allowances, &hint),
            Section::Alternates => push_unique(&mut out.hints.alternates, &hint),
            Section::Terms => push_unique(&mut out.hints.payment_terms, &hint),
            Section::Notes => push_unique(&mut out.hints.fine_print, &hint),
            _ => match self.trailing_status(line) {
                Some("included") => push_unique(&mut out.hints.includes, &hint),
                Some("excluded") => push_unique(&mut out.hints.excludes, &hint),
                _ => {}
            },
        }

        let cells: Vec<String> = split_delimited(line)
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect();
        let table_like = cells.len() >= 2;
        if !section.is_positive() && !table_like {
            return;
        }

        let source = if table_like {
            match pick_description_cell(&cells) {
                Some(cell) => cell,
                None => return,
            }
        } else {
            line.to_string()
        };
        if self.is_junk(&source) {
            return;
        }
        if let Some(candidate) = self.clean_candidate(&source) {
            push_unique(&mut out.lines, &candidate);
        }
    }
}

fn try_compile(pattern: &str) -> Result<Regex, CoreError> {
    Regex::new(pattern).map_err(|source| CoreError::InvalidRule {
        pattern: pattern.to_string(),
        source,
    })
}

/// First cell that reads like a description rather than a number, unit or header.
fn pick_description_cell(cells: &[String]) -> Option<String> {
    let header_cells = cells
        .iter()
        .filter(|c| HEADER_CELL_WORDS.contains(&c.to_lowercase().trim()))
        .count();
    if header_cells * 2 >= cells.len() {
        return None;
    }
    cells
        .iter()
        .find(|cell| {
            let letters = cell.chars().filter(|c| c.is_alphabetic()).count();
            let digits = cell.chars().filter(|c| c.is_ascii_digit()).count();
            letters >= MIN_CANDIDATE_CHARS && letters > digits && !cell.contains('$')
        })
        .cloned()
}

fn push_unique(target: &mut Vec<String>, value: &str) {
    let key = value.trim().to_lowercase();
    if key.is_empty() {
        return;
    }
    if !target.iter().any(|t| t.to_lowercase() == key) {
        target.push(value.trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ExtractionRules {
        ExtractionRules::default()
    }

    #[test]
    fn headers_detected() {
        let r = rules();
        assert_eq!(r.detect_header("Exclusions:"), Some((Section::Exclusions, None)));
        assert_eq!(r.detect_header("SCOPE OF WORK"), Some((Section::Scope, None)));
        assert_eq!(r.detect_header("Inclusions"), Some((Section::Inclusions, None)));
        assert_eq!(r.detect_header("Items not included:"), Some((Section::Exclusions, None)));
        assert_eq!(
            r.detect_header("Exclusions: asbestos abatement"),
            Some((Section::Exclusions, Some("asbestos abatement".into())))
        );
        assert_eq!(r.detect_header("Install new equipment"), None);
        assert_eq!(r.detect_header("Ductwork: excluded, by others"), None);
    }

    #[test]
    fn junk_filter_drops_business_prose() {
        let r = rules();
        assert!(r.is_junk("estimating@acmemech.com"));
        assert!(r.is_junk("Phone: (555) 123-4567"));
        assert!(r.is_junk("1234 Industrial Blvd, Suite 200"));
        assert!(r.is_junk("Springfield, IL 62704"));
        assert!(r.is_junk("Contractor License No. 123456"));
        assert!(r.is_junk("Sincerely,"));
        assert!(r.is_junk("Page 2 of 5"));
        assert!(r.is_junk("Based on drawings M-101 through M-402 and specifications"));
        assert!(r.is_junk("Base Bid: $482,000"));
        assert!(r.is_junk("Total Amount $1,200,000"));
        assert!(r.is_junk("We are pleased to submit our proposal for the above project"));
        assert!(r.is_junk("This proposal is valid for 30 days"));
        assert!(r.is_junk("12"));
    }

    #[test]
    fn junk_filter_keeps_scope_lines() {
        let r = rules();
        assert!(!r.is_junk("Ductwork"));
        assert!(!r.is_junk("Install ductwork throughout"));
        assert!(!r.is_junk("Rooftop units (3) with curbs"));
        assert!(!r.is_junk("We will furnish and install VAV boxes"));
        assert!(!r.is_junk("Test and balance"));
    }

    #[test]
    fn contact_noise_is_narrower_than_junk() {
        let r = rules();
        assert!(r.is_contact_noise("Phone: (555) 123-4567"));
        assert!(r.is_contact_noise("Sincerely,"));
        assert!(!r.is_contact_noise("Base Bid: $482,000"));
        assert!(!r.is_contact_noise("Ductwork: excluded, by others"));
    }

    #[test]
    fn alternate_signs() {
        let r = rules();
        let deduct = r
            .parse_alternate("DEDUCT ALTERNATE #2 - Delete controls upgrade $4,200", Section::None)
            .unwrap();
        assert_eq!(deduct.price, -4200.0);
        assert_eq!(deduct.label, "Alternate: Delete controls upgrade");

        let add = r
            .parse_alternate("ADD ALTERNATE #1: VFDs on heating pumps ... $7,600", Section::None)
            .unwrap();
        assert_eq!(add.price, 7600.0);
        assert_eq!(add.label, "Alternate: VFDs on heating pumps");
    }

    #[test]
    fn alternate_requires_amount_and_label() {
        let r = rules();
        assert!(r.parse_alternate("Alternates are not included", Section::None).is_none());
        assert!(r.parse_alternate("Premium filters $900", Section::None).is_none());
        let under_header = r
            .parse_alternate("Premium filters $900", Section::Alternates)
            .unwrap();
        assert_eq!(under_header.price, 900.0);
        assert_eq!(under_header.label, "Alternate: Premium filters");
    }

    #[test]
    fn enumerators_stripped() {
        let r = rules();
        assert_eq!(r.strip_enumerator("1. Ductwork"), "Ductwork");
        assert_eq!(r.strip_enumerator("a. Ductwork"), "Ductwork");
        assert_eq!(r.strip_enumerator("(iv) Ductwork"), "Ductwork");
        assert_eq!(r.strip_enumerator("2.3.1 Ductwork"), "Ductwork");
        assert_eq!(r.strip_enumerator("• Ductwork"), "Ductwork");
        assert_eq!(r.strip_enumerator("40 ton AHU"), "40 ton AHU");
        assert_eq!(r.strip_enumerator("1.5 ton split system"), "1.5 ton split system");
    }

    #[test]
    fn candidate_cleanup() {
        let r = rules();
        assert_eq!(r.clean_candidate("  3.  furnish and install   ductwork."), Some("Ductwork".into()));
        assert_eq!(r.clean_candidate("Ductwork: excluded"), Some("Ductwork".into()));
        assert_eq!(r.clean_candidate("ab"), None);
        let long = "x".repeat(400);
        assert_eq!(r.clean_candidate(&long).unwrap().chars().count(), MAX_CANDIDATE_CHARS);
    }

    #[test]
    fn harvest_only_positive_sections_or_tables() {
        let r = rules();
        let text = "\
Acme Mechanical
1234 Industrial Blvd
Scope of Work:
1. Rooftop units
2. Ductwork and grilles
Boiler, qty 2, $84,000
Exclusions:
Asbestos abatement
Temporary heat
Notes:
Pricing assumes normal working hours
Install ductwork in phase 2";
        let harvested = r.harvest("acme", &[EvidenceFragment::new("bid.pdf p.1", text)]);
        assert_eq!(
            harvested.lines,
            vec!["Rooftop units", "Ductwork and grilles", "Boiler"]
        );
        assert_eq!(harvested.hints.excludes, vec!["Asbestos abatement", "Temporary heat"]);
        assert_eq!(harvested.hints.fine_print, vec!["Install ductwork in phase 2"]);
    }

    #[test]
    fn harvest_table_like_status_line() {
        let r = rules();
        let frag = EvidenceFragment::new("b.pdf p.1", "Ductwork: excluded, by others");
        let harvested = r.harvest("b", &[frag]);
        assert_eq!(harvested.lines, vec!["Ductwork"]);
        assert_eq!(harvested.hints.excludes, vec!["Ductwork: excluded, by others"]);
    }

    #[test]
    fn harvest_collects_alternates() {
        let r = rules();
        let frag = EvidenceFragment::new(
            "bid.pdf p.3",
            "ADD ALTERNATE #1: VFDs on heating pumps $7,600\nDEDUCT ALTERNATE #2 - Delete controls upgrade $4,200",
        );
        let harvested = r.harvest("acme", &[frag]);
        assert_eq!(harvested.alternates.len(), 2);
        assert_eq!(harvested.hints.alternates.len(), 2);
        assert!(harvested.lines.is_empty());
    }

    #[test]
    fn spreadsheet_header_rows_skipped() {
        let r = rules();
        let frag = EvidenceFragment::new(
            "pricing.xlsx [Sheet1]",
            "Item,Description,Qty,Price\n1,Exhaust fans,4,\"$6,400\"",
        );
        let harvested = r.harvest("c", &[frag]);
        assert_eq!(harvested.lines, vec!["Exhaust fans"]);
    }

    #[test]
    fn custom_rules_compile_or_error() {
        assert!(rules().with_deny(r"(?i)\bbond\b").is_ok());
        assert!(matches!(
            rules().with_allow("("),
            Err(CoreError::InvalidRule { .. })
        ));
    }
}
