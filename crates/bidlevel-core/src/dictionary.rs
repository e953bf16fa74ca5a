//! Synonym dictionaries that fold wording variants into one canonical scope name.
//!
//! A dictionary is immutable configuration: built once (bundled or from JSON) and
//! passed into the extractor and reconciler. Only Division 23 (HVAC) is bundled;
//! every other division gets the generic dictionary, which has word lists but no
//! synonym entries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One canonical scope name and the phrases that mean the same thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymEntry {
    pub canonical: String,
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDictionary {
    pub division: String,
    pub entries: Vec<SynonymEntry>,
    /// Dropped before fuzzy token comparison.
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,
    /// Manufacturer names; dropped before fuzzy token comparison.
    #[serde(default = "default_brand_words")]
    pub brand_words: Vec<String>,
}

impl ScopeDictionary {
    /// Generic dictionary for divisions without a bundled vocabulary.
    pub fn generic(division: &str) -> Self {
        Self {
            division: division.to_string(),
            entries: Vec::new(),
            stopwords: default_stopwords(),
            brand_words: default_brand_words(),
        }
    }

    /// Bundled Division 23 (HVAC) vocabulary.
    pub fn hvac() -> Self {
        let entries = HVAC_ENTRIES
            .iter()
            .map(|(canonical, synonyms)| SynonymEntry {
                canonical: canonical.to_string(),
                synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            })
            .collect();
        Self {
            division: "23".to_string(),
            entries,
            stopwords: default_stopwords(),
            brand_words: default_brand_words(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_generic(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map free text onto a canonical name.
    ///
    /// Matches whole-word phrases: the canonical name itself or any synonym appearing
    /// as a token sequence inside `text`. The longest matching phrase wins; ties go to
    /// the earlier entry.
    pub fn canonicalize(&self, text: &str) -> Option<&str> {
        let padded = format!(" {} ", token_string(text));
        if padded.trim().is_empty() {
            return None;
        }

        let mut best: Option<(&str, usize)> = None;
        for entry in &self.entries {
            let phrases = std::iter::once(&entry.canonical).chain(entry.synonyms.iter());
            for phrase in phrases {
                let needle = token_string(phrase);
                if needle.is_empty() || !padded.contains(&format!(" {needle} ")) {
                    continue;
                }
                let len = needle.len();
                if best.is_none_or(|(_, best_len)| len > best_len) {
                    best = Some((entry.canonical.as_str(), len));
                }
            }
        }
        best.map(|(canonical, _)| canonical)
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.iter().any(|w| w == token) || self.brand_words.iter().any(|w| w == token)
    }
}

/// Lowercase alphanumeric tokens joined by single spaces.
pub fn token_string(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Division key → dictionary, with a generic fallback.
#[derive(Debug, Clone, Default)]
pub struct DictionaryRegistry {
    by_division: HashMap<String, ScopeDictionary>,
}

impl DictionaryRegistry {
    /// Registry holding every bundled dictionary.
    pub fn bundled() -> Self {
        let mut registry = Self::default();
        registry.insert(ScopeDictionary::hvac());
        registry
    }

    pub fn insert(&mut self, dictionary: ScopeDictionary) {
        let key = division_key(&dictionary.division);
        self.by_division.insert(key, dictionary);
    }

    /// Dictionary for `division` (`"23"`, `"23 00 00"`, `"Division 23"`, `"230000"`…).
    pub fn for_division(&self, division: &str) -> ScopeDictionary {
        self.by_division
            .get(&division_key(division))
            .cloned()
            .unwrap_or_else(|| ScopeDictionary::generic(division))
    }
}

/// First two digits of a CSI division reference, or the lowercased text if none.
pub fn division_key(division: &str) -> String {
    let digits: String = division.chars().filter(|c| c.is_ascii_digit()).take(2).collect();
    if digits.len() == 2 {
        digits
    } else {
        division.trim().to_lowercase()
    }
}

fn default_stopwords() -> Vec<String> {
    [
        "a", "an", "and", "the", "of", "for", "to", "in", "on", "at", "with", "by", "per",
        "as", "or", "all", "new", "each", "install", "installation", "installed", "furnish",
        "furnished", "provide", "provided", "supply", "supplied", "complete", "including",
        "include", "includes", "throughout", "labor", "material", "materials", "work", "item",
        "items", "lot", "ls", "ea",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_brand_words() -> Vec<String> {
    [
        "trane", "carrier", "daikin", "lennox", "york", "mitsubishi", "greenheck", "titus",
        "honeywell", "siemens", "johnson", "jci", "aaon", "mcquay", "rheem", "goodman", "taco",
        "armstrong", "bell", "gossett", "krueger", "ruskin", "pennbarry", "loren", "cook",
        "fujitsu", "lg", "samsung", "distech", "alerton",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

const HVAC_ENTRIES: &[(&str, &[&str])] = &[
    (
        "HVAC equipment",
        &[
            "ahu", "ahus", "air handler", "air handlers", "air handling unit", "air handling units",
            "rtu", "rtus", "rooftop unit", "rooftop units", "packaged unit", "packaged units",
            "mechanical equipment", "hvac units",
        ],
    ),
    ("Ductwork", &["duct", "ducts", "ductwork", "duct work", "sheet metal", "supply duct", "return duct"]),
    ("Duct insulation", &["duct insulation", "duct wrap", "duct liner", "duct lining"]),
    ("Piping insulation", &["pipe insulation", "piping insulation", "pipe covering"]),
    (
        "Hydronic piping",
        &["hydronic", "hydronic piping", "chilled water piping", "hot water piping", "heating water piping", "chw piping", "hhw piping"],
    ),
    ("Refrigerant piping", &["refrigerant piping", "refrigerant lines", "refrigerant line", "line set", "line sets", "lineset", "linesets"]),
    ("Condensate drains", &["condensate", "condensate drain", "condensate drains", "condensate piping"]),
    (
        "Grilles, registers and diffusers",
        &["grille", "grilles", "register", "registers", "diffuser", "diffusers", "grd", "grds", "air devices", "air distribution devices"],
    ),
    ("Exhaust fans", &["exhaust fan", "exhaust fans", "inline fan", "inline fans", "ef"]),
    ("Fan coil units", &["fan coil", "fan coils", "fan coil unit", "fan coil units", "fcu", "fcus"]),
    ("VAV boxes", &["vav", "vavs", "vav box", "vav boxes", "terminal unit", "terminal units"]),
    ("Split systems", &["split system", "split systems", "mini split", "mini splits", "ductless", "vrf", "vrv"]),
    ("Boilers", &["boiler", "boilers"]),
    ("Chillers", &["chiller", "chillers"]),
    ("Pumps", &["pump", "pumps", "circulator", "circulators"]),
    ("Unit heaters", &["unit heater", "unit heaters", "cabinet heater", "cabinet heaters", "cuh"]),
    (
        "Controls",
        &["controls", "temperature controls", "bas", "bms", "building automation", "ddc", "thermostat", "thermostats", "energy management system", "ems"],
    ),
    (
        "Test and balance",
        &["test and balance", "testing and balancing", "testing adjusting and balancing", "tab", "air balance", "balancing"],
    ),
    ("Fire dampers", &["fire damper", "fire dampers", "smoke damper", "smoke dampers", "fire smoke damper", "fire smoke dampers"]),
    ("Louvers", &["louver", "louvers", "louvre", "louvres"]),
    ("Gas piping", &["gas piping", "natural gas piping", "gas pipe", "gas line", "gas lines"]),
    ("Startup and commissioning", &["startup", "start up", "commissioning", "cx", "functional testing"]),
    ("Permits", &["permit", "permits", "permit fees", "mechanical permit"]),
    ("Engineering and submittals", &["engineering", "submittals", "shop drawings", "design", "stamped drawings"]),
    ("Demolition", &["demo", "demolition", "removal of existing", "remove existing"]),
    ("Crane and rigging", &["crane", "rigging", "hoisting", "crane and rigging"]),
    ("Electrical connections", &["electrical", "power wiring", "line voltage wiring", "disconnect", "disconnects", "starters"]),
    ("Roof curbs", &["curb", "curbs", "roof curb", "roof curbs", "curb adapter", "curb adapters"]),
    ("Warranty", &["warranty", "warranties", "guarantee"]),
    ("Closeout documents", &["o m manuals", "o and m manuals", "operation and maintenance manuals", "as builts", "as built drawings", "training"]),
    ("Seismic restraints", &["seismic", "seismic restraints", "vibration isolation", "isolators"]),
    ("Kitchen hood exhaust", &["kitchen hood", "hood exhaust", "grease duct", "kitchen exhaust"]),
    ("Firestopping", &["firestopping", "fire stopping", "firesafing", "fire caulking"]),
    ("Cutting and patching", &["cutting", "patching", "cutting and patching", "core drilling", "coring"]),
    ("Equipment pads", &["housekeeping pad", "housekeeping pads", "concrete pad", "concrete pads", "equipment pad", "equipment pads"]),
    ("Temporary heating", &["temporary heat", "temporary heating", "temp heat"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_by_substring_synonym() {
        let dict = ScopeDictionary::hvac();
        assert_eq!(dict.canonicalize("40 ton AHU"), Some("HVAC equipment"));
        assert_eq!(dict.canonicalize("Install ductwork throughout"), Some("Ductwork"));
        assert_eq!(dict.canonicalize("ductwork"), Some("Ductwork"));
    }

    #[test]
    fn canonicalize_prefers_longest_phrase() {
        let dict = ScopeDictionary::hvac();
        assert_eq!(dict.canonicalize("Duct insulation 1.5in wrap"), Some("Duct insulation"));
        assert_eq!(dict.canonicalize("Fire/smoke dampers"), Some("Fire dampers"));
    }

    #[test]
    fn canonicalize_respects_word_boundaries() {
        let dict = ScopeDictionary::hvac();
        // "product" contains "duct" but not as a word.
        assert_eq!(dict.canonicalize("Product data sheets"), None);
        assert_eq!(dict.canonicalize(""), None);
    }

    #[test]
    fn registry_falls_back_to_generic() {
        let registry = DictionaryRegistry::bundled();
        assert!(!registry.for_division("23 00 00").is_generic());
        assert!(!registry.for_division("Division 23").is_generic());
        let plumbing = registry.for_division("22");
        assert!(plumbing.is_generic());
        assert_eq!(plumbing.canonicalize("ductwork"), None);
    }

    #[test]
    fn dictionary_from_json_defaults_word_lists() {
        let dict = ScopeDictionary::from_json(
            r#"{"division": "22", "entries": [{"canonical": "Water heaters", "synonyms": ["wh", "water heater"]}]}"#,
        )
        .unwrap();
        assert_eq!(dict.canonicalize("50 gal water heater"), Some("Water heaters"));
        assert!(dict.is_stopword("install"));
        assert!(dict.is_stopword("trane"));
    }

    #[test]
    fn division_keys() {
        assert_eq!(division_key("23 05 00"), "23");
        assert_eq!(division_key("Division 23 - HVAC"), "23");
        assert_eq!(division_key("HVAC"), "hvac");
    }
}
