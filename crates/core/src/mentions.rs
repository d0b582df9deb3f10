use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Persistence cap applied per document by the coordinator.
pub const DEFAULT_MENTION_CAP: usize = 50;

/// Context captured on each side of a match, in bytes, clipped to char
/// boundaries and to the text bounds.
const CONTEXT_WINDOW: usize = 100;

/// Names tracked by the research portal. The catalog ships compiled in but
/// can be replaced wholesale from a JSON list, so updates do not require a
/// rebuild.
const DEFAULT_NOTABLE_NAMES: [&str; 30] = [
    "Bill Gates",
    "Donald Trump",
    "Bill Clinton",
    "Hillary Clinton",
    "Prince Andrew",
    "Alan Dershowitz",
    "Ghislaine Maxwell",
    "Les Wexner",
    "Stephen Hawking",
    "Elon Musk",
    "Kevin Spacey",
    "Chris Tucker",
    "Naomi Campbell",
    "Jean-Luc Brunel",
    "Ehud Barak",
    "Larry Summers",
    "Leon Black",
    "Marvin Minsky",
    "Reid Hoffman",
    "George Mitchell",
    "Glenn Dubin",
    "Eva Dubin",
    "Sarah Kellen",
    "Nadia Marcinkova",
    "Virginia Giuffre",
    "Virginia Roberts",
    "Jeffrey Epstein",
    "Palm Beach",
    "Little St. James",
    "Zorro Ranch",
];

/// A single occurrence of a catalog name within a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionHit {
    pub name: String,
    pub normalized_name: String,
    pub context: String,
}

/// The list of names scanned for during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionCatalog {
    names: Vec<String>,
}

impl Default for MentionCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_NOTABLE_NAMES.iter().map(|name| name.to_string()).collect())
    }
}

impl MentionCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names: names.into_iter().filter(|name| !name.trim().is_empty()).collect(),
        }
    }

    /// Load a catalog from a JSON array of names.
    pub fn from_json_file(path: &Path) -> Result<Self, IngestError> {
        let raw = fs::read_to_string(path)?;
        let names: Vec<String> = serde_json::from_str(&raw)
            .map_err(|error| IngestError::InvalidConfig(format!(
                "names file {}: {error}",
                path.display()
            )))?;
        Ok(Self::new(names))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Scan `text` for every catalog name, case-insensitively, advancing one
    /// position past each match start so adjacent occurrences are all
    /// captured. The caller caps the total before persistence.
    pub fn find_mentions(&self, text: &str) -> Vec<MentionHit> {
        let mut hits = Vec::new();

        for name in &self.names {
            let normalized = name.to_lowercase();
            let mut from = 0;
            while let Some(at) = find_ignore_ascii_case(text, name, from) {
                let start = floor_char_boundary(text, at.saturating_sub(CONTEXT_WINDOW));
                let end =
                    ceil_char_boundary(text, (at + name.len() + CONTEXT_WINDOW).min(text.len()));
                hits.push(MentionHit {
                    name: name.clone(),
                    normalized_name: normalized.clone(),
                    context: text[start..end].trim().to_string(),
                });
                from = at + 1;
            }
        }

        hits
    }
}

/// Byte offset of the next ASCII-case-insensitive occurrence of `needle` at
/// or after `from`. Catalog names are ASCII, so offsets stay aligned with
/// the original text.
fn find_ignore_ascii_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let haystack_bytes = haystack.as_bytes();
    let needle_bytes = needle.as_bytes();
    if needle_bytes.is_empty() || haystack_bytes.len() < needle_bytes.len() {
        return None;
    }

    (from..=haystack_bytes.len() - needle_bytes.len()).find(|&at| {
        haystack.is_char_boundary(at)
            && haystack_bytes[at..at + needle_bytes.len()].eq_ignore_ascii_case(needle_bytes)
    })
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn finds_name_with_surrounding_context() {
        let text = "The guest list shows that several people attended with Bill Gates at the \
                    event in question, according to the deposition transcript.";
        let hits = MentionCatalog::default().find_mentions(text);

        let gates: Vec<&MentionHit> =
            hits.iter().filter(|hit| hit.name == "Bill Gates").collect();
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].normalized_name, "bill gates");
        assert!(gates[0].context.contains("Bill Gates"));
        assert!(gates[0].context.len() <= "Bill Gates".len() + 2 * 100 + 2);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let text = "a letter addressed to BILL GATES and signed by the staff of the foundation";
        let hits = MentionCatalog::default().find_mentions(text);
        assert!(hits.iter().any(|hit| hit.name == "Bill Gates"));
        // The canonical display name comes from the catalog, not the text.
        assert!(hits.iter().all(|hit| hit.normalized_name == hit.name.to_lowercase()));
    }

    #[test]
    fn every_occurrence_is_a_separate_hit() {
        let text = "Jeffrey Epstein met them, and later Jeffrey Epstein left for Palm Beach.";
        let hits = MentionCatalog::default().find_mentions(text);
        let epstein = hits.iter().filter(|hit| hit.name == "Jeffrey Epstein").count();
        let palm_beach = hits.iter().filter(|hit| hit.name == "Palm Beach").count();
        assert_eq!(epstein, 2);
        assert_eq!(palm_beach, 1);
    }

    #[test]
    fn context_is_clipped_at_text_bounds() {
        let text = "Bill Gates";
        let hits = MentionCatalog::default().find_mentions(text);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].context, "Bill Gates");
    }

    #[test]
    fn custom_catalog_replaces_the_default() {
        let catalog = MentionCatalog::new(vec!["Jane Doe".to_string()]);
        let text = "Jane Doe appeared alongside Bill Gates at the hearing last week in court.";
        let hits = catalog.find_mentions(text);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Jane Doe");
    }

    #[test]
    fn catalog_loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"["Jane Doe", "John Roe", ""]"#).expect("write names");

        let catalog = MentionCatalog::from_json_file(file.path()).expect("load catalog");
        assert_eq!(catalog.names(), ["Jane Doe".to_string(), "John Roe".to_string()]);
    }

    #[test]
    fn multibyte_neighbours_do_not_break_context_slicing() {
        let text = "témoignage récent — Bill Gates — déposition complète";
        let hits = MentionCatalog::default().find_mentions(text);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].context.contains("Bill Gates"));
    }
}
