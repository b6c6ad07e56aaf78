use serde::{Deserialize, Serialize};

pub const KEY_PREF_LABEL: &str = "skos:prefLabel";
pub const KEY_IN_SCHEME: &str = "skos:inScheme";
pub const KEY_HISTORY_NOTE: &str = "skos:historyNote";
pub const KEY_DEFINITION: &str = "skos:definition";
pub const KEY_AUTHOR: &str = "skos:scopeNote";

/// One tagged literal inside a raw entry. The data source does not enforce
/// uniqueness per schema key; the first occurrence wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttribute {
    pub schema: String,
    pub literal: String,
}

/// One taxonomy node exactly as returned by the graph service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub descriptor: String,
    pub attributes: Vec<RawAttribute>,
}

impl RawEntry {
    /// Returns the literal of the first attribute tagged with `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.schema == key)
            .map(|attribute| attribute.literal.as_str())
    }

    /// Lenient per-field view used when rendering the raw related-entries
    /// response: every missing attribute becomes an empty string.
    pub fn display_fields(&self) -> Plant {
        Plant {
            descriptor: self.descriptor.clone(),
            pref_label: self.attribute(KEY_PREF_LABEL).unwrap_or_default().to_string(),
            in_scheme: self.attribute(KEY_IN_SCHEME).unwrap_or_default().to_string(),
            history_note: self
                .attribute(KEY_HISTORY_NOTE)
                .unwrap_or_default()
                .to_string(),
            definition: self.attribute(KEY_DEFINITION).unwrap_or_default().to_string(),
            author: self.attribute(KEY_AUTHOR).unwrap_or_default().to_string(),
        }
    }
}

/// Flat display record resolved from a raw entry's attribute list.
/// `author` is the only field that may legitimately be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
    pub descriptor: String,
    pub pref_label: String,
    pub in_scheme: String,
    pub history_note: String,
    pub definition: String,
    pub author: String,
}

impl Plant {
    /// Primary text of a search-result row: `label (note)`.
    pub fn result_caption(&self) -> String {
        format!("{} ({})", self.pref_label, self.history_note)
    }

    /// Secondary text of a search-result row. The author segment is omitted
    /// entirely when the author attribute was absent.
    pub fn result_detail(&self) -> String {
        let mut text = format!("{} | {}", self.in_scheme, self.definition);
        if !self.author.is_empty() {
            text.push_str(" | ");
            text.push_str(&self.author);
        }
        text
    }

    /// Secondary text of a synonym row in the detail panel.
    pub fn synonym_detail(&self) -> String {
        let mut text = format!(
            "{} in {} | status: {}",
            self.in_scheme, self.history_note, self.definition
        );
        if !self.author.is_empty() {
            text.push_str(" | author: ");
            text.push_str(&self.author);
        }
        text
    }

    /// Header caption shown above the synonym list for the selected entry.
    pub fn header_caption(&self) -> String {
        format!(
            "{} as {} | status: {} [{}]",
            self.pref_label, self.in_scheme, self.definition, self.history_note
        )
    }
}

/// Top-level shape of every graph-service response. Anything else is a
/// contract violation surfaced at the client boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub result: Vec<RawEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(descriptor: &str, pairs: &[(&str, &str)]) -> RawEntry {
        RawEntry {
            descriptor: descriptor.to_string(),
            attributes: pairs
                .iter()
                .map(|(schema, literal)| RawAttribute {
                    schema: schema.to_string(),
                    literal: literal.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn display_fields_defaults_every_missing_attribute() {
        let sparse = entry("d9", &[(KEY_PREF_LABEL, "Rosa")]);
        let fields = sparse.display_fields();
        assert_eq!(fields.descriptor, "d9");
        assert_eq!(fields.pref_label, "Rosa");
        assert_eq!(fields.in_scheme, "");
        assert_eq!(fields.history_note, "");
        assert_eq!(fields.definition, "");
        assert_eq!(fields.author, "");
    }

    #[test]
    fn attribute_lookup_takes_first_match() {
        let doubled = entry(
            "d1",
            &[(KEY_PREF_LABEL, "first"), (KEY_PREF_LABEL, "second")],
        );
        assert_eq!(doubled.attribute(KEY_PREF_LABEL), Some("first"));
    }

    #[test]
    fn captions_hide_author_segment_when_empty() {
        let plant = Plant {
            descriptor: "d1".to_string(),
            pref_label: "Rosa canina".to_string(),
            in_scheme: "WFO".to_string(),
            history_note: "2019".to_string(),
            definition: "accepted".to_string(),
            author: String::new(),
        };
        assert_eq!(plant.result_caption(), "Rosa canina (2019)");
        assert_eq!(plant.result_detail(), "WFO | accepted");
        assert_eq!(plant.synonym_detail(), "WFO in 2019 | status: accepted");
        assert_eq!(
            plant.header_caption(),
            "Rosa canina as WFO | status: accepted [2019]"
        );
    }

    #[test]
    fn captions_show_author_segment_when_present() {
        let plant = Plant {
            descriptor: "d1".to_string(),
            pref_label: "Rosa canina".to_string(),
            in_scheme: "WFO".to_string(),
            history_note: "2019".to_string(),
            definition: "accepted".to_string(),
            author: "L.".to_string(),
        };
        assert_eq!(plant.result_detail(), "WFO | accepted | L.");
        assert_eq!(
            plant.synonym_detail(),
            "WFO in 2019 | status: accepted | author: L."
        );
    }
}
