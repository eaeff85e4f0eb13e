//! Text encoding of asset records in the remote catalog format.
//!
//! The catalog is a source file holding an array literal of records. New
//! records are written with [`encode_record`]; [`parse_catalog`] reads the
//! array back so the store can be rebuilt from the same text.

use std::sync::LazyLock;

use regex::Regex;

use super::{AssetId, AssetRecord, Category, CatalogError};

static OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{((?:[^{}'"]|'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*")*)\}"#)
        .expect("object pattern compiles")
});

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\w+)\s*:\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)"|SoundCategory\.(\w+))"#,
    )
    .expect("field pattern compiles")
});

/// Render a record as the fragment spliced in after the catalog marker.
pub fn encode_record(record: &AssetRecord) -> String {
    let mut lines = vec![
        quoted_field("id", record.id.as_str()),
        quoted_field("filename", &record.filename),
        quoted_field("title", &record.title),
        format!("    category: SoundCategory.{}", record.category.catalog_key()),
        quoted_field("description", &record.description),
    ];
    if let Some(duration) = &record.duration {
        lines.push(quoted_field("duration", duration));
    }
    format!("\n  {{\n{}\n  }},", lines.join(",\n"))
}

fn quoted_field(key: &str, value: &str) -> String {
    format!("    {key}: '{}'", escape_literal(value))
}

/// Escape a value for a single-quoted string literal.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_literal`]; unknown escapes keep the escaped character.
pub fn unescape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Read every record in the array that follows `marker`.
///
/// Objects missing a required field or carrying an unknown category are
/// skipped with a warning rather than failing the whole catalog.
pub fn parse_catalog(text: &str, marker: &str) -> Result<Vec<AssetRecord>, CatalogError> {
    let start = text
        .find(marker)
        .map(|index| index + marker.len())
        .ok_or_else(|| CatalogError::MissingMarker {
            marker: marker.to_string(),
        })?;
    let body = &text[start..array_end(&text[start..])];
    let mut records = Vec::new();
    for object in OBJECT_RE.captures_iter(body) {
        let fields = &object[1];
        match parse_object(fields) {
            Some(record) => records.push(record),
            None => tracing::warn!(object = fields.trim(), "Skipping incomplete catalog entry"),
        }
    }
    Ok(records)
}

/// Index of the closing `]` of the record array, ignoring brackets inside literals.
fn array_end(body: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, ch) in body.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            ']' => return index,
            _ => {}
        }
    }
    body.len()
}

fn parse_object(fields: &str) -> Option<AssetRecord> {
    let mut id = None;
    let mut filename = None;
    let mut title = None;
    let mut category = None;
    let mut description = None;
    let mut duration = None;
    for field in FIELD_RE.captures_iter(fields) {
        let value = field
            .get(2)
            .or_else(|| field.get(3))
            .map(|literal| unescape_literal(literal.as_str()));
        match (&field[1], value) {
            ("id", Some(value)) => id = Some(AssetId::new(value)),
            ("filename", Some(value)) => filename = Some(value),
            ("title", Some(value)) => title = Some(value),
            ("description", Some(value)) => description = Some(value),
            ("duration", Some(value)) => duration = Some(value),
            ("category", None) => {
                category = field.get(4).and_then(|key| Category::from_catalog_key(key.as_str()));
            }
            ("category", Some(label)) => category = label.parse().ok(),
            _ => {}
        }
    }
    Some(AssetRecord {
        id: id?,
        filename: filename?,
        title: title?,
        category: category?,
        description: description.unwrap_or_default(),
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "export const SOUND_LIBRARY: Sound[] = [";

    fn record(duration: Option<&str>) -> AssetRecord {
        AssetRecord {
            id: AssetId::new("1770196191008"),
            filename: "magic-chime.mp3".into(),
            title: "Wizard's Chime".into(),
            category: Category::UiEffects,
            description: "test".into(),
            duration: duration.map(str::to_string),
        }
    }

    #[test]
    fn encodes_fragment_in_catalog_layout() {
        let fragment = encode_record(&record(Some("0:04")));
        assert_eq!(
            fragment,
            "\n  {\n    id: '1770196191008',\n    filename: 'magic-chime.mp3',\n    title: 'Wizard\\'s Chime',\n    category: SoundCategory.UI,\n    description: 'test',\n    duration: '0:04'\n  },"
        );
    }

    #[test]
    fn omits_duration_line_when_unknown() {
        let fragment = encode_record(&record(None));
        assert!(!fragment.contains("duration"));
        assert!(fragment.contains("    description: 'test'\n  },"));
    }

    #[test]
    fn escape_handles_backslash_before_quote() {
        assert_eq!(escape_literal(r"a\'b"), r"a\\\'b");
        assert_eq!(unescape_literal(&escape_literal("it's\nfine\\")), "it's\nfine\\");
    }

    #[test]
    fn carriage_returns_survive_escaping() {
        assert_eq!(escape_literal("one\r\ntwo"), r"one\r\ntwo");
        assert_eq!(unescape_literal(&escape_literal("one\r\ntwo\r")), "one\r\ntwo\r");
    }

    #[test]
    fn parses_encoded_records_back() {
        let text = format!("{MARKER}{}\n];\n", encode_record(&record(Some("0:04"))));
        let records = parse_catalog(&text, MARKER).unwrap();
        assert_eq!(records, vec![record(Some("0:04"))]);
    }

    #[test]
    fn parses_hand_written_entries_and_stops_at_array_end() {
        let text = format!(
            r#"import {{ Sound }} from './types';
{MARKER}
  {{
    id: '1',
    filename: 'success_bell.mp3',
    title: "Success [Bell]",
    category: SoundCategory.UI,
    description: 'A cheerful chime.',
    duration: '0:02'
  }},
  {{ id: '2', filename: 'rain.mp3', title: 'Rain', category: SoundCategory.AMBIENCE, description: 'Soft rain' }},
];

export const DEMO_URL_MAP = {{ 'x.mp3': 'https://example.com/x.mp3' }};
"#
        );
        let records = parse_catalog(&text, MARKER).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Success [Bell]");
        assert_eq!(records[1].category, Category::Ambience);
        assert_eq!(records[1].duration, None);
    }

    #[test]
    fn skips_entries_with_unknown_category() {
        let text = format!(
            "{MARKER}\n  {{ id: '9', filename: 'a.mp3', title: 'A', category: SoundCategory.NOPE }},\n];"
        );
        assert!(parse_catalog(&text, MARKER).unwrap().is_empty());
    }

    #[test]
    fn missing_marker_is_reported() {
        let err = parse_catalog("const X = [];", MARKER).unwrap_err();
        assert!(matches!(err, CatalogError::MissingMarker { .. }));
    }
}
