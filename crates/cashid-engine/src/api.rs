//! Protocol grammar: compact metadata encoding, challenge URI parsing and
//! assembly.
//!
//! Everything here is a pure function over the fixed CashID grammar:
//!
//! ```text
//! cashid:<domain><path>?a=<action>&d=<data>&r=<required>&o=<optional>&x=<nonce>
//! ```
//!
//! The parser is an explicit tokenizer, progressive and non-throwing:
//! malformed input yields a partially populated record that the validator
//! rejects with a specific status code, never a parse error.

use std::collections::BTreeMap;

/// The protocol scheme literal, colon included.
pub const SCHEME: &str = "cashid:";

/// Actions for which the client supplies its own timestamp-based freshness
/// token instead of a server-issued nonce.
pub const USER_ACTIONS: [&str; 4] = ["delete", "logout", "revoke", "update"];

pub fn is_user_action(action: &str) -> bool {
    USER_ACTIONS.contains(&action)
}

// ---------------------------------------------------------------------------
// Metadata field tables — fixed and protocol-defined
// ---------------------------------------------------------------------------

pub struct MetadataCategory {
    pub name: &'static str,
    pub letter: char,
    /// Field name -> digit code, in wire order. Unlisted digits are reserved.
    pub fields: &'static [(&'static str, u8)],
}

pub const METADATA_CATEGORIES: [MetadataCategory; 3] = [
    MetadataCategory {
        name: "identification",
        letter: 'i',
        fields: &[
            ("name", 1),
            ("family", 2),
            ("nickname", 3),
            ("age", 4),
            ("gender", 5),
            ("birthdate", 6),
            ("picture", 8),
            ("national", 9),
        ],
    },
    MetadataCategory {
        name: "position",
        letter: 'p',
        fields: &[
            ("country", 1),
            ("state", 2),
            ("city", 3),
            ("streetname", 4),
            ("streetnumber", 5),
            ("residence", 6),
            ("coordinates", 9),
        ],
    },
    MetadataCategory {
        name: "contact",
        letter: 'c',
        fields: &[
            ("email", 1),
            ("instant", 2),
            ("social", 3),
            ("phone", 4),
            ("postal", 5),
        ],
    },
];

fn field_for_digit(category: &MetadataCategory, digit: u8) -> Option<&'static str> {
    category
        .fields
        .iter()
        .find(|(_, code)| *code == digit)
        .map(|(name, _)| *name)
}

// ---------------------------------------------------------------------------
// MetadataSelection — what a service asks for when issuing a challenge
// ---------------------------------------------------------------------------

/// Field names requested per category. Unknown names are ignored by the
/// encoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSelection {
    pub identification: Vec<String>,
    pub position: Vec<String>,
    pub contact: Vec<String>,
}

impl MetadataSelection {
    fn selected_for(&self, category: &str) -> &[String] {
        match category {
            "identification" => &self.identification,
            "position" => &self.position,
            "contact" => &self.contact,
            _ => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.identification.is_empty() && self.position.is_empty() && self.contact.is_empty()
    }
}

/// The required/optional metadata pair attached to a challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub required: MetadataSelection,
    pub optional: MetadataSelection,
}

/// Encodes a metadata selection into its compact wire form.
///
/// Categories appear in fixed order (identification, position, contact),
/// each as its single-letter prefix followed by the selected digit codes in
/// table order. Categories with no selected fields are omitted entirely.
pub fn encode_request_metadata(selection: &MetadataSelection) -> String {
    let mut encoded = String::new();
    for category in &METADATA_CATEGORIES {
        let requested = selection.selected_for(category.name);
        let mut part = String::new();
        for (field_name, field_code) in category.fields {
            if requested.iter().any(|r| r == field_name) {
                part.push((b'0' + field_code) as char);
            }
        }
        if !part.is_empty() {
            encoded.push(category.letter);
            encoded.push_str(&part);
        }
    }
    encoded
}

// ---------------------------------------------------------------------------
// MetadataRequest — a decoded r=/o= payload
// ---------------------------------------------------------------------------

/// Per category, the decoded field-name -> digit map. A category is `Some`
/// iff its letter prefix appeared in the input, even when no valid digits
/// followed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRequest {
    pub identification: Option<BTreeMap<String, u8>>,
    pub position: Option<BTreeMap<String, u8>>,
    pub contact: Option<BTreeMap<String, u8>>,
}

impl MetadataRequest {
    fn slot_mut(&mut self, index: usize) -> &mut Option<BTreeMap<String, u8>> {
        match index {
            0 => &mut self.identification,
            1 => &mut self.position,
            _ => &mut self.contact,
        }
    }

    fn slot(&self, index: usize) -> &Option<BTreeMap<String, u8>> {
        match index {
            0 => &self.identification,
            1 => &self.position,
            _ => &self.contact,
        }
    }

    /// True when `field` was requested in any category.
    pub fn contains(&self, field: &str) -> bool {
        (0..METADATA_CATEGORIES.len())
            .any(|i| self.slot(i).as_ref().is_some_and(|m| m.contains_key(field)))
    }

    /// All requested field names, in category and table order.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for (index, category) in METADATA_CATEGORIES.iter().enumerate() {
            if let Some(map) = self.slot(index) {
                for (field_name, _) in category.fields {
                    if map.contains_key(*field_name) {
                        names.push(*field_name);
                    }
                }
            }
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.identification.is_none() && self.position.is_none() && self.contact.is_none()
    }
}

/// Decodes a compact metadata string. Fails open: unrecognized characters and
/// digits are silently skipped, digits before any category letter are
/// dropped, and malformed input yields an empty request rather than an error.
pub fn decode_request_metadata(encoded: &str) -> MetadataRequest {
    let mut decoded = MetadataRequest::default();
    let mut current: Option<usize> = None;
    for ch in encoded.chars() {
        if let Some(index) = METADATA_CATEGORIES.iter().position(|c| c.letter == ch) {
            current = Some(index);
            decoded.slot_mut(index).get_or_insert_with(BTreeMap::new);
        } else if let (Some(index), Some(digit)) = (current, ch.to_digit(10)) {
            if let Some(field) = field_for_digit(&METADATA_CATEGORIES[index], digit as u8) {
                decoded
                    .slot_mut(index)
                    .get_or_insert_with(BTreeMap::new)
                    .insert(field.to_string(), digit as u8);
            }
        }
    }
    decoded
}

// ---------------------------------------------------------------------------
// Challenge URI parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParameters {
    pub action: Option<String>,
    pub data: Option<String>,
    pub required: MetadataRequest,
    pub optional: MetadataRequest,
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRequest {
    /// The scheme literal, colon included (e.g. `"cashid:"`).
    pub scheme: Option<String>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub parameters: RequestParameters,
}

/// Splits a challenge URI into scheme, domain, path and parameters.
///
/// Absence of any component is a valid state, not an error; the result is
/// populated as far as the input allows.
pub fn parse_request(uri: &str) -> ParsedRequest {
    let mut parsed = ParsedRequest::default();

    let Some(colon) = uri.find(':') else {
        return parsed;
    };
    parsed.scheme = Some(uri[..=colon].to_string());

    let mut rest = &uri[colon + 1..];
    if let Some(stripped) = rest.strip_prefix("//") {
        rest = stripped;
    }

    let Some(slash) = rest.find('/') else {
        if !rest.is_empty() {
            parsed.domain = Some(rest.to_string());
        }
        return parsed;
    };
    if slash > 0 {
        parsed.domain = Some(rest[..slash].to_string());
    }

    let path_and_query = &rest[slash..];
    match path_and_query.find('?') {
        Some(question) => {
            if question > 1 {
                parsed.path = Some(path_and_query[..question].to_string());
            }
            parsed.parameters = parse_parameters(&path_and_query[question + 1..]);
        }
        None => {
            if path_and_query.len() > 1 {
                parsed.path = Some(path_and_query.to_string());
            }
        }
    }
    parsed
}

fn parse_parameters(query: &str) -> RequestParameters {
    let mut parameters = RequestParameters::default();
    let (mut saw_required, mut saw_optional) = (false, false);
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        // An empty value is treated as an absent parameter.
        if value.is_empty() {
            continue;
        }
        match key {
            "a" if parameters.action.is_none() => parameters.action = Some(value.to_string()),
            "d" if parameters.data.is_none() => parameters.data = Some(value.to_string()),
            "r" if !saw_required => {
                saw_required = true;
                parameters.required = decode_request_metadata(value);
            }
            "o" if !saw_optional => {
                saw_optional = true;
                parameters.optional = decode_request_metadata(value);
            }
            "x" if parameters.nonce.is_none() => parameters.nonce = Some(value.to_string()),
            _ => {}
        }
    }
    parameters
}

// ---------------------------------------------------------------------------
// Challenge URI assembly
// ---------------------------------------------------------------------------

/// Assembles a challenge URI from its parts. Only non-empty parameters are
/// emitted, in the fixed order `a`, `d`, `r`, `o`, `x`; user-initiated
/// requests pass `nonce = None` and carry no `x` parameter.
pub fn build_request_uri(
    domain: &str,
    path: &str,
    action: &str,
    data: &str,
    required_encoded: &str,
    optional_encoded: &str,
    nonce: Option<u64>,
) -> String {
    let mut parameters: Vec<String> = Vec::new();
    if !action.is_empty() {
        parameters.push(format!("a={}", action));
    }
    if !data.is_empty() {
        parameters.push(format!("d={}", data));
    }
    if !required_encoded.is_empty() {
        parameters.push(format!("r={}", required_encoded));
    }
    if !optional_encoded.is_empty() {
        parameters.push(format!("o={}", optional_encoded));
    }
    if let Some(nonce) = nonce {
        parameters.push(format!("x={}", nonce));
    }
    format!("{}{}{}?{}", SCHEME, domain, path, parameters.join("&"))
}
