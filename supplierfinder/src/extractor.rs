//! Company detail extraction from free page text
//!
//! Pulls four fields out of the visible text of a page:
//! - Legal name with its organizational form (ООО, ЗАО, ОАО, ПАО, АО, ИП)
//! - INN, accepted only if it passes the checksum
//! - First e-mail address
//! - First Russian phone number (+7 or leading 8)
//!
//! Each field is found by an ordered list of patterns; the first pattern that
//! yields an acceptable value wins. Fields are independent of each other.

use fancy_regex::{Regex as FancyRegex, RegexBuilder as FancyRegexBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{debug, warn};

use crate::company::PartialCandidate;
use crate::config::MAX_PAGE_BYTES_LIMIT;
use crate::inn::validate_inn;

/// Legal form used when a name pattern matched without an explicit form marker
pub const DEFAULT_LEGAL_FORM: &str = "ООО";

const LEGAL_FORMS: &str = "ПАО|ООО|ЗАО|ОАО|АО|ИП";

/// Characters trimmed from both ends of a captured name
const NAME_TRIM_CHARS: &[char] = &['"', '\'', '«', '»', '“', '”', '„', '.', ','];

/// Elements whose text never shows up on the rendered page
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Backtracking budget for lookaround patterns. The budget is spent across
/// every start position of one search, so it scales with the largest page
/// the fetcher will hand over.
const BACKTRACK_LIMIT: usize = 64 * MAX_PAGE_BYTES_LIMIT;

/// Lookaround patterns go through the backtracking engine, the rest through
/// the linear-time one
enum Matcher {
    Plain(Regex),
    Fancy(FancyRegex),
}

type Span = std::ops::Range<usize>;

/// A pattern in a field's priority list
struct FieldPattern {
    label: &'static str,
    matcher: Matcher,
}

impl FieldPattern {
    fn plain(label: &'static str, pattern: &str) -> Self {
        Self {
            label,
            matcher: Matcher::Plain(Regex::new(pattern).unwrap()),
        }
    }

    fn fancy(label: &'static str, pattern: &str) -> Self {
        Self {
            label,
            matcher: Matcher::Fancy(fancy(pattern)),
        }
    }

    /// Spans of the whole first match and of its group 1
    fn first(&self, text: &str) -> Result<Option<(Span, Option<Span>)>, fancy_regex::Error> {
        let spans = match &self.matcher {
            Matcher::Plain(regex) => regex
                .captures(text)
                .and_then(|c| Some((c.get(0)?.range(), c.get(1).map(|m| m.range())))),
            Matcher::Fancy(regex) => regex
                .captures(text)?
                .and_then(|c| Some((c.get(0)?.range(), c.get(1).map(|m| m.range())))),
        };
        Ok(spans)
    }

    /// First group 1 across all matches that `accept` takes. An engine error
    /// ends the scan of this pattern.
    fn find_group<'t>(&self, text: &'t str, accept: impl Fn(&str) -> bool) -> Option<&'t str> {
        match &self.matcher {
            Matcher::Plain(regex) => regex
                .captures_iter(text)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .find(|group| accept(group)),
            Matcher::Fancy(regex) => {
                for captures in regex.captures_iter(text) {
                    let captures = match captures {
                        Ok(captures) => captures,
                        Err(e) => {
                            debug!("Pattern {} failed: {}", self.label, e);
                            return None;
                        }
                    };
                    if let Some(group) = captures.get(1).map(|m| m.as_str()) {
                        if accept(group) {
                            return Some(group);
                        }
                    }
                }
                None
            }
        }
    }
}

fn fancy(pattern: &str) -> FancyRegex {
    FancyRegexBuilder::new(pattern)
        .backtrack_limit(BACKTRACK_LIMIT)
        .build()
        .unwrap()
}

static NAME_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    let quoted = r#"[«"“„]([^»"”“]+)[»"”“]"#;
    let bare = r"([А-Яа-яЁё0-9\-\s]+?)";
    vec![
        FieldPattern::plain(
            "form_quoted",
            &format!(r"(?i)\b(?:{})\s*{}", LEGAL_FORMS, quoted),
        ),
        FieldPattern::plain("company_quoted", &format!(r"(?i)компания\s*{}", quoted)),
        FieldPattern::plain("firm_quoted", &format!(r"(?i)фирма\s*{}", quoted)),
        FieldPattern::fancy(
            "form_bare",
            &format!(
                r"(?im)\b(?:{})\s+{}(?=\s+(?:производитель|поставщик|компания|фирма|ИНН|ОГРН|адрес|телефон|[0-9]|$))",
                LEGAL_FORMS, bare
            ),
        ),
        FieldPattern::plain(
            "supplier_quoted",
            &format!(r"(?i)(?:производитель|поставщик)\s+{}", quoted),
        ),
        // The name must be followed by whitespace and then a legal form or
        // the end of a sentence
        FieldPattern::fancy(
            "supplier_bare",
            &format!(
                r"(?im)(?:производитель|поставщик)\s+{}(?=\s+(?:(?:{})\b|\.|,|$))",
                bare, LEGAL_FORMS
            ),
        ),
    ]
});

static LEGAL_FORM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", LEGAL_FORMS)).unwrap()
});

static INN_PATTERNS: Lazy<Vec<FieldPattern>> = Lazy::new(|| {
    // 12 digits first so a personal INN is never cut down to its first 10
    let digits = r"(?<![0-9])([0-9]{12}|[0-9]{10})(?![0-9])";
    vec![
        FieldPattern::fancy("labeled_colon", &format!(r"(?i)ИНН\s*[:|]\s*{}", digits)),
        FieldPattern::fancy("labeled_dash", &format!(r"(?i)ИНН\s*[-–—]\s*{}", digits)),
        FieldPattern::fancy("labeled_space", &format!(r"(?i)ИНН\s*{}", digits)),
        FieldPattern::fancy("labeled_loose", &format!(r"(?i)ИНН.{{0,10}}?{}", digits)),
        FieldPattern::fancy("taxpayer", &format!(r"(?i)налогоплательщика[^0-9]*{}", digits)),
        FieldPattern::fancy("bare_digits", digits),
    ]
});

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w.\-]+@[\w.\-]+\.\w+").unwrap()
});

static PHONE_REGEX: Lazy<FancyRegex> = Lazy::new(|| {
    fancy(r"(?<![0-9])(?:\+7|8)[\s(]*[0-9]{3}[\s)]*[0-9]{3}[\s\-]?[0-9]{2}[\s\-]?[0-9]{2}(?![0-9])")
});

/// Convert an HTML document to the text a visitor would see, one space
/// between text nodes.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| INVISIBLE_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}

/// Extract company details from page text.
///
/// A fault inside any pattern is contained: the affected field is left empty
/// and, if the whole extraction aborts, an empty record is returned.
pub fn extract(page_text: &str) -> PartialCandidate {
    match std::panic::catch_unwind(|| extract_fields(page_text)) {
        Ok(partial) => partial,
        Err(_) => {
            warn!("Extraction aborted on a page of {} bytes; treating as empty", page_text.len());
            PartialCandidate::default()
        }
    }
}

fn extract_fields(text: &str) -> PartialCandidate {
    PartialCandidate {
        legal_name: extract_legal_name(text),
        inn: extract_inn(text),
        email: extract_email(text),
        phone: extract_phone(text),
    }
}

/// First legal name found by the name patterns, prefixed with its legal form
pub fn extract_legal_name(text: &str) -> Option<String> {
    for pattern in NAME_PATTERNS.iter() {
        let (span, raw_name) = match pattern.first(text) {
            Ok(Some((span, Some(raw_name)))) => (span, raw_name),
            Ok(_) => continue,
            Err(e) => {
                debug!("Name pattern {} failed: {}", pattern.label, e);
                continue;
            }
        };

        let name = clean_name(&text[raw_name]);
        if name.is_empty() {
            continue;
        }

        let form = LEGAL_FORM_REGEX
            .captures(&text[span])
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| DEFAULT_LEGAL_FORM.to_string());

        let legal_name = format!("{} {}", form, name);
        debug!("Found legal name via {}: {}", pattern.label, legal_name);
        return Some(legal_name);
    }
    None
}

/// First checksum-valid INN, scanning every occurrence of each pattern in
/// priority order
pub fn extract_inn(text: &str) -> Option<String> {
    for pattern in INN_PATTERNS.iter() {
        let found = pattern.find_group(text, |candidate| {
            let valid = validate_inn(candidate);
            if !valid {
                debug!("Discarding {} from {}: checksum mismatch", candidate, pattern.label);
            }
            valid
        });
        if let Some(inn) = found {
            debug!("Found INN via {}: {}", pattern.label, inn);
            return Some(inn.to_string());
        }
    }
    None
}

pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_REGEX.find(text).map(|m| m.as_str().to_string())
}

pub fn extract_phone(text: &str) -> Option<String> {
    match PHONE_REGEX.find(text) {
        Ok(found) => found.map(|m| m.as_str().to_string()),
        Err(e) => {
            debug!("Phone pattern failed: {}", e);
            None
        }
    }
}

/// Collapse whitespace and strip surrounding quotes and punctuation
fn clean_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .trim_matches(NAME_TRIM_CHARS)
        .trim()
        .to_string()
}
