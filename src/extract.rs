use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use crate::pattern::{Regex, RegexBuilder};

const SCRIPT_ELEMENT_PATTERN: &str = r"<script\b([^>]*)>(.*?)</script>";

/// One inline script element found in a template document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    index: usize,
    body: String,
    span: Range<usize>,
    attributes: HashMap<String, String>,
}

impl ScriptBlock {
    /// Position of this block among all blocks of its document.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The text between the opening and closing tags, verbatim.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }

    /// Byte range of [`body`](Self::body) inside the source document.
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Looks up an opening-tag attribute by name, ignoring ASCII case.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    pub fn script_type(&self) -> Option<&str> {
        self.attr("type")
    }

    pub fn is_external(&self) -> bool {
        self.src().is_some()
    }

    /// Whether a browser would run the body as JavaScript.
    ///
    /// Data blocks such as `application/ld+json` or client-side template
    /// blocks (`text/template`, `text/x-kendo-template`) are not executable.
    pub fn is_executable(&self) -> bool {
        let Some(kind) = self.script_type() else {
            return true;
        };
        let kind = kind.trim();
        let essence = kind
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        matches!(
            essence.as_str(),
            "" | "module" | "text/javascript" | "application/javascript"
        )
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.body.contains(needle)
    }
}

/// Returns the contents of every closed `<script>` element, in document order.
///
/// Empty elements produce an empty string; an opening tag without a matching
/// `</script>` produces nothing.
pub fn extract_scripts(document: &str) -> Vec<String> {
    extract_script_blocks(document)
        .into_iter()
        .map(ScriptBlock::into_body)
        .collect()
}

pub fn extract_script_blocks(document: &str) -> Vec<ScriptBlock> {
    let Some(regex) = script_element_regex() else {
        return Vec::new();
    };

    // A match the engine gives up on only shortens the result.
    let all = regex.group_spans_all(document, 2);

    let mut blocks = Vec::with_capacity(all.len());
    for groups in all {
        let mut groups = groups.into_iter();
        let (Some(Some(open)), Some(Some(span))) = (groups.next(), groups.next()) else {
            continue;
        };
        blocks.push(ScriptBlock {
            index: blocks.len(),
            body: document[span.clone()].to_string(),
            span,
            attributes: parse_attributes(&document[open]),
        });
    }
    blocks
}

fn script_element_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| {
            RegexBuilder::new(SCRIPT_ELEMENT_PATTERN)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()
                .ok()
        })
        .as_ref()
}

/// Parses the attribute section of an opening tag (everything between the
/// tag name and `>`). Stops quietly at the first thing it cannot read.
fn parse_attributes(source: &str) -> HashMap<String, String> {
    let bytes = source.as_bytes();
    let mut attrs = HashMap::new();
    let mut i = 0usize;

    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            break;
        }

        if bytes[i] == b'/' {
            i += 1;
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }

        let Some(name) = source.get(name_start..i) else {
            break;
        };
        if name.is_empty() {
            break;
        }
        let name = name.to_ascii_lowercase();

        skip_ws(bytes, &mut i);

        let value = if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            skip_ws(bytes, &mut i);
            match parse_attr_value(source, bytes, &mut i) {
                Some(value) => value,
                None => break,
            }
        } else {
            "true".to_string()
        };

        attrs.entry(name).or_insert(value);
    }

    attrs
}

fn parse_attr_value(source: &str, bytes: &[u8], i: &mut usize) -> Option<String> {
    if *i >= bytes.len() {
        return None;
    }

    if bytes[*i] == b'\'' || bytes[*i] == b'"' {
        let quote = bytes[*i];
        *i += 1;
        let start = *i;
        while *i < bytes.len() && bytes[*i] != quote {
            *i += 1;
        }
        if *i >= bytes.len() {
            return None;
        }
        let value = source.get(start..*i)?.to_string();
        *i += 1;
        return Some(value);
    }

    let start = *i;
    while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
    source.get(start..*i).map(str::to_string)
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'/' | b'"' | b'\'' | b'>' | b'<')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_attributes_reads_quoted_unquoted_and_bare() {
        let attrs = parse_attributes(r#" type='text/javascript' defer data-x=1 src="a.js""#);
        assert_eq!(attrs.get("type").map(String::as_str), Some("text/javascript"));
        assert_eq!(attrs.get("defer").map(String::as_str), Some("true"));
        assert_eq!(attrs.get("data-x").map(String::as_str), Some("1"));
        assert_eq!(attrs.get("src").map(String::as_str), Some("a.js"));
    }

    #[test]
    fn parse_attributes_keeps_razor_values_verbatim() {
        let attrs = parse_attributes(r#" src='@Url.Content("~/js/app.js")'"#);
        assert_eq!(
            attrs.get("src").map(String::as_str),
            Some(r#"@Url.Content("~/js/app.js")"#)
        );
    }

    #[test]
    fn parse_attributes_stops_at_unclosed_quote() {
        let attrs = parse_attributes(r#" async src="broken"#);
        assert_eq!(attrs.get("async").map(String::as_str), Some("true"));
        assert!(!attrs.contains_key("src"));
    }

    #[test]
    fn parse_attributes_ignores_trailing_slash_and_duplicates() {
        let attrs = parse_attributes(r#" src="first.js" SRC="second.js" /"#);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("src").map(String::as_str), Some("first.js"));
    }
}
