use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone)]
pub(crate) struct Regex {
    backend: fancy_regex::Regex,
}

impl Regex {
    pub(crate) fn new(pattern: &str) -> Result<Self, RegexError> {
        let backend = fancy_regex::Regex::new(pattern).map_err(RegexError::from)?;
        Ok(Self { backend })
    }

    /// Byte spans of groups `1..=groups` for every match, stopping at the
    /// first match the engine gives up on (backtrack limit).
    pub(crate) fn group_spans_all(
        &self,
        input: &str,
        groups: usize,
    ) -> Vec<Vec<Option<Range<usize>>>> {
        let mut out = Vec::new();
        for captures in self.backend.captures_iter(input) {
            let Ok(captures) = captures else {
                break;
            };
            let spans = (1..=groups)
                .map(|idx| captures.get(idx).map(|matched| matched.start()..matched.end()))
                .collect();
            out.push(spans);
        }
        out
    }

    /// Replaces every match with `replacement` verbatim (no `$n` expansion).
    ///
    /// If the engine gives up partway, the rest of `input` is copied through
    /// untouched.
    pub(crate) fn replace_all<'a>(&self, input: &'a str, replacement: &str) -> Replaced<'a> {
        let mut out = String::new();
        let mut last_end = 0usize;
        let mut count = 0usize;

        for matched in self.backend.find_iter(input) {
            let Ok(matched) = matched else {
                break;
            };
            out.push_str(&input[last_end..matched.start()]);
            out.push_str(replacement);
            last_end = matched.end();
            count += 1;
        }

        let text = if count == 0 {
            Cow::Borrowed(input)
        } else {
            out.push_str(&input[last_end..]);
            Cow::Owned(out)
        };
        Replaced { text, count }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RegexBuilder {
    pattern: String,
    case_insensitive: bool,
    dot_matches_new_line: bool,
}

impl RegexBuilder {
    pub(crate) fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            case_insensitive: false,
            dot_matches_new_line: false,
        }
    }

    pub(crate) fn case_insensitive(&mut self, enabled: bool) -> &mut Self {
        self.case_insensitive = enabled;
        self
    }

    pub(crate) fn dot_matches_new_line(&mut self, enabled: bool) -> &mut Self {
        self.dot_matches_new_line = enabled;
        self
    }

    pub(crate) fn build(&self) -> Result<Regex, RegexError> {
        let mut builder = fancy_regex::RegexBuilder::new(&self.pattern);
        builder.case_insensitive(self.case_insensitive);
        builder.dot_matches_new_line(self.dot_matches_new_line);
        let backend = builder.build().map_err(RegexError::from)?;
        Ok(Regex { backend })
    }
}

#[derive(Debug)]
pub(crate) struct Replaced<'a> {
    pub(crate) text: Cow<'a, str>,
    pub(crate) count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegexError {
    message: String,
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RegexError {}

impl From<fancy_regex::Error> for RegexError {
    fn from(value: fancy_regex::Error) -> Self {
        Self {
            message: value.to_string(),
        }
    }
}

pub(crate) fn escape(value: &str) -> Cow<'_, str> {
    let mut out = String::with_capacity(value.len());
    let mut changed = false;

    for ch in value.chars() {
        if is_regex_meta(ch) {
            out.push('\\');
            changed = true;
        }
        out.push(ch);
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(value)
    }
}

fn is_regex_meta(ch: char) -> bool {
    matches!(
        ch,
        '\\' | '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$' | '/'
    )
}
