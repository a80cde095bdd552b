use std::borrow::Cow;
use std::sync::OnceLock;

use crate::pattern::{Regex, escape};
use crate::{Error, Result};

pub const RAZOR_PREFIX: char = '@';
pub const RAZOR_PLACEHOLDER: &str = "\"__RAZOR__\"";
pub const URL_ACTION_PLACEHOLDER: &str = "\"/__UrlActionPlaceholder__\"";

const IDENT_CHAIN: &str = r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*";
const CALL_ARGUMENTS: &str = r"\([^)]*\)";
const PATH_CHARS: &str = r"[A-Za-z0-9_.]+";

/// How server-side markers look in a template and what they are replaced with.
///
/// [`MarkerSyntax::razor`] (also the `Default`) matches ASP.NET Razor views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSyntax {
    prefix: char,
    path_placeholder: String,
    call_placeholder: String,
    call_overrides: Vec<(String, String)>,
}

impl Default for MarkerSyntax {
    fn default() -> Self {
        Self::razor()
    }
}

impl MarkerSyntax {
    pub fn razor() -> Self {
        Self {
            prefix: RAZOR_PREFIX,
            path_placeholder: RAZOR_PLACEHOLDER.to_string(),
            call_placeholder: RAZOR_PLACEHOLDER.to_string(),
            call_overrides: vec![(
                "Url.Action".to_string(),
                URL_ACTION_PLACEHOLDER.to_string(),
            )],
        }
    }

    pub fn prefix(mut self, prefix: char) -> Self {
        self.prefix = prefix;
        self
    }

    /// Replacement for simple markers such as `@Model.Name`.
    pub fn path_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.path_placeholder = placeholder.into();
        self
    }

    /// Replacement for call markers without a dedicated override.
    pub fn call_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.call_placeholder = placeholder.into();
        self
    }

    /// Gives calls of `path` (for example `Url.Content`) their own placeholder.
    /// A later override for the same path replaces the earlier one.
    pub fn call_override(
        mut self,
        path: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let placeholder = placeholder.into();
        if let Some(existing) = self.call_overrides.iter_mut().find(|(p, _)| *p == path) {
            existing.1 = placeholder;
        } else {
            self.call_overrides.push((path, placeholder));
        }
        self
    }

    pub fn without_call_overrides(mut self) -> Self {
        self.call_overrides.clear();
        self
    }

    pub fn prefix_char(&self) -> char {
        self.prefix
    }

    fn validate(&self) -> Result<()> {
        let prefix = self.prefix;
        if prefix.is_alphanumeric()
            || prefix.is_whitespace()
            || matches!(prefix, '_' | '.' | '(' | ')')
        {
            return Err(Error::InvalidSyntax(format!(
                "prefix {prefix:?} cannot start a marker"
            )));
        }

        let placeholders = std::iter::once(&self.path_placeholder)
            .chain(std::iter::once(&self.call_placeholder))
            .chain(self.call_overrides.iter().map(|(_, placeholder)| placeholder));
        for placeholder in placeholders {
            if placeholder.contains(prefix) {
                return Err(Error::InvalidSyntax(format!(
                    "placeholder {placeholder:?} contains the prefix {prefix:?}"
                )));
            }
        }

        for (path, _) in &self.call_overrides {
            if !is_ident_chain(path) {
                return Err(Error::InvalidSyntax(format!(
                    "call override {path:?} is not a dotted identifier path"
                )));
            }
        }
        Ok(())
    }
}

fn is_ident_chain(value: &str) -> bool {
    !value.is_empty() && value.split('.').all(is_ident)
}

fn is_ident(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    if !(first == '_' || first.is_ascii_alphabetic()) {
        return false;
    }

    chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric())
}

/// The result of one sanitization pass plus what it rewrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    pub call_markers: usize,
    pub path_markers: usize,
    pub escapes: usize,
}

impl Sanitized {
    pub fn changed(&self) -> bool {
        self.call_markers + self.path_markers + self.escapes > 0
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Debug, Clone)]
struct Substitution {
    regex: Regex,
    replacement: String,
}

/// Compiled marker rewriting rules for one [`MarkerSyntax`].
///
/// Rules run in a fixed order: call markers, then simple path markers, then
/// escaped prefixes. Each rule is a single left-to-right pass over the output
/// of the one before.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    syntax: MarkerSyntax,
    calls: Vec<Substitution>,
    path: Substitution,
    escape_pair: Substitution,
}

impl Sanitizer {
    pub fn new(syntax: &MarkerSyntax) -> Result<Self> {
        syntax.validate()?;

        let prefix = syntax.prefix.to_string();
        let p = escape(&prefix);

        let mut calls = Vec::with_capacity(syntax.call_overrides.len() + 1);
        for (path, placeholder) in &syntax.call_overrides {
            calls.push(Substitution::compile(
                &format!("{p}{}{CALL_ARGUMENTS}", escape(path)),
                placeholder,
            )?);
        }
        // Overrides match even after an escaped prefix; the generic form does not.
        calls.push(Substitution::compile(
            &format!("(?<!{p}){p}{IDENT_CHAIN}{CALL_ARGUMENTS}"),
            &syntax.call_placeholder,
        )?);

        let path = Substitution::compile(
            &format!("(?<!{p}){p}{PATH_CHARS}"),
            &syntax.path_placeholder,
        )?;
        let escape_pair = Substitution::compile(&format!("{p}{p}"), &prefix)?;

        Ok(Self {
            syntax: syntax.clone(),
            calls,
            path,
            escape_pair,
        })
    }

    pub fn razor() -> Result<Self> {
        Self::new(&MarkerSyntax::razor())
    }

    pub fn syntax(&self) -> &MarkerSyntax {
        &self.syntax
    }

    pub fn sanitize(&self, script: &str) -> String {
        self.sanitize_with_report(script).text
    }

    pub fn sanitize_with_report(&self, script: &str) -> Sanitized {
        // Nothing can match without the prefix.
        if !script.contains(self.syntax.prefix) {
            return Sanitized {
                text: script.to_string(),
                call_markers: 0,
                path_markers: 0,
                escapes: 0,
            };
        }

        let mut text = script.to_string();
        let mut call_markers = 0usize;
        for call in &self.calls {
            let (next, count) = call.apply(&text);
            let next = next.into_owned();
            call_markers += count;
            text = next;
        }

        let (after_paths, path_markers) = self.path.apply(&text);
        let (after_escapes, escapes) = self.escape_pair.apply(&after_paths);

        Sanitized {
            text: after_escapes.into_owned(),
            call_markers,
            path_markers,
            escapes,
        }
    }
}

impl Substitution {
    fn compile(pattern: &str, replacement: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|err| Error::Pattern(format!("{pattern}: {err}")))?;
        Ok(Self {
            regex,
            replacement: replacement.to_string(),
        })
    }

    fn apply<'a>(&self, text: &'a str) -> (Cow<'a, str>, usize) {
        let replaced = self.regex.replace_all(text, &self.replacement);
        (replaced.text, replaced.count)
    }
}

fn razor_sanitizer() -> Option<&'static Sanitizer> {
    static RAZOR: OnceLock<Option<Sanitizer>> = OnceLock::new();
    RAZOR.get_or_init(|| Sanitizer::razor().ok()).as_ref()
}

/// Rewrites Razor markers in `script` so it can be evaluated on its own.
///
/// - `@Url.Action(...)` becomes `"/__UrlActionPlaceholder__"`
/// - any other `@Name.Chain(...)` becomes `"__RAZOR__"`
/// - `@Name.Path` becomes `"__RAZOR__"` unless the `@` follows another `@`
/// - `@@` becomes `@`
///
/// The result is not checked for valid JavaScript.
pub fn sanitize(script: &str) -> String {
    match razor_sanitizer() {
        Some(sanitizer) => sanitizer.sanitize(script),
        None => script.to_string(),
    }
}

pub fn sanitize_with_report(script: &str) -> Sanitized {
    match razor_sanitizer() {
        Some(sanitizer) => sanitizer.sanitize_with_report(script),
        None => Sanitized {
            text: script.to_string(),
            call_markers: 0,
            path_markers: 0,
            escapes: 0,
        },
    }
}
