use std::fs;
use std::path::{Path, PathBuf};

use crate::extract::{ScriptBlock, extract_script_blocks};
use crate::sanitize::{Sanitized, Sanitizer};
use crate::{Error, Result};

const DEFAULT_TRACE_LOG_LIMIT: usize = 10_000;

/// The inline scripts of one template, ready to be sanitized and handed to
/// a script evaluator.
///
/// ```no_run
/// use template_scripts::TemplateScripts;
///
/// let mut view = TemplateScripts::from_file("Views/SortSet/SortSet.cshtml")?;
/// let script = view.sanitized_pick("loadSponsorValues")?;
/// assert!(!script.contains("@Url.Action"));
/// # Ok::<(), template_scripts::Error>(())
/// ```
#[derive(Debug)]
pub struct TemplateScripts {
    source: Option<PathBuf>,
    blocks: Vec<ScriptBlock>,
    sanitizer: Option<Sanitizer>,
    trace: bool,
    trace_logs: Vec<String>,
    trace_log_limit: usize,
    trace_to_stderr: bool,
}

impl TemplateScripts {
    pub fn from_template(template: &str) -> Self {
        Self::with_blocks(None, extract_script_blocks(template))
    }

    /// Reads a template from disk as UTF-8 and extracts its scripts.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let template = fs::read_to_string(path).map_err(|err| Error::TemplateRead {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let blocks = extract_script_blocks(&template);
        Ok(Self::with_blocks(Some(path.to_path_buf()), blocks))
    }

    fn with_blocks(source: Option<PathBuf>, blocks: Vec<ScriptBlock>) -> Self {
        Self {
            source,
            blocks,
            sanitizer: None,
            trace: false,
            trace_logs: Vec::new(),
            trace_log_limit: DEFAULT_TRACE_LOG_LIMIT,
            trace_to_stderr: true,
        }
    }

    /// Uses `sanitizer` instead of the built-in Razor rules.
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn blocks(&self) -> &[ScriptBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks a browser would execute: no `src`, JavaScript `type`.
    pub fn inline_blocks(&self) -> impl Iterator<Item = &ScriptBlock> {
        self.blocks
            .iter()
            .filter(|block| !block.is_external() && block.is_executable())
    }

    pub fn find_containing(&self, needle: &str) -> Option<&ScriptBlock> {
        self.blocks.iter().find(|block| block.contains(needle))
    }

    /// The first block mentioning `needle`, falling back to the first block.
    pub fn pick(&mut self, needle: &str) -> Result<&ScriptBlock> {
        let found = self.blocks.iter().position(|block| block.contains(needle));
        let index = match found {
            Some(index) => {
                self.trace_line(format!("[pick] needle={needle:?} block={index}"));
                index
            }
            None if !self.blocks.is_empty() => {
                self.trace_line(format!("[pick] needle={needle:?} not found, using block=0"));
                0
            }
            None => {
                self.trace_line(format!("[pick] needle={needle:?} no blocks"));
                return Err(Error::ScriptNotFound(format!(
                    "no inline script in {}",
                    self.describe_source()
                )));
            }
        };
        Ok(&self.blocks[index])
    }

    pub fn sanitized_block(&mut self, index: usize) -> Result<Sanitized> {
        let Some(block) = self.blocks.get(index) else {
            return Err(Error::ScriptNotFound(format!(
                "script block {index} out of range ({} blocks in {})",
                self.blocks.len(),
                self.describe_source()
            )));
        };
        let sanitized = self.sanitize_body(block.body());
        self.trace_sanitized(index, &sanitized);
        Ok(sanitized)
    }

    pub fn sanitized_all(&mut self) -> Vec<String> {
        let reports: Vec<Sanitized> = self
            .blocks
            .iter()
            .map(|block| self.sanitize_body(block.body()))
            .collect();

        let mut out = Vec::with_capacity(reports.len());
        for (index, sanitized) in reports.into_iter().enumerate() {
            self.trace_sanitized(index, &sanitized);
            out.push(sanitized.into_text());
        }
        out
    }

    fn sanitize_body(&self, body: &str) -> Sanitized {
        match &self.sanitizer {
            Some(sanitizer) => sanitizer.sanitize_with_report(body),
            None => crate::sanitize::sanitize_with_report(body),
        }
    }

    fn trace_sanitized(&mut self, index: usize, sanitized: &Sanitized) {
        self.trace_line(format!(
            "[sanitize] block={index} calls={} paths={} escapes={}",
            sanitized.call_markers, sanitized.path_markers, sanitized.escapes
        ));
    }

    pub fn sanitized_pick(&mut self, needle: &str) -> Result<String> {
        let index = self.pick(needle)?.index();
        Ok(self.sanitized_block(index)?.into_text())
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace = enabled;
        if enabled {
            let line = format!(
                "[extract] source={} blocks={}",
                self.describe_source(),
                self.blocks.len()
            );
            self.trace_line(line);
        }
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace_logs)
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace_to_stderr = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::InvalidTraceLimit);
        }
        self.trace_log_limit = max_entries;
        while self.trace_logs.len() > self.trace_log_limit {
            self.trace_logs.remove(0);
        }
        Ok(())
    }

    fn trace_line(&mut self, line: String) {
        if self.trace {
            if self.trace_to_stderr {
                eprintln!("{line}");
            }
            if self.trace_logs.len() >= self.trace_log_limit {
                self.trace_logs.remove(0);
            }
            self.trace_logs.push(line);
        }
    }

    fn describe_source(&self) -> String {
        match &self.source {
            Some(path) => path.display().to_string(),
            None => "<template>".to_string(),
        }
    }
}
