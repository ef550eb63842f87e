//! Assembly of the full HTML document handed to the browser.
//!
//! Caller HTML lands in `<body>` and caller CSS in a single `<style>` block,
//! both verbatim. The block is layered so that the resets come first (caller
//! rules override them), and the font-family override comes last (caller
//! rules cannot override it).

use std::fmt::Write;

const BOX_RESET: &str = "*, *::before, *::after {\n  box-sizing: border-box;\n  border-width: 0;\n  border-style: solid;\n}\n";

const PRINT_COLOR_ADJUST: &str =
    "* {\n  -webkit-print-color-adjust: exact !important;\n  print-color-adjust: exact !important;\n}\n";

const FONT_SMOOTHING: &str = "html {\n  -webkit-font-smoothing: antialiased;\n  -moz-osx-font-smoothing: grayscale;\n  text-rendering: optimizeLegibility;\n}\n";

const PAGE_RULE: &str = "@page {\n  margin: 0;\n  size: letter;\n}\n";

/// Builds complete documents around caller fragments.
#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    font_family: String,
}

impl Default for DocumentTemplate {
    fn default() -> Self {
        Self::new("Inter")
    }
}

impl DocumentTemplate {
    pub fn new(font_family: impl Into<String>) -> Self {
        Self { font_family: font_family.into() }
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    /// The rule forcing every element onto the configured family.
    pub fn font_override(&self) -> String {
        format!(
            "html, body, * {{\n  font-family: '{}', sans-serif !important;\n}}\n",
            css_escape_string(&self.font_family)
        )
    }

    /// Wrap `html` and `css` into a standalone document.
    pub fn assemble(&self, html: &str, css: &str) -> String {
        let mut doc = String::with_capacity(html.len() + css.len() + 1024);
        doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<style>\n");
        doc.push_str(BOX_RESET);
        doc.push_str(PRINT_COLOR_ADJUST);
        doc.push_str(FONT_SMOOTHING);
        doc.push_str(css);
        doc.push('\n');
        doc.push_str(PAGE_RULE);
        // Must stay the last rule in the block.
        doc.push_str("/* Force global override */\n");
        doc.push_str(&self.font_override());
        doc.push_str("</style>\n</head>\n<body>\n");
        doc.push_str(html);
        doc.push_str("\n</body>\n</html>\n");
        doc
    }

    /// Script reporting whether the configured family is loaded at 12px.
    pub fn font_check_script(&self) -> String {
        let mut script = String::new();
        let _ = write!(
            script,
            "document.fonts.check({})",
            serde_json::Value::String(format!("12px '{}'", css_escape_string(&self.font_family)))
        );
        script
    }
}

/// https://www.w3.org/TR/css-syntax-3/#consume-string-token
fn css_escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\'' | '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}
