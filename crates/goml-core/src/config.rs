use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserOptions,
    #[serde(default)]
    pub markup: MarkupNames,
    #[serde(default)]
    pub printer: PrinterOptions,
    #[serde(default)]
    pub output: OutputOptions,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ParserOptions {
    /// Report every error instead of the first per line (and at most ten).
    #[serde(default)]
    pub all_errors: bool,
    /// Treat the input as a bare statement list instead of a file with a package clause.
    #[serde(default)]
    pub fragment: bool,
}

/// Identifiers the lowered calls are written against.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MarkupNames {
    /// Builder in scope at file level, supplied by the runtime.
    #[serde(default = "default_builder")]
    pub builder: String,
    /// Parameter name of every synthesized body closure.
    #[serde(default = "default_builder")]
    pub param: String,
    #[serde(default = "default_element_type")]
    pub element_type: String,
    #[serde(default = "default_attributes_type")]
    pub attributes_type: String,
    #[serde(default = "default_nil")]
    pub nil: String,
    #[serde(default = "default_true_ident")]
    pub true_ident: String,
    #[serde(default = "default_append_element")]
    pub append_element: String,
    #[serde(default = "default_append_text")]
    pub append_text: String,
}

impl Default for MarkupNames {
    fn default() -> Self {
        Self {
            builder: default_builder(),
            param: default_builder(),
            element_type: default_element_type(),
            attributes_type: default_attributes_type(),
            nil: default_nil(),
            true_ident: default_true_ident(),
            append_element: default_append_element(),
            append_text: default_append_text(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrinterOptions {
    /// Indent with spaces instead of tabs.
    #[serde(default)]
    pub use_spaces: bool,
    /// Spaces per indentation level when `use_spaces` is set.
    #[serde(default = "default_indent_width")]
    pub indent_width: usize,
}

impl Default for PrinterOptions {
    fn default() -> Self {
        Self {
            use_spaces: false,
            indent_width: default_indent_width(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputOptions {
    /// Extension of the source files collected from input directories.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

fn default_builder() -> String {
    "e".to_string()
}

fn default_element_type() -> String {
    "element".to_string()
}

fn default_attributes_type() -> String {
    "attributes".to_string()
}

fn default_nil() -> String {
    "nil".to_string()
}

fn default_true_ident() -> String {
    "true".to_string()
}

fn default_append_element() -> String {
    "AppendElement".to_string()
}

fn default_append_text() -> String {
    "AppendTextNode".to_string()
}

fn default_indent_width() -> usize {
    4
}

fn default_extension() -> String {
    "goml".to_string()
}

impl Config {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }
}
