use std::fmt;
use std::str::FromStr;

/// How a churn report is rendered.
///
/// Parsed from `--format`; matching is case-insensitive and `md` is accepted
/// for markdown.
///
/// ```
/// use churnrate_core::OutputFormat;
///
/// assert_eq!("MD".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
/// assert_eq!(OutputFormat::Json.to_string(), "json");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Boxed console report.
    #[default]
    Text,
    /// The full analysis result as JSON with camelCase keys.
    Json,
    /// Tables for pasting into issues and pull requests.
    Markdown,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [Self::Text, Self::Json, Self::Markdown];

    /// Canonical command-line spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Markdown => "markdown",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "md" {
            return Ok(Self::Markdown);
        }
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| format!("unknown output format '{s}' (expected text, json or markdown)"))
    }
}
