use serde::{Deserialize, Serialize};

/// Closed enum of source kinds an Evidence record can come from (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pubmed,
    Clinicaltrials,
    Europepmc,
    Openalex,
    Preprint,
    Web,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pubmed => "pubmed",
            Self::Clinicaltrials => "clinicaltrials",
            Self::Europepmc => "europepmc",
            Self::Openalex => "openalex",
            Self::Preprint => "preprint",
            Self::Web => "web",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: SourceKind,
    pub title: String,
    pub url: String,
    /// `YYYY-MM-DD`, or the literal string `"Unknown"`.
    pub date: String,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl Citation {
    /// Constructs a Citation, enforcing the title-length invariant from
    /// spec.md §3 (1-500 chars). Titles are truncated rather than rejected:
    /// a provider returning an overlong title is a formatting quirk, not
    /// a reason to drop otherwise-good evidence.
    pub fn new(
        source: SourceKind,
        title: impl Into<String>,
        url: impl Into<String>,
        date: Option<String>,
        authors: Vec<String>,
    ) -> Self {
        let mut title = title.into();
        if title.trim().is_empty() {
            title = "Untitled".to_string();
        }
        if title.chars().count() > 500 {
            title = title.chars().take(500).collect();
        }
        Self {
            source,
            title,
            url: url.into(),
            date: date
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            authors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_becomes_untitled() {
        let c = Citation::new(SourceKind::Pubmed, "   ", "https://x", None, vec![]);
        assert_eq!(c.title, "Untitled");
    }

    #[test]
    fn missing_date_becomes_unknown() {
        let c = Citation::new(SourceKind::Web, "Title", "https://x", None, vec![]);
        assert_eq!(c.date, "Unknown");
    }

    #[test]
    fn overlong_title_is_truncated_to_500_chars() {
        let long = "a".repeat(600);
        let c = Citation::new(SourceKind::Web, long, "https://x", None, vec![]);
        assert_eq!(c.title.chars().count(), 500);
    }
}
