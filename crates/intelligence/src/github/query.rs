//! Repository search query construction.

use chrono::NaiveDate;

/// Sort key for repository search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSort {
    Stars,
    Updated,
}

impl SearchSort {
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Stars => "stars",
            Self::Updated => "updated",
        }
    }
}

/// A bounded repository search (`GET /search/repositories`), always in
/// descending order of `sort`.
///
/// Qualifier values that come from profile data go through
/// [`sanitize_search_term`] so they cannot smuggle extra operators into the
/// query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    qualifiers: Vec<String>,
    pub sort: SearchSort,
    pub per_page: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            qualifiers: Vec::new(),
            sort: SearchSort::Stars,
            per_page: 30,
        }
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(mut self, language: &str) -> Self {
        let clean = sanitize_search_term(language).replace('"', "");
        if clean.is_empty() {
            return self;
        }
        if clean.contains(' ') {
            self.qualifiers.push(format!("language:\"{clean}\""));
        } else {
            self.qualifiers.push(format!("language:{clean}"));
        }
        self
    }

    /// Adds `org:` qualifiers; GitHub ORs repeated `org:` terms.
    pub fn orgs<I, S>(mut self, orgs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for org in orgs {
            let clean = sanitize_search_term(org.as_ref()).replace(['"', ' '], "");
            if !clean.is_empty() {
                self.qualifiers.push(format!("org:{clean}"));
            }
        }
        self
    }

    pub fn min_stars(mut self, stars: u64) -> Self {
        self.qualifiers.push(format!("stars:>={stars}"));
        self
    }

    pub fn pushed_since(mut self, date: NaiveDate) -> Self {
        self.qualifiers
            .push(format!("pushed:>={}", date.format("%Y-%m-%d")));
        self
    }

    pub fn not_archived(mut self) -> Self {
        self.qualifiers.push("archived:false".to_string());
        self
    }

    pub fn min_good_first_issues(mut self, count: u32) -> Self {
        self.qualifiers.push(format!("good-first-issues:>={count}"));
        self
    }

    pub fn sort(mut self, sort: SearchSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, 100);
        self
    }

    /// The `q` parameter.
    pub fn query_string(&self) -> String {
        self.qualifiers.join(" ")
    }
}

/// Strip GitHub search operators from a free-text value.
pub fn sanitize_search_term(term: &str) -> String {
    const COLON_OPERATORS: &[&str] = &[
        "repo:",
        "org:",
        "user:",
        "in:",
        "size:",
        "fork:",
        "forks:",
        "stars:",
        "topics:",
        "topic:",
        "created:",
        "pushed:",
        "updated:",
        "is:",
        "archived:",
        "license:",
        "language:",
        "filename:",
        "path:",
        "extension:",
        "label:",
    ];
    const BOOLEAN_OPERATORS: &[&str] = &["NOT", "AND", "OR"];

    let mut sanitized = term.to_string();

    for op in COLON_OPERATORS {
        loop {
            // ASCII lowering keeps byte offsets aligned with `sanitized`.
            let lower = sanitized.to_ascii_lowercase();
            let Some(pos) = lower.find(op) else {
                break;
            };
            let rest = &sanitized[pos + op.len()..];
            let end = if rest.starts_with('"') {
                rest[1..]
                    .find('"')
                    .map(|p| pos + op.len() + p + 2)
                    .unwrap_or(sanitized.len())
            } else {
                rest.find(' ')
                    .map(|p| pos + op.len() + p)
                    .unwrap_or(sanitized.len())
            };
            sanitized = format!("{}{}", &sanitized[..pos], &sanitized[end..]);
        }
    }

    sanitized
        .split_whitespace()
        .filter(|word| !BOOLEAN_OPERATORS.iter().any(|op| word.eq_ignore_ascii_case(op)))
        .collect::<Vec<_>>()
        .join(" ")
}
