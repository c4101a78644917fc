//! Workflow index query parameters and the search filter language.

use serde::{Deserialize, Serialize};

/// Column a workflow listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowSortBy {
    /// Creation time.
    CreateTime,
    /// Last update time.
    #[default]
    UpdateTime,
    /// Name, case-insensitive.
    Name,
}

/// Filter, sort and pagination parameters of a workflow listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct WorkflowIndexQuery {
    /// List deleted workflows instead of live ones.
    pub show_deleted: bool,
    /// Include hidden workflows.
    pub show_hidden: bool,
    /// Include workflows published by other users.
    pub show_published: bool,
    /// Include workflows other users shared with the caller.
    pub show_shared: bool,
    /// Search expression, see [`SearchTerm`].
    pub search: Option<String>,
    /// Sort column.
    pub sort_by: WorkflowSortBy,
    /// Sort descending.
    pub sort_desc: bool,
    /// Maximum number of results.
    pub limit: Option<i64>,
    /// Number of results to skip.
    pub offset: Option<i64>,
    /// Do not compute step counts.
    pub skip_step_counts: bool,
    /// Regroup the result by missing tool-shed repositories.
    pub missing_tools: bool,
}

impl Default for WorkflowIndexQuery {
    fn default() -> Self {
        Self {
            show_deleted: false,
            show_hidden: false,
            show_published: false,
            show_shared: true,
            search: None,
            sort_by: WorkflowSortBy::UpdateTime,
            sort_desc: true,
            limit: None,
            offset: None,
            skip_step_counts: false,
            missing_tools: false,
        }
    }
}

impl WorkflowIndexQuery {
    /// Parsed search terms; empty when there is no search expression.
    #[must_use]
    pub fn search_terms(&self) -> Vec<SearchTerm> {
        self.search.as_deref().map(parse_search).unwrap_or_default()
    }
}

/// One term of the search filter language.
///
/// | Syntax            | Meaning                                   |
/// |-------------------|-------------------------------------------|
/// | `name:<text>`     | name contains text                        |
/// | `user:<name>`     | owned by that user                        |
/// | `is:published`    | published                                 |
/// | `is:shared_with_me` | shared with the caller by someone else  |
/// | `is:deleted`      | deleted                                   |
/// | `is:bookmarked`   | in the caller's workflow menu             |
/// | anything else     | name contains text                        |
///
/// Values may be quoted with `'` or `"` to include spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerm {
    /// `name:` filter.
    Name(String),
    /// `user:` filter.
    Owner(String),
    /// `is:published`.
    Published,
    /// `is:shared_with_me`.
    SharedWithMe,
    /// `is:deleted`.
    Deleted,
    /// `is:bookmarked`.
    Bookmarked,
    /// Bare text.
    Text(String),
}

/// Parse a search expression into terms.
#[must_use]
pub fn parse_search(search: &str) -> Vec<SearchTerm> {
    tokenize(search)
        .into_iter()
        .filter_map(|token| {
            let term = match token.split_once(':') {
                Some(("name", value)) => SearchTerm::Name(value.to_string()),
                Some(("user", value)) => SearchTerm::Owner(value.to_string()),
                Some(("is", "published")) => SearchTerm::Published,
                Some(("is", "shared_with_me")) => SearchTerm::SharedWithMe,
                Some(("is", "deleted")) => SearchTerm::Deleted,
                Some(("is", "bookmarked")) => SearchTerm::Bookmarked,
                _ => SearchTerm::Text(token),
            };
            match &term {
                SearchTerm::Name(v) | SearchTerm::Owner(v) | SearchTerm::Text(v) if v.is_empty() => {
                    None
                }
                _ => Some(term),
            }
        })
        .collect()
}

/// Split on whitespace, keeping quoted runs together and dropping the quotes.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
