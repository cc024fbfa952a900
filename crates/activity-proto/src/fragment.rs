//! Activity fragment model: extraction of the anchored sub-fragment from a
//! fetched HTML body and the fields used to decide whether it changed.
//!
//! Parsed documents are never kept around. `scraper::Html` is not `Send`, so
//! every function here parses, copies out owned strings and drops the tree
//! before returning.

use scraper::{ElementRef, Html, Selector};

use crate::config::SelectorConfig;

#[derive(Debug, thiserror::Error)]
#[error("invalid {field} selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub field: &'static str,
    pub selector: String,
    pub reason: String,
}

/// Text fields compared between the displayed and the fetched fragment.
/// Each is the trimmed text content of the first match, `None` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFields {
    pub status: Option<String>,
    pub title: Option<String>,
    pub artists: Option<String>,
}

/// What differs between two sets of [`ActivityFields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    /// Only the status header text differs.
    Header,
    /// Title or artists differ. The header may differ as well.
    Track,
}

impl ActivityFields {
    pub fn compare(&self, next: &ActivityFields) -> Change {
        if self.title != next.title || self.artists != next.artists {
            Change::Track
        } else if self.status != next.status {
            Change::Header
        } else {
            Change::Unchanged
        }
    }

    /// One-line summary used by renderers and logs.
    pub fn now_playing(&self) -> Option<String> {
        match (self.title.as_deref(), self.artists.as_deref()) {
            (Some(t), Some(a)) => Some(format!("{} \u{2013} {}", a, t)),
            (Some(t), None) => Some(t.to_string()),
            _ => None,
        }
    }
}

/// The status header sub-element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFragment {
    pub markup: String,
    pub status: Option<String>,
}

/// Markup of one activity container plus everything extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityFragment {
    pub markup: String,
    pub header: Option<HeaderFragment>,
    pub fields: ActivityFields,
    /// The lyrics modal and both of its triggers are present.
    pub has_lyrics: bool,
}

impl ActivityFragment {
    /// Inline error presentation shown in place of the activity.
    pub fn error(message: &str) -> Self {
        Self {
            markup: format!(
                "<div class=\"error-container\"><p class=\"text-in-article\">{}</p></div>",
                escape_text(message)
            ),
            header: None,
            fields: ActivityFields::default(),
            has_lyrics: false,
        }
    }

    /// Empty container as rendered before the first fetch completes.
    pub fn placeholder() -> Self {
        Self {
            markup: String::new(),
            header: None,
            fields: ActivityFields::default(),
            has_lyrics: false,
        }
    }

    /// Swap the header sub-element in place. Title and artists are untouched.
    pub fn replace_header(&mut self, header: HeaderFragment) {
        if let Some(old) = &self.header {
            self.markup = self.markup.replacen(&old.markup, &header.markup, 1);
        }
        self.fields.status = header.status.clone();
        self.header = Some(header);
    }
}

/// Compiled selectors for the fragment markup contract.
#[derive(Debug, Clone)]
pub struct ActivitySelectors {
    anchor: Selector,
    header: Selector,
    status: Selector,
    title: Selector,
    artists: Selector,
    lyrics_modal: Selector,
    lyrics_open: Selector,
    lyrics_close: Selector,
}

impl ActivitySelectors {
    pub fn from_config(cfg: &SelectorConfig) -> Result<Self, SelectorError> {
        Ok(Self {
            anchor: compile("anchor", &cfg.anchor)?,
            header: compile("header", &cfg.header)?,
            status: compile("status", &cfg.status)?,
            title: compile("title", &cfg.title)?,
            artists: compile("artists", &cfg.artists)?,
            lyrics_modal: compile("lyrics_modal", &cfg.lyrics_modal)?,
            lyrics_open: compile("lyrics_open", &cfg.lyrics_open)?,
            lyrics_close: compile("lyrics_close", &cfg.lyrics_close)?,
        })
    }

    /// Locate the anchor element in a fetched body.
    ///
    /// Returns `None` when the anchor is missing, which callers treat as
    /// "nothing to update" rather than as an error.
    pub fn extract(&self, body: &str) -> Option<ActivityFragment> {
        let html = Html::parse_fragment(body);
        let anchor = html.select(&self.anchor).next()?;
        Some(self.describe(anchor, anchor.html()))
    }

    /// Describe markup that already is a container's content.
    pub fn read(&self, markup: &str) -> ActivityFragment {
        let html = Html::parse_fragment(markup);
        self.describe(html.root_element(), markup.to_string())
    }

    fn describe(&self, scope: ElementRef<'_>, markup: String) -> ActivityFragment {
        let header = scope.select(&self.header).next().map(|el| HeaderFragment {
            markup: el.html(),
            status: first_text(el, &self.status),
        });

        let fields = ActivityFields {
            status: first_text(scope, &self.status),
            title: first_text(scope, &self.title),
            artists: first_text(scope, &self.artists),
        };

        let has_lyrics = [&self.lyrics_modal, &self.lyrics_open, &self.lyrics_close]
            .iter()
            .all(|sel| scope.select(sel).next().is_some());

        ActivityFragment {
            markup,
            header,
            fields,
            has_lyrics,
        }
    }
}

fn compile(field: &'static str, selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        field,
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
