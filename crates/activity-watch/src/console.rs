//! Console renderer: prints the now-playing line whenever the page changes.

use activity_proto::fragment::{ActivityFields, ActivityFragment, HeaderFragment};
use tracing::debug;

use crate::page::{ActivityContainer, Document, NodeId, Page};

pub struct ConsolePage {
    doc: Document,
}

impl ConsolePage {
    pub fn new() -> Self {
        Self {
            doc: Document::new(ActivityContainer::loading()),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }
}

impl Default for ConsolePage {
    fn default() -> Self {
        Self::new()
    }
}

fn stamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// `Artist – Title  (status)`, or just the status when nothing is playing.
pub fn format_line(fields: &ActivityFields) -> String {
    match (fields.now_playing(), fields.status.as_deref()) {
        (Some(np), Some(status)) if !status.is_empty() => format!("\u{266a} {}  ({})", np, status),
        (Some(np), _) => format!("\u{266a} {}", np),
        (None, Some(status)) => status.to_string(),
        (None, None) => "nothing playing".to_string(),
    }
}

impl Page for ConsolePage {
    fn container(&self) -> Option<&ActivityContainer> {
        self.doc.container()
    }

    fn replace_header(&mut self, header: HeaderFragment) {
        self.doc.replace_header(header);
        if let Some(c) = self.doc.container() {
            println!("[{}] {}", stamp(), format_line(&c.fragment().fields));
        }
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.doc.set_opacity(opacity);
    }

    fn replace_container(&mut self, fragment: ActivityFragment) -> Option<NodeId> {
        let line = format_line(&fragment.fields);
        let id = self.doc.replace_container(fragment)?;
        println!("[{}] {}", stamp(), line);
        Some(id)
    }

    fn show_error(&mut self, message: &str) {
        self.doc.show_error(message);
        eprintln!("[{}] ! {}", stamp(), message);
    }

    fn attach_listeners(&mut self) {
        self.doc.attach_listeners();
        if self.doc.lyrics_bound() {
            debug!("[console] lyrics available for current track");
        }
    }
}
