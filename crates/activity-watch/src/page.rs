//! Page trait: the DOM-mutation sink the poller renders into.
//!
//! Design principles:
//! - The poller is the only writer. It owns the page and funnels every
//!   mutation through these methods, so no locking is involved.
//! - `Document` is the in-memory page: it keeps the displayed container and a
//!   journal of mutations. Renderers wrap it and add presentation.

use std::sync::atomic::{AtomicU64, Ordering};

use activity_proto::fragment::{ActivityFragment, HeaderFragment};

/// Identity of an inserted container node. Replacing the container yields a
/// fresh id; in-place edits (header swap, opacity, error text) keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The activity container currently on the page.
#[derive(Debug, Clone)]
pub struct ActivityContainer {
    id: NodeId,
    fragment: ActivityFragment,
    opacity: f32,
    busy: bool,
}

impl ActivityContainer {
    pub fn new(fragment: ActivityFragment) -> Self {
        Self {
            id: NodeId::next(),
            fragment,
            opacity: 1.0,
            busy: false,
        }
    }

    /// Empty container marked busy, as served before the first fetch.
    pub fn loading() -> Self {
        Self {
            busy: true,
            ..Self::new(ActivityFragment::placeholder())
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn fragment(&self) -> &ActivityFragment {
        &self.fragment
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

/// One recorded page mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Header { node: NodeId },
    Opacity { node: NodeId, value: f32 },
    Replace { old: NodeId, new: NodeId },
    Error { node: NodeId, message: String },
}

impl Mutation {
    /// Opacity changes are presentation only; everything else edits content.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Mutation::Opacity { .. })
    }
}

pub trait Page: Send {
    /// The activity container, or `None` when this page has no activity
    /// feature at all.
    fn container(&self) -> Option<&ActivityContainer>;

    /// Swap only the status header sub-element.
    fn replace_header(&mut self, header: HeaderFragment);

    fn set_opacity(&mut self, opacity: f32);

    /// Replace the whole container node. Returns the new node's id.
    fn replace_container(&mut self, fragment: ActivityFragment) -> Option<NodeId>;

    /// Replace the container's content with an inline error message.
    fn show_error(&mut self, message: &str);

    /// Re-attach fragment-local listeners (the lyrics modal triggers).
    /// Inserted markup carries no listeners, so this runs after every
    /// successful refresh.
    fn attach_listeners(&mut self);
}

/// In-memory page.
#[derive(Debug, Default)]
pub struct Document {
    container: Option<ActivityContainer>,
    journal: Vec<Mutation>,
    listener_attachments: u32,
    lyrics_bound: bool,
}

impl Document {
    pub fn new(container: ActivityContainer) -> Self {
        Self {
            container: Some(container),
            ..Self::default()
        }
    }

    /// A page without an activity container.
    pub fn without_activity() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> &[Mutation] {
        &self.journal
    }

    /// Mutations other than opacity changes.
    pub fn structural_mutations(&self) -> impl Iterator<Item = &Mutation> {
        self.journal.iter().filter(|m| m.is_structural())
    }

    pub fn listener_attachments(&self) -> u32 {
        self.listener_attachments
    }

    /// Whether the lyrics modal triggers were wired on the last attachment.
    pub fn lyrics_bound(&self) -> bool {
        self.lyrics_bound
    }
}

impl Page for Document {
    fn container(&self) -> Option<&ActivityContainer> {
        self.container.as_ref()
    }

    fn replace_header(&mut self, header: HeaderFragment) {
        if let Some(c) = self.container.as_mut() {
            c.fragment.replace_header(header);
            self.journal.push(Mutation::Header { node: c.id });
        }
    }

    fn set_opacity(&mut self, opacity: f32) {
        if let Some(c) = self.container.as_mut() {
            c.opacity = opacity.clamp(0.0, 1.0);
            self.journal.push(Mutation::Opacity {
                node: c.id,
                value: c.opacity,
            });
        }
    }

    fn replace_container(&mut self, fragment: ActivityFragment) -> Option<NodeId> {
        let old = self.container.as_ref()?.id;
        let next = ActivityContainer::new(fragment);
        let new = next.id;
        self.container = Some(next);
        self.journal.push(Mutation::Replace { old, new });
        Some(new)
    }

    fn show_error(&mut self, message: &str) {
        if let Some(c) = self.container.as_mut() {
            c.busy = false;
            c.fragment = ActivityFragment::error(message);
            self.journal.push(Mutation::Error {
                node: c.id,
                message: message.to_string(),
            });
        }
    }

    fn attach_listeners(&mut self) {
        self.listener_attachments += 1;
        self.lyrics_bound = self
            .container
            .as_ref()
            .map(|c| c.fragment.has_lyrics)
            .unwrap_or(false);
    }
}
