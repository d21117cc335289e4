
use serde::{Deserialize, Serialize};

use crate::autofill::error::AutofillError;
use crate::dom::dom_model::{Document, Mutation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub usize);

impl FrameId {
    pub const TOP: FrameId = FrameId(0);
}

/// One browsing context inside a tab.
#[derive(Debug, Clone)]
pub struct Frame {
    pub url: String,
    pub document: Document,
    pub parent: Option<FrameId>,
    /// False once the frame's page context is gone; messages to it have no
    /// receiver.
    pub attached: bool,
}

/// A tab: the top-level document plus nested frames. Frame 0 is the top.
#[derive(Debug, Clone)]
pub struct Tab {
    frames: Vec<Frame>,
}

impl Tab {
    pub fn new(url: &str, document: Document) -> Self {
        Tab {
            frames: vec![Frame {
                url: url.to_string(),
                document,
                parent: None,
                attached: true,
            }],
        }
    }

    pub fn add_frame(&mut self, parent: FrameId, url: &str, document: Document) -> FrameId {
        let id = FrameId(self.frames.len());
        self.frames.push(Frame {
            url: url.to_string(),
            document,
            parent: Some(parent),
            attached: true,
        });
        id
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id.0)
    }

    pub fn document(&self, id: FrameId) -> Option<&Document> {
        self.frames.get(id.0).map(|f| &f.document)
    }

    pub fn document_mut(&mut self, id: FrameId) -> Option<&mut Document> {
        self.frames.get_mut(id.0).map(|f| &mut f.document)
    }

    pub fn detach(&mut self, id: FrameId) {
        if let Some(frame) = self.frames.get_mut(id.0) {
            frame.attached = false;
        }
    }

    pub fn top(&self, id: FrameId) -> FrameId {
        let mut current = id;
        while let Some(parent) = self.frame(current).and_then(|f| f.parent) {
            current = parent;
        }
        current
    }

    pub fn is_embedded(&self, id: FrameId) -> bool {
        self.frame(id).and_then(|f| f.parent).is_some()
    }

    /// Script in `from` can read `to`'s document only when both share an
    /// origin.
    pub fn can_access(&self, from: FrameId, to: FrameId) -> bool {
        if from == to {
            return true;
        }
        match (self.frame(from), self.frame(to)) {
            (Some(a), Some(b)) => same_origin(&a.url, &b.url),
            _ => false,
        }
    }

    /// Documents a script in `from` may search: itself, then its parent,
    /// then the top, skipping anything cross-origin.
    pub fn search_frames(&self, from: FrameId) -> Vec<FrameId> {
        let mut out = vec![from];
        let parent = self.frame(from).and_then(|f| f.parent);

        if let Some(parent) = parent {
            if self.can_access(from, parent) {
                out.push(parent);
            }
        }

        let top = self.top(from);
        if top != from && Some(top) != parent && self.can_access(from, top) {
            out.push(top);
        }
        out
    }

    /// Drain every frame's mutation journal.
    pub fn take_journals(&mut self) -> Vec<(FrameId, Vec<Mutation>)> {
        self.frames
            .iter_mut()
            .enumerate()
            .map(|(i, f)| (FrameId(i), f.document.take_journal()))
            .filter(|(_, ops)| !ops.is_empty())
            .collect()
    }
}

pub fn same_origin(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

// ============================================================================
// Page seam driven by the orchestrator
// ============================================================================

/// The page a session runs in: a tab and the frame the session belongs to.
pub trait PageContext {
    fn frame(&self) -> FrameId;

    fn tab(&self) -> &Tab;

    fn tab_mut(&mut self) -> &mut Tab;

    fn url(&self) -> String {
        self.tab()
            .frame(self.frame())
            .map(|f| f.url.clone())
            .unwrap_or_default()
    }

    /// Pull current page state before a timer task runs.
    fn refresh(&mut self) -> Result<(), AutofillError> {
        Ok(())
    }

    /// Push side effects of the task just run.
    fn commit(&mut self) -> Result<(), AutofillError> {
        Ok(())
    }
}

/// An in-memory page: the tab is only changed by the session itself.
#[derive(Debug, Clone)]
pub struct TabPage {
    pub tab: Tab,
    pub frame: FrameId,
}

impl TabPage {
    pub fn new(tab: Tab, frame: FrameId) -> Self {
        TabPage { tab, frame }
    }

    pub fn top_level(url: &str, document: Document) -> Self {
        TabPage {
            tab: Tab::new(url, document),
            frame: FrameId::TOP,
        }
    }
}

impl PageContext for TabPage {
    fn frame(&self) -> FrameId {
        self.frame
    }

    fn tab(&self) -> &Tab {
        &self.tab
    }

    fn tab_mut(&mut self) -> &mut Tab {
        &mut self.tab
    }
}
