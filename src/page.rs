//! Page-level view state: the active section and the hover tooltip.
//!
//! [`PageController`] owns all mutable UI state. Renderers read a
//! [`PageSnapshot`]; scroll events reach the controller through an
//! [`EventHub`] subscription taken at mount time and released at unmount.

use crate::Section;
use crate::events::{EventError, EventHub, Subscription};
use crate::glossary::GlossaryEntry;
use crate::scroll::{ScrollMetrics, ScrollTracker};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// Vertical gap between a hovered term and its tooltip, in pixels.
pub const TOOLTIP_GAP_PX: f64 = 10.0;

/// One scroll notification plus the anchor layout measured at that moment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollEvent {
    pub metrics: ScrollMetrics,
    pub anchors: Vec<Option<f64>>,
}

/// Bounding box of a hovered element, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Tooltip {
    #[default]
    Hidden,
    /// `x` is the horizontal centre of the term, `y` sits just above it.
    Visible {
        term: String,
        definition: String,
        x: f64,
        y: f64,
    },
}

impl Tooltip {
    pub fn anchored(entry: &GlossaryEntry, rect: Rect) -> Self {
        Tooltip::Visible {
            term: entry.term.clone(),
            definition: entry.definition.clone(),
            x: rect.left + rect.width / 2.0,
            y: rect.top - TOOLTIP_GAP_PX,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, Tooltip::Visible { .. })
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    Smooth,
}

/// Ask the host to bring an anchor into view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrollRequest {
    pub anchor: String,
    pub behavior: ScrollBehavior,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarItem {
    pub id: String,
    pub title: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSnapshot {
    pub active: Option<String>,
    pub sidebar: Vec<SidebarItem>,
    pub tooltip: Tooltip,
}

#[derive(Debug, Clone)]
pub struct PageController {
    titles: Vec<String>,
    tracker: ScrollTracker,
    tooltip: Tooltip,
}

impl PageController {
    pub fn new(sections: &[Section]) -> Self {
        Self {
            titles: sections.iter().map(|section| section.title.clone()).collect(),
            tracker: ScrollTracker::new(sections.iter().map(|section| section.id.as_str())),
            tooltip: Tooltip::Hidden,
        }
    }

    pub fn active_id(&self) -> Option<&str> {
        self.tracker.active_id()
    }

    pub fn on_scroll(&mut self, event: &ScrollEvent) -> bool {
        self.tracker.update(event.metrics, &event.anchors)
    }

    /// Preselects a section; unknown ids leave the state untouched.
    pub fn select(&mut self, id: &str) -> bool {
        self.tracker.select(id)
    }

    pub fn hover_enter(&mut self, entry: &GlossaryEntry, rect: Rect) {
        self.tooltip = Tooltip::anchored(entry, rect);
    }

    pub fn hover_leave(&mut self) {
        self.tooltip = Tooltip::Hidden;
    }

    pub fn tooltip(&self) -> &Tooltip {
        &self.tooltip
    }

    /// Smooth-scroll request for a sidebar click. The active section is left
    /// alone; the scroll events that follow recompute it.
    pub fn navigate(&self, id: &str) -> Option<ScrollRequest> {
        self.tracker.position(id).map(|_| ScrollRequest {
            anchor: id.to_string(),
            behavior: ScrollBehavior::Smooth,
        })
    }

    pub fn snapshot(&self) -> PageSnapshot {
        let active = self.tracker.active_index();
        let sidebar = self
            .tracker
            .ids()
            .zip(&self.titles)
            .enumerate()
            .map(|(idx, (id, title))| SidebarItem {
                id: id.to_string(),
                title: title.clone(),
                active: active == Some(idx),
            })
            .collect();
        PageSnapshot {
            active: self.active_id().map(str::to_string),
            sidebar,
            tooltip: self.tooltip.clone(),
        }
    }

    /// Registers the scroll handler. The listener lives until the returned
    /// page is unmounted or dropped.
    pub fn mount(self, hub: &EventHub<ScrollEvent>) -> Result<MountedPage, EventError> {
        let controller = Rc::new(RefCell::new(self));
        let handler = Rc::clone(&controller);
        let subscription = hub.subscribe(move |event: &ScrollEvent| {
            handler.borrow_mut().on_scroll(event);
        })?;
        Ok(MountedPage {
            controller,
            subscription,
        })
    }
}

/// A controller with a live scroll subscription.
pub struct MountedPage {
    controller: Rc<RefCell<PageController>>,
    subscription: Subscription,
}

impl MountedPage {
    pub fn snapshot(&self) -> PageSnapshot {
        self.controller.borrow().snapshot()
    }

    pub fn active_id(&self) -> Option<String> {
        self.controller.borrow().active_id().map(str::to_string)
    }

    pub fn hover_enter(&self, entry: &GlossaryEntry, rect: Rect) {
        self.controller.borrow_mut().hover_enter(entry, rect);
    }

    pub fn hover_leave(&self) {
        self.controller.borrow_mut().hover_leave();
    }

    pub fn navigate(&self, id: &str) -> Option<ScrollRequest> {
        self.controller.borrow().navigate(id)
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.is_active()
    }

    /// Releases the scroll listener and returns the final state.
    pub fn unmount(self) -> PageSnapshot {
        let MountedPage {
            controller,
            subscription,
        } = self;
        subscription.cancel();
        controller.borrow().snapshot()
    }
}
