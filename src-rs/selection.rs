//! Turns pointer and keyboard input into one finalized selection.

use serde::Serialize;
use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::geometry::{PagePoint, PageRect};
use crate::hit_test::{hit_test, targets_floating_control, Highlight, PointerInput};
use crate::viewport::Viewport;

/// Region drags must exceed this size (logical px) on both axes.
pub const MIN_REGION_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Element,
    Region,
    FullSurface,
}

/// What a capture request targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionTarget {
    Element { node: NodeId, rect: PageRect },
    Region(PageRect),
    FullSurface,
}

impl SelectionTarget {
    pub fn mode(&self) -> SelectionMode {
        match self {
            SelectionTarget::Element { .. } => SelectionMode::Element,
            SelectionTarget::Region(_) => SelectionMode::Region,
            SelectionTarget::FullSurface => SelectionMode::FullSurface,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionState {
    Idle,
    Active(SelectionMode),
    Finalized(SelectionTarget),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Other,
}

/// Caller-owned decision about where a cancelled selection goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Nothing selected yet; drop back to idle.
    #[default]
    ReturnToIdle,
    /// A multi-step flow has partial progress; the caller steps back.
    GoBack,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionOutcome {
    /// Input consumed, nothing decided yet.
    Pending,
    /// Input belonged to the tool's own controls or arrived in the wrong state.
    Ignored,
    /// Region drag below the minimum size; selection stays active.
    Discarded,
    Cancelled(CancelPolicy),
    Finalized(SelectionTarget),
}

/// Coalesces a burst of pointer moves into one hit test per animation frame.
#[derive(Debug, Default)]
pub struct FrameThrottle {
    pending: bool,
    latest: Option<PointerInput>,
}

impl FrameThrottle {
    /// Stores the newest event. Returns true when the caller must request a
    /// new animation frame.
    pub fn push(&mut self, input: PointerInput) -> bool {
        self.latest = Some(input);
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Called on the frame tick; yields the most recent event.
    pub fn take(&mut self) -> Option<PointerInput> {
        self.pending = false;
        self.latest.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn clear(&mut self) {
        self.pending = false;
        self.latest = None;
    }
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    start: PagePoint,
    end: PagePoint,
}

/// Selection state machine. One instance per capture flow; it owns the
/// highlight cache that hit testing refreshes.
#[derive(Debug)]
pub struct SelectionController {
    state: SelectionState,
    cancel_policy: CancelPolicy,
    throttle: FrameThrottle,
    highlight: Option<Highlight>,
    drag: Option<Drag>,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionController {
    pub fn new() -> Self {
        Self {
            state: SelectionState::Idle,
            cancel_policy: CancelPolicy::default(),
            throttle: FrameThrottle::default(),
            highlight: None,
            drag: None,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn highlight(&self) -> Option<Highlight> {
        self.highlight
    }

    /// Live rectangle of an in-progress region drag.
    pub fn region_preview(&self) -> Option<PageRect> {
        self.drag
            .map(|drag| PageRect::from_corners(drag.start, drag.end))
    }

    pub fn begin(&mut self, mode: SelectionMode, cancel_policy: CancelPolicy) -> SelectionOutcome {
        if self.state == SelectionState::Closed {
            return SelectionOutcome::Ignored;
        }
        self.reset_transient();
        self.cancel_policy = cancel_policy;

        if mode == SelectionMode::FullSurface {
            return self.finalize(SelectionTarget::FullSurface);
        }
        self.transition(SelectionState::Active(mode));
        SelectionOutcome::Pending
    }

    /// Returns true when the caller must schedule an animation frame.
    pub fn pointer_move(&mut self, input: PointerInput, viewport: &Viewport) -> bool {
        match self.state {
            SelectionState::Active(SelectionMode::Element) => self.throttle.push(input),
            SelectionState::Active(SelectionMode::Region) => {
                if let Some(drag) = self.drag.as_mut() {
                    drag.end = viewport.client_to_page(input.client);
                }
                false
            }
            _ => false,
        }
    }

    /// Frame tick: runs at most one hit test for all moves since the last tick.
    pub fn animation_frame(&mut self, doc: &mut Document, viewport: &Viewport) -> Option<Highlight> {
        let input = self.throttle.take()?;
        if self.state != SelectionState::Active(SelectionMode::Element) {
            return None;
        }
        hit_test(doc, viewport, &input, &mut self.highlight);
        self.highlight
    }

    pub fn pointer_down(
        &mut self,
        doc: &Document,
        viewport: &Viewport,
        input: PointerInput,
        button: PointerButton,
    ) -> SelectionOutcome {
        if !matches!(self.state, SelectionState::Active(_)) {
            return SelectionOutcome::Ignored;
        }
        if targets_floating_control(doc, viewport, &input) {
            return SelectionOutcome::Ignored;
        }
        if button == PointerButton::Secondary {
            return self.cancel();
        }
        if self.state == SelectionState::Active(SelectionMode::Region) {
            let start = viewport.client_to_page(input.client);
            self.drag = Some(Drag { start, end: start });
            return SelectionOutcome::Pending;
        }
        SelectionOutcome::Ignored
    }

    pub fn pointer_up(&mut self, viewport: &Viewport, input: PointerInput) -> SelectionOutcome {
        if self.state != SelectionState::Active(SelectionMode::Region) {
            return SelectionOutcome::Ignored;
        }
        let Some(mut drag) = self.drag.take() else {
            return SelectionOutcome::Ignored;
        };
        drag.end = viewport.client_to_page(input.client);
        let rect = PageRect::from_corners(drag.start, drag.end);
        if rect.width > MIN_REGION_SIZE && rect.height > MIN_REGION_SIZE {
            return self.finalize(SelectionTarget::Region(rect));
        }
        debug!(width = rect.width, height = rect.height, "region below minimum, discarded");
        SelectionOutcome::Discarded
    }

    /// Confirming click. Clicks on the tool's own controls pass through untouched.
    pub fn click(
        &mut self,
        doc: &mut Document,
        viewport: &Viewport,
        input: PointerInput,
    ) -> SelectionOutcome {
        if self.state != SelectionState::Active(SelectionMode::Element) {
            return SelectionOutcome::Ignored;
        }
        if targets_floating_control(doc, viewport, &input) {
            return SelectionOutcome::Ignored;
        }
        if self.highlight.is_none() {
            hit_test(doc, viewport, &input, &mut self.highlight);
        }
        match self.highlight {
            Some(Highlight { node, rect }) => self.finalize(SelectionTarget::Element { node, rect }),
            None => SelectionOutcome::Pending,
        }
    }

    pub fn key(&mut self, key: Key) -> SelectionOutcome {
        match (key, self.state) {
            (Key::Escape, SelectionState::Active(_)) => self.cancel(),
            _ => SelectionOutcome::Ignored,
        }
    }

    pub fn cancel(&mut self) -> SelectionOutcome {
        if !matches!(self.state, SelectionState::Active(_)) {
            return SelectionOutcome::Ignored;
        }
        self.reset_transient();
        self.transition(SelectionState::Idle);
        SelectionOutcome::Cancelled(self.cancel_policy)
    }

    /// Finalized or idle controller goes back to idle for the next selection.
    pub fn reset(&mut self) {
        if self.state != SelectionState::Closed {
            self.reset_transient();
            self.transition(SelectionState::Idle);
        }
    }

    pub fn close(&mut self) {
        self.reset_transient();
        self.transition(SelectionState::Closed);
    }

    fn finalize(&mut self, target: SelectionTarget) -> SelectionOutcome {
        self.throttle.clear();
        self.drag = None;
        self.transition(SelectionState::Finalized(target));
        SelectionOutcome::Finalized(target)
    }

    fn reset_transient(&mut self) {
        self.throttle.clear();
        self.highlight = None;
        self.drag = None;
    }

    fn transition(&mut self, next: SelectionState) {
        debug!(from = ?self.state, to = ?next, "selection transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ClientPoint, ScrollOffset};
    use crate::hit_test::{FLOATING_CONTROL, TOOL_ATTRIBUTE};

    fn page() -> (Document, Viewport, NodeId, NodeId) {
        let mut doc = Document::new(1280.0, 3000.0);
        let body = doc.body();
        let button = doc.create_element("button");
        doc.set_rect(button, PageRect::new(40.0, 260.0, 120.0, 40.0));
        doc.append_child(body, button);

        let control = doc.create_element("div");
        doc.set_attribute(control, TOOL_ATTRIBUTE, FLOATING_CONTROL);
        doc.set_rect(control, PageRect::new(1100.0, 220.0, 160.0, 48.0));
        doc.append_child(body, control);

        let viewport = Viewport {
            scroll: ScrollOffset { x: 0.0, y: 200.0 },
            ..Viewport::default()
        };
        (doc, viewport, button, control)
    }

    #[test]
    fn throttle_coalesces_bursts() {
        let mut throttle = FrameThrottle::default();
        assert!(throttle.push(PointerInput::at(1.0, 1.0)));
        assert!(!throttle.push(PointerInput::at(2.0, 2.0)));
        assert!(!throttle.push(PointerInput::at(3.0, 3.0)));
        assert!(throttle.is_pending());
        assert_eq!(throttle.take().map(|i| i.client.x), Some(3.0));
        assert_eq!(throttle.take(), None);
        assert!(throttle.push(PointerInput::at(4.0, 4.0)));
    }

    #[test]
    fn element_mode_finalizes_hovered_element() {
        let (mut doc, viewport, button, _) = page();
        let mut controller = SelectionController::new();
        controller.begin(SelectionMode::Element, CancelPolicy::ReturnToIdle);

        assert!(controller.pointer_move(PointerInput::at(50.0, 70.0), &viewport));
        assert!(!controller.pointer_move(PointerInput::at(60.0, 80.0), &viewport));
        let highlight = controller.animation_frame(&mut doc, &viewport);
        assert_eq!(highlight.map(|h| h.node), Some(button));

        let outcome = controller.click(&mut doc, &viewport, PointerInput::at(60.0, 80.0));
        let expected = SelectionTarget::Element {
            node: button,
            rect: PageRect::new(40.0, 260.0, 120.0, 40.0),
        };
        assert_eq!(outcome, SelectionOutcome::Finalized(expected));
        assert_eq!(controller.state(), SelectionState::Finalized(expected));
    }

    #[test]
    fn clicks_on_floating_control_are_transparent() {
        let (mut doc, viewport, _, control) = page();
        let mut controller = SelectionController::new();
        controller.begin(SelectionMode::Element, CancelPolicy::ReturnToIdle);
        let input = PointerInput {
            client: ClientPoint::new(1150.0, 40.0),
            target: Some(control),
        };
        assert_eq!(
            controller.click(&mut doc, &viewport, input),
            SelectionOutcome::Ignored
        );
        assert_eq!(
            controller.state(),
            SelectionState::Active(SelectionMode::Element)
        );
    }

    #[test]
    fn region_drag_is_page_relative() {
        let (doc, viewport, _, _) = page();
        let mut controller = SelectionController::new();
        controller.begin(SelectionMode::Region, CancelPolicy::ReturnToIdle);
        controller.pointer_down(&doc, &viewport, PointerInput::at(100.0, 100.0), PointerButton::Primary);
        controller.pointer_move(PointerInput::at(300.0, 250.0), &viewport);
        assert_eq!(
            controller.region_preview(),
            Some(PageRect::new(100.0, 300.0, 200.0, 150.0))
        );
        let outcome = controller.pointer_up(&viewport, PointerInput::at(300.0, 250.0));
        assert_eq!(
            outcome,
            SelectionOutcome::Finalized(SelectionTarget::Region(PageRect::new(
                100.0, 300.0, 200.0, 150.0
            )))
        );
    }

    #[test]
    fn tiny_region_is_discarded_and_mode_stays_active() {
        let (doc, viewport, _, _) = page();
        let mut controller = SelectionController::new();
        controller.begin(SelectionMode::Region, CancelPolicy::ReturnToIdle);
        controller.pointer_down(&doc, &viewport, PointerInput::at(100.0, 100.0), PointerButton::Primary);
        let outcome = controller.pointer_up(&viewport, PointerInput::at(110.0, 300.0));
        assert_eq!(outcome, SelectionOutcome::Discarded);
        assert_eq!(
            controller.state(),
            SelectionState::Active(SelectionMode::Region)
        );
        assert_eq!(controller.region_preview(), None);
    }

    #[test]
    fn full_surface_finalizes_immediately() {
        let mut controller = SelectionController::new();
        assert_eq!(
            controller.begin(SelectionMode::FullSurface, CancelPolicy::ReturnToIdle),
            SelectionOutcome::Finalized(SelectionTarget::FullSurface)
        );
    }

    #[test]
    fn escape_and_secondary_button_cancel_with_caller_policy() {
        let (doc, viewport, _, _) = page();
        let mut controller = SelectionController::new();
        controller.begin(SelectionMode::Element, CancelPolicy::GoBack);
        assert_eq!(
            controller.key(Key::Escape),
            SelectionOutcome::Cancelled(CancelPolicy::GoBack)
        );
        assert_eq!(controller.state(), SelectionState::Idle);

        controller.begin(SelectionMode::Region, CancelPolicy::ReturnToIdle);
        let outcome = controller.pointer_down(
            &doc,
            &viewport,
            PointerInput::at(10.0, 10.0),
            PointerButton::Secondary,
        );
        assert_eq!(outcome, SelectionOutcome::Cancelled(CancelPolicy::ReturnToIdle));
    }

    #[test]
    fn closed_controller_ignores_begin() {
        let mut controller = SelectionController::new();
        controller.close();
        assert_eq!(
            controller.begin(SelectionMode::Element, CancelPolicy::ReturnToIdle),
            SelectionOutcome::Ignored
        );
    }
}
