//! Input events and framework events.
//!
//! This module defines the input events that the platform window delivers to the
//! pipeline, and the [`FrameworkEvent`]s the framework publishes on its telemetry
//! channel.
//!
//! # Main Types
//!
//! - [`TouchPoint`], [`KeyEvent`], [`MouseEvent`], [`RotationEvent`]: window input.
//! - [`Modifiers`]: Keyboard modifiers (Shift, Control, Alt, Meta).
//! - [`FrameworkEvent`]: Page lifecycle notifications and exception reports.
//! - [`EventReporter`]: Broadcast sender for framework events. This is the telemetry
//!   side channel; nothing in the core fails loudly, failures are logged and reported here.

use crate::router::PageId;
use bitflags::bitflags;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchType {
    Down,
    Up,
    Move,
    Cancel,
}

/// A single touch point in window coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub kind: TouchType,
}

impl TouchPoint {
    /// Converts window coordinates into logical coordinates.
    pub fn scaled(&self, view_scale: f64) -> TouchPoint {
        if view_scale == 0.0 {
            return *self;
        }
        TouchPoint {
            x: self.x / view_scale,
            y: self.y / view_scale,
            ..*self
        }
    }
}

/// Represents a mouse button that can be pressed or released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    /// No button involved (hover, move)
    None,
    /// Left mouse button pressed (or depressed)
    Left,
    /// Middle mouse button pressed (or depressed)
    Middle,
    /// Right mouse button pressed (or depressed)
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    None,
    Press,
    Release,
    Move,
    HoverEnter,
    HoverExit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub x: f64,
    pub y: f64,
    pub action: MouseAction,
    pub button: MouseButton,
    /// True while the left button is held during a move
    pub left_pressed: bool,
}

impl MouseEvent {
    /// Whether this mouse event should also be delivered as a touch.
    pub fn is_left_touch(&self) -> bool {
        matches!(self.action, MouseAction::Press | MouseAction::Release | MouseAction::Move)
            && (self.button == MouseButton::Left || self.left_pressed)
    }

    pub fn to_touch_point(&self) -> TouchPoint {
        let kind = match self.action {
            MouseAction::Press => TouchType::Down,
            MouseAction::Release => TouchType::Up,
            MouseAction::Move => TouchType::Move,
            _ => TouchType::Cancel,
        };
        TouchPoint { id: 0, x: self.x, y: self.y, kind }
    }

    pub fn scaled(&self, view_scale: f64) -> MouseEvent {
        if view_scale == 0.0 {
            return *self;
        }
        MouseEvent {
            x: self.x / view_scale,
            y: self.y / view_scale,
            ..*self
        }
    }
}

bitflags! {
    pub struct Modifiers: u8 {
        const SHIFT   = 0b0001;
        const CONTROL = 0b0010;
        const ALT     = 0b0100;
        const META    = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Back,
    Tab,
    Other(i32),
}

impl KeyCode {
    pub fn is_direction(&self) -> bool {
        matches!(self, KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
    Click,
    LongPress,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub action: KeyAction,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationEvent {
    /// Rotation delta in degrees
    pub value: f64,
}

/// Transition events emitted by the stage while pages animate in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionEvent {
    PushStart,
    PushEnd,
    PopStart,
    PopEnd,
}

/// Kinds of navigation failures reported on the telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRouterExceptionKind {
    LoadPage,
    ReplacePage,
    UpdatePage,
    StackOverflow,
}

/// Kinds of fatal setup failures reported on the telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStartExceptionKind {
    PipelineContext,
    RunPage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameworkEvent {
    // ****************************************
    // ** Exceptions
    /// Navigation failed or was refused
    PageRouterException { kind: PageRouterExceptionKind, url: String },
    /// A root/stage element required by the pipeline is missing
    AppStartException { kind: AppStartExceptionKind },

    // ****************************************
    // ** Page lifecycle
    /// A page was attached to the stage and recorded on the route stack
    PagePushed { page_id: PageId, url: String },
    /// The top page was replaced
    PageReplaced { page_id: PageId, url: String },
    /// One or more pages were popped after their transition finished
    PagesPopped { top: Option<PageId> },
    /// A page was handed back to the frontend for destruction
    PageDestroyed { page_id: PageId },

    // ****************************************
    // ** Surface
    /// The first surface size arrived and frames are being produced
    SurfaceReady { width: i32, height: i32 },
}

/// Publishes framework events. Cloning yields another sender on the same channel.
#[derive(Clone, Debug)]
pub struct EventReporter {
    tx: broadcast::Sender<FrameworkEvent>,
}

impl EventReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _first_rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FrameworkEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, event: FrameworkEvent) {
        let _ = self.tx.send(event);
    }

    pub fn page_router_exception(&self, kind: PageRouterExceptionKind, url: &str) {
        log::warn!("page router exception {:?} for '{}'", kind, url);
        self.emit(FrameworkEvent::PageRouterException { kind, url: url.to_string() });
    }

    pub fn app_start_exception(&self, kind: AppStartExceptionKind) {
        log::error!("app start exception {:?}", kind);
        self.emit(FrameworkEvent::AppStartException { kind });
    }
}

impl Default for EventReporter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_point_scales_to_logical_pixels() {
        let p = TouchPoint { id: 1, x: 200.0, y: 100.0, kind: TouchType::Down };
        let scaled = p.scaled(2.0);
        assert_eq!(scaled.x, 100.0);
        assert_eq!(scaled.y, 50.0);
        assert_eq!(scaled.kind, TouchType::Down);
        assert_eq!(p.scaled(0.0), p);
    }

    #[test]
    fn only_left_button_mouse_events_become_touches() {
        let press = MouseEvent {
            x: 1.0,
            y: 2.0,
            action: MouseAction::Press,
            button: MouseButton::Left,
            left_pressed: false,
        };
        assert!(press.is_left_touch());
        assert_eq!(press.to_touch_point().kind, TouchType::Down);

        let right = MouseEvent { button: MouseButton::Right, ..press };
        assert!(!right.is_left_touch());

        let drag = MouseEvent { action: MouseAction::Move, button: MouseButton::None, left_pressed: true, ..press };
        assert!(drag.is_left_touch());

        let hover = MouseEvent { action: MouseAction::HoverEnter, ..press };
        assert!(!hover.is_left_touch());
    }

    #[test]
    fn reporter_without_subscribers_does_not_fail() {
        let reporter = EventReporter::new(4);
        reporter.page_router_exception(PageRouterExceptionKind::LoadPage, "pages/a.js");
    }

    #[test]
    fn reporter_delivers_to_subscribers() {
        let reporter = EventReporter::new(4);
        let mut rx = reporter.subscribe();
        reporter.app_start_exception(AppStartExceptionKind::PipelineContext);
        assert_eq!(
            rx.try_recv().unwrap(),
            FrameworkEvent::AppStartException { kind: AppStartExceptionKind::PipelineContext }
        );
    }
}
