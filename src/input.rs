//! Touch collection from winit window events.
//!
//! [`TouchTracker`] turns raw [`WindowEvent`]s into the two signals the
//! [`InputAdapter`](crate::InputAdapter) understands: a batch of every touch
//! currently down, and "all touches ended". The left mouse button acts as one
//! extra finger so the simulation can be driven without a touch screen.
//!
//! ```ignore
//! if let Some(signal) = tracker.handle_event(&event) {
//!     sim.apply(signal);
//! }
//! ```

use glam::Vec2;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};

use crate::adapter::TouchPoint;

/// Touch id used for the mouse pointer.
pub const MOUSE_TOUCH_ID: u64 = u64::MAX;

/// What changed after one window event.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchSignal {
    /// Every touch currently down, in the order they went down.
    Batch(Vec<TouchPoint>),
    /// The last touch lifted or the gesture was cancelled.
    Ended,
}

/// Ordered set of active touches.
#[derive(Debug, Default)]
pub struct TouchTracker {
    touches: Vec<TouchPoint>,
    cursor: Vec2,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known cursor position in window pixels.
    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    pub fn active(&self) -> &[TouchPoint] {
        &self.touches
    }

    /// Feed one window event. Returns a signal when the touch set changed.
    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<TouchSignal> {
        match event {
            WindowEvent::Touch(touch) => {
                let position = Vec2::new(touch.location.x as f32, touch.location.y as f32);
                match touch.phase {
                    TouchPhase::Started | TouchPhase::Moved => self.press(touch.id, position),
                    TouchPhase::Ended => self.release(touch.id),
                    TouchPhase::Cancelled => self.cancel(),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                if self.is_down(MOUSE_TOUCH_ID) {
                    self.press(MOUSE_TOUCH_ID, self.cursor)
                } else {
                    None
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.press(MOUSE_TOUCH_ID, self.cursor),
                ElementState::Released => self.release(MOUSE_TOUCH_ID),
            },
            WindowEvent::CursorLeft { .. } if self.is_down(MOUSE_TOUCH_ID) => {
                self.release(MOUSE_TOUCH_ID)
            }
            WindowEvent::Focused(false) if !self.touches.is_empty() => self.cancel(),
            _ => None,
        }
    }

    fn is_down(&self, id: u64) -> bool {
        self.touches.iter().any(|t| t.id == id)
    }

    fn press(&mut self, id: u64, position: Vec2) -> Option<TouchSignal> {
        match self.touches.iter_mut().find(|t| t.id == id) {
            Some(touch) => touch.position = position,
            None => self.touches.push(TouchPoint::new(id, position)),
        }
        Some(TouchSignal::Batch(self.touches.clone()))
    }

    fn release(&mut self, id: u64) -> Option<TouchSignal> {
        let before = self.touches.len();
        self.touches.retain(|t| t.id != id);
        if self.touches.len() == before {
            return None;
        }
        if self.touches.is_empty() {
            Some(TouchSignal::Ended)
        } else {
            Some(TouchSignal::Batch(self.touches.clone()))
        }
    }

    fn cancel(&mut self) -> Option<TouchSignal> {
        self.touches.clear();
        Some(TouchSignal::Ended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;
    use winit::event::{DeviceId, Touch};

    fn touch(id: u64, phase: TouchPhase, x: f64, y: f64) -> WindowEvent {
        WindowEvent::Touch(Touch {
            device_id: unsafe { DeviceId::dummy() },
            phase,
            location: PhysicalPosition::new(x, y),
            force: None,
            id,
        })
    }

    #[test]
    fn test_touch_sequence() {
        let mut tracker = TouchTracker::new();

        let signal = tracker.handle_event(&touch(1, TouchPhase::Started, 10.0, 20.0));
        assert_eq!(
            signal,
            Some(TouchSignal::Batch(vec![TouchPoint::new(1, Vec2::new(10.0, 20.0))]))
        );

        tracker.handle_event(&touch(2, TouchPhase::Started, 5.0, 5.0));
        let signal = tracker.handle_event(&touch(1, TouchPhase::Moved, 11.0, 21.0));
        match signal {
            Some(TouchSignal::Batch(points)) => {
                assert_eq!(points.len(), 2);
                assert_eq!(points[0].id, 1);
                assert_eq!(points[0].position, Vec2::new(11.0, 21.0));
            }
            other => panic!("expected batch, got {other:?}"),
        }

        let signal = tracker.handle_event(&touch(1, TouchPhase::Ended, 0.0, 0.0));
        assert_eq!(
            signal,
            Some(TouchSignal::Batch(vec![TouchPoint::new(2, Vec2::new(5.0, 5.0))]))
        );
        let signal = tracker.handle_event(&touch(2, TouchPhase::Ended, 0.0, 0.0));
        assert_eq!(signal, Some(TouchSignal::Ended));
        assert!(tracker.active().is_empty());
    }

    #[test]
    fn test_cancel_ends_gesture() {
        let mut tracker = TouchTracker::new();
        tracker.handle_event(&touch(1, TouchPhase::Started, 0.0, 0.0));
        tracker.handle_event(&touch(2, TouchPhase::Started, 0.0, 0.0));
        let signal = tracker.handle_event(&touch(2, TouchPhase::Cancelled, 0.0, 0.0));
        assert_eq!(signal, Some(TouchSignal::Ended));
        assert!(tracker.active().is_empty());
    }

    #[test]
    fn test_unknown_release_is_ignored() {
        let mut tracker = TouchTracker::new();
        assert_eq!(tracker.handle_event(&touch(9, TouchPhase::Ended, 0.0, 0.0)), None);
    }

    #[test]
    fn test_mouse_drag_acts_as_touch() {
        let mut tracker = TouchTracker::new();
        let device_id = unsafe { DeviceId::dummy() };

        let moved = WindowEvent::CursorMoved {
            device_id,
            position: PhysicalPosition::new(40.0, 50.0),
        };
        assert_eq!(tracker.handle_event(&moved), None);
        assert_eq!(tracker.cursor(), Vec2::new(40.0, 50.0));

        let pressed = WindowEvent::MouseInput {
            device_id,
            state: ElementState::Pressed,
            button: MouseButton::Left,
        };
        assert_eq!(
            tracker.handle_event(&pressed),
            Some(TouchSignal::Batch(vec![TouchPoint::new(
                MOUSE_TOUCH_ID,
                Vec2::new(40.0, 50.0)
            )]))
        );

        let released = WindowEvent::MouseInput {
            device_id,
            state: ElementState::Released,
            button: MouseButton::Left,
        };
        assert_eq!(tracker.handle_event(&released), Some(TouchSignal::Ended));
    }
}
