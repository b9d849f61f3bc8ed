//! Window input reduced to what the scene reacts to.

use winit::{
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Resized { width: u32, height: u32 },
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    MouseButton { button: MouseButton, pressed: bool },
    MouseMoved { x: f64, y: f64 },
}

impl InputEvent {
    /// Converts a window event, `None` for everything the scene ignores.
    pub fn from_window_event(event: &WindowEvent) -> Option<Self> {
        match event {
            WindowEvent::Resized(size) => Some(Self::Resized {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => Some(match state {
                ElementState::Pressed => Self::KeyDown(*key),
                ElementState::Released => Self::KeyUp(*key),
            }),
            WindowEvent::MouseInput { state, button, .. } => Some(Self::MouseButton {
                button: *button,
                pressed: state.is_pressed(),
            }),
            WindowEvent::CursorMoved { position, .. } => Some(Self::MouseMoved {
                x: position.x,
                y: position.y,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_and_cursor_are_converted() {
        let resized = WindowEvent::Resized(winit::dpi::PhysicalSize::new(640, 480));
        assert_eq!(
            InputEvent::from_window_event(&resized),
            Some(InputEvent::Resized {
                width: 640,
                height: 480
            })
        );
        assert_eq!(
            InputEvent::from_window_event(&WindowEvent::Focused(true)),
            None
        );
    }
}
