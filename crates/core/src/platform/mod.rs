pub mod capture;
pub mod hotkey;
pub mod stub;

#[cfg(target_os = "windows")]
pub mod win32;

use anyhow::Result;

use crate::error::{CaptureError, InputError};
use crate::keys::{Key, KeyRouting};
use crate::logger;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Produces frames of the target window's client area on demand.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

/// Delivers synthetic input to the target window.
pub trait InputSink: Send {
    /// Click at `pos` in client coordinates. With `restore_cursor` the operator's
    /// cursor is put back where it was, on success and on failure.
    fn click(&mut self, pos: Point, button: MouseButton, restore_cursor: bool) -> Result<(), InputError>;

    /// Press and release `key` through the channel its class is routed to.
    fn send_key(&mut self, key: Key) -> Result<(), InputError>;
}

/// Screen cursor access used by [`CursorGuard`].
pub trait CursorControl {
    fn cursor_pos(&self) -> Result<Point, InputError>;
    fn set_cursor_pos(&self, pos: Point) -> Result<(), InputError>;
}

/// Saves the cursor position on creation and restores it when dropped.
pub struct CursorGuard<'a, C: CursorControl + ?Sized> {
    ctl: &'a C,
    saved: Point,
}

impl<'a, C: CursorControl + ?Sized> CursorGuard<'a, C> {
    pub fn acquire(ctl: &'a C) -> Result<Self, InputError> {
        let saved = ctl.cursor_pos()?;
        Ok(Self { ctl, saved })
    }

    pub fn saved(&self) -> Point {
        self.saved
    }
}

impl<C: CursorControl + ?Sized> Drop for CursorGuard<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.ctl.set_cursor_pos(self.saved) {
            logger::warn(&format!("failed to restore cursor to {:?}: {}", self.saved, e));
        }
    }
}

/// Platform-level operations (window enumeration, attaching collaborators).
pub trait Platform: Send {
    fn get_instances(&self, pattern: &str) -> Vec<(WindowId, String)>;
    fn attach(
        &self,
        window_id: WindowId,
        routing: KeyRouting,
        key_hold: std::time::Duration,
    ) -> Result<(Box<dyn FrameSource>, Box<dyn InputSink>)>;

    /// Restore the window if it is minimized and bring it to the foreground.
    fn activate_window(&self, window_id: WindowId) -> Result<()>;

    /// Operator's cursor position in screen coordinates.
    fn cursor_pos(&self) -> Result<Point>;
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool) -> Box<dyn Platform> {
    if force_stub {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        return Box::new(stub::StubPlatform::new());
    }
    #[cfg(target_os = "windows")]
    {
        logger::register_prefix("win32", logger::COLOR_GRAY);
        return Box::new(win32::Win32Platform);
    }
    #[cfg(not(target_os = "windows"))]
    {
        logger::register_prefix("stub", logger::COLOR_GRAY);
        logger::warn("no native backend on this OS, using the simulated world");
        return Box::new(stub::StubPlatform::new());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    struct FakeCursor {
        pos: Cell<Point>,
        moves: RefCell<Vec<Point>>,
    }

    impl CursorControl for FakeCursor {
        fn cursor_pos(&self) -> Result<Point, InputError> {
            Ok(self.pos.get())
        }

        fn set_cursor_pos(&self, pos: Point) -> Result<(), InputError> {
            self.pos.set(pos);
            self.moves.borrow_mut().push(pos);
            Ok(())
        }
    }

    fn click_then_fail(cursor: &FakeCursor, target: Point) -> Result<(), InputError> {
        let _guard = CursorGuard::acquire(cursor)?;
        cursor.set_cursor_pos(target)?;
        Err(InputError::Delivery("button down rejected".into()))
    }

    #[test]
    fn guard_restores_on_success() {
        let cursor = FakeCursor { pos: Cell::new(Point::new(5, 5)), moves: RefCell::new(vec![]) };
        {
            let guard = CursorGuard::acquire(&cursor).unwrap();
            assert_eq!(guard.saved(), Point::new(5, 5));
            cursor.set_cursor_pos(Point::new(300, 200)).unwrap();
        }
        assert_eq!(cursor.pos.get(), Point::new(5, 5));
    }

    #[test]
    fn guard_restores_on_error_path() {
        let cursor = FakeCursor { pos: Cell::new(Point::new(7, 9)), moves: RefCell::new(vec![]) };
        assert!(click_then_fail(&cursor, Point::new(400, 100)).is_err());
        assert_eq!(cursor.pos.get(), Point::new(7, 9));
        assert_eq!(*cursor.moves.borrow(), vec![Point::new(400, 100), Point::new(7, 9)]);
    }
}
