//! Native backend: GDI capture of the client area, SendInput clicks, and
//! window-message keyboard delivery routed per key class.

use std::ffi::c_void;
use std::mem;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use regex::RegexBuilder;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BitBlt, ClientToScreen, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC, SRCCOPY,
};
use windows::Win32::Storage::Xps::{PrintWindow, PRINT_WINDOW_FLAGS};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    MapVirtualKeyW, SendInput, INPUT, INPUT_0, INPUT_MOUSE, MAPVK_VK_TO_VSC, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumChildWindows, EnumWindows, GetClientRect, GetCursorPos, GetWindowTextLengthW, GetWindowTextW, IsIconic,
    IsWindow, IsWindowVisible, PostMessageW, SendMessageW, SetCursorPos, SetForegroundWindow, ShowWindow,
    SW_RESTORE, WM_KEYDOWN, WM_KEYUP,
};

use crate::error::{CaptureError, InputError};
use crate::keys::{Channel, Key, KeyRouting};
use crate::logger;
use crate::types::*;

use super::capture::{CaptureStrategy, FallbackCapture};
use super::{CursorControl, CursorGuard, FrameSource, InputSink, MouseButton, Platform};

/// PW_CLIENTONLY | PW_RENDERFULLCONTENT
const PW_CLIENT_FULL: u32 = 0x3;
/// Time for a restored window to repaint before it is captured.
const RESTORE_SETTLE: Duration = Duration::from_millis(100);

// HWND wraps a raw pointer and is not Send; handles are kept as integers.
fn hwnd(raw: isize) -> HWND {
    HWND(raw as *mut c_void)
}

fn is_window(raw: isize) -> bool {
    unsafe { IsWindow(hwnd(raw)).as_bool() }
}

/// Un-minimize `raw` if needed. Returns whether a restore was issued.
fn restore_if_iconic(raw: isize) -> bool {
    let h = hwnd(raw);
    unsafe {
        if !IsIconic(h).as_bool() {
            return false;
        }
        let _ = ShowWindow(h, SW_RESTORE);
    }
    thread::sleep(RESTORE_SETTLE);
    true
}

fn window_title(h: HWND) -> String {
    unsafe {
        let len = GetWindowTextLengthW(h);
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u16; len as usize + 1];
        let n = GetWindowTextW(h, &mut buf);
        String::from_utf16_lossy(&buf[..n.max(0) as usize])
    }
}

unsafe extern "system" fn collect_hwnd(h: HWND, lparam: LPARAM) -> BOOL {
    let out = &mut *(lparam.0 as *mut Vec<isize>);
    out.push(h.0 as isize);
    TRUE
}

fn top_level_windows() -> Vec<isize> {
    let mut out: Vec<isize> = Vec::new();
    unsafe {
        let _ = EnumWindows(Some(collect_hwnd), LPARAM(&mut out as *mut Vec<isize> as isize));
    }
    out
}

fn child_windows(parent: isize) -> Vec<isize> {
    let mut out: Vec<isize> = Vec::new();
    unsafe {
        let _ = EnumChildWindows(hwnd(parent), Some(collect_hwnd), LPARAM(&mut out as *mut Vec<isize> as isize));
    }
    out
}

// -- capture --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    PrintWindow,
    BitBlt,
    Screen,
}

struct GdiCapture {
    hwnd: isize,
    method: Method,
}

impl GdiCapture {
    fn client_size(&self) -> Result<(i32, i32), CaptureError> {
        let h = hwnd(self.hwnd);
        unsafe {
            if !IsWindow(h).as_bool() {
                return Err(CaptureError::WindowInvalid);
            }
            if IsIconic(h).as_bool() {
                return Err(CaptureError::Minimized);
            }
            let mut rect = RECT::default();
            GetClientRect(h, &mut rect).map_err(|e| CaptureError::Backend(format!("GetClientRect: {}", e)))?;
            Ok((rect.right - rect.left, rect.bottom - rect.top))
        }
    }
}

/// Copy a selected 32-bit bitmap into a top-down BGRA frame.
unsafe fn read_bitmap(dc: HDC, bitmap: HBITMAP, w: i32, h: i32) -> Result<Frame, CaptureError> {
    let mut info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: w,
            biHeight: -h,
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut data = vec![0u8; w as usize * h as usize * 4];
    let lines = GetDIBits(
        dc,
        bitmap,
        0,
        h as u32,
        Some(data.as_mut_ptr() as *mut c_void),
        &mut info,
        DIB_RGB_COLORS,
    );
    if lines == 0 {
        return Err(CaptureError::Backend("GetDIBits copied no rows".into()));
    }
    for px in data.chunks_exact_mut(4) {
        px[3] = 255;
    }
    Frame::new(data, w as u32, h as u32, w as u32 * 4).map_err(|e| CaptureError::Backend(e.to_string()))
}

impl CaptureStrategy for GdiCapture {
    fn name(&self) -> &str {
        match self.method {
            Method::PrintWindow => "printwindow",
            Method::BitBlt => "bitblt",
            Method::Screen => "screen",
        }
    }

    fn grab(&mut self) -> Result<Frame, CaptureError> {
        // PrintWindow renders nothing for an iconic window; the later strategies
        // see whatever this restore achieved.
        if self.method == Method::PrintWindow && is_window(self.hwnd) && restore_if_iconic(self.hwnd) {
            logger::info_p("win32", &format!("restored minimized window {:#x} for capture", self.hwnd));
        }
        let (w, h) = self.client_size()?;
        if w <= 0 || h <= 0 {
            return Err(CaptureError::Backend(format!("client area is {}x{}", w, h)));
        }
        let target = hwnd(self.hwnd);
        let src_wnd = if self.method == Method::Screen { HWND::default() } else { target };
        unsafe {
            let src_dc = GetDC(src_wnd);
            if src_dc.is_invalid() {
                return Err(CaptureError::Backend("GetDC failed".into()));
            }
            let mem_dc = CreateCompatibleDC(src_dc);
            let bitmap = CreateCompatibleBitmap(src_dc, w, h);
            let old = SelectObject(mem_dc, bitmap);

            let copied = match self.method {
                Method::PrintWindow => PrintWindow(target, mem_dc, PRINT_WINDOW_FLAGS(PW_CLIENT_FULL)).as_bool(),
                Method::BitBlt => BitBlt(mem_dc, 0, 0, w, h, src_dc, 0, 0, SRCCOPY).is_ok(),
                Method::Screen => {
                    let mut origin = POINT::default();
                    ClientToScreen(target, &mut origin).as_bool()
                        && BitBlt(mem_dc, 0, 0, w, h, src_dc, origin.x, origin.y, SRCCOPY).is_ok()
                }
            };
            let result = if copied {
                read_bitmap(mem_dc, bitmap, w, h)
            } else {
                Err(CaptureError::Backend(format!("{} copy failed", self.name())))
            };

            SelectObject(mem_dc, old);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(src_wnd, src_dc);
            result
        }
    }
}

/// PrintWindow, then BitBlt from the window DC, then a copy of the screen region.
pub fn window_capture(raw: isize) -> FallbackCapture {
    FallbackCapture::new(vec![
        Box::new(GdiCapture { hwnd: raw, method: Method::PrintWindow }),
        Box::new(GdiCapture { hwnd: raw, method: Method::BitBlt }),
        Box::new(GdiCapture { hwnd: raw, method: Method::Screen }),
    ])
}

// -- input --

pub struct Win32Input {
    hwnd: isize,
    routing: KeyRouting,
    key_hold: Duration,
}

impl Win32Input {
    pub fn new(raw: isize, routing: KeyRouting, key_hold: Duration) -> Self {
        Self { hwnd: raw, routing, key_hold }
    }

    fn mouse(&self, flags: MOUSE_EVENT_FLAGS) -> Result<(), InputError> {
        let input = [INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT { dx: 0, dy: 0, mouseData: 0, dwFlags: flags, time: 0, dwExtraInfo: 0 },
            },
        }];
        let sent = unsafe { SendInput(&input, mem::size_of::<INPUT>() as i32) };
        if sent != 1 {
            return Err(InputError::Delivery("SendInput was blocked".into()));
        }
        Ok(())
    }
}

/// WM_KEYDOWN / WM_KEYUP lparam: repeat count 1, scan code, transition bits on release.
fn key_lparams(key: Key) -> (LPARAM, LPARAM) {
    let scan = unsafe { MapVirtualKeyW(key.code() as u32, MAPVK_VK_TO_VSC) };
    let down = 1u32 | (scan << 16);
    let up = down | (1 << 30) | (1 << 31);
    (LPARAM(down as isize), LPARAM(up as i32 as isize))
}

impl CursorControl for Win32Input {
    fn cursor_pos(&self) -> Result<Point, InputError> {
        let mut p = POINT::default();
        unsafe { GetCursorPos(&mut p) }.map_err(|e| InputError::Delivery(format!("GetCursorPos: {}", e)))?;
        Ok(Point::new(p.x, p.y))
    }

    fn set_cursor_pos(&self, pos: Point) -> Result<(), InputError> {
        unsafe { SetCursorPos(pos.x, pos.y) }.map_err(|e| InputError::Delivery(format!("SetCursorPos: {}", e)))
    }
}

impl InputSink for Win32Input {
    fn click(&mut self, pos: Point, button: MouseButton, restore_cursor: bool) -> Result<(), InputError> {
        if !is_window(self.hwnd) {
            return Err(InputError::WindowInvalid);
        }
        let mut screen = POINT { x: pos.x, y: pos.y };
        if !unsafe { ClientToScreen(hwnd(self.hwnd), &mut screen) }.as_bool() {
            return Err(InputError::Delivery("ClientToScreen failed".into()));
        }

        let this: &Self = self;
        let _guard = if restore_cursor { Some(CursorGuard::acquire(this)?) } else { None };
        this.set_cursor_pos(Point::new(screen.x, screen.y))?;
        thread::sleep(Duration::from_millis(30));
        let (down, up) = match button {
            MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP),
            MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP),
        };
        this.mouse(down)?;
        thread::sleep(this.key_hold);
        this.mouse(up)
    }

    fn send_key(&mut self, key: Key) -> Result<(), InputError> {
        if !is_window(self.hwnd) {
            return Err(InputError::WindowInvalid);
        }
        let vk = WPARAM(key.code() as usize);
        let (down, up) = key_lparams(key);
        let channel = self.routing.route(key);

        match channel {
            Channel::SyncBroadcast => {
                let mut targets = child_windows(self.hwnd);
                targets.push(self.hwnd);
                unsafe {
                    for &t in &targets {
                        SendMessageW(hwnd(t), WM_KEYDOWN, vk, down);
                    }
                    thread::sleep(self.key_hold);
                    for &t in &targets {
                        SendMessageW(hwnd(t), WM_KEYUP, vk, up);
                    }
                }
            }
            Channel::AsyncBroadcast => {
                let mut targets = child_windows(self.hwnd);
                targets.push(self.hwnd);
                let hold = self.key_hold;
                let (down, up) = (down.0, up.0);
                thread::spawn(move || unsafe {
                    for &t in &targets {
                        let _ = PostMessageW(hwnd(t), WM_KEYDOWN, vk, LPARAM(down));
                    }
                    thread::sleep(hold);
                    for &t in &targets {
                        let _ = PostMessageW(hwnd(t), WM_KEYUP, vk, LPARAM(up));
                    }
                });
            }
            Channel::TopLevelSync => unsafe {
                SendMessageW(hwnd(self.hwnd), WM_KEYDOWN, vk, down);
                thread::sleep(self.key_hold);
                SendMessageW(hwnd(self.hwnd), WM_KEYUP, vk, up);
            },
        }
        Ok(())
    }
}

// -- platform --

pub struct Win32Platform;

impl Platform for Win32Platform {
    fn get_instances(&self, pattern: &str) -> Vec<(WindowId, String)> {
        let re = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(r) => r,
            Err(e) => {
                logger::error(&format!("invalid pattern '{}': {}", pattern, e));
                return Vec::new();
            }
        };
        let found: Vec<(WindowId, String)> = top_level_windows()
            .into_iter()
            .filter(|&raw| unsafe { IsWindowVisible(hwnd(raw)).as_bool() })
            .filter_map(|raw| {
                let title = window_title(hwnd(raw));
                (!title.is_empty() && re.is_match(&title)).then_some((raw as WindowId, title))
            })
            .collect();
        logger::info_p("win32", &format!("{} window(s) match \"{}\"", found.len(), pattern));
        found
    }

    fn attach(
        &self,
        window_id: WindowId,
        routing: KeyRouting,
        key_hold: Duration,
    ) -> Result<(Box<dyn FrameSource>, Box<dyn InputSink>)> {
        let raw = window_id as isize;
        if !is_window(raw) {
            bail!("window {:#x} no longer exists", window_id);
        }
        logger::info_p("win32", &format!("attached to {:#x} \"{}\"", window_id, window_title(hwnd(raw))));
        Ok((Box::new(window_capture(raw)), Box::new(Win32Input::new(raw, routing, key_hold))))
    }

    fn activate_window(&self, window_id: WindowId) -> Result<()> {
        let raw = window_id as isize;
        if !is_window(raw) {
            bail!("window {:#x} no longer exists", window_id);
        }
        restore_if_iconic(raw);
        // Windows may refuse the foreground request; capture and input still work.
        if !unsafe { SetForegroundWindow(hwnd(raw)) }.as_bool() {
            logger::warn_p("win32", &format!("could not bring {:#x} to the foreground", window_id));
        }
        Ok(())
    }

    fn cursor_pos(&self) -> Result<Point> {
        let mut p = POINT::default();
        unsafe { GetCursorPos(&mut p) }?;
        Ok(Point::new(p.x, p.y))
    }
}
