use std::sync::Arc;
use std::sync::atomic::AtomicBool;
#[cfg(target_os = "windows")]
use std::sync::atomic::Ordering;

/// Start a background thread that listens for the global hotkey Ctrl+Shift+K.
/// Sets `flag` to `true` when the hotkey is pressed.
#[cfg(target_os = "windows")]
pub fn start_hotkey_listener(flag: Arc<AtomicBool>) {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse::{RegisterHotKey, MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT};
    use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, WM_HOTKEY};

    const VK_K: u32 = 0x4B;
    const HOTKEY_ID: i32 = 1;

    std::thread::spawn(move || unsafe {
        if let Err(e) = RegisterHotKey(HWND::default(), HOTKEY_ID, MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT, VK_K) {
            crate::logger::error(&format!(
                "failed to register global hotkey Ctrl+Shift+K, another application may own it: {}",
                e
            ));
            return;
        }

        crate::logger::info("global hotkey Ctrl+Shift+K registered");

        let mut msg = MSG::default();
        // GetMessageW blocks until a message arrives; returns 0 on WM_QUIT
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {
            if msg.message == WM_HOTKEY && msg.wParam.0 == HOTKEY_ID as usize {
                flag.store(true, Ordering::Release);
            }
        }
    });
}

#[cfg(not(target_os = "windows"))]
pub fn start_hotkey_listener(_flag: Arc<AtomicBool>) {
    // Global hotkeys not supported on this platform
}
