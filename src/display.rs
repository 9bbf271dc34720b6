//! Display Facade: the one module allowed to call into Xlib directly.
//!
//! Grounded in the reference `rdwm.rs`'s substructure-redirect registration
//! and error-handler dance, and in `original_source/src/xwmux/xwrapper.h`'s
//! `XState` (`set_resolution`, `set_term`, `focus_term`, prefix grab/ungrab)
//! and `instance.h` (`open_term`, `is_root_term`, `iconic`,
//! `override_redirect`, `kill_client`).
//!
//! Unlike the reference implementation's `static ref WM_DETECTED:
//! Mutex<bool>`, the startup-detection flag here is thread-local: this
//! process only ever touches one display connection from one thread, so a
//! process-wide global adds contention for no benefit (spec.md REDESIGN
//! FLAGS).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::CString;

use libc::c_int;
use x11::xlib;

use crate::error::{Result, XwmuxError};
use crate::layout::Rect;
use crate::mapping::{self, ModifiedKey, XWindow};

thread_local! {
    static WM_DETECTED: Cell<bool> = const { Cell::new(false) };
    static LAST_X_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

extern "C" fn on_wm_detected(_display: *mut xlib::Display, event: *mut xlib::XErrorEvent) -> c_int {
    let code = unsafe { (*event).error_code };
    if code == xlib::BadAccess {
        WM_DETECTED.with(|d| d.set(true));
    }
    0
}

extern "C" fn on_runtime_error(display: *mut xlib::Display, event: *mut xlib::XErrorEvent) -> c_int {
    let mut buf = [0u8; 256];
    unsafe {
        xlib::XGetErrorText(
            display,
            (*event).error_code as c_int,
            buf.as_mut_ptr() as *mut i8,
            buf.len() as c_int,
        );
    }
    let msg = String::from_utf8_lossy(&buf).trim_end_matches('\0').to_string();
    let full = format!("X error (request {}): {}", unsafe { (*event).request_code }, msg);
    log::warn!("{}", full);
    LAST_X_ERROR.with(|e| *e.borrow_mut() = Some(full));
    0
}

/// Thin wrapper over a live Xlib connection plus the handful of atoms the
/// reactor needs to read and write control messages.
pub struct XDisplay {
    display: *mut xlib::Display,
    root: XWindow,
    atoms: HashMap<&'static str, xlib::Atom>,
    wm_delete_window: xlib::Atom,
    wm_protocols: xlib::Atom,
    wm_name: xlib::Atom,
    prefix: Option<ModifiedKey>,
    grabbed: bool,
}

impl XDisplay {
    /// Opens the default display and grabs substructure redirection on its
    /// root window. Returns `Err` (a fatal startup error, spec.md §7) if the
    /// display can't be opened or another window manager already owns it.
    pub fn open() -> Result<Self> {
        let display = unsafe { xlib::XOpenDisplay(std::ptr::null()) };
        if display.is_null() {
            return Err(XwmuxError::Startup("could not open X display".to_string()));
        }

        let root = unsafe { xlib::XDefaultRootWindow(display) };

        WM_DETECTED.with(|d| d.set(false));
        unsafe {
            xlib::XSetErrorHandler(Some(on_wm_detected));
            xlib::XSelectInput(
                display,
                root,
                xlib::SubstructureRedirectMask | xlib::SubstructureNotifyMask,
            );
            xlib::XSync(display, xlib::False);
        }

        if WM_DETECTED.with(|d| d.get()) {
            unsafe { xlib::XCloseDisplay(display) };
            return Err(XwmuxError::Startup(
                "another window manager is already running".to_string(),
            ));
        }

        unsafe { xlib::XSetErrorHandler(Some(on_runtime_error)) };

        let mut atoms = HashMap::new();
        for name in crate::protocol::ALL_ATOMS {
            atoms.insert(*name, intern(display, name));
        }
        let wm_protocols = intern(display, "WM_PROTOCOLS");
        let wm_delete_window = intern(display, "WM_DELETE_WINDOW");
        let wm_name = intern(display, "WM_NAME");

        Ok(XDisplay {
            display,
            root,
            atoms,
            wm_delete_window,
            wm_protocols,
            wm_name,
            prefix: None,
            grabbed: false,
        })
    }

    pub fn root(&self) -> XWindow {
        self.root
    }

    /// Takes and clears the most recent runtime X error text, if any, set
    /// by the error handler installed in `open`. Polled once per reactor
    /// iteration and forwarded to the multiplexer's status line (spec.md
    /// §7).
    pub fn take_error(&self) -> Option<String> {
        LAST_X_ERROR.with(|e| e.borrow_mut().take())
    }

    pub fn atom(&self, name: &str) -> Option<xlib::Atom> {
        self.atoms.get(name).copied()
    }

    pub fn atom_name(&self, atom: xlib::Atom) -> Option<&'static str> {
        self.atoms.iter().find(|(_, v)| **v == atom).map(|(k, _)| *k)
    }

    pub fn is_wm_name(&self, atom: xlib::Atom) -> bool {
        atom == self.wm_name
    }

    pub fn prefix_key(&self) -> Option<ModifiedKey> {
        self.prefix
    }

    pub fn lower_window(&self, window: XWindow) {
        unsafe { xlib::XLowerWindow(self.display, window) };
    }

    /// Subscribes to property changes on `window`, used to track a pane's
    /// title via `WM_NAME` once it's queued for binding.
    pub fn watch_property_changes(&self, window: XWindow) {
        unsafe { xlib::XSelectInput(self.display, window, xlib::PropertyChangeMask) };
    }

    /// Releases the synchronous keyboard grab the prefix keypress created,
    /// letting further key events flow normally (spec.md §4.6).
    pub fn allow_async_keyboard(&self, time: xlib::Time) {
        unsafe { xlib::XAllowEvents(self.display, xlib::AsyncKeyboard, time) };
    }

    /// Blocks for the next event on this connection.
    pub fn next_event(&self) -> xlib::XEvent {
        let mut event: xlib::XEvent = unsafe { std::mem::zeroed() };
        unsafe { xlib::XNextEvent(self.display, &mut event) };
        event
    }

    pub fn sync(&self) {
        unsafe { xlib::XSync(self.display, xlib::False) };
    }

    /// Tracks current screen resolution for fullscreen-rect math downstream;
    /// xwmux does not do dynamic RandR reconfiguration itself, only reports
    /// what it is told via `_XW_RESOUTION`.
    pub fn resolution(&self) -> (u32, u32) {
        let screen = unsafe { xlib::XDefaultScreenOfDisplay(self.display) };
        unsafe { ((*screen).width as u32, (*screen).height as u32) }
    }

    /// Launches the configured root-terminal command asynchronously. The
    /// command is a shell line (it may reference `{class}`/`{init_script}`
    /// placeholders the config's `TerminalSettings` already substituted),
    /// spawned via `sh -c` and left detached — its window arrives later as
    /// an ordinary `MapRequest`.
    pub fn open_term(&self, command: &str) {
        match std::process::Command::new("sh").args(["-c", command]).spawn() {
            Ok(_) => {}
            Err(e) => log::warn!("open_term: failed to spawn {:?}: {}", command, e),
        }
    }

    /// Closes the current root-terminal window via the same polite-close
    /// path as a GUI pane.
    pub fn close_term(&self, window: XWindow) {
        self.kill_client(window);
    }

    /// Reads `WM_NAME` for pushing to the multiplexer as a pane's display
    /// name after a `PropertyNotify`.
    pub fn window_name(&self, window: XWindow) -> Option<String> {
        let mut name_ptr: *mut i8 = std::ptr::null_mut();
        let ok = unsafe { xlib::XFetchName(self.display, window, &mut name_ptr) };
        if ok == 0 || name_ptr.is_null() {
            return None;
        }
        let name = unsafe { std::ffi::CStr::from_ptr(name_ptr).to_string_lossy().into_owned() };
        unsafe { xlib::XFree(name_ptr as *mut _) };
        Some(name)
    }

    /// True if `window`'s WM_CLASS matches the configured root-terminal
    /// class (the terminal hosting the multiplexer session itself, as
    /// opposed to a GUI client pane).
    pub fn is_root_term(&self, window: XWindow, class: &str) -> bool {
        let mut hint: xlib::XClassHint = unsafe { std::mem::zeroed() };
        let ok = unsafe { xlib::XGetClassHint(self.display, window, &mut hint) };
        if ok == 0 {
            return false;
        }
        let matches = unsafe {
            !hint.res_class.is_null()
                && std::ffi::CStr::from_ptr(hint.res_class).to_string_lossy() == class
        };
        unsafe {
            if !hint.res_name.is_null() {
                xlib::XFree(hint.res_name as *mut _);
            }
            if !hint.res_class.is_null() {
                xlib::XFree(hint.res_class as *mut _);
            }
        }
        matches
    }

    pub fn override_redirect(&self, window: XWindow) -> bool {
        self.attributes(window)
            .map(|a| a.override_redirect != 0)
            .unwrap_or(false)
    }

    pub fn iconic(&self, window: XWindow) -> bool {
        let mut state: *mut c_int = std::ptr::null_mut();
        let mut actual_type = 0;
        let mut actual_format = 0;
        let mut nitems = 0;
        let mut bytes_after = 0;
        let wm_state = intern(self.display, "WM_STATE");
        
        unsafe {
            let status = xlib::XGetWindowProperty(
                self.display,
                window,
                wm_state,
                0,
                2,
                xlib::False,
                xlib::AnyPropertyType as u64,
                &mut actual_type,
                &mut actual_format,
                &mut nitems,
                &mut bytes_after,
                &mut state as *mut _ as *mut *mut u8,
            );
            let iconic = status == 0 && !state.is_null() && nitems > 0 && *state == 3;
            if !state.is_null() {
                xlib::XFree(state as *mut _);
            }
            iconic
        }
    }

    fn attributes(&self, window: XWindow) -> Option<xlib::XWindowAttributes> {
        let mut attrs: xlib::XWindowAttributes = unsafe { std::mem::zeroed() };
        let ok = unsafe { xlib::XGetWindowAttributes(self.display, window, &mut attrs) };
        if ok == 0 {
            None
        } else {
            Some(attrs)
        }
    }

    /// Sends `WM_DELETE_WINDOW` to a client that supports it; runtime X
    /// errors here are logged, never propagated (spec.md §7).
    pub fn kill_client(&self, window: XWindow) {
        let mut event: xlib::XClientMessageEvent = unsafe { std::mem::zeroed() };
        event.type_ = xlib::ClientMessage;
        event.window = window;
        event.message_type = self.wm_protocols;
        event.format = 32;
        event.data.set_long(0, self.wm_delete_window as i64);
        event.data.set_long(1, xlib::CurrentTime as i64);

        let mut xevent = xlib::XEvent { client_message: event };
        unsafe {
            xlib::XSendEvent(self.display, window, xlib::False, xlib::NoEventMask, &mut xevent);
        }
    }

    /// Sets the configured prefix key. If the old key is presently grabbed
    /// on root, ungrabs it and grabs the new one in its place; otherwise
    /// just records the new key, leaving the grabbed/ungrabbed state as it
    /// was (spec.md §4.2).
    pub fn set_prefix(&mut self, key: ModifiedKey) {
        if self.grabbed {
            if let Some(old) = self.prefix {
                unsafe {
                    xlib::XUngrabKey(self.display, old.keycode as i32, old.modifiers, self.root);
                }
            }
            unsafe {
                xlib::XGrabKey(
                    self.display,
                    key.keycode as i32,
                    key.modifiers,
                    self.root,
                    xlib::False,
                    xlib::GrabModeAsync,
                    xlib::GrabModeAsync,
                );
            }
        }
        self.prefix = Some(key);
    }
}

fn intern(display: *mut xlib::Display, name: &str) -> xlib::Atom {
    let c_name = CString::new(name).expect("atom name has no interior nul");
    unsafe { xlib::XInternAtom(display, c_name.as_ptr(), xlib::False) }
}

impl Drop for XDisplay {
    fn drop(&mut self) {
        unsafe { xlib::XCloseDisplay(self.display) };
    }
}

impl mapping::Display for XDisplay {
    fn map(&mut self, window: XWindow) {
        unsafe { xlib::XMapWindow(self.display, window) };
    }

    fn unmap(&mut self, window: XWindow) {
        unsafe { xlib::XUnmapWindow(self.display, window) };
    }

    fn resize(&mut self, window: XWindow, rect: Rect) {
        unsafe {
            xlib::XMoveResizeWindow(
                self.display,
                window,
                rect.start.x as i32,
                rect.start.y as i32,
                rect.width() as u32,
                rect.height() as u32,
            );
        }
    }

    fn focus(&mut self, window: XWindow) {
        unsafe {
            xlib::XSetInputFocus(self.display, window, xlib::RevertToPointerRoot, xlib::CurrentTime);
        }
    }

    fn focus_term(&mut self) {
        // The root terminal window is whatever currently has
        // override_redirect unset and is the multiplexer's own frame; the
        // reactor tracks its XWindow separately and calls `focus` on it
        // directly, so this just re-asserts focus on the root as a
        // fallback when no pane is active.
        let root = self.root;
        self.focus(root);
    }

    fn focus_root(&mut self) {
        let root = self.root;
        self.focus(root);
    }

    /// Grabs the configured prefix key on root, unless it's already
    /// grabbed (spec.md §4.2/§8: idempotent, at most one grab). Logs
    /// `NotInitialized` and does nothing if no prefix key has been
    /// configured yet.
    fn grab_prefix(&mut self) {
        let key = match self.prefix {
            Some(key) => key,
            None => {
                log::warn!("{}", XwmuxError::NotInitialized);
                return;
            }
        };
        if self.grabbed {
            return;
        }
        unsafe {
            xlib::XGrabKey(
                self.display,
                key.keycode as i32,
                key.modifiers,
                self.root,
                xlib::False,
                xlib::GrabModeAsync,
                xlib::GrabModeAsync,
            );
        }
        self.grabbed = true;
    }

    /// Ungrabs the configured prefix key on root, unless it's already
    /// ungrabbed. Logs `NotInitialized` and does nothing if no prefix key
    /// has been configured yet.
    fn ungrab_prefix(&mut self) {
        let key = match self.prefix {
            Some(key) => key,
            None => {
                log::warn!("{}", XwmuxError::NotInitialized);
                return;
            }
        };
        if !self.grabbed {
            return;
        }
        unsafe {
            xlib::XUngrabKey(self.display, key.keycode as i32, key.modifiers, self.root);
        }
        self.grabbed = false;
    }
}

/// Resolves a [`crate::keys::KeySpec`] to a keycode against a live display
/// connection; `XStringToKeysym`/`XKeysymToKeycode` both require one, which
/// is why `keys::parse_key_spec` stops short of this step.
pub fn resolve_keycode(display: &XDisplay, spec: &crate::keys::KeySpec) -> Option<ModifiedKey> {
    let keysym = if let Some(sym) = spec.keysym {
        sym
    } else {
        let name = spec.symbolic_name.as_deref()?;
        let c_name = CString::new(name).ok()?;
        let sym = unsafe { xlib::XStringToKeysym(c_name.as_ptr()) };
        if sym == xlib::NoSymbol as u64 {
            return None;
        }
        sym
    };
    let keycode = unsafe { xlib::XKeysymToKeycode(display.display, keysym) };
    if keycode == 0 {
        return None;
    }
    Some(ModifiedKey {
        keycode: keycode as u32,
        modifiers: spec.modifiers,
    })
}
