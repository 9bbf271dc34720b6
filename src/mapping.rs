//! Pane–Window Mapping: the two-level state machine binding multiplexer
//! locations (window-id, pane-id) to managed X windows.
//!
//! This module is deliberately X-free: it talks to the windowing system and
//! the multiplexer only through the [`Display`] and [`Tmux`] traits, so its
//! invariants (spec.md §8) can be unit-tested against fakes.

use std::collections::HashMap;

use crate::layout::Rect;
use crate::tmux::Tmux;

/// The managed GUI window handle. A plain numeric id (matches X's `Window`,
/// an opaque `u64`) so this module has no X11 dependency.
pub type XWindow = u64;

pub type MuxWindowId = i32;
pub type PaneId = i32;

/// Names a pane uniquely across the session: (multiplexer-window-id, pane-id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaneKey {
    pub mux_window: MuxWindowId,
    pub pane: PaneId,
}

impl PaneKey {
    pub const NONE: PaneKey = PaneKey {
        mux_window: -1,
        pane: -1,
    };

    pub fn is_filled(&self) -> bool {
        *self != PaneKey::NONE
    }
}

impl Default for PaneKey {
    fn default() -> Self {
        PaneKey::NONE
    }
}

/// A physical key plus a modifier-mask bitset (control/alt/shift/super).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifiedKey {
    pub keycode: u32,
    pub modifiers: u32,
}

/// Operations the Mapping needs from the Display Facade. Kept minimal and
/// X-free so the mapping's invariants can be exercised without a display
/// connection.
pub trait Display {
    fn map(&mut self, window: XWindow);
    fn unmap(&mut self, window: XWindow);
    fn resize(&mut self, window: XWindow, rect: Rect);
    fn focus(&mut self, window: XWindow);
    fn focus_term(&mut self);
    fn focus_root(&mut self);
    fn grab_prefix(&mut self);
    fn ungrab_prefix(&mut self);
}

/// One mapping entry: a GUI window backing a single pane.
#[derive(Debug, Clone)]
pub struct WindowPane {
    pub x_window: XWindow,
    pub hidden: bool,
    pub pending_unmaps: u32,
}

impl WindowPane {
    fn new(x_window: XWindow) -> Self {
        WindowPane {
            x_window,
            hidden: true,
            pending_unmaps: 0,
        }
    }

    fn hide(&mut self, display: &mut dyn Display) {
        if self.hidden {
            return;
        }
        display.unmap(self.x_window);
        self.hidden = true;
        self.pending_unmaps += 1;
    }

    fn show(&mut self, display: &mut dyn Display) {
        if !self.hidden {
            return;
        }
        display.map(self.x_window);
        self.hidden = false;
    }

    /// Called when an UnmapNotify for this window is observed. Returns
    /// `true` if the unmap was WM-initiated (i.e. absorbed, no removal).
    pub fn notify_unmapped(&mut self) -> bool {
        if self.pending_unmaps > 0 {
            self.pending_unmaps -= 1;
            true
        } else {
            false
        }
    }
}

/// One multiplexer window's worth of GUI-backed panes.
#[derive(Debug, Default)]
struct Workspace {
    panes: HashMap<PaneId, WindowPane>,
}

impl Workspace {
    fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    fn hide_all(&mut self, display: &mut dyn Display) {
        for wp in self.panes.values_mut() {
            wp.hide(display);
        }
    }

    fn show_all(&mut self, display: &mut dyn Display) {
        for wp in self.panes.values_mut() {
            wp.show(display);
        }
    }

    fn show_zoomed(&mut self, display: &mut dyn Display, zoomed: PaneId) {
        for (pane, wp) in self.panes.iter_mut() {
            if *pane == zoomed {
                wp.show(display);
            } else {
                wp.hide(display);
            }
        }
    }
}

/// Top-level Pane–Window Mapping state. See spec.md §3 for the invariants
/// this type upholds:
///
/// - `pane_to_window[p] = w <=> workspaces[w].contains(p)`
/// - `window_to_pane[x] = p <=> workspaces[pane_to_window[p]][p].x_window == x`
/// - `override_ => is_filled(active)`
#[derive(Debug, Default)]
pub struct Mapping {
    workspaces: HashMap<MuxWindowId, Workspace>,
    pane_to_window: HashMap<PaneId, MuxWindowId>,
    window_to_pane: HashMap<XWindow, PaneId>,
    active: PaneKey,
    override_: bool,
}

impl Mapping {
    pub fn new() -> Self {
        Mapping {
            workspaces: HashMap::new(),
            pane_to_window: HashMap::new(),
            window_to_pane: HashMap::new(),
            active: PaneKey::NONE,
            override_: false,
        }
    }

    pub fn active(&self) -> PaneKey {
        self.active
    }

    pub fn overridden(&self) -> bool {
        self.override_
    }

    pub fn is_filled(&self, key: PaneKey) -> bool {
        self.workspaces
            .get(&key.mux_window)
            .map(|ws| ws.panes.contains_key(&key.pane))
            .unwrap_or(false)
    }

    pub fn is_active_filled(&self) -> bool {
        self.is_filled(self.active)
    }

    pub fn has_window(&self, window: XWindow) -> bool {
        self.window_to_pane.contains_key(&window)
    }

    /// Every managed X window currently in the mapping, in no particular
    /// order. Used to drain all panes on shutdown.
    pub fn known_windows(&self) -> Vec<XWindow> {
        self.window_to_pane.keys().copied().collect()
    }

    /// Returns the `PaneKey` a managed window backs, if any.
    pub fn find(&self, window: XWindow) -> Option<PaneKey> {
        let pane = *self.window_to_pane.get(&window)?;
        let mux_window = *self.pane_to_window.get(&pane)?;
        Some(PaneKey { mux_window, pane })
    }

    pub fn window_for(&self, key: PaneKey) -> Option<XWindow> {
        self.workspaces
            .get(&key.mux_window)?
            .panes
            .get(&key.pane)
            .map(|wp| wp.x_window)
    }

    pub fn current_window(&self) -> Option<XWindow> {
        self.window_for(self.active)
    }

    pub fn pane_mut(&mut self, window: XWindow) -> Option<&mut WindowPane> {
        let key = self.find(window)?;
        self.workspaces.get_mut(&key.mux_window)?.panes.get_mut(&key.pane)
    }

    /// Registers `window` as the GUI backing of `key`, resizing it to the
    /// fullscreen-term rect so the first real geometry update causes no
    /// flicker.
    pub fn add(&mut self, display: &mut dyn Display, window: XWindow, key: PaneKey, fullscreen_term_rect: Rect) {
        display.resize(window, fullscreen_term_rect);
        self.workspaces
            .entry(key.mux_window)
            .or_default()
            .panes
            .insert(key.pane, WindowPane::new(window));
        self.pane_to_window.insert(key.pane, key.mux_window);
        self.window_to_pane.insert(window, key.pane);
    }

    /// Removes the entry backing `window`. No-op if unknown. Prunes an
    /// emptied workspace and asks the multiplexer to kill the corresponding
    /// pane; does not itself unmap or destroy the X window.
    pub fn remove(&mut self, tmux: &dyn Tmux, window: XWindow) {
        let key = match self.find(window) {
            Some(k) => k,
            None => return,
        };

        if let Some(ws) = self.workspaces.get_mut(&key.mux_window) {
            ws.panes.remove(&key.pane);
            if ws.is_empty() {
                self.workspaces.remove(&key.mux_window);
            }
        }
        self.pane_to_window.remove(&key.pane);
        self.window_to_pane.remove(&window);

        tmux.kill_pane(key.pane);
    }

    /// Migrates a pane between multiplexer windows if it moved, preserving
    /// `hidden`/`pending_unmaps`. No-op if the pane-id is unknown or hasn't
    /// migrated.
    pub fn move_pane(&mut self, new_key: PaneKey) {
        let pane = new_key.pane;
        let new_window = new_key.mux_window;

        let old_window = match self.pane_to_window.get(&pane) {
            Some(w) if *w != new_window => *w,
            _ => return,
        };

        let wp = match self
            .workspaces
            .get_mut(&old_window)
            .and_then(|ws| ws.panes.remove(&pane))
        {
            Some(wp) => wp,
            None => return,
        };

        if let Some(ws) = self.workspaces.get(&old_window) {
            if ws.is_empty() {
                self.workspaces.remove(&old_window);
            }
        }

        self.workspaces
            .entry(new_window)
            .or_default()
            .panes
            .insert(pane, wp);
        self.pane_to_window.insert(pane, new_window);
    }

    fn activate_workspace(&mut self, display: &mut dyn Display, key: PaneKey, zoomed: bool) {
        if key.mux_window != self.active.mux_window && self.active.mux_window >= 0 {
            if let Some(prev) = self.workspaces.get_mut(&self.active.mux_window) {
                prev.hide_all(display);
            }
        }

        if let Some(ws) = self.workspaces.get_mut(&key.mux_window) {
            if zoomed {
                ws.show_zoomed(display, key.pane);
            } else {
                ws.show_all(display);
            }
        }
    }

    fn focus_pane(&mut self, display: &mut dyn Display, key: PaneKey, redundant_refocus: bool) {
        if self.active == key && !redundant_refocus {
            return;
        }

        match self.window_for(key) {
            Some(w) => {
                display.grab_prefix();
                display.focus(w);
            }
            None => {
                display.ungrab_prefix();
                display.focus_term();
            }
        }

        self.active = key;
        self.override_ = false;
    }

    /// Switches the active pane. If the multiplexer window changed, hides
    /// the previous workspace (incrementing pending_unmaps on each pane)
    /// and shows the new one (all panes, or just `key.pane` if `zoomed`).
    /// Focuses the pane's backing window if present, else the root
    /// terminal. Grabs the prefix for a GUI-backed pane, ungrabs otherwise.
    pub fn set_active(&mut self, display: &mut dyn Display, key: PaneKey, zoomed: bool) {
        self.activate_workspace(display, key, zoomed);
        self.focus_pane(display, key, false);
    }

    /// Sets the override flag without touching focus.
    pub fn set_override(&mut self) {
        self.override_ = true;
    }

    /// Clears the override flag and re-focuses the active pane, forcing
    /// the focus call even though `active` hasn't changed (recovers focus
    /// stolen while overridden).
    pub fn release_override(&mut self, display: &mut dyn Display) {
        let active = self.active;
        self.focus_pane(display, active, true);
    }

    /// Every managed X window whose pane-id the multiplexer no longer
    /// reports. Probed via `Tmux::has_pane`.
    pub fn find_orphans(&self, tmux: &dyn Tmux) -> Vec<XWindow> {
        self.window_to_pane
            .iter()
            .filter(|(_, pane)| !tmux.has_pane(**pane))
            .map(|(w, _)| *w)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeDisplay {
        mapped: Vec<XWindow>,
        unmapped: Vec<XWindow>,
        focused: Vec<XWindow>,
        focused_term: u32,
        focused_root: u32,
        grabbed: bool,
    }

    impl Display for FakeDisplay {
        fn map(&mut self, window: XWindow) {
            self.mapped.push(window);
        }
        fn unmap(&mut self, window: XWindow) {
            self.unmapped.push(window);
        }
        fn resize(&mut self, _window: XWindow, _rect: Rect) {}
        fn focus(&mut self, window: XWindow) {
            self.focused.push(window);
        }
        fn focus_term(&mut self) {
            self.focused_term += 1;
        }
        fn focus_root(&mut self) {
            self.focused_root += 1;
        }
        fn grab_prefix(&mut self) {
            self.grabbed = true;
        }
        fn ungrab_prefix(&mut self) {
            self.grabbed = false;
        }
    }

    #[derive(Default)]
    struct FakeTmux {
        killed: RefCell<Vec<PaneId>>,
        missing: RefCell<Vec<PaneId>>,
    }

    impl Tmux for FakeTmux {
        fn split_window(&self) {}
        fn kill_pane(&self, pane: PaneId) {
            self.killed.borrow_mut().push(pane);
        }
        fn name_pane(&self, _pane: PaneId, _name: &str) {}
        fn has_pane(&self, pane: PaneId) -> bool {
            !self.missing.borrow().contains(&pane)
        }
        fn display_message(&self, _msg: &str) {}
        fn send_prefix(&self) {}
        fn cancel_prefix(&self) {}
    }

    fn rect() -> Rect {
        Rect {
            start: crate::layout::Point { x: 0, y: 0 },
            end: crate::layout::Point { x: 80, y: 23 },
        }
    }

    #[test]
    fn add_registers_both_reverse_indices() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let key = PaneKey { mux_window: 1, pane: 2 };
        m.add(&mut d, 100, key, rect());

        assert_eq!(m.find(100), Some(key));
        assert_eq!(m.window_for(key), Some(100));
        assert!(m.is_filled(key));
        assert_eq!(d.mapped.len() + d.unmapped.len(), 0); // add doesn't map/unmap
    }

    #[test]
    fn remove_unknown_window_is_noop() {
        let mut m = Mapping::new();
        let tmux = FakeTmux::default();
        m.remove(&tmux, 999);
        assert!(tmux.killed.borrow().is_empty());
    }

    #[test]
    fn remove_prunes_emptied_workspace_and_kills_pane() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let tmux = FakeTmux::default();
        let key = PaneKey { mux_window: 1, pane: 2 };
        m.add(&mut d, 100, key, rect());

        m.remove(&tmux, 100);

        assert!(!m.has_window(100));
        assert!(!m.is_filled(key));
        assert_eq!(*tmux.killed.borrow(), vec![2]);
    }

    #[test]
    fn set_active_hides_previous_workspace_and_shows_new() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let k1 = PaneKey { mux_window: 1, pane: 2 };
        let k2 = PaneKey { mux_window: 2, pane: 4 };
        m.add(&mut d, 100, k1, rect());
        m.add(&mut d, 101, k2, rect());

        m.set_active(&mut d, k1, false);
        d.mapped.clear();
        d.unmapped.clear();
        d.focused.clear();

        m.set_active(&mut d, k2, false);

        assert_eq!(d.unmapped, vec![100]);
        assert_eq!(d.mapped, vec![101]);
        assert_eq!(d.focused, vec![101]);
        assert!(d.grabbed);

        let wp = m.pane_mut(100).unwrap();
        assert_eq!(wp.pending_unmaps, 1);
        assert!(wp.hidden);
    }

    #[test]
    fn zoom_hides_non_focal_panes_in_same_workspace() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let k4 = PaneKey { mux_window: 2, pane: 4 };
        let k5 = PaneKey { mux_window: 2, pane: 5 };
        m.add(&mut d, 101, k4, rect());
        m.add(&mut d, 102, k5, rect());
        m.set_active(&mut d, k4, false);
        d.mapped.clear();
        d.unmapped.clear();

        m.set_active(&mut d, k4, true);

        assert_eq!(d.unmapped, vec![102]);
        assert!(d.mapped.is_empty());

        d.mapped.clear();
        d.unmapped.clear();
        m.set_active(&mut d, k4, false);
        assert_eq!(d.mapped, vec![102]);
    }

    #[test]
    fn set_active_idempotent() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let key = PaneKey { mux_window: 1, pane: 2 };
        m.add(&mut d, 100, key, rect());
        m.set_active(&mut d, key, false);
        let focus_count = d.focused.len();
        m.set_active(&mut d, key, false);
        assert_eq!(d.focused.len(), focus_count);
    }

    #[test]
    fn release_override_forces_refocus() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let key = PaneKey { mux_window: 1, pane: 2 };
        m.add(&mut d, 100, key, rect());
        m.set_active(&mut d, key, false);
        m.set_override();
        assert!(m.overridden());

        d.focused.clear();
        m.release_override(&mut d);
        assert_eq!(d.focused, vec![100]);
        assert!(!m.overridden());
    }

    #[test]
    fn override_implies_active_filled_invariant_holds_after_release() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let key = PaneKey { mux_window: 1, pane: 2 };
        m.add(&mut d, 100, key, rect());
        m.set_active(&mut d, key, false);
        m.set_override();
        assert!(m.overridden());
        assert!(m.is_active_filled());
    }

    #[test]
    fn move_pane_transfers_between_workspaces_preserving_state() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let key = PaneKey { mux_window: 1, pane: 2 };
        m.add(&mut d, 100, key, rect());
        m.pane_mut(100).unwrap().pending_unmaps = 3;

        m.move_pane(PaneKey { mux_window: 9, pane: 2 });

        assert!(!m.is_filled(key));
        let moved = PaneKey { mux_window: 9, pane: 2 };
        assert!(m.is_filled(moved));
        assert_eq!(m.pane_mut(100).unwrap().pending_unmaps, 3);
    }

    #[test]
    fn move_pane_noop_when_pane_unknown_or_same_workspace() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let key = PaneKey { mux_window: 1, pane: 2 };
        m.add(&mut d, 100, key, rect());

        m.move_pane(PaneKey { mux_window: 1, pane: 2 });
        assert!(m.is_filled(key));

        m.move_pane(PaneKey { mux_window: 5, pane: 999 });
        assert!(m.is_filled(key));
    }

    #[test]
    fn pending_unmap_absorbs_one_wm_initiated_unmap() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let key = PaneKey { mux_window: 1, pane: 2 };
        m.add(&mut d, 100, key, rect());
        m.pane_mut(100).unwrap().show(&mut d);
        m.pane_mut(100).unwrap().hide(&mut d);
        assert_eq!(m.pane_mut(100).unwrap().pending_unmaps, 1);

        let absorbed = m.pane_mut(100).unwrap().notify_unmapped();
        assert!(absorbed);
        assert_eq!(m.pane_mut(100).unwrap().pending_unmaps, 0);

        let absorbed_again = m.pane_mut(100).unwrap().notify_unmapped();
        assert!(!absorbed_again);
    }

    #[test]
    fn find_orphans_returns_windows_whose_pane_vanished() {
        let mut m = Mapping::new();
        let mut d = FakeDisplay::default();
        let tmux = FakeTmux::default();
        let k1 = PaneKey { mux_window: 1, pane: 7 };
        m.add(&mut d, 100, k1, rect());
        tmux.missing.borrow_mut().push(7);

        let orphans = m.find_orphans(&tmux);
        assert_eq!(orphans, vec![100]);
    }
}
