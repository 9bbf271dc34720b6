//! The single-threaded event loop: merges X events and control messages
//! (delivered as `ClientMessage` events on the root window) into one
//! stream, per spec.md §4.4/§4.5. Grounded in the reference `Rdwm::run`'s
//! event dispatch loop, generalized from a quadrant tiler to the
//! pane/mapping model.

use std::collections::{HashSet, VecDeque};

use x11::xlib;

use crate::config::Config;
use crate::display::XDisplay;
use crate::layout::Layout;
use crate::mapping::{Display as _, Mapping, PaneKey, XWindow};
use crate::protocol::{self, Message};
use crate::tmux::Tmux;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermState {
    None,
    Opening,
    Mapped(XWindow),
}

pub struct Reactor<T: Tmux> {
    display: XDisplay,
    tmux: T,
    config: Config,
    mapping: Mapping,
    layout: Layout,
    window_queue: VecDeque<XWindow>,
    pending_windows: HashSet<XWindow>,
    term: TermState,
    ignore_focus: bool,
    stop: bool,
}

impl<T: Tmux> Reactor<T> {
    pub fn new(display: XDisplay, tmux: T, config: Config) -> Self {
        let layout = Layout::with_padding(
            crate::layout::Resolution::default(),
            crate::layout::Resolution::default(),
            config.layout.bar,
            config.layout.x_padding,
            config.layout.y_padding,
        );
        Reactor {
            display,
            tmux,
            config,
            mapping: Mapping::new(),
            layout,
            window_queue: VecDeque::new(),
            pending_windows: HashSet::new(),
            term: TermState::None,
            ignore_focus: false,
            stop: false,
        }
    }

    /// Runs until an `EXIT` control message is processed. On exit, kills
    /// every remaining managed pane via the multiplexer and closes the
    /// display (spec.md §5 cancellation).
    pub fn run(&mut self) {
        self.open_root_term();
        while !self.stop {
            let event = self.display.next_event();
            self.dispatch(event);
            self.display.sync();
            self.forward_pending_error();
        }
        self.shutdown();
    }

    /// Polls the Display Facade's runtime-error buffer once per iteration
    /// and forwards anything pending to the multiplexer's status line
    /// (spec.md §7); the error itself was already logged when it occurred.
    fn forward_pending_error(&mut self) {
        if let Some(msg) = self.display.take_error() {
            self.tmux.display_message(&msg);
        }
    }

    fn open_root_term(&mut self) {
        self.term = TermState::Opening;
        self.display.open_term(&self.config.terminal.command);
    }

    fn shutdown(&mut self) {
        let windows: Vec<XWindow> = self.mapping.known_windows();
        for w in windows {
            if let Some(key) = self.mapping.find(w) {
                self.tmux.kill_pane(key.pane);
            }
        }
    }

    fn dispatch(&mut self, event: xlib::XEvent) {
        match event.get_type() {
            xlib::ConfigureNotify => self.on_configure_notify(unsafe { &event.configure }),
            xlib::MapRequest => self.on_map_request(unsafe { &event.map_request }),
            xlib::UnmapNotify => self.on_unmap_notify(unsafe { &event.unmap }),
            xlib::DestroyNotify => self.on_destroy_notify(unsafe { &event.destroy_window }),
            xlib::PropertyNotify => self.on_property_notify(unsafe { &event.property }),
            xlib::KeyPress => self.on_key_press(unsafe { &event.key }),
            xlib::ClientMessage => self.on_client_message(unsafe { &event.client_message }),
            _ => {}
        }
    }

    fn on_configure_notify(&mut self, event: &xlib::XConfigureEvent) {
        if event.window != self.display.root() {
            return;
        }
        self.layout
            .set_screen_resolution(crate::layout::Resolution::new(event.width as usize, event.height as usize));
        if let TermState::Mapped(w) = self.term {
            self.display.close_term(w);
        }
        self.open_root_term();
    }

    fn on_map_request(&mut self, event: &xlib::XMapRequestEvent) {
        let window = event.window;
        if self.display.override_redirect(window) {
            return;
        }
        if self.display.is_root_term(window, &self.config.terminal.class) {
            let rect = self.layout.fullscreen_term_rect();
            self.display.resize(window, rect);
            self.display.lower_window(window);
            self.display.map(window);
            self.term = TermState::Mapped(window);
            self.display.focus(window);
            return;
        }
        if self.pending_windows.contains(&window) || self.display.iconic(window) {
            return;
        }

        self.window_queue.push_back(window);
        self.pending_windows.insert(window);
        self.tmux.split_window();
        self.display.watch_property_changes(window);
    }

    fn on_unmap_notify(&mut self, event: &xlib::XUnmapEvent) {
        let window = event.window;
        if self.mapping.has_window(window) {
            let absorbed = self
                .mapping
                .pane_mut(window)
                .map(|wp| wp.notify_unmapped())
                .unwrap_or(false);
            if absorbed {
                return;
            }
            self.mapping.remove(&self.tmux, window);
            self.display.focus_term();
        } else {
            self.pending_windows.remove(&window);
            self.window_queue.retain(|w| *w != window);
        }
    }

    fn on_destroy_notify(&mut self, event: &xlib::XDestroyWindowEvent) {
        let window = event.window;
        if matches!(self.term, TermState::Mapped(w) if w == window) {
            self.term = TermState::None;
            self.open_root_term();
            self.display.focus_term();
            return;
        }
        if !self.mapping.has_window(window) {
            self.pending_windows.remove(&window);
            self.window_queue.retain(|w| *w != window);
            return;
        }
        self.mapping.remove(&self.tmux, window);
        self.display.focus_term();
    }

    fn on_property_notify(&mut self, event: &xlib::XPropertyEvent) {
        if !self.display.is_wm_name(event.atom) || !self.mapping.has_window(event.window) {
            return;
        }
        if let (Some(key), Some(name)) = (self.mapping.find(event.window), self.display.window_name(event.window)) {
            self.tmux.name_pane(key.pane, &name);
        }
    }

    fn on_key_press(&mut self, event: &xlib::XKeyEvent) {
        let is_prefix = self
            .display
            .prefix_key()
            .map(|k| k.keycode == event.keycode && k.modifiers == event.state)
            .unwrap_or(false);
        if !is_prefix {
            return;
        }

        self.display.allow_async_keyboard(event.time);

        if !self.mapping.overridden() {
            if !self.mapping.is_active_filled() {
                return;
            }
            self.ignore_focus = true;
            self.display.focus_term();
            self.ignore_focus = false;
            self.display.sync();
            self.tmux.send_prefix();
            self.mapping.set_override();
        } else {
            self.tmux.cancel_prefix();
            self.mapping.release_override(&mut self.display);
            if let Some(w) = self.mapping.current_window() {
                self.display.focus(w);
            }
        }
    }

    fn on_client_message(&mut self, event: &xlib::XClientMessageEvent) {
        let atom_name = match self.display.atom_name(event.message_type) {
            Some(name) => name,
            None => return,
        };
        let slots: [i32; 5] = [
            event.data.get_long(0) as i32,
            event.data.get_long(1) as i32,
            event.data.get_long(2) as i32,
            event.data.get_long(3) as i32,
            event.data.get_long(4) as i32,
        ];
        let msg = match protocol::decode(atom_name, slots) {
            Some(m) => m,
            None => return,
        };
        self.handle_message(msg);
    }

    fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::Resolution { term, screen, bar } => {
                self.layout.set_term_resolution(term);
                self.layout.set_screen_resolution(screen);
                self.layout.set_bar_position(bar);
            }
            Message::Prefix(key) => {
                self.display.set_prefix(key);
            }
            Message::Exit => {
                self.stop = true;
            }
            Message::KillPane => {
                if let Some(w) = self.mapping.current_window() {
                    self.display.kill_client(w);
                }
            }
            Message::KillOrphans => {
                let orphans = self.mapping.find_orphans(&self.tmux);
                for w in orphans {
                    self.display.kill_client(w);
                    self.mapping.remove(&self.tmux, w);
                }
            }
            Message::TmuxPosition {
                key,
                rect,
                focused,
                zoomed,
                dead,
            } => self.handle_tmux_position(key, rect, focused, zoomed, dead),
        }
    }

    fn handle_tmux_position(
        &mut self,
        key: PaneKey,
        rect: crate::layout::Rect,
        focused: bool,
        zoomed: bool,
        dead: bool,
    ) {
        self.mapping.move_pane(key);

        if focused && !self.ignore_focus {
            if let Some(&w) = self.window_queue.front() {
                if !self.mapping.is_filled(key) && dead {
                    self.window_queue.pop_front();
                    if !self.pending_windows.contains(&w) || self.mapping.has_window(w) {
                        self.tmux.kill_pane(key.pane);
                    } else {
                        self.pending_windows.remove(&w);
                        let rect = self.layout.fullscreen_term_rect();
                        self.mapping.add(&mut self.display, w, key, rect);
                        if let Some(name) = self.display.window_name(w) {
                            self.tmux.name_pane(key.pane, &name);
                        }
                    }
                }
            }
            self.mapping.set_active(&mut self.display, key, zoomed);
        }

        let bar_adjusted = self.layout.add_bar(rect);
        let screen_rect = self.layout.rect_to_screen(bar_adjusted);
        if self.mapping.is_filled(key) {
            if let Some(w) = self.mapping.window_for(key) {
                self.display.resize(w, screen_rect);
            }
        }
    }
}
