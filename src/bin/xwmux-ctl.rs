//! Control client: encodes one control message and delivers it to the
//! running reactor as a `ClientMessage` event on the root window, per
//! spec.md §4.7. Opens its own short-lived display connection distinct
//! from the reactor's (spec.md §5: "the control CLI opens its own display
//! connection only long enough to send the client message").

use std::ffi::CString;

use x11::xlib;

use xwmux::error::{Result, XwmuxError};
use xwmux::keys;
use xwmux::layout::{BarPosition, Point, Rect, Resolution};
use xwmux::mapping::PaneKey;
use xwmux::protocol::{self, Message};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    match run(&args[1..]) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("xwmux-ctl: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &[String]) -> Result<()> {
    let msg = parse(args)?;
    send(&msg)
}

fn parse(args: &[String]) -> Result<Message> {
    let (cmd, rest) = args
        .split_first()
        .ok_or_else(|| XwmuxError::ClientParse("missing command".to_string()))?;

    match cmd.as_str() {
        "init" => parse_init(rest),
        "prefix" => parse_prefix(rest),
        "exit" => Ok(Message::Exit),
        "kill-pane" => {
            if rest.is_empty() {
                return Err(XwmuxError::ClientParse("kill-pane needs an argument".to_string()));
            }
            Ok(Message::KillPane)
        }
        "kill-orphans" => Ok(Message::KillOrphans),
        "tmux-position" => parse_tmux_position(rest),
        other => Err(XwmuxError::ClientParse(format!("unknown command {:?}", other))),
    }
}

fn parse_init(args: &[String]) -> Result<Message> {
    let [rows, cols, px_w, px_h, bar] = args else {
        return Err(XwmuxError::ClientParse(
            "init needs <rows> <cols> <px_w> <px_h> <bar>".to_string(),
        ));
    };
    let rows: usize = parse_num(rows)?;
    let cols: usize = parse_num(cols)?;
    let px_w: usize = parse_num(px_w)?;
    let px_h: usize = parse_num(px_h)?;
    let bar = match bar.as_str() {
        "top" => BarPosition::Top,
        "bottom" => BarPosition::Bottom,
        other => return Err(XwmuxError::ClientParse(format!("unknown bar position {:?}", other))),
    };
    Ok(Message::Resolution {
        term: Resolution::new(cols, rows),
        screen: Resolution::new(px_w, px_h),
        bar,
    })
}

fn parse_prefix(args: &[String]) -> Result<Message> {
    let key = args
        .first()
        .ok_or_else(|| XwmuxError::ClientParse("prefix needs a key".to_string()))?;
    let spec = keys::parse_key_spec(key);

    let display = unsafe { xlib::XOpenDisplay(std::ptr::null()) };
    if display.is_null() {
        return Err(XwmuxError::Startup("could not open X display".to_string()));
    }
    let resolved = resolve_keycode(display, &spec);
    unsafe { xlib::XCloseDisplay(display) };

    let modified = resolved.ok_or_else(|| XwmuxError::ClientParse(format!("unrecognized key {:?}", key)))?;
    Ok(Message::Prefix(modified))
}

fn resolve_keycode(display: *mut xlib::Display, spec: &keys::KeySpec) -> Option<xwmux::mapping::ModifiedKey> {
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
    let keycode = unsafe { xlib::XKeysymToKeycode(display, keysym) };
    if keycode == 0 {
        return None;
    }
    Some(xwmux::mapping::ModifiedKey {
        keycode: keycode as u32,
        modifiers: spec.modifiers,
    })
}

fn parse_tmux_position(args: &[String]) -> Result<Message> {
    if args.len() < 9 {
        return Err(XwmuxError::ClientParse(
            "tmux-position needs <focused> <zoomed> $<session> @<window> %<pane> <left> <top> <width> <height> [dead]"
                .to_string(),
        ));
    }
    let focused = parse_bool(&args[0])?;
    let zoomed = parse_bool(&args[1])?;
    // args[2] is the $<session> token; sessions aren't modeled here, only
    // window/pane identity is (spec.md §3 data model).
    let mux_window = parse_prefixed(&args[3], '@')?;
    let pane = parse_prefixed(&args[4], '%')?;
    let left: usize = parse_num(&args[5])?;
    let top: usize = parse_num(&args[6])?;
    let width: usize = parse_num(&args[7])?;
    let height: usize = parse_num(&args[8])?;
    let dead = args.get(9).map(|s| parse_bool(s)).transpose()?.unwrap_or(false);

    Ok(Message::TmuxPosition {
        key: PaneKey { mux_window, pane },
        rect: Rect {
            start: Point { x: left, y: top },
            end: Point {
                x: left + width,
                y: top + height,
            },
        },
        focused,
        zoomed,
        dead,
    })
}

fn parse_prefixed(s: &str, prefix: char) -> Result<i32> {
    let stripped = s
        .strip_prefix(prefix)
        .ok_or_else(|| XwmuxError::ClientParse(format!("expected {:?}-prefixed id, got {:?}", prefix, s)))?;
    parse_num(stripped)
}

fn parse_bool(s: &str) -> Result<bool> {
    match s {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(XwmuxError::ClientParse(format!("expected 0/1, got {:?}", other))),
    }
}

fn parse_num<T: std::str::FromStr>(s: &str) -> Result<T> {
    s.parse().map_err(|_| XwmuxError::ClientParse(format!("expected a number, got {:?}", s)))
}

fn send(msg: &Message) -> Result<()> {
    let display = unsafe { xlib::XOpenDisplay(std::ptr::null()) };
    if display.is_null() {
        return Err(XwmuxError::Startup("could not open X display".to_string()));
    }

    let root = unsafe { xlib::XDefaultRootWindow(display) };
    let (atom_name, slots) = protocol::encode(msg);
    let c_name = CString::new(atom_name).expect("atom name has no interior nul");
    let atom = unsafe { xlib::XInternAtom(display, c_name.as_ptr(), xlib::False) };

    let mut event: xlib::XClientMessageEvent = unsafe { std::mem::zeroed() };
    event.type_ = xlib::ClientMessage;
    event.window = root;
    event.message_type = atom;
    event.format = 32;
    for (i, slot) in slots.iter().enumerate() {
        event.data.set_long(i, *slot as i64);
    }

    let mut xevent = xlib::XEvent { client_message: event };
    let ok = unsafe {
        xlib::XSendEvent(
            display,
            root,
            xlib::False,
            xlib::SubstructureRedirectMask,
            &mut xevent,
        )
    };
    unsafe {
        xlib::XSync(display, xlib::False);
        xlib::XCloseDisplay(display);
    }

    if ok == 0 {
        return Err(XwmuxError::Startup("failed to send control message".to_string()));
    }
    Ok(())
}
