//! Key-syntax parsing for the control client's `prefix` command: modifier
//! prefixes (`M-`, `S-`, `C-`, case-insensitive) followed by either a named
//! key or a single character, matching the multiplexer's own key-binding
//! syntax (e.g. `C-a`, `M-S-F1`). Grounded in
//! `original_source/src/xwmux/tmux_keys.h`.
//!
//! This module only parses the string into a modifier mask plus either a
//! resolved keysym or a symbolic name still needing resolution; actually
//! turning a keysym into a keycode requires a live display connection (see
//! `display.rs`), so that step is not done here, to keep parsing unit
//! testable without an X server.

use x11::keysym::*;

pub const MOD_CONTROL: u32 = x11::xlib::ControlMask;
pub const MOD_ALT: u32 = x11::xlib::Mod1Mask;
pub const MOD_SHIFT: u32 = x11::xlib::ShiftMask;

/// Named keys the multiplexer recognizes, mapped to their X11 keysym.
/// Mouse event names resolve to `None` per spec (accepted but not
/// forwarded, since pointer events are out of this WM's scope).
fn named_keysym(name: &str) -> Option<Option<u64>> {
    let sym: Option<u64> = match name {
        "F1" => Some(XK_F1 as u64),
        "F2" => Some(XK_F2 as u64),
        "F3" => Some(XK_F3 as u64),
        "F4" => Some(XK_F4 as u64),
        "F5" => Some(XK_F5 as u64),
        "F6" => Some(XK_F6 as u64),
        "F7" => Some(XK_F7 as u64),
        "F8" => Some(XK_F8 as u64),
        "F9" => Some(XK_F9 as u64),
        "F10" => Some(XK_F10 as u64),
        "F11" => Some(XK_F11 as u64),
        "F12" => Some(XK_F12 as u64),
        "IC" => Some(XK_Insert as u64),
        "DC" => Some(XK_Delete as u64),
        "Home" => Some(XK_Home as u64),
        "End" => Some(XK_End as u64),
        "NPage" | "PageDown" | "PgDn" => Some(XK_Page_Down as u64),
        "PPage" | "PageUp" | "PgUp" => Some(XK_Page_Up as u64),
        "Tab" => Some(XK_Tab as u64),
        "BTab" => Some(XK_ISO_Left_Tab as u64),
        "Space" => Some(XK_space as u64),
        "BSpace" => Some(XK_BackSpace as u64),
        "Enter" => Some(XK_Return as u64),
        "Escape" => Some(XK_Escape as u64),
        "Up" => Some(XK_Up as u64),
        "Down" => Some(XK_Down as u64),
        "Left" => Some(XK_Left as u64),
        "Right" => Some(XK_Right as u64),
        "KP/" => Some(XK_KP_Divide as u64),
        "KP*" => Some(XK_KP_Multiply as u64),
        "KP-" => Some(XK_KP_Subtract as u64),
        "KP7" => Some(XK_KP_7 as u64),
        "KP8" => Some(XK_KP_8 as u64),
        "KP9" => Some(XK_KP_9 as u64),
        "KP+" => Some(XK_KP_Add as u64),
        "KP4" => Some(XK_KP_4 as u64),
        "KP5" => Some(XK_KP_5 as u64),
        "KP6" => Some(XK_KP_6 as u64),
        "KP1" => Some(XK_KP_1 as u64),
        "KP2" => Some(XK_KP_2 as u64),
        "KP3" => Some(XK_KP_3 as u64),
        "KPEnter" => Some(XK_KP_Enter as u64),
        "KP0" => Some(XK_KP_0 as u64),
        "KP." => Some(XK_KP_Decimal as u64),

        n if is_mouse_event_name(n) => None,

        _ => return None,
    };
    Some(sym)
}

fn is_mouse_event_name(name: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "MouseDown1", "MouseDown2", "MouseDown3", "MouseUp1", "MouseUp2", "MouseUp3",
        "MouseDrag1", "MouseDrag2", "MouseDrag3", "MouseDragEnd1", "MouseDragEnd2",
        "MouseDragEnd3", "WheelUp", "WheelDown",
    ];
    const SUFFIXES: &[&str] = &["Pane", "Status", "Border"];
    PREFIXES
        .iter()
        .any(|p| SUFFIXES.iter().any(|s| name == format!("{}{}", p, s)))
}

/// A parsed key spec: a modifier mask plus either a resolved keysym or (if
/// the name wasn't in the built-in table and isn't a mouse event) a
/// symbolic name to resolve via `XStringToKeysym`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub modifiers: u32,
    pub keysym: Option<u64>,
    pub symbolic_name: Option<String>,
}

/// Parses a multiplexer-style key spec, e.g. `C-a`, `M-S-F1`, `Enter`.
pub fn parse_key_spec(spec: &str) -> KeySpec {
    let bytes = spec.as_bytes();
    let mut modifiers = 0u32;
    let mut n = 0usize;

    while n + 1 < bytes.len() && bytes[n + 1] == b'-' {
        let new_mod = match bytes[n] {
            b'M' | b'm' => MOD_ALT,
            b'S' | b's' => MOD_SHIFT,
            b'C' | b'c' => MOD_CONTROL,
            _ => 0,
        };
        if new_mod == 0 {
            break;
        }
        modifiers |= new_mod;
        n += 2;
    }

    let rest = &spec[n..];
    match named_keysym(rest) {
        Some(sym) => KeySpec {
            modifiers,
            keysym: sym,
            symbolic_name: None,
        },
        None => KeySpec {
            modifiers,
            keysym: None,
            symbolic_name: Some(rest.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_modifier() {
        let k = parse_key_spec("C-a");
        assert_eq!(k.modifiers, MOD_CONTROL);
        assert_eq!(k.symbolic_name.as_deref(), Some("a"));
    }

    #[test]
    fn parses_stacked_modifiers_case_insensitive() {
        let k = parse_key_spec("m-s-F1");
        assert_eq!(k.modifiers, MOD_ALT | MOD_SHIFT);
        assert_eq!(k.keysym, Some(XK_F1 as u64));
    }

    #[test]
    fn named_key_resolves_without_display() {
        let k = parse_key_spec("Enter");
        assert_eq!(k.modifiers, 0);
        assert_eq!(k.keysym, Some(XK_Return as u64));
    }

    #[test]
    fn unnamed_single_char_is_left_symbolic() {
        let k = parse_key_spec("C-x");
        assert_eq!(k.keysym, None);
        assert_eq!(k.symbolic_name.as_deref(), Some("x"));
    }

    #[test]
    fn mouse_event_names_map_to_null_key() {
        let k = parse_key_spec("MouseDown1Pane");
        assert_eq!(k.keysym, None);
        assert_eq!(k.symbolic_name, None);
    }

    #[test]
    fn stops_modifier_parsing_on_unrecognized_prefix_char() {
        // "Xa-Enter" doesn't start with a known modifier letter, so the
        // whole thing should fall through to the symbolic-name path
        // rather than silently eating a modifier.
        let k = parse_key_spec("Xa-Enter");
        assert_eq!(k.modifiers, 0);
        assert_eq!(k.symbolic_name.as_deref(), Some("Xa-Enter"));
    }
}
