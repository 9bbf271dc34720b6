//! Fixed-slot client-message wire format used by the control client to push
//! events into the reactor.
//!
//! Every message is carried by an X `ClientMessage` event: format 32, five
//! signed 32-bit slots, and a message-type atom drawn from the table below.
//! The atom name `_XW_RESOUTION` is a preserved misspelling for wire
//! compatibility with existing control-client builds.

use crate::layout::{BarPosition, Point, Rect, Resolution};
use crate::mapping::{ModifiedKey, PaneKey};

pub const ATOM_RESOLUTION: &str = "_XW_RESOUTION";
pub const ATOM_PREFIX: &str = "_XW_PREFIX";
pub const ATOM_EXIT: &str = "_XW_EXIT";
pub const ATOM_TMUX_POSITION: &str = "_XW_TMUX_POSITION";
pub const ATOM_KILL_PANE: &str = "_XW_KILL_PANE";
pub const ATOM_KILL_ORPHANS: &str = "_XW_KILL_ORPHANS";

/// All atom names the reactor recognizes, in decode-attempt order.
pub const ALL_ATOMS: &[&str] = &[
    ATOM_RESOLUTION,
    ATOM_PREFIX,
    ATOM_EXIT,
    ATOM_TMUX_POSITION,
    ATOM_KILL_PANE,
    ATOM_KILL_ORPHANS,
];

pub type Slots = [i32; 5];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Resolution {
        term: Resolution,
        screen: Resolution,
        bar: BarPosition,
    },
    Prefix(ModifiedKey),
    Exit,
    KillPane,
    KillOrphans,
    TmuxPosition {
        key: PaneKey,
        rect: Rect,
        focused: bool,
        zoomed: bool,
        dead: bool,
    },
}

/// Packs a point into one slot: low 16 bits x, high 16 bits y. Both
/// components are assumed to fit in 16 bits (true for any screen or
/// terminal grid dimension in practice).
fn pack_point(p: Point) -> i32 {
    let x = (p.x as u32) & 0xFFFF;
    let y = (p.y as u32) & 0xFFFF;
    ((y << 16) | x) as i32
}

fn unpack_point(slot: i32) -> Point {
    let v = slot as u32;
    Point {
        x: (v & 0xFFFF) as usize,
        y: ((v >> 16) & 0xFFFF) as usize,
    }
}

fn pack_resolution(r: Resolution) -> i32 {
    pack_point(Point {
        x: r.width,
        y: r.height,
    })
}

fn unpack_resolution(slot: i32) -> Resolution {
    let p = unpack_point(slot);
    Resolution::new(p.x, p.y)
}

const FOCUSED_BIT: i32 = 1 << 0;
const ZOOMED_BIT: i32 = 1 << 1;
const DEAD_BIT: i32 = 1 << 2;

/// Encodes a [`Message`] as (message-type atom name, 5 signed 32-bit slots).
pub fn encode(msg: &Message) -> (&'static str, Slots) {
    match msg {
        Message::Resolution { term, screen, bar } => {
            let bar_slot = match bar {
                BarPosition::Bottom => 0,
                BarPosition::Top => 1,
            };
            (
                ATOM_RESOLUTION,
                [pack_resolution(*screen), pack_resolution(*term), 0, 0, bar_slot],
            )
        }
        Message::Prefix(key) => (ATOM_PREFIX, [key.keycode as i32, key.modifiers as i32, 0, 0, 0]),
        Message::Exit => (ATOM_EXIT, [0; 5]),
        Message::KillPane => (ATOM_KILL_PANE, [0; 5]),
        Message::KillOrphans => (ATOM_KILL_ORPHANS, [0; 5]),
        Message::TmuxPosition {
            key,
            rect,
            focused,
            zoomed,
            dead,
        } => {
            let mut bits = 0;
            if *focused {
                bits |= FOCUSED_BIT;
            }
            if *zoomed {
                bits |= ZOOMED_BIT;
            }
            if *dead {
                bits |= DEAD_BIT;
            }
            (
                ATOM_TMUX_POSITION,
                [
                    pack_point(rect.start),
                    pack_point(rect.end),
                    key.mux_window,
                    key.pane,
                    bits,
                ],
            )
        }
    }
}

/// Decodes a message given its atom name and slots. Returns `None` if the
/// atom name is unknown (malformed/foreign control messages are silently
/// dropped by the reactor per spec, not an error).
pub fn decode(atom_name: &str, slots: Slots) -> Option<Message> {
    match atom_name {
        ATOM_RESOLUTION => {
            let screen = unpack_resolution(slots[0]);
            let term = unpack_resolution(slots[1]);
            let bar = if slots[4] == 1 {
                BarPosition::Top
            } else {
                BarPosition::Bottom
            };
            Some(Message::Resolution { term, screen, bar })
        }
        ATOM_PREFIX => Some(Message::Prefix(ModifiedKey {
            keycode: slots[0] as u32,
            modifiers: slots[1] as u32,
        })),
        ATOM_EXIT => Some(Message::Exit),
        ATOM_KILL_PANE => Some(Message::KillPane),
        ATOM_KILL_ORPHANS => Some(Message::KillOrphans),
        ATOM_TMUX_POSITION => {
            let start = unpack_point(slots[0]);
            let end = unpack_point(slots[1]);
            let bits = slots[4];
            Some(Message::TmuxPosition {
                key: PaneKey {
                    mux_window: slots[2],
                    pane: slots[3],
                },
                rect: Rect { start, end },
                focused: bits & FOCUSED_BIT != 0,
                zoomed: bits & ZOOMED_BIT != 0,
                dead: bits & DEAD_BIT != 0,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: Message) {
        let (atom, slots) = encode(&msg);
        let decoded = decode(atom, slots).expect("known atom decodes");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn resolution_roundtrips() {
        roundtrip(Message::Resolution {
            term: Resolution::new(80, 24),
            screen: Resolution::new(1920, 1080),
            bar: BarPosition::Top,
        });
        roundtrip(Message::Resolution {
            term: Resolution::new(80, 24),
            screen: Resolution::new(1920, 1080),
            bar: BarPosition::Bottom,
        });
    }

    #[test]
    fn prefix_roundtrips() {
        roundtrip(Message::Prefix(ModifiedKey {
            keycode: 38,
            modifiers: 4,
        }));
    }

    #[test]
    fn exit_and_kill_roundtrip() {
        roundtrip(Message::Exit);
        roundtrip(Message::KillPane);
        roundtrip(Message::KillOrphans);
    }

    #[test]
    fn tmux_position_roundtrips_with_all_bit_combinations() {
        for focused in [false, true] {
            for zoomed in [false, true] {
                for dead in [false, true] {
                    roundtrip(Message::TmuxPosition {
                        key: PaneKey {
                            mux_window: 1,
                            pane: 2,
                        },
                        rect: Rect {
                            start: Point { x: 0, y: 0 },
                            end: Point { x: 80, y: 23 },
                        },
                        focused,
                        zoomed,
                        dead,
                    });
                }
            }
        }
    }

    #[test]
    fn point_packing_roundtrips() {
        let p = Point { x: 1920, y: 1080 };
        assert_eq!(unpack_point(pack_point(p)), p);
    }

    #[test]
    fn unknown_atom_decodes_to_none() {
        assert_eq!(decode("_XW_NOT_A_REAL_MESSAGE", [0; 5]), None);
    }
}
