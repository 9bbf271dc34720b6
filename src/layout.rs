//! Character-cell <-> screen-pixel coordinate arithmetic.
//!
//! The multiplexer reports pane rectangles in its own character grid; the
//! Display Facade needs screen pixels. All arithmetic here is integer-only
//! and pins the outer edges of the grid so that rounding error never
//! accumulates across tiled panes (see the reference implementation's
//! `layout.h`, which this module follows cell-for-cell).

use serde::{Deserialize, Serialize};

/// A size in some unit: pixels for the screen, character cells for the
/// multiplexer grid. Both components must be >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: usize,
    pub height: usize,
}

impl Resolution {
    pub fn new(width: usize, height: usize) -> Self {
        Resolution { width, height }
    }

    pub fn fullscreen(&self) -> Rect {
        Rect {
            start: Point { x: 0, y: 0 },
            end: Point {
                x: self.width,
                y: self.height,
            },
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution {
            width: 1,
            height: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

/// `start <= end` componentwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub start: Point,
    pub end: Point,
}

impl Rect {
    pub fn width(&self) -> usize {
        self.end.x - self.start.x
    }

    pub fn height(&self) -> usize {
        self.end.y - self.start.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarPosition {
    Top,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingDistribution {
    Start,
    #[default]
    Even,
    End,
}

impl PaddingDistribution {
    fn init_pad(self, total_pad: usize) -> usize {
        match self {
            PaddingDistribution::Start => total_pad,
            PaddingDistribution::Even => total_pad / 2,
            PaddingDistribution::End => 0,
        }
    }
}

/// Maps the multiplexer's character-cell grid onto screen pixels, tracking
/// status-bar position and padding distribution. Assumes padding like
/// a terminal emulator would: some split between axes, pinned edges.
#[derive(Debug, Clone)]
pub struct Layout {
    screen: Resolution,
    term: Resolution,
    bar: BarPosition,
    x_padding: PaddingDistribution,
    y_padding: PaddingDistribution,
}

impl Layout {
    pub fn new(screen: Resolution, term: Resolution) -> Self {
        Layout {
            screen,
            term,
            bar: BarPosition::default(),
            x_padding: PaddingDistribution::default(),
            y_padding: PaddingDistribution::default(),
        }
    }

    pub fn with_padding(
        screen: Resolution,
        term: Resolution,
        bar: BarPosition,
        x_padding: PaddingDistribution,
        y_padding: PaddingDistribution,
    ) -> Self {
        Layout {
            screen,
            term,
            bar,
            x_padding,
            y_padding,
        }
    }

    pub fn screen_resolution(&self) -> Resolution {
        self.screen
    }

    pub fn term_resolution(&self) -> Resolution {
        self.term
    }

    pub fn bar_position(&self) -> BarPosition {
        self.bar
    }

    pub fn set_screen_resolution(&mut self, res: Resolution) {
        self.screen = res;
    }

    pub fn set_term_resolution(&mut self, res: Resolution) {
        self.term = res;
    }

    pub fn set_bar_position(&mut self, bar: BarPosition) {
        self.bar = bar;
    }

    fn cell(&self) -> (usize, usize) {
        (self.screen.width / self.term.width, self.screen.height / self.term.height)
    }

    fn total_pad(&self) -> (usize, usize) {
        (self.screen.width % self.term.width, self.screen.height % self.term.height)
    }

    fn init_pad(&self) -> (usize, usize) {
        let (px, py) = self.total_pad();
        (self.x_padding.init_pad(px), self.y_padding.init_pad(py))
    }

    fn axis_to_screen(
        axis: usize,
        screen_len: usize,
        term_len: usize,
        cell: usize,
        init_pad: usize,
    ) -> usize {
        if axis == 0 {
            0
        } else if axis >= term_len {
            screen_len
        } else {
            init_pad + axis * cell
        }
    }

    /// Maps a character-cell coordinate to a pixel coordinate. Pins the
    /// left/top edge to 0 and the right/bottom edge to the screen
    /// resolution, collapsing off-by-one error at the grid boundary.
    pub fn term_to_screen(&self, p: Point) -> Point {
        let (cell_w, cell_h) = self.cell();
        let (pad_w, pad_h) = self.init_pad();
        Point {
            x: Self::axis_to_screen(p.x, self.screen.width, self.term.width, cell_w, pad_w),
            y: Self::axis_to_screen(p.y, self.screen.height, self.term.height, cell_h, pad_h),
        }
    }

    /// Applies `term_to_screen` componentwise to a rect.
    pub fn rect_to_screen(&self, r: Rect) -> Rect {
        Rect {
            start: self.term_to_screen(r.start),
            end: self.term_to_screen(r.end),
        }
    }

    /// Shifts a term-space rect by one cell to make room for the status
    /// bar. The reference implementation shifts the `x` field for a TOP
    /// bar, which is the axis along the bar rather than perpendicular to
    /// it; this is almost certainly a bug upstream (see DESIGN.md), but is
    /// preserved verbatim rather than silently "fixed", per spec.
    pub fn add_bar(&self, mut r: Rect) -> Rect {
        if self.bar == BarPosition::Top {
            r.start.x += 1;
            r.end.x += 1;
        }
        r
    }

    /// The full usable terminal area, in term-space, minus one cell for the
    /// status bar on whichever side it sits. Used to pre-size newly bound
    /// GUI windows so the first real geometry update causes no flicker.
    pub fn fullscreen_term_rect(&self) -> Rect {
        let (start, end) = match self.bar {
            BarPosition::Bottom => (
                Point { x: 0, y: 0 },
                Point {
                    x: self.term.width,
                    y: self.term.height - 1,
                },
            ),
            BarPosition::Top => (
                Point { x: 0, y: 1 },
                Point {
                    x: self.term.width,
                    y: self.term.height,
                },
            ),
        };
        self.rect_to_screen(Rect { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::new(Resolution::new(1920, 1080), Resolution::new(80, 24))
    }

    #[test]
    fn pins_left_top_edge() {
        let l = layout();
        assert_eq!(l.term_to_screen(Point { x: 0, y: 0 }), Point { x: 0, y: 0 });
    }

    #[test]
    fn pins_right_bottom_edge() {
        let l = layout();
        assert_eq!(
            l.term_to_screen(Point { x: 80, y: 24 }),
            Point { x: 1920, y: 1080 }
        );
        // past the edge still pins
        assert_eq!(
            l.term_to_screen(Point { x: 200, y: 200 }),
            Point { x: 1920, y: 1080 }
        );
    }

    #[test]
    fn inner_points_are_stable_under_round_trip() {
        let l = layout();
        let p = Point { x: 40, y: 12 };
        let screen = l.term_to_screen(p);
        // cell size is exact here (1920/80 = 24, 1080/24 = 45), so the
        // mapping is injective at this point and recovers cleanly.
        assert_eq!(screen.x / 24, 40);
        assert_eq!(screen.y / 45, 12);
    }

    #[test]
    fn add_bar_shifts_x_for_top() {
        let mut l = layout();
        l.set_bar_position(BarPosition::Top);
        let r = Rect {
            start: Point { x: 0, y: 0 },
            end: Point { x: 10, y: 10 },
        };
        let shifted = l.add_bar(r);
        assert_eq!(shifted.start.x, 1);
        assert_eq!(shifted.end.x, 11);
        assert_eq!(shifted.start.y, 0);
        assert_eq!(shifted.end.y, 10);
    }

    #[test]
    fn add_bar_is_identity_for_bottom() {
        let l = layout();
        let r = Rect {
            start: Point { x: 2, y: 3 },
            end: Point { x: 10, y: 10 },
        };
        assert_eq!(l.add_bar(r), r);
    }

    #[test]
    fn fullscreen_term_rect_reserves_bar_row_bottom() {
        let l = layout();
        let r = l.fullscreen_term_rect();
        // bottom bar: end.y is one cell short of the full term height
        assert!(r.end.y < l.screen.height);
    }

    #[test]
    fn padding_distribution_start_vs_end() {
        // 1921 px over 80 cols leaves 1 px of total padding
        let start = Layout::with_padding(
            Resolution::new(1921, 1080),
            Resolution::new(80, 24),
            BarPosition::Bottom,
            PaddingDistribution::Start,
            PaddingDistribution::Even,
        );
        let end = Layout::with_padding(
            Resolution::new(1921, 1080),
            Resolution::new(80, 24),
            BarPosition::Bottom,
            PaddingDistribution::End,
            PaddingDistribution::Even,
        );
        let p = Point { x: 1, y: 0 };
        assert!(start.term_to_screen(p).x > end.term_to_screen(p).x);
    }
}
