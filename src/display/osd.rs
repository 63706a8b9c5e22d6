// On-screen display - Status and message text drawn into finished frames
//
// Text is painted straight into the destination buffer after filtering, so
// it is never smoothed or blended. Drawing is stateless: the same text at the
// same place gives the same pixels every frame.

use super::framebuffer::FrameBuffer;
use std::time::{Duration, Instant};

/// How long a message stays on screen by default
pub const DEFAULT_MESSAGE_DURATION: Duration = Duration::from_secs(3);

/// Glyph width in font pixels
pub const GLYPH_WIDTH: usize = 3;
/// Glyph height in font pixels
pub const GLYPH_HEIGHT: usize = 5;
/// Horizontal advance per character, including spacing
pub const CELL_WIDTH: usize = GLYPH_WIDTH + 1;
/// Vertical size of a text line, including spacing
pub const CELL_HEIGHT: usize = GLYPH_HEIGHT + 1;

const TEXT_RGB: [u8; 3] = [0xFF, 0xFF, 0xFF];
const BACKDROP_RGB: [u8; 3] = [0x00, 0x00, 0x00];

/// 3x5 font for ' ' through 'Z'; bit 2 is the leftmost column
const FONT: [[u8; GLYPH_HEIGHT]; 59] = [
    [0, 0, 0, 0, 0], // ' '
    [2, 2, 2, 0, 2], // '!'
    [5, 5, 0, 0, 0], // '"'
    [5, 7, 5, 7, 5], // '#'
    [3, 6, 2, 3, 6], // '$'
    [5, 1, 2, 4, 5], // '%'
    [2, 5, 2, 5, 3], // '&'
    [2, 2, 0, 0, 0], // '\''
    [1, 2, 2, 2, 1], // '('
    [4, 2, 2, 2, 4], // ')'
    [0, 5, 2, 5, 0], // '*'
    [0, 2, 7, 2, 0], // '+'
    [0, 0, 0, 2, 4], // ','
    [0, 0, 7, 0, 0], // '-'
    [0, 0, 0, 0, 2], // '.'
    [1, 1, 2, 4, 4], // '/'
    [7, 5, 5, 5, 7], // '0'
    [2, 6, 2, 2, 7], // '1'
    [7, 1, 7, 4, 7], // '2'
    [7, 1, 3, 1, 7], // '3'
    [5, 5, 7, 1, 1], // '4'
    [7, 4, 7, 1, 7], // '5'
    [7, 4, 7, 5, 7], // '6'
    [7, 1, 1, 2, 2], // '7'
    [7, 5, 7, 5, 7], // '8'
    [7, 5, 7, 1, 7], // '9'
    [0, 2, 0, 2, 0], // ':'
    [0, 2, 0, 2, 4], // ';'
    [1, 2, 4, 2, 1], // '<'
    [0, 7, 0, 7, 0], // '='
    [4, 2, 1, 2, 4], // '>'
    [7, 1, 3, 0, 2], // '?'
    [7, 5, 7, 4, 7], // '@'
    [2, 5, 7, 5, 5], // 'A'
    [6, 5, 6, 5, 6], // 'B'
    [3, 4, 4, 4, 3], // 'C'
    [6, 5, 5, 5, 6], // 'D'
    [7, 4, 6, 4, 7], // 'E'
    [7, 4, 6, 4, 4], // 'F'
    [3, 4, 5, 5, 3], // 'G'
    [5, 5, 7, 5, 5], // 'H'
    [7, 2, 2, 2, 7], // 'I'
    [1, 1, 1, 5, 2], // 'J'
    [5, 5, 6, 5, 5], // 'K'
    [4, 4, 4, 4, 7], // 'L'
    [5, 7, 7, 5, 5], // 'M'
    [6, 5, 5, 5, 5], // 'N'
    [2, 5, 5, 5, 2], // 'O'
    [6, 5, 6, 4, 4], // 'P'
    [2, 5, 5, 6, 3], // 'Q'
    [6, 5, 6, 5, 5], // 'R'
    [3, 4, 2, 1, 6], // 'S'
    [7, 2, 2, 2, 2], // 'T'
    [5, 5, 5, 5, 7], // 'U'
    [5, 5, 5, 5, 2], // 'V'
    [5, 5, 7, 7, 5], // 'W'
    [5, 5, 2, 5, 5], // 'X'
    [5, 5, 2, 2, 2], // 'Y'
    [7, 1, 2, 4, 7], // 'Z'
];

fn glyph(c: char) -> &'static [u8; GLYPH_HEIGHT] {
    let c = c.to_ascii_uppercase();
    match c {
        ' '..='Z' => &FONT[c as usize - ' ' as usize],
        _ => &FONT['?' as usize - ' ' as usize],
    }
}

/// Width in stored-image pixels of `text` drawn into a frame with `scale`
pub fn text_width(text: &str, scale: usize) -> usize {
    text.chars().count() * CELL_WIDTH * scale
}

/// Draw `text` with its top-left corner at stored-image position `(x, y)`
///
/// Glyphs are enlarged by the frame's scale factor and clipped at the frame
/// edges. Opaque text gets a dark backdrop; transparent text is mixed 50%
/// into the pixels underneath.
pub fn draw_text(frame: &mut FrameBuffer, x: usize, y: usize, text: &str, transparent: bool) {
    let scale = frame.scale().max(1);
    let max_x = frame.output_width();
    let max_y = frame.output_height();

    for (i, c) in text.chars().enumerate() {
        let cell_x = x + i * CELL_WIDTH * scale;
        if cell_x >= max_x {
            break;
        }
        let rows = glyph(c);

        for gy in 0..CELL_HEIGHT {
            for gx in 0..CELL_WIDTH {
                let lit = gy < GLYPH_HEIGHT
                    && gx < GLYPH_WIDTH
                    && rows[gy] & (0b100 >> gx) != 0;
                if !lit && transparent {
                    continue;
                }

                for sy in 0..scale {
                    let py = y + gy * scale + sy;
                    if py >= max_y {
                        break;
                    }
                    for sx in 0..scale {
                        let px = cell_x + gx * scale + sx;
                        if px >= max_x {
                            break;
                        }
                        let rgb = if !lit {
                            BACKDROP_RGB
                        } else if transparent {
                            mix(frame.rgb(px, py), TEXT_RGB)
                        } else {
                            TEXT_RGB
                        };
                        frame.set_rgb(px, py, rgb);
                    }
                }
            }
        }
    }
}

fn mix(a: [u8; 3], b: [u8; 3]) -> [u8; 3] {
    [
        ((a[0] as u16 + b[0] as u16) / 2) as u8,
        ((a[1] as u16 + b[1] as u16) / 2) as u8,
        ((a[2] as u16 + b[2] as u16) / 2) as u8,
    ]
}

/// Status line and timed message overlaid on every delivered frame
#[derive(Debug, Clone)]
pub struct OsdState {
    status: Option<String>,
    message: Option<(String, Instant)>,
    duration: Duration,
    transparent: bool,
    show_messages: bool,
}

impl OsdState {
    pub fn new() -> Self {
        Self {
            status: None,
            message: None,
            duration: DEFAULT_MESSAGE_DURATION,
            transparent: false,
            show_messages: true,
        }
    }

    /// Set how long a message stays visible
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Mix text into the frame instead of drawing it on a backdrop
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Enable or disable timed messages (the status line is unaffected)
    pub fn with_messages(mut self, show_messages: bool) -> Self {
        self.show_messages = show_messages;
        self
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Show `text` starting now
    pub fn show_message(&mut self, text: impl Into<String>) {
        self.show_message_at(text, Instant::now());
    }

    /// Show `text` as if it had been posted at `posted`
    pub fn show_message_at(&mut self, text: impl Into<String>, posted: Instant) {
        self.message = Some((text.into(), posted));
    }

    /// Current message, if one is pending
    pub fn message(&self) -> Option<&str> {
        self.message.as_ref().map(|(text, _)| text.as_str())
    }

    /// Draw the status line and any unexpired message into `frame`
    ///
    /// A message whose display window has passed is dropped.
    pub fn compose(&mut self, frame: &mut FrameBuffer, now: Instant) {
        if let Some(status) = &self.status {
            draw_text(frame, 0, 2, status, self.transparent);
        }

        if !self.show_messages {
            return;
        }

        let expired = match &self.message {
            Some((text, posted)) if now.saturating_duration_since(*posted) < self.duration => {
                let y = frame.output_height() / 2;
                draw_text(frame, 0, y, text, self.transparent);
                false
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.message = None;
        }
    }
}

impl Default for OsdState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ColorDepth;

    const WHITE: u32 = 0xFFFF_FFFF;
    const BLACK: u32 = 0xFF00_0000;

    fn frame(scale: usize) -> FrameBuffer {
        let mut fb = FrameBuffer::allocate(32, 24, ColorDepth::Bits32, scale).unwrap();
        fb.fill32(0xFF40_4040);
        fb
    }

    #[test]
    fn test_glyph_lookup() {
        assert_eq!(glyph('a'), glyph('A'));
        assert_eq!(glyph('~'), glyph('?'));
        assert_eq!(glyph('0'), &[7, 5, 5, 5, 7]);
    }

    #[test]
    fn test_opaque_text_pixels() {
        let mut fb = frame(1);
        draw_text(&mut fb, 0, 0, "I", false);
        // top row of 'I' is solid
        assert_eq!(fb.pixel32(0, 0), WHITE);
        assert_eq!(fb.pixel32(2, 0), WHITE);
        // second row only the middle column
        assert_eq!(fb.pixel32(0, 1), BLACK);
        assert_eq!(fb.pixel32(1, 1), WHITE);
        // spacing column gets the backdrop
        assert_eq!(fb.pixel32(3, 0), BLACK);
        // outside the cell is untouched
        assert_eq!(fb.pixel32(4, 0), 0xFF40_4040);
    }

    #[test]
    fn test_transparent_text_mixes() {
        let mut fb = frame(1);
        draw_text(&mut fb, 0, 0, "I", true);
        assert_eq!(fb.pixel32(0, 0), 0xFF9F_9F9F);
        // unlit pixels are left alone
        assert_eq!(fb.pixel32(0, 1), 0xFF40_4040);
    }

    #[test]
    fn test_text_scales_with_frame() {
        let mut fb = frame(2);
        draw_text(&mut fb, 0, 0, "I", false);
        assert_eq!(fb.pixel32(5, 1), WHITE);
        assert_eq!(fb.pixel32(0, 2), BLACK);
        assert_eq!(text_width("AB", 2), 16);
    }

    #[test]
    fn test_drawing_is_idempotent() {
        let mut once = frame(1);
        draw_text(&mut once, 1, 3, "FPS 60", false);
        let mut twice = once.clone();
        draw_text(&mut twice, 1, 3, "FPS 60", false);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_text_clips_at_edges() {
        let mut fb = frame(1);
        draw_text(&mut fb, 30, 22, "WWWW", false);
        // only the top-left 2x2 corner of the first glyph is on screen
        assert_eq!(fb.pixel32(30, 22), WHITE);
        assert_eq!(fb.pixel32(30, 23), WHITE);
        assert_eq!(fb.pixel32(31, 22), BLACK);
        assert_eq!(fb.pixel32(31, 23), BLACK);
        assert_eq!(fb.pixel32(29, 23), 0xFF40_4040);
    }

    #[test]
    fn test_message_expires() {
        let mut osd = OsdState::new().with_duration(Duration::from_millis(100));
        let start = Instant::now();
        osd.show_message_at("HI", start);

        let mut fb = frame(1);
        osd.compose(&mut fb, start + Duration::from_millis(50));
        assert_eq!(osd.message(), Some("HI"));
        assert_eq!(fb.pixel32(0, 12), WHITE);

        osd.compose(&mut fb, start + Duration::from_millis(150));
        assert_eq!(osd.message(), None);
    }

    #[test]
    fn test_messages_can_be_disabled() {
        let mut osd = OsdState::new().with_messages(false);
        osd.show_message("HIDDEN");
        let mut fb = frame(1);
        let before = fb.clone();
        osd.compose(&mut fb, Instant::now());
        assert_eq!(fb, before);
    }

    #[test]
    fn test_status_drawn_at_top() {
        let mut osd = OsdState::new();
        osd.set_status("1");
        let mut fb = frame(1);
        osd.compose(&mut fb, Instant::now());
        // '1' top row is the middle column only
        assert_eq!(fb.pixel32(1, 2), WHITE);
        assert_eq!(fb.pixel32(0, 2), BLACK);
    }
}
