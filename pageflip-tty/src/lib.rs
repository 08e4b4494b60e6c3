use std::io::{self, Write};

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind},
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use pageflip_core::{Command, Direction, RenderImage, Slider};
use png::{BitDepth, ColorType, Encoder};
use tracing::trace;

pub const LEFT_PAGE_IMAGE_ID: u32 = 1;
pub const RIGHT_PAGE_IMAGE_ID: u32 = 2;
pub const PREVIEW_IMAGE_ID: u32 = 3;

const SPINNER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];

pub struct KittyRenderer<W: Write> {
    writer: W,
}

pub struct DrawParams {
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Transmits `image` and places it at the cursor, replacing whatever was
    /// previously shown under `image_id`.
    pub fn draw(&mut self, image_id: u32, image: &RenderImage, params: DrawParams) -> Result<()> {
        let mut buffer = Vec::new();
        let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&image.pixels)?;
        writer.finish()?;

        trace!(image_id, bytes = buffer.len(), "transmitting image");
        let encoded = BASE64.encode(&buffer);
        let mut chunks = encoded.as_bytes().chunks(4096).peekable();
        let mut first = true;

        while let Some(chunk) = chunks.next() {
            let more = chunks.peek().is_some();
            if first {
                write!(
                    self.writer,
                    "\u{1b}_Ga=T,f=100,C=1,q=2,i={},p=1,c={},r={},s={},v={},z=-1,m={}",
                    image_id,
                    params.columns,
                    params.rows,
                    image.width,
                    image.height,
                    if more { 1 } else { 0 }
                )?;
                first = false;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2", if more { 1 } else { 0 })?;
            }
            if !chunk.is_empty() {
                self.writer.write_all(b";")?;
                self.writer.write_all(chunk)?;
            }
            write!(self.writer, "\u{1b}\\")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    pub fn delete_all(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}_Ga=d,d=A,q=2\u{1b}\\")?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Disables synchronized updates.
    /// The terminal will render all buffered changes at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    Click { column: u16, row: u16 },
    Resize { columns: u16, rows: u16 },
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Book,
    Preview,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
}

impl EventMapper {
    pub const PAN_STEP: f32 = 0.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.mode = mode;
        }
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                kind: KeyEventKind::Release,
                ..
            }) => UiEvent::None,
            Event::Key(KeyEvent {
                code: KeyCode::Char('c'),
                modifiers,
                ..
            }) if modifiers.contains(KeyModifiers::CONTROL) => UiEvent::Quit,
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Down(MouseButton::Left) => {
                    self.reset_count();
                    UiEvent::Click {
                        column: mouse.column,
                        row: mouse.row,
                    }
                }
                _ => UiEvent::None,
            },
            Event::Resize(columns, rows) => UiEvent::Resize { columns, rows },
            event => match self.mode {
                InputMode::Book => self.map_event_book(event),
                InputMode::Preview => self.map_event_preview(event),
            },
        }
    }

    fn map_event_book(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Char('h'), KeyModifiers::NONE)
            | (KeyCode::Char('k'), KeyModifiers::NONE)
            | (KeyCode::Left, _)
            | (KeyCode::Up, _)
            | (KeyCode::PageUp, _) => self.advance(Direction::Prev),
            (KeyCode::Char('l'), KeyModifiers::NONE)
            | (KeyCode::Char('j'), KeyModifiers::NONE)
            | (KeyCode::Char(' '), _)
            | (KeyCode::Right, _)
            | (KeyCode::Down, _)
            | (KeyCode::PageDown, _) => self.advance(Direction::Next),
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                let page_number = self.take_count().unwrap_or(1);
                UiEvent::Command(Command::Seek {
                    page_number: i64::try_from(page_number).unwrap_or(i64::MAX),
                })
            }
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
                self.reset_count();
                UiEvent::Command(Command::Seek {
                    page_number: i64::MAX,
                })
            }
            (KeyCode::Char('p'), KeyModifiers::NONE) | (KeyCode::Enter, _) => {
                self.reset_count();
                UiEvent::Command(Command::PreviewSpreadPage { position: 0 })
            }
            (KeyCode::Char('P'), _) => {
                self.reset_count();
                UiEvent::Command(Command::PreviewSpreadPage { position: 1 })
            }
            (KeyCode::Char('q'), _) => {
                self.reset_count();
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_event_preview(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        let command = match (code, modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('x'), _) | (KeyCode::Char('q'), _) => {
                Command::ClosePreview
            }
            (KeyCode::Char('+'), _) => Command::ZoomIn,
            (KeyCode::Char('-'), _) => Command::ZoomOut,
            (KeyCode::Char('0'), _) | (KeyCode::Char('='), _) => Command::ResetZoom,
            (KeyCode::Char('h'), KeyModifiers::NONE) | (KeyCode::Left, _) => Command::Pan {
                delta_x: -Self::PAN_STEP,
                delta_y: 0.0,
            },
            (KeyCode::Char('l'), KeyModifiers::NONE) | (KeyCode::Right, _) => Command::Pan {
                delta_x: Self::PAN_STEP,
                delta_y: 0.0,
            },
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => Command::Pan {
                delta_x: 0.0,
                delta_y: -Self::PAN_STEP,
            },
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => Command::Pan {
                delta_x: 0.0,
                delta_y: Self::PAN_STEP,
            },
            _ => return UiEvent::None,
        };
        UiEvent::Command(command)
    }

    fn advance(&mut self, direction: Direction) -> UiEvent {
        self.reset_count();
        UiEvent::Command(Command::Advance { direction })
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> Option<usize> {
        let count = self.pending_count.take();
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}

pub fn spinner_frame(tick: u64) -> char {
    SPINNER_FRAMES[(tick % SPINNER_FRAMES.len() as u64) as usize]
}

/// Text rendering of the page slider plus where its track sits, so mouse
/// clicks can be mapped back onto page numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliderLine {
    pub text: String,
    pub track_offset: u16,
    pub track_width: u16,
}

pub fn slider_line(slider: &Slider, width: u16) -> SliderLine {
    let min_label = slider.min.to_string();
    let max_label = slider.max.to_string();
    let decoration = min_label.len() + max_label.len() + 4;
    let track_width = (width as usize).saturating_sub(decoration).max(1);

    let filled = (slider.fill_fraction() * track_width as f32).round() as usize;
    let knob = filled.saturating_sub(1).min(track_width - 1);
    let track: String = (0..track_width)
        .map(|pos| match pos {
            pos if pos == knob => 'o',
            pos if pos < filled => '=',
            _ => '-',
        })
        .collect();

    SliderLine {
        text: format!("{} [{}] {}", min_label, track, max_label),
        track_offset: (min_label.len() + 2) as u16,
        track_width: track_width as u16,
    }
}

pub fn button_label(label: &str, disabled: bool) -> String {
    if disabled {
        format!("( {} )", label)
    } else {
        format!("[ {} ]", label)
    }
}

pub fn write_button<W: Write>(
    writer: &mut W,
    col: u16,
    row: u16,
    label: &str,
    disabled: bool,
) -> Result<()> {
    let attribute = if disabled {
        Attribute::Dim
    } else {
        Attribute::Bold
    };
    crossterm::queue!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(attribute),
        Print(button_label(label, disabled)),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}
