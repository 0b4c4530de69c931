//! Line reconstruction from OCR tokens or text-layer characters.
//!
//! Both paths yield non-empty, trimmed lines in page order. Each line keeps
//! the index range of the tokens/characters it was built from so glyph
//! detection can walk the page line by line.

use std::ops::Range;

use crate::geometry::{PageRect, PixelRect};

/// Tesseract's grouping of a word into block / paragraph / line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
}

/// One OCR word with its pixel box on the rendered page
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    pub text: String,
    pub key: LineKey,
    pub pixel_box: PixelRect,
    pub confidence: f32,
}

/// One character from a vector text layer. `bbox` is `None` for characters
/// the layer synthesized (line breaks, inferred spaces).
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayerChar {
    pub ch: char,
    pub bbox: Option<PageRect>,
}

impl TextLayerChar {
    pub fn is_line_break(&self) -> bool {
        matches!(self.ch, '\n' | '\r')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    /// Indices into the source token/character slice
    pub members: Range<usize>,
}

/// Group OCR tokens into lines by their `LineKey`
pub fn token_lines(tokens: &[OcrToken]) -> TokenLines<'_> {
    TokenLines { tokens, pos: 0 }
}

#[derive(Debug, Clone)]
pub struct TokenLines<'a> {
    tokens: &'a [OcrToken],
    pos: usize,
}

impl<'a> Iterator for TokenLines<'a> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        while self.pos < self.tokens.len() {
            let start = self.pos;
            let key = self.tokens[start].key;
            while self.pos < self.tokens.len() && self.tokens[self.pos].key == key {
                self.pos += 1;
            }

            let text = self.tokens[start..self.pos]
                .iter()
                .map(|t| t.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            if !text.is_empty() {
                return Some(Line { text, members: start..self.pos });
            }
        }
        None
    }
}

/// Split a character stream on its explicit line breaks
pub fn char_lines(chars: &[TextLayerChar]) -> CharLines<'_> {
    CharLines { chars, pos: 0 }
}

#[derive(Debug, Clone)]
pub struct CharLines<'a> {
    chars: &'a [TextLayerChar],
    pos: usize,
}

impl<'a> Iterator for CharLines<'a> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        while self.pos < self.chars.len() {
            let start = self.pos;
            while self.pos < self.chars.len() && !self.chars[self.pos].is_line_break() {
                self.pos += 1;
            }
            let end = self.pos;
            // step over the break itself
            if self.pos < self.chars.len() {
                self.pos += 1;
            }

            let raw: String = self.chars[start..end].iter().map(|c| c.ch).collect();
            let text = raw.trim();
            if !text.is_empty() {
                return Some(Line { text: text.to_string(), members: start..end });
            }
        }
        None
    }
}
