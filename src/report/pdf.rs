use chrono::{ DateTime, Local };
use printpdf::{
    BuiltinFont,
    Color,
    IndirectFontRef,
    Mm,
    PdfDocument,
    PdfDocumentReference,
    PdfLayerReference,
    Rgb,
};
use std::io::{ BufWriter, Write };

use crate::models::chat::Turn;

const PAGE_WIDTH: f64 = 210.0;
const PAGE_HEIGHT: f64 = 297.0;
const MARGIN_LEFT: f64 = 20.0;
const TOP: f64 = 277.0;
const BOTTOM: f64 = 20.0;
const WRAP_COLUMNS: usize = 95;

/// Keeps Latin-1 characters and replaces everything else with `?`.
pub fn to_latin1_lossy(text: &str) -> String {
    text.chars().map(|c| if (c as u32) <= 0xFF { c } else { '?' }).collect()
}

/// Greedy word wrap on character count. Explicit newlines are kept and
/// words longer than `width` are hard-split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0usize;
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > width && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

struct PageCursor {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    y: f64,
    pages: usize,
}

impl PageCursor {
    fn new(title: &str) -> Self {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        Self { doc, layer, y: TOP, pages: 1 }
    }

    fn ensure_room(&mut self, height: f64) {
        if self.y - height < BOTTOM {
            self.pages += 1;
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Layer {}", self.pages)
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
    }

    fn line(&mut self, text: &str, size: f64, height: f64, font: &IndirectFontRef) {
        self.ensure_room(height);
        self.y -= height;
        self.layer.use_text(to_latin1_lossy(text), size, Mm(MARGIN_LEFT), Mm(self.y), font);
    }

    fn paragraph(&mut self, text: &str, size: f64, height: f64, font: &IndirectFontRef) {
        for line in wrap_text(text, WRAP_COLUMNS) {
            self.line(&line, size, height, font);
        }
    }

    fn gap(&mut self, height: f64) {
        self.y -= height;
    }

    fn set_color(&self, r: f64, g: f64, b: f64) {
        self.layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Writes the consultation transcript as a PDF document into `out`.
pub fn render_transcript<W: Write>(
    history: &[Turn],
    patient_category: &str,
    is_emergency: bool,
    generated_at: DateTime<Local>,
    out: &mut BufWriter<W>
) -> Result<(), String> {
    let mut cursor = PageCursor::new("MediMate Medical Consultation Record");
    let font = cursor.doc.add_builtin_font(BuiltinFont::Helvetica).map_err(|e| format!("{:?}", e))?;
    let font_bold = cursor.doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| format!("{:?}", e))?;

    cursor.line("MediMate Medical Consultation Record", 16.0, 10.0, &font_bold);
    cursor.line(&format!("Date: {}", generated_at.format("%Y-%m-%d %H:%M")), 12.0, 10.0, &font);
    cursor.line(&format!("Patient Profile: {}", capitalize(patient_category)), 12.0, 10.0, &font);
    if is_emergency {
        cursor.set_color(1.0, 0.0, 0.0);
        cursor.line("Status: Potential Emergency Flagged", 12.0, 10.0, &font);
        cursor.set_color(0.0, 0.0, 0.0);
    }
    cursor.gap(10.0);

    for turn in history {
        cursor.line("Patient:", 11.0, 5.0, &font_bold);
        cursor.paragraph(turn.user(), 11.0, 5.0, &font);
        cursor.gap(3.0);
        cursor.line("Dr. MediMate:", 11.0, 5.0, &font_bold);
        cursor.paragraph(turn.assistant(), 11.0, 5.0, &font);
        cursor.gap(8.0);
    }

    cursor.doc.save(out).map_err(|e| format!("{:?}", e))?;
    out.flush().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_characters_outside_latin1() {
        assert_eq!(to_latin1_lossy("fièvre 39°C ⚠️ 头痛"), "fièvre 39°C ?? ??");
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn keeps_newlines_and_splits_long_words() {
        let lines = wrap_text("ab\nabcdefghij", 4);
        assert_eq!(lines, vec!["ab", "abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn capitalizes_category_labels() {
        assert_eq!(capitalize("pediatric"), "Pediatric");
        assert_eq!(capitalize("CHRONIC"), "Chronic");
        assert_eq!(capitalize(""), "");
    }
}
