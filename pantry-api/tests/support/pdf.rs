//! Reads the visible text back out of a rendered shopping-list PDF.
//!
//! Text is drawn with an embedded Type0 font, so `Tj` operands are 2-byte
//! glyph ids. Each font's `ToUnicode` CMap turns them back into characters.

use std::collections::{BTreeMap, HashMap};

use printpdf::lopdf::content::Content;
use printpdf::lopdf::{Dictionary, Document, Object};

type GlyphMap = HashMap<u16, char>;

/// Text of every `BT .. ET` block, page by page, in drawing order.
pub fn page_texts(bytes: &[u8]) -> Vec<Vec<String>> {
    let doc = Document::load_mem(bytes).expect("rendered bytes should parse as PDF");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let maps: BTreeMap<Vec<u8>, GlyphMap> = doc
                .get_page_fonts(page_id)
                .into_iter()
                .map(|(name, font)| (name, glyph_map(&doc, font)))
                .collect();
            let content = doc.get_page_content(page_id).expect("page content");
            texts_in(&content, &maps)
        })
        .collect()
}

fn glyph_map(doc: &Document, font: &Dictionary) -> GlyphMap {
    let Some(stream) = font
        .get(b"ToUnicode")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_object(id))
        .and_then(Object::as_stream)
        .ok()
    else {
        return GlyphMap::new();
    };
    let cmap = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    parse_bfchar(&String::from_utf8_lossy(&cmap))
}

/// Only `beginbfchar` sections map glyphs; the codespace range is skipped.
fn parse_bfchar(cmap: &str) -> GlyphMap {
    let mut map = GlyphMap::new();
    let mut in_block = false;
    for line in cmap.lines().map(str::trim) {
        if line.ends_with("beginbfchar") {
            in_block = true;
        } else if line == "endbfchar" {
            in_block = false;
        } else if in_block {
            let mut codes = line
                .split_whitespace()
                .map(|hex| hex.trim_matches(|c| c == '<' || c == '>'));
            if let (Some(glyph), Some(unicode)) = (codes.next(), codes.next()) {
                let glyph = u16::from_str_radix(glyph, 16).expect("glyph id");
                let unicode = u32::from_str_radix(unicode, 16).expect("code point");
                if let Some(ch) = char::from_u32(unicode) {
                    map.insert(glyph, ch);
                }
            }
        }
    }
    map
}

fn decode_glyphs(bytes: &[u8], map: &GlyphMap, out: &mut String) {
    for pair in bytes.chunks_exact(2) {
        let glyph = u16::from_be_bytes([pair[0], pair[1]]);
        out.push(map.get(&glyph).copied().unwrap_or('\u{fffd}'));
    }
}

fn texts_in(content: &[u8], maps: &BTreeMap<Vec<u8>, GlyphMap>) -> Vec<String> {
    let empty = GlyphMap::new();
    let ops = Content::decode(content).expect("content stream").operations;

    let mut texts = Vec::new();
    let mut font: &GlyphMap = &empty;
    let mut current = String::new();
    for op in &ops {
        match op.operator.as_str() {
            "BT" => current.clear(),
            "Tf" => {
                font = op
                    .operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| maps.get(name))
                    .unwrap_or(&empty);
            }
            "Tj" => {
                if let Some(Ok(bytes)) = op.operands.first().map(Object::as_str) {
                    decode_glyphs(bytes, font, &mut current);
                }
            }
            "TJ" => {
                if let Some(Ok(parts)) = op.operands.first().map(Object::as_array) {
                    for bytes in parts.iter().filter_map(|part| part.as_str().ok()) {
                        decode_glyphs(bytes, font, &mut current);
                    }
                }
            }
            "ET" => texts.push(std::mem::take(&mut current)),
            _ => {}
        }
    }
    texts
}

#[test]
fn bfchar_sections_map_glyphs_and_skip_codespace() {
    let cmap = "1 begincodespacerange\n<0000> <ffff>\nendcodespacerange\n\
                2 beginbfchar\r\n<0003> <0020>\n<0024> <0041>\nendbfchar\n";
    let map = parse_bfchar(cmap);
    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&0x0003), Some(&' '));
    assert_eq!(map.get(&0x0024), Some(&'A'));
}
