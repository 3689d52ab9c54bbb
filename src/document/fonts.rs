//! Font resources used when painting text.
//!
//! Glyph outlines come from an embedded TrueType/OpenType program when the
//! document carries one, otherwise from a system font picked by family.
//! Type 3 glyphs are content streams and are painted by the page renderer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tiny_skia::Transform;
use ttf_parser::{Face, GlyphId};

use super::rasterize::{obj_to_f32, resolve};

/// Extra directories (path-list syntax) searched for substitute fonts
pub const FONT_DIR_ENV: &str = "FIT_TO_SIZE_FONT_DIR";

/// Width in thousandths of an em used when a font has no metrics
const FALLBACK_WIDTH: f32 = 500.0;

/// FontDescriptor flag for fonts outside the standard Latin set
const FLAG_SYMBOLIC: i64 = 1 << 2;

pub(super) enum FontProgram<'a> {
    /// TrueType or OpenType outlines
    Outline(Arc<Vec<u8>>),
    Type3 {
        char_procs: &'a Dictionary,
        matrix: Transform,
        resources: Option<&'a Dictionary>,
    },
    /// Nothing to draw with; text still advances
    Missing,
}

pub(super) struct PdfFont<'a> {
    pub(super) program: FontProgram<'a>,
    embedded: bool,
    two_byte: bool,
    symbolic: bool,
    /// Thousandths of text space, by character code
    widths: HashMap<u16, f32>,
    default_width: f32,
    to_unicode: HashMap<u16, String>,
    differences: HashMap<u16, Vec<u8>>,
    /// `None` means CIDs are glyph ids
    cid_to_gid: Option<Vec<u16>>,
}

impl<'a> PdfFont<'a> {
    /// Read a font dictionary. Broken pieces fall back to defaults rather
    /// than failing the page.
    pub(super) fn load(doc: &'a Document, dict: &'a Dictionary) -> Self {
        let subtype = dict.get(b"Subtype").and_then(Object::as_name).unwrap_or(b"");
        let base_font = dict
            .get(b"BaseFont")
            .and_then(Object::as_name)
            .map(|name| strip_subset_prefix(&String::from_utf8_lossy(name)))
            .unwrap_or_default();

        let mut font = PdfFont {
            program: FontProgram::Missing,
            embedded: false,
            two_byte: false,
            symbolic: false,
            widths: HashMap::new(),
            default_width: FALLBACK_WIDTH,
            to_unicode: to_unicode_map(doc, dict),
            differences: encoding_differences(doc, dict),
            cid_to_gid: None,
        };

        match subtype {
            b"Type0" => font.load_composite(doc, dict),
            b"Type3" => font.load_type3(doc, dict),
            _ => font.load_simple(doc, dict),
        }

        if matches!(font.program, FontProgram::Missing) {
            match system_font(&base_font) {
                Some(data) => font.program = FontProgram::Outline(data),
                None => log::debug!("No outlines for font {:?}; its text is skipped", base_font),
            }
        }
        font
    }

    fn load_simple(&mut self, doc: &'a Document, dict: &'a Dictionary) {
        let descriptor = dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_dict().ok());

        if let Some(descriptor) = descriptor {
            if let Some(missing) = descriptor.get(b"MissingWidth").ok().and_then(obj_to_f32) {
                self.default_width = missing.max(0.0);
            }
            let flags = descriptor.get(b"Flags").and_then(Object::as_i64).unwrap_or(0);
            self.symbolic = flags & FLAG_SYMBOLIC != 0;
            self.set_embedded(embedded_program(doc, descriptor));
        }
        self.widths = simple_widths(doc, dict, 1.0);
    }

    fn load_composite(&mut self, doc: &'a Document, dict: &'a Dictionary) {
        self.two_byte = true;
        self.default_width = 1000.0;

        let Some(descendant) = dict
            .get(b"DescendantFonts")
            .ok()
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_array().ok())
            .and_then(|arr| arr.first())
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_dict().ok())
        else {
            return;
        };

        if let Some(dw) = descendant.get(b"DW").ok().and_then(obj_to_f32) {
            self.default_width = dw.max(0.0);
        }
        if let Ok(w) = descendant.get(b"W") {
            self.widths = cid_widths(doc, w);
        }
        if let Ok(map) = descendant.get(b"CIDToGIDMap") {
            if let Ok(stream) = resolve(doc, map).and_then(|obj| Ok(obj.as_stream()?)) {
                self.cid_to_gid = stream.get_plain_content().ok().map(|data| {
                    data.chunks_exact(2)
                        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                        .collect()
                });
            }
        }
        if let Some(descriptor) = descendant
            .get(b"FontDescriptor")
            .ok()
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_dict().ok())
        {
            self.set_embedded(embedded_program(doc, descriptor));
        }
    }

    fn load_type3(&mut self, doc: &'a Document, dict: &'a Dictionary) {
        let matrix = dict
            .get(b"FontMatrix")
            .ok()
            .and_then(|obj| obj.as_array().ok())
            .and_then(|arr| transform_from_array(arr))
            .unwrap_or_else(|| Transform::from_scale(0.001, 0.001));
        let Some(char_procs) = dict
            .get(b"CharProcs")
            .ok()
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_dict().ok())
        else {
            return;
        };
        let resources = dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_dict().ok());

        // Type 3 widths are in glyph space
        self.widths = simple_widths(doc, dict, matrix.sx * 1000.0);
        self.default_width = 0.0;
        self.embedded = true;
        self.program = FontProgram::Type3 {
            char_procs,
            matrix,
            resources,
        };
    }

    fn set_embedded(&mut self, data: Option<Vec<u8>>) {
        let Some(data) = data else {
            return;
        };
        if Face::parse(&data, 0).is_ok() {
            self.embedded = true;
            self.program = FontProgram::Outline(Arc::new(data));
        } else {
            log::debug!("Embedded font program is not TrueType/OpenType; substituting");
        }
    }

    /// Split a shown string into character codes
    pub(super) fn codes(&self, bytes: &[u8]) -> Vec<u16> {
        if self.two_byte {
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect()
        } else {
            bytes.iter().map(|&b| u16::from(b)).collect()
        }
    }

    /// Horizontal advance of `code` in thousandths of text space
    pub(super) fn advance(&self, code: u16, face: Option<&Face>) -> f32 {
        if let Some(width) = self.widths.get(&code) {
            return *width;
        }
        // Substitute faces carry better widths than a flat default
        face.filter(|_| !self.two_byte)
            .and_then(|face| {
                let gid = self.glyph_id(face, code)?;
                let upem = f32::from(face.units_per_em().max(1));
                Some(f32::from(face.glyph_hor_advance(gid)?) * 1000.0 / upem)
            })
            .unwrap_or(self.default_width)
    }

    /// Word spacing applies to the single-byte code 32 only
    pub(super) fn is_word_space(&self, code: u16) -> bool {
        !self.two_byte && code == 0x20
    }

    pub(super) fn unicode(&self, code: u16) -> Option<char> {
        if let Some(mapped) = self.to_unicode.get(&code) {
            return mapped.chars().next();
        }
        if let Some(name) = self.differences.get(&code) {
            return glyph_name_char(name);
        }
        if self.two_byte {
            return None;
        }
        u8::try_from(code).ok().and_then(win_ansi_char)
    }

    pub(super) fn glyph_id(&self, face: &Face, code: u16) -> Option<GlyphId> {
        if self.two_byte && self.embedded {
            let gid = match &self.cid_to_gid {
                Some(map) => *map.get(usize::from(code))?,
                None => code,
            };
            return Some(GlyphId(gid));
        }
        if self.embedded && self.symbolic {
            if let Some(gid) = symbol_glyph(face, code) {
                return Some(gid);
            }
        }
        let by_unicode = self.unicode(code).and_then(|ch| face.glyph_index(ch));
        match by_unicode {
            Some(gid) => Some(gid),
            None if self.embedded => symbol_glyph(face, code),
            None => None,
        }
    }

    /// Glyph procedure stream of a Type 3 font
    pub(super) fn char_proc(&self, code: u16) -> Option<ObjectId> {
        let FontProgram::Type3 { char_procs, .. } = &self.program else {
            return None;
        };
        let name = self.differences.get(&code)?;
        char_procs.get(name).and_then(Object::as_reference).ok()
    }
}

/// Look a code up in the font's own cmap, including the 0xF000 symbol range
fn symbol_glyph(face: &Face, code: u16) -> Option<GlyphId> {
    let cmap = face.tables().cmap?;
    cmap.subtables.into_iter().find_map(|subtable| {
        subtable
            .glyph_index(0xF000 + u32::from(code))
            .or_else(|| subtable.glyph_index(u32::from(code)))
            .filter(|gid| gid.0 != 0)
    })
}

fn embedded_program(doc: &Document, descriptor: &Dictionary) -> Option<Vec<u8>> {
    [b"FontFile2".as_slice(), b"FontFile3".as_slice(), b"FontFile".as_slice()]
        .into_iter()
        .filter_map(|key| descriptor.get(key).ok())
        .filter_map(|obj| resolve(doc, obj).ok()?.as_stream().ok())
        .filter_map(|stream| stream.get_plain_content().ok())
        .find(|data| !data.is_empty())
}

/// `FirstChar` + `Widths`, scaled into thousandths of text space
fn simple_widths(doc: &Document, dict: &Dictionary, scale: f32) -> HashMap<u16, f32> {
    let first = dict
        .get(b"FirstChar")
        .and_then(Object::as_i64)
        .ok()
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or(0);
    let Some(widths) = dict
        .get(b"Widths")
        .ok()
        .and_then(|obj| resolve(doc, obj).ok())
        .and_then(|obj| obj.as_array().ok())
    else {
        return HashMap::new();
    };

    widths
        .iter()
        .zip(first..=u16::MAX)
        .filter_map(|(obj, code)| {
            let width = resolve(doc, obj).ok().and_then(obj_to_f32)?;
            Some((code, (width * scale).max(0.0)))
        })
        .collect()
}

/// CID font `W` array: `c [w1 w2 ...]` and `c_first c_last w` runs
fn cid_widths(doc: &Document, obj: &Object) -> HashMap<u16, f32> {
    let mut out = HashMap::new();
    let Some(items) = resolve(doc, obj).ok().and_then(|o| o.as_array().ok()) else {
        return out;
    };
    let cid = |obj: &Object| {
        resolve(doc, obj)
            .ok()
            .and_then(obj_to_f32)
            .filter(|v| (0.0..=f32::from(u16::MAX)).contains(v))
            .map(|v| v as u16)
    };

    let mut rest = items.as_slice();
    while let [start, next, tail @ ..] = rest {
        let Some(start) = cid(start) else {
            rest = &rest[1..];
            continue;
        };
        if let Ok(list) = resolve(doc, next).and_then(|o| Ok(o.as_array()?)) {
            for (code, width) in (start..=u16::MAX).zip(list) {
                if let Some(width) = resolve(doc, width).ok().and_then(obj_to_f32) {
                    out.insert(code, width.max(0.0));
                }
            }
            rest = tail;
            continue;
        }
        let [width, tail @ ..] = tail else {
            break;
        };
        let width = resolve(doc, width).ok().and_then(obj_to_f32);
        if let (Some(end), Some(width)) = (cid(next), width) {
            for code in start..=end {
                out.insert(code, width.max(0.0));
            }
        }
        rest = tail;
    }
    out
}

fn encoding_differences(doc: &Document, dict: &Dictionary) -> HashMap<u16, Vec<u8>> {
    let mut out = HashMap::new();
    let Some(differences) = dict
        .get(b"Encoding")
        .ok()
        .and_then(|obj| resolve(doc, obj).ok())
        .and_then(|obj| obj.as_dict().ok())
        .and_then(|enc| enc.get(b"Differences").ok())
        .and_then(|obj| resolve(doc, obj).ok())
        .and_then(|obj| obj.as_array().ok())
    else {
        return out;
    };

    let mut code: u16 = 0;
    for item in differences {
        match item {
            Object::Integer(start) => code = u16::try_from(*start).unwrap_or(0),
            Object::Name(name) => {
                out.insert(code, name.clone());
                code = code.saturating_add(1);
            }
            _ => {}
        }
    }
    out
}

#[derive(Debug, PartialEq)]
enum CMapToken<'t> {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(&'t str),
}

fn cmap_tokens(text: &str) -> Vec<CMapToken<'_>> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        match ch {
            '<' if !rest.starts_with("<<") => {
                let end = rest.find('>').unwrap_or(rest.len());
                tokens.push(CMapToken::Hex(parse_hex(&rest[1..end])));
                rest = rest.get(end + 1..).unwrap_or("");
            }
            '[' => {
                tokens.push(CMapToken::ArrayStart);
                rest = &rest[1..];
            }
            ']' => {
                tokens.push(CMapToken::ArrayEnd);
                rest = &rest[1..];
            }
            c if c.is_whitespace() => rest = &rest[c.len_utf8()..],
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || "<>[]".contains(c))
                    .unwrap_or(rest.len())
                    .max(1);
                tokens.push(CMapToken::Word(&rest[..end]));
                rest = &rest[end..];
            }
        }
    }
    tokens
}

fn parse_hex(text: &str) -> Vec<u8> {
    let nibbles: Vec<u8> = text
        .chars()
        .filter_map(|c| c.to_digit(16))
        .map(|d| d as u8)
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn hex_code(bytes: &[u8]) -> Option<u16> {
    match bytes {
        [b] => Some(u16::from(*b)),
        [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn to_unicode_map(doc: &Document, dict: &Dictionary) -> HashMap<u16, String> {
    dict.get(b"ToUnicode")
        .ok()
        .and_then(|obj| resolve(doc, obj).ok())
        .and_then(|obj| obj.as_stream().ok())
        .and_then(|stream| stream.get_plain_content().ok())
        .map(|data| parse_to_unicode(&String::from_utf8_lossy(&data)))
        .unwrap_or_default()
}

/// `bfchar` and `bfrange` sections of a ToUnicode CMap
fn parse_to_unicode(text: &str) -> HashMap<u16, String> {
    #[derive(Clone, Copy)]
    enum Section {
        None,
        Char,
        Range,
    }

    let mut map = HashMap::new();
    let mut section = Section::None;
    let tokens = cmap_tokens(text);
    let mut i = 0;
    while i < tokens.len() {
        match (&tokens[i], section) {
            (CMapToken::Word("beginbfchar"), _) => section = Section::Char,
            (CMapToken::Word("beginbfrange"), _) => section = Section::Range,
            (CMapToken::Word(w), _) if w.starts_with("end") => section = Section::None,
            (CMapToken::Hex(src), Section::Char) => {
                let dst = tokens.get(i + 1);
                if let (Some(code), Some(CMapToken::Hex(dst))) = (hex_code(src), dst) {
                    map.insert(code, utf16_text(dst));
                }
                i += 1;
            }
            (CMapToken::Hex(lo), Section::Range) => {
                let (Some(CMapToken::Hex(hi)), Some(dst)) = (tokens.get(i + 1), tokens.get(i + 2))
                else {
                    break;
                };
                let (Some(lo), Some(hi)) = (hex_code(lo), hex_code(hi)) else {
                    i += 3;
                    continue;
                };
                match dst {
                    CMapToken::Hex(base) => {
                        let base_text = utf16_text(base);
                        let mut units: Vec<u16> = base_text.encode_utf16().collect();
                        for code in lo..=hi {
                            map.insert(code, String::from_utf16_lossy(&units));
                            if let Some(last) = units.last_mut() {
                                *last = last.wrapping_add(1);
                            }
                        }
                        i += 2;
                    }
                    CMapToken::ArrayStart => {
                        let mut j = i + 3;
                        let mut code = lo;
                        while let Some(CMapToken::Hex(dst)) = tokens.get(j) {
                            if code <= hi {
                                map.insert(code, utf16_text(dst));
                            }
                            code = code.saturating_add(1);
                            j += 1;
                        }
                        i = j;
                    }
                    _ => i += 2,
                }
            }
            _ => {}
        }
        i += 1;
    }
    map
}

fn transform_from_array(arr: &[Object]) -> Option<Transform> {
    let values: Vec<f32> = arr.iter().take(6).map(obj_to_f32).collect::<Option<_>>()?;
    match values.as_slice() {
        [a, b, c, d, e, f] => Some(Transform::from_row(*a, *b, *c, *d, *e, *f)),
        _ => None,
    }
}

/// `ABCDEF+Name` subset tags are dropped
fn strip_subset_prefix(name: &str) -> String {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => {
            rest.to_string()
        }
        _ => name.to_string(),
    }
}

/// WinAnsiEncoding, which also covers the printable ASCII of the other
/// Latin encodings
fn win_ansi_char(code: u8) -> Option<char> {
    let special = match code {
        0x80 => '€',
        0x85 => '…',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x99 => '™',
        0x20..=0x7E | 0xA0..=0xFF => char::from(code),
        _ => return None,
    };
    Some(special)
}

/// Adobe glyph names for the Latin basics, plus `uniXXXX`/`uXXXX` forms
fn glyph_name_char(name: &[u8]) -> Option<char> {
    let name = std::str::from_utf8(name).ok()?;
    let base = name.split('.').next().unwrap_or(name);
    if let [single] = base.as_bytes() {
        return single.is_ascii_alphabetic().then(|| char::from(*single));
    }
    if let Some(hex) = base.strip_prefix("uni").or_else(|| base.strip_prefix('u')) {
        if (4..=6).contains(&hex.len()) {
            if let Some(ch) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(ch);
            }
        }
    }
    let ch = match base {
        "space" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "quoteright" => '’',
        "quoteleft" => '‘',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "asciicircum" => '^',
        "underscore" => '_',
        "grave" => '`',
        "braceleft" => '{',
        "bar" => '|',
        "braceright" => '}',
        "asciitilde" => '~',
        "bullet" => '•',
        "endash" => '–',
        "emdash" => '—',
        _ => return None,
    };
    Some(ch)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Family {
    Sans,
    Serif,
    Mono,
}

static SUBSTITUTES: OnceLock<Mutex<HashMap<(Family, bool), Option<Arc<Vec<u8>>>>>> =
    OnceLock::new();
static FONT_FILES: OnceLock<HashMap<String, PathBuf>> = OnceLock::new();

fn classify(base_font: &str) -> (Family, bool) {
    let name = base_font.to_ascii_lowercase();
    let bold = ["bold", "black", "heavy", "semibold"]
        .iter()
        .any(|w| name.contains(w));
    let family = if name.contains("courier") || name.contains("mono") {
        Family::Mono
    } else if name.contains("times")
        || name.contains("roman")
        || name.contains("georgia")
        || (name.contains("serif") && !name.contains("sans"))
    {
        Family::Serif
    } else {
        Family::Sans
    };
    (family, bold)
}

fn candidates(family: Family, bold: bool) -> &'static [&'static str] {
    match (family, bold) {
        (Family::Sans, false) => &[
            "LiberationSans-Regular.ttf",
            "DejaVuSans.ttf",
            "NotoSans-Regular.ttf",
            "Arial.ttf",
            "arial.ttf",
            "Helvetica.ttc",
        ],
        (Family::Sans, true) => &[
            "LiberationSans-Bold.ttf",
            "DejaVuSans-Bold.ttf",
            "NotoSans-Bold.ttf",
            "Arial Bold.ttf",
            "arialbd.ttf",
        ],
        (Family::Serif, false) => &[
            "LiberationSerif-Regular.ttf",
            "DejaVuSerif.ttf",
            "NotoSerif-Regular.ttf",
            "Times New Roman.ttf",
            "times.ttf",
        ],
        (Family::Serif, true) => &[
            "LiberationSerif-Bold.ttf",
            "DejaVuSerif-Bold.ttf",
            "NotoSerif-Bold.ttf",
            "timesbd.ttf",
        ],
        (Family::Mono, false) => &[
            "LiberationMono-Regular.ttf",
            "DejaVuSansMono.ttf",
            "NotoSansMono-Regular.ttf",
            "cour.ttf",
        ],
        (Family::Mono, true) => &[
            "LiberationMono-Bold.ttf",
            "DejaVuSansMono-Bold.ttf",
            "courbd.ttf",
        ],
    }
}

/// Substitute outlines for a font the document does not embed.
///
/// Falls back to the regular sans face when nothing closer is installed.
fn system_font(base_font: &str) -> Option<Arc<Vec<u8>>> {
    let (family, bold) = classify(base_font);
    let mut keys = vec![(family, bold), (family, false)];
    if family != Family::Sans {
        keys.push((Family::Sans, false));
    }
    keys.dedup();

    let cache = SUBSTITUTES.get_or_init(|| Mutex::new(HashMap::new()));
    for key in keys {
        if let Ok(guard) = cache.lock() {
            match guard.get(&key) {
                Some(Some(data)) => return Some(data.clone()),
                Some(None) => continue,
                None => {}
            }
        }
        let loaded = load_first(candidates(key.0, key.1));
        if let Ok(mut guard) = cache.lock() {
            guard.insert(key, loaded.clone());
        }
        if loaded.is_some() {
            return loaded;
        }
    }
    None
}

fn load_first(names: &[&str]) -> Option<Arc<Vec<u8>>> {
    let files = FONT_FILES.get_or_init(index_font_files);
    names
        .iter()
        .filter_map(|name| files.get(*name))
        .filter_map(|path| std::fs::read(path).ok())
        .find(|data| Face::parse(data, 0).is_ok())
        .map(Arc::new)
}

fn index_font_files() -> HashMap<String, PathBuf> {
    let mut files = HashMap::new();
    for dir in font_dirs() {
        index_dir(&dir, 0, &mut files);
    }
    log::debug!("Indexed {} font files", files.len());
    files
}

fn index_dir(dir: &std::path::Path, depth: usize, files: &mut HashMap<String, PathBuf>) {
    if depth > 4 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            index_dir(&path, depth + 1, files);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.entry(name.to_string()).or_insert(path);
        }
    }
}

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(extra) = std::env::var_os(FONT_DIR_ENV) {
        dirs.extend(std::env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        match std::env::var_os("WINDIR") {
            Some(windir) => dirs.push(PathBuf::from(windir).join("Fonts")),
            None => dirs.push(PathBuf::from(r"C:\Windows\Fonts")),
        }
    }

    dirs
}
