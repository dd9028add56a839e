//! フォント情報: 文字コードの分割、Unicode変換、グリフ幅

use super::{number, resolve, stream_data};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

const DEFAULT_WIDTH: f64 = 0.5;
const DEFAULT_ASCENT: f64 = 0.8;
const DEFAULT_DESCENT: f64 = -0.2;

/// 文字列オペランドを分割した1グリフ分の情報
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGlyph {
    pub text: String,
    /// 送り幅（em単位）
    pub width: f64,
    /// 1バイトコード32（ワードスペース適用対象）
    pub is_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    Simple { first_char: u32, widths: Vec<f64> },
    Composite { default_width: f64, widths: HashMap<u32, f64> },
}

#[derive(Debug, Clone)]
pub struct Font {
    widths: Widths,
    missing_width: Option<f64>,
    ascent: f64,
    descent: f64,
    to_unicode: Option<ToUnicodeMap>,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            widths: Widths::Simple {
                first_char: 0,
                widths: Vec::new(),
            },
            missing_width: None,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
            to_unicode: None,
        }
    }
}

impl Font {
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let subtype = dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok())
            .and_then(|s| stream_data(s).ok())
            .map(|data| ToUnicodeMap::parse(&data))
            .filter(|m| !m.is_empty());

        if subtype == Some(b"Type0".as_slice()) {
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .map(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .map(|o| resolve(doc, o))
                .and_then(|o| o.as_dict().ok());

            let mut font = Font {
                widths: Widths::Composite {
                    default_width: 1.0,
                    widths: HashMap::new(),
                },
                to_unicode,
                ..Default::default()
            };

            if let Some(desc) = descendant {
                let default_width = desc
                    .get(b"DW")
                    .ok()
                    .and_then(number)
                    .map(|w| w / 1000.0)
                    .unwrap_or(1.0);
                let widths = desc
                    .get(b"W")
                    .ok()
                    .map(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                    .map(|arr| parse_cid_widths(doc, arr))
                    .unwrap_or_default();
                font.widths = Widths::Composite {
                    default_width,
                    widths,
                };
                font.apply_descriptor(doc, desc);
            }
            return font;
        }

        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .and_then(number)
            .map(|n| n.max(0.0) as u32)
            .unwrap_or(0);
        let widths = dict
            .get(b"Widths")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|o| number(resolve(doc, o)).unwrap_or(0.0) / 1000.0)
                    .collect()
            })
            .unwrap_or_default();

        let mut font = Font {
            widths: Widths::Simple { first_char, widths },
            to_unicode,
            ..Default::default()
        };
        font.apply_descriptor(doc, dict);
        font
    }

    fn apply_descriptor(&mut self, doc: &Document, dict: &Dictionary) {
        let Some(descriptor) = dict
            .get(b"FontDescriptor")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
        else {
            return;
        };

        let get = |key: &[u8]| descriptor.get(key).ok().and_then(number);
        self.missing_width = get(b"MissingWidth").map(|w| w / 1000.0);

        let ascent = get(b"Ascent").unwrap_or(0.0) / 1000.0;
        let descent = get(b"Descent").unwrap_or(0.0) / 1000.0;
        // Ascent/Descent が欠けている・壊れているフォントは既定値
        if ascent > descent && ascent > 0.0 {
            self.ascent = ascent;
            self.descent = descent.min(0.0);
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.widths, Widths::Composite { .. })
    }

    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    pub fn descent(&self) -> f64 {
        self.descent
    }

    pub fn width(&self, code: u32) -> f64 {
        match &self.widths {
            Widths::Simple { first_char, widths } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize).copied())
                .filter(|w| *w > 0.0)
                .or(self.missing_width)
                .unwrap_or(DEFAULT_WIDTH),
            Widths::Composite {
                default_width,
                widths,
            } => widths.get(&code).copied().unwrap_or(*default_width),
        }
    }

    /// 文字列オペランドをグリフ単位に分解する
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        if self.is_composite() {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                    let text = self
                        .to_unicode
                        .as_ref()
                        .and_then(|m| m.lookup(code))
                        .map(str::to_string)
                        .unwrap_or_else(|| '\u{FFFD}'.to_string());
                    DecodedGlyph {
                        text,
                        width: self.width(code),
                        is_space: false,
                    }
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&b| {
                    let code = b as u32;
                    let text = self
                        .to_unicode
                        .as_ref()
                        .and_then(|m| m.lookup(code))
                        .map(str::to_string)
                        .unwrap_or_else(|| char::from(b).to_string());
                    DecodedGlyph {
                        text,
                        width: self.width(code),
                        is_space: b == b' ',
                    }
                })
                .collect()
        }
    }
}

/// `/W` 配列: `c [w1 w2 ...]` または `c_first c_last w`
fn parse_cid_widths(doc: &Document, arr: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < arr.len() {
        let Some(start) = number(resolve(doc, &arr[i])) else {
            break;
        };
        let start = start.max(0.0) as u32;
        match arr.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(start + offset as u32, w / 1000.0);
                    }
                }
                i += 2;
            }
            Some(end) => {
                let end = number(end).map(|n| n.max(0.0) as u32);
                let w = arr.get(i + 2).and_then(|o| number(resolve(doc, o)));
                match (end, w) {
                    (Some(end), Some(w)) => {
                        for code in start..=end.min(start.saturating_add(0xFFFF)) {
                            widths.insert(code, w / 1000.0);
                        }
                    }
                    _ => break,
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// ToUnicode CMap（`bfchar` / `bfrange`）
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeMap {
    mappings: HashMap<u32, String>,
}

#[derive(Debug, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    Open,
    Close,
}

impl ToUnicodeMap {
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut mappings = HashMap::new();

        for section in sections(&text, "beginbfchar", "endbfchar") {
            let tokens = tokenize(section);
            for pair in tokens.chunks(2) {
                if let [CMapToken::Hex(src), CMapToken::Hex(dst)] = pair {
                    mappings.insert(code_of(src), utf16_string(dst));
                }
            }
        }

        for section in sections(&text, "beginbfrange", "endbfrange") {
            let tokens = tokenize(section);
            let mut i = 0;
            while i + 2 < tokens.len() {
                let (CMapToken::Hex(lo), CMapToken::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                    i += 1;
                    continue;
                };
                let (lo, hi) = (code_of(lo), code_of(hi));
                match &tokens[i + 2] {
                    CMapToken::Hex(dst) => {
                        for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                            mappings.insert(code, offset_utf16(dst, code - lo));
                        }
                        i += 3;
                    }
                    CMapToken::Open => {
                        let mut j = i + 3;
                        let mut code = lo;
                        while let Some(CMapToken::Hex(dst)) = tokens.get(j) {
                            if code <= hi {
                                mappings.insert(code, utf16_string(dst));
                            }
                            code += 1;
                            j += 1;
                        }
                        i = j + 1;
                    }
                    CMapToken::Close => i += 3,
                }
            }
        }

        Self { mappings }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn sections<'a>(text: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(begin) {
        let body = &rest[start + begin.len()..];
        let Some(stop) = body.find(end) else {
            break;
        };
        found.push(&body[..stop]);
        rest = &body[stop + end.len()..];
    }
    found
}

fn tokenize(section: &str) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut chars = section.chars();
    while let Some(c) = chars.next() {
        match c {
            '<' => {
                let digits: String = chars
                    .by_ref()
                    .take_while(|&c| c != '>')
                    .filter(|c| c.is_ascii_hexdigit())
                    .collect();
                tokens.push(CMapToken::Hex(hex_bytes(&digits)));
            }
            '[' => tokens.push(CMapToken::Open),
            ']' => tokens.push(CMapToken::Close),
            _ => {}
        }
    }
    tokens
}

fn hex_bytes(digits: &str) -> Vec<u8> {
    let mut padded = digits.to_string();
    if padded.len() % 2 == 1 {
        padded.push('0');
    }
    (0..padded.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&padded[i..i + 2], 16).ok())
        .collect()
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|c| match c {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => *single as u16,
            _ => 0,
        })
        .collect()
}

fn utf16_string(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

/// bfrange の連番: 末尾のUTF-16単位に offset を加算
fn offset_utf16(bytes: &[u8], offset: u32) -> String {
    let mut units = utf16_units(bytes);
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}
