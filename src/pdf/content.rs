//! コンテンツストリームの解釈
//!
//! 文字の配置（グリフ矩形）と画像XObjectの配置矩形だけを追跡する。
//! パス描画・色・クリッピングは扱わない。

use super::font::Font;
use super::geometry::{Matrix, Point, Rect};
use super::{number, resolve, stream_data};
use crate::error::Result;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::rc::Rc;

/// フォームXObjectの入れ子の上限
const MAX_FORM_DEPTH: usize = 16;

/// ページ上に描画された1グリフ
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    pub bbox: Rect,
    /// ベースライン上の描画原点
    pub origin: Point,
}

/// 画像XObjectの1回分の配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub xref: ObjectId,
    pub rect: Rect,
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Rc<Font>>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scaling: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

pub struct PageInterpreter<'a> {
    doc: &'a Document,
    media_box: Rect,
    fonts: HashMap<ObjectId, Rc<Font>>,
    default_font: Rc<Font>,
    form_stack: Vec<ObjectId>,
    glyphs: Vec<Glyph>,
    images: Vec<ImagePlacement>,
}

impl<'a> PageInterpreter<'a> {
    /// `media_box` はPDF座標（左下原点）
    pub fn new(doc: &'a Document, media_box: Rect) -> Self {
        Self {
            doc,
            media_box,
            fonts: HashMap::new(),
            default_font: Rc::new(Font::default()),
            form_stack: Vec::new(),
            glyphs: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn run(&mut self, content: &[u8], resources: Option<&'a Dictionary>) -> Result<()> {
        self.run_with_ctm(content, resources, Matrix::identity())
    }

    pub fn finish(self) -> (Vec<Glyph>, Vec<ImagePlacement>) {
        (self.glyphs, self.images)
    }

    fn run_with_ctm(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
    ) -> Result<()> {
        let content = Content::decode(content)?;

        let mut state = GraphicsState {
            ctm,
            ..Default::default()
        };
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::identity();
        let mut tlm = Matrix::identity();

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operand(operands) {
                        state.ctm = m.multiply(&state.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::identity();
                    tlm = Matrix::identity();
                }
                "ET" => {}
                "Tf" => {
                    if let [Object::Name(name), size] = operands.as_slice() {
                        state.text.font = Some(self.font(resources, name));
                        state.text.size = number(size).unwrap_or(0.0);
                    }
                }
                "Tc" => set_number(operands, &mut state.text.char_spacing),
                "Tw" => set_number(operands, &mut state.text.word_spacing),
                "TL" => set_number(operands, &mut state.text.leading),
                "Ts" => set_number(operands, &mut state.text.rise),
                "Tz" => {
                    if let Some(scale) = operands.first().and_then(number) {
                        state.text.horizontal_scaling = scale / 100.0;
                    }
                }
                "Td" | "TD" => {
                    if let [tx, ty] = operands.as_slice() {
                        let (tx, ty) = (number(tx).unwrap_or(0.0), number(ty).unwrap_or(0.0));
                        if op.operator == "TD" {
                            state.text.leading = -ty;
                        }
                        tlm = Matrix::translate(tx, ty).multiply(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_operand(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -state.text.leading).multiply(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show_text(&state, &mut tm, bytes);
                    }
                }
                "'" => {
                    tlm = Matrix::translate(0.0, -state.text.leading).multiply(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show_text(&state, &mut tm, bytes);
                    }
                }
                "\"" => {
                    if let [aw, ac, Object::String(bytes, _)] = operands.as_slice() {
                        state.text.word_spacing = number(aw).unwrap_or(0.0);
                        state.text.char_spacing = number(ac).unwrap_or(0.0);
                        tlm = Matrix::translate(0.0, -state.text.leading).multiply(&tlm);
                        tm = tlm;
                        self.show_text(&state, &mut tm, bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show_text(&state, &mut tm, bytes),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0
                                            * state.text.size
                                            * state.text.horizontal_scaling;
                                        tm = Matrix::translate(tx, 0.0).multiply(&tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.draw_xobject(resources, name, state.ctm)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn font(&mut self, resources: Option<&'a Dictionary>, name: &[u8]) -> Rc<Font> {
        let entry = resources
            .and_then(|res| res.get(b"Font").ok())
            .map(|o| resolve(self.doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|fonts| fonts.get(name).ok());

        let Some(entry) = entry else {
            log::debug!("フォント /{} がリソースにありません", String::from_utf8_lossy(name));
            return self.default_font.clone();
        };

        if let Object::Reference(id) = entry {
            if let Some(font) = self.fonts.get(id) {
                return font.clone();
            }
            let font = match self.doc.get_object(*id).and_then(Object::as_dict) {
                Ok(dict) => Rc::new(Font::from_dict(self.doc, dict)),
                Err(_) => self.default_font.clone(),
            };
            self.fonts.insert(*id, font.clone());
            return font;
        }

        match entry.as_dict() {
            Ok(dict) => Rc::new(Font::from_dict(self.doc, dict)),
            Err(_) => self.default_font.clone(),
        }
    }

    fn show_text(&mut self, state: &GraphicsState, tm: &mut Matrix, bytes: &[u8]) {
        let text = &state.text;
        let font = text.font.clone().unwrap_or_else(|| self.default_font.clone());
        let size = text.size;
        let scale = text.horizontal_scaling;

        for glyph in font.decode(bytes) {
            let trm = Matrix::new(size * scale, 0.0, 0.0, size, 0.0, text.rise)
                .multiply(tm)
                .multiply(&state.ctm);

            let bbox = trm.transform_rect(0.0, font.descent(), glyph.width, font.ascent());
            let origin = trm.apply(0.0, 0.0);
            self.glyphs.push(Glyph {
                text: glyph.text,
                bbox: self.to_page_rect(bbox),
                origin: self.to_page_point(origin),
            });

            let spacing = if glyph.is_space { text.word_spacing } else { 0.0 };
            let tx = (glyph.width * size + text.char_spacing + spacing) * scale;
            *tm = Matrix::translate(tx, 0.0).multiply(tm);
        }
    }

    fn draw_xobject(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        ctm: Matrix,
    ) -> Result<()> {
        let doc = self.doc;
        let entry = resources
            .and_then(|res| res.get(b"XObject").ok())
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|xobjects| xobjects.get(name).ok());

        // 間接参照でないXObjectはxrefを持たないので対象外
        let Some(Object::Reference(id)) = entry else {
            log::debug!("XObject /{} を解決できません", String::from_utf8_lossy(name));
            return Ok(());
        };
        let Ok(stream) = doc.get_object(*id).and_then(Object::as_stream) else {
            log::debug!("XObject {:?} がストリームではありません", id);
            return Ok(());
        };

        let subtype = stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        match subtype {
            Some(b"Image") => {
                let rect = ctm.transform_rect(0.0, 0.0, 1.0, 1.0);
                self.images.push(ImagePlacement {
                    xref: *id,
                    rect: self.to_page_rect(rect),
                });
            }
            Some(b"Form") => {
                if self.form_stack.contains(id) || self.form_stack.len() >= MAX_FORM_DEPTH {
                    log::warn!("フォームXObject {:?} の再帰をスキップ", id);
                    return Ok(());
                }
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .map(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                    .and_then(|arr| matrix_operand(arr))
                    .unwrap_or_default();
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .map(|o| resolve(doc, o))
                    .and_then(|o| o.as_dict().ok())
                    .or(resources);
                let data = stream_data(stream)?;

                self.form_stack.push(*id);
                let result = self.run_with_ctm(&data, form_resources, matrix.multiply(&ctm));
                self.form_stack.pop();
                result?;
            }
            _ => {}
        }
        Ok(())
    }

    fn to_page_point(&self, p: Point) -> Point {
        Point::new(p.x - self.media_box.x0, self.media_box.y1 - p.y)
    }

    fn to_page_rect(&self, r: Rect) -> Rect {
        Rect::new(
            r.x0 - self.media_box.x0,
            self.media_box.y1 - r.y1,
            r.x1 - self.media_box.x0,
            self.media_box.y1 - r.y0,
        )
    }
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    match operands {
        [a, b, c, d, e, f] => Some(Matrix::new(
            number(a)?,
            number(b)?,
            number(c)?,
            number(d)?,
            number(e)?,
            number(f)?,
        )),
        _ => None,
    }
}

fn set_number(operands: &[Object], target: &mut f64) {
    if let Some(value) = operands.first().and_then(number) {
        *target = value;
    }
}
