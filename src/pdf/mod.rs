//! lopdf を使ったカタログPDFへのアクセス
//!
//! ページ単位でテキスト・グリフ矩形・画像配置を取り出し、
//! xref 指定で画像のバイト列を取り出す。

pub mod content;
pub mod font;
pub mod geometry;
pub mod image;
pub mod text;

pub use content::{Glyph, ImagePlacement};
pub use geometry::{Matrix, Point, Rect};
pub use image::ExtractedImage;

use crate::error::{CatalogError, Result};
use content::PageInterpreter;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use text::PageText;

/// `/Parent` を辿る継承の上限
const MAX_INHERIT_DEPTH: usize = 32;

/// US Letter
const DEFAULT_MEDIA_BOX: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

pub struct PdfDocument {
    inner: Document,
    page_ids: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self> {
        let inner = Document::load(path).map_err(|source| CatalogError::PdfOpen {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_document(inner))
    }

    pub fn from_document(inner: Document) -> Self {
        // get_pages は1始まりのページ番号順
        let page_ids = inner.get_pages().values().copied().collect();
        Self { inner, page_ids }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// 0始まりのページ番号でページを解釈する
    pub fn page(&self, index: usize) -> Result<PdfPage> {
        let page_id = *self.page_ids.get(index).ok_or(CatalogError::PageOutOfRange {
            index,
            count: self.page_ids.len(),
        })?;
        let doc = &self.inner;

        let media_box = inherited(doc, page_id, b"MediaBox")
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| rect_from_array(arr))
            .unwrap_or(DEFAULT_MEDIA_BOX);
        let resources = inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok());

        let mut interpreter = PageInterpreter::new(doc, media_box);
        let content = doc.get_page_content(page_id)?;
        if !content.is_empty() {
            interpreter.run(&content, resources)?;
        }
        let (glyphs, images) = interpreter.finish();
        let text = PageText::from_glyphs(&glyphs);

        log::debug!(
            "ページ{}: グリフ{}個, 画像配置{}個",
            index + 1,
            glyphs.len(),
            images.len()
        );

        Ok(PdfPage {
            width: media_box.width(),
            height: media_box.height(),
            glyphs,
            images,
            text,
        })
    }

    pub fn extract_image(&self, xref: ObjectId) -> Result<ExtractedImage> {
        image::extract_image(&self.inner, xref)
    }
}

/// 解釈済みのページ
#[derive(Debug, Clone)]
pub struct PdfPage {
    width: f64,
    height: f64,
    glyphs: Vec<Glyph>,
    images: Vec<ImagePlacement>,
    text: PageText,
}

impl PdfPage {
    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    /// 描画順の画像配置
    pub fn image_placements(&self) -> &[ImagePlacement] {
        &self.images
    }

    /// ページ上の文字列出現位置（前から順）
    pub fn search_for(&self, needle: &str) -> Vec<Rect> {
        self.text.search(&self.glyphs, needle)
    }
}

pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// フィルタがあれば展開、無ければそのままの中身
pub(crate) fn stream_data(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    Ok(stream.decompressed_content()?)
}

/// ページ辞書のキーを `/Parent` を辿って探す
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict: &Dictionary = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn rect_from_array(arr: &[Object]) -> Option<Rect> {
    match arr {
        [x0, y0, x1, y1] => Some(Rect::new(
            number(x0)?,
            number(y0)?,
            number(x1)?,
            number(y1)?,
        )),
        _ => None,
    }
}
