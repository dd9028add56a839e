//! 照合テスト用の偽ページ・偽文書

use super::{CatalogPage, CatalogSource};
use crate::error::{CatalogError, Result};
use crate::pdf::{ExtractedImage, ImagePlacement, Point, Rect};
use lopdf::ObjectId;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Clone, Default)]
pub struct FakePage {
    pub text: String,
    pub placements: Vec<ImagePlacement>,
    /// 検索語 → 出現矩形
    pub hits: HashMap<String, Vec<Rect>>,
}

impl CatalogPage for FakePage {
    fn text(&self) -> &str {
        &self.text
    }

    fn image_placements(&self) -> Vec<ImagePlacement> {
        self.placements.clone()
    }

    fn search_for(&self, needle: &str) -> Vec<Rect> {
        self.hits.get(needle).cloned().unwrap_or_default()
    }
}

#[derive(Default)]
pub struct FakeSource {
    pub pages: Vec<FakePage>,
    /// xref → 形式タグ（既定は jpeg）
    pub formats: HashMap<u32, Option<String>>,
    /// extract_image が呼ばれた xref の記録
    pub extracted: RefCell<Vec<u32>>,
}

impl CatalogSource for FakeSource {
    type Page = FakePage;

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<FakePage> {
        self.pages
            .get(index)
            .cloned()
            .ok_or(CatalogError::PageOutOfRange {
                index,
                count: self.pages.len(),
            })
    }

    fn extract_image(&self, xref: ObjectId) -> Result<ExtractedImage> {
        self.extracted.borrow_mut().push(xref.0);
        Ok(ExtractedImage {
            bytes: format!("image-{}", xref.0).into_bytes(),
            format: self.formats.get(&xref.0).cloned().unwrap_or(Some("jpeg".into())),
            width: 1,
            height: 1,
        })
    }
}

pub fn placement(xref: u32, center: (f64, f64)) -> ImagePlacement {
    ImagePlacement {
        xref: (xref, 0),
        rect: Rect::centered(Point::new(center.0, center.1), 40.0, 40.0),
    }
}

pub fn sku_hit(center: (f64, f64)) -> Vec<Rect> {
    vec![Rect::centered(Point::new(center.0, center.1), 50.0, 10.0)]
}
