//! ページ単位のSKU↔画像照合
//!
//! SKUの最初の出現矩形の中心から、ページ上の全画像配置矩形の中心までの
//! 距離を線形に調べ、最小のものを採用する。距離の閾値は設けない。

mod sku;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use sku::SkuScanner;
pub use types::{ImageCandidate, MatchedImage, PageOutcome};

use crate::error::Result;
use crate::pdf::{ExtractedImage, ImagePlacement, PdfDocument, PdfPage, Point, Rect};
use lopdf::ObjectId;

/// 照合に必要なページ操作
pub trait CatalogPage {
    fn text(&self) -> &str;
    /// 描画順の画像配置
    fn image_placements(&self) -> Vec<ImagePlacement>;
    /// 文字列の出現矩形（前から順）
    fn search_for(&self, needle: &str) -> Vec<Rect>;
}

/// 照合に必要な文書操作
pub trait CatalogSource {
    type Page: CatalogPage;

    fn page_count(&self) -> usize;
    fn page(&self, index: usize) -> Result<Self::Page>;
    fn extract_image(&self, xref: ObjectId) -> Result<ExtractedImage>;
}

impl CatalogPage for PdfPage {
    fn text(&self) -> &str {
        PdfPage::text(self)
    }

    fn image_placements(&self) -> Vec<ImagePlacement> {
        PdfPage::image_placements(self).to_vec()
    }

    fn search_for(&self, needle: &str) -> Vec<Rect> {
        PdfPage::search_for(self, needle)
    }
}

impl CatalogSource for PdfDocument {
    type Page = PdfPage;

    fn page_count(&self) -> usize {
        PdfDocument::page_count(self)
    }

    fn page(&self, index: usize) -> Result<PdfPage> {
        PdfDocument::page(self, index)
    }

    fn extract_image(&self, xref: ObjectId) -> Result<ExtractedImage> {
        PdfDocument::extract_image(self, xref)
    }
}

/// 画像配置を (xref, 矩形) の候補列に平坦化する
///
/// 画像は初出順、同じ画像の矩形は描画順。
pub fn flatten_candidates(placements: &[ImagePlacement]) -> Vec<ImageCandidate> {
    let mut order: Vec<ObjectId> = Vec::new();
    for p in placements {
        if !order.contains(&p.xref) {
            order.push(p.xref);
        }
    }

    order
        .iter()
        .flat_map(|xref| {
            placements
                .iter()
                .filter(move |p| p.xref == *xref)
                .map(|p| ImageCandidate {
                    xref: p.xref,
                    rect: p.rect,
                })
        })
        .collect()
}

/// 中心が最も近い候補と距離（同距離なら先の候補）
pub fn nearest(point: Point, candidates: &[ImageCandidate]) -> Option<(&ImageCandidate, f64)> {
    let mut best: Option<(&ImageCandidate, f64)> = None;
    for candidate in candidates {
        let d = point.distance(&candidate.rect.center());
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((candidate, d)),
        }
    }
    best
}

/// 画像形式タグを拡張子に正規化（jpeg → jpg、タグ無しは fallback）
pub fn normalize_extension(tag: Option<&str>, fallback: &str) -> String {
    match tag.map(str::trim).filter(|t| !t.is_empty()) {
        Some(tag) => tag.to_lowercase().replace("jpeg", "jpg"),
        None => fallback.to_lowercase(),
    }
}

pub struct PageMatcher {
    scanner: SkuScanner,
    fallback_extension: String,
}

impl PageMatcher {
    pub fn new(scanner: SkuScanner, fallback_extension: impl Into<String>) -> Self {
        Self {
            scanner,
            fallback_extension: fallback_extension.into(),
        }
    }

    /// 1ページを照合する
    ///
    /// `already_exported` が true を返すSKUは照合しない（先勝ち）。
    pub fn match_page<S: CatalogSource>(
        &self,
        source: &S,
        index: usize,
        already_exported: impl Fn(&str) -> bool,
    ) -> Result<PageOutcome> {
        let page = source.page(index)?;

        let skus = self.scanner.scan(page.text());
        if skus.is_empty() {
            return Ok(PageOutcome::NoSku);
        }

        let candidates = flatten_candidates(&page.image_placements());
        if candidates.is_empty() {
            return Ok(PageOutcome::NoImage { skus });
        }

        let mut matches = Vec::new();
        for sku in &skus {
            if already_exported(sku) {
                continue;
            }

            let Some(sku_rect) = page.search_for(sku).into_iter().next() else {
                log::debug!("ページ{}: {} の位置が見つかりません", index + 1, sku);
                continue;
            };

            let Some((best, distance)) = nearest(sku_rect.center(), &candidates) else {
                continue;
            };

            let image = source.extract_image(best.xref)?;
            let ext = normalize_extension(image.format.as_deref(), &self.fallback_extension);
            log::debug!(
                "ページ{}: {} -> xref {} (距離 {:.1})",
                index + 1,
                sku,
                best.xref.0,
                distance
            );

            matches.push(MatchedImage {
                sku: sku.clone(),
                page: index + 1,
                xref: best.xref,
                ext,
                bytes: image.bytes,
                distance,
            });
        }

        Ok(PageOutcome::Matched { skus, matches })
    }
}

impl Default for PageMatcher {
    fn default() -> Self {
        Self::new(SkuScanner::default(), "png")
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{placement, sku_hit, FakePage, FakeSource};
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_nearest_image_wins() {
        let page = FakePage {
            text: "AB1234-56".into(),
            placements: vec![placement(7, (500.0, 500.0)), placement(5, (105.0, 105.0))],
            hits: HashMap::from([("AB1234-56".to_string(), sku_hit((100.0, 100.0)))]),
        };
        let source = FakeSource {
            pages: vec![page],
            ..Default::default()
        };

        let outcome = PageMatcher::default().match_page(&source, 0, |_| false).unwrap();
        let PageOutcome::Matched { matches, .. } = outcome else {
            panic!("照合されるはず");
        };
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].xref, (5, 0));
        assert_eq!(matches[0].bytes, b"image-5");
        assert_eq!(matches[0].ext, "jpg");
        assert_eq!(matches[0].page, 1);
        assert!((matches[0].distance - 50f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_no_sku_skips_image_pass() {
        let page = FakePage {
            text: "no codes here".into(),
            placements: vec![placement(1, (0.0, 0.0))],
            ..Default::default()
        };
        let source = FakeSource {
            pages: vec![page],
            ..Default::default()
        };

        let outcome = PageMatcher::default().match_page(&source, 0, |_| false).unwrap();
        assert_eq!(outcome, PageOutcome::NoSku);
        assert!(source.extracted.borrow().is_empty());
    }

    #[test]
    fn test_no_image() {
        let page = FakePage {
            text: "FS1003-24".into(),
            hits: HashMap::from([("FS1003-24".to_string(), sku_hit((10.0, 10.0)))]),
            ..Default::default()
        };
        let source = FakeSource {
            pages: vec![page],
            ..Default::default()
        };

        let outcome = PageMatcher::default().match_page(&source, 0, |_| false).unwrap();
        assert_eq!(
            outcome,
            PageOutcome::NoImage {
                skus: vec!["FS1003-24".into()]
            }
        );
    }

    #[test]
    fn test_already_exported_and_unsearchable_skus_are_skipped() {
        let page = FakePage {
            text: "FS1003-24 PB0011-180 AB1234-56".into(),
            placements: vec![placement(3, (0.0, 0.0))],
            // PB0011-180 は検索しても矩形が無い
            hits: HashMap::from([
                ("FS1003-24".to_string(), sku_hit((10.0, 10.0))),
                ("AB1234-56".to_string(), sku_hit((20.0, 20.0))),
            ]),
        };
        let source = FakeSource {
            pages: vec![page],
            ..Default::default()
        };

        let outcome = PageMatcher::default()
            .match_page(&source, 0, |sku| sku == "FS1003-24")
            .unwrap();
        let PageOutcome::Matched { skus, matches } = outcome else {
            panic!("照合されるはず");
        };
        assert_eq!(skus.len(), 3);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].sku, "AB1234-56");
        assert_eq!(*source.extracted.borrow(), vec![3]);
    }

    #[test]
    fn test_first_occurrence_rect_is_used() {
        let page = FakePage {
            text: "AB1234-56 ... AB1234-56".into(),
            placements: vec![placement(1, (0.0, 0.0)), placement(2, (300.0, 300.0))],
            hits: HashMap::from([(
                "AB1234-56".to_string(),
                vec![
                    Rect::centered(Point::new(290.0, 290.0), 50.0, 10.0),
                    Rect::centered(Point::new(5.0, 5.0), 50.0, 10.0),
                ],
            )]),
        };
        let source = FakeSource {
            pages: vec![page],
            ..Default::default()
        };

        let outcome = PageMatcher::default().match_page(&source, 0, |_| false).unwrap();
        let PageOutcome::Matched { matches, .. } = outcome else {
            panic!("照合されるはず");
        };
        assert_eq!(matches[0].xref, (2, 0));
    }

    #[test]
    fn test_missing_format_falls_back() {
        let page = FakePage {
            text: "AB1234-56".into(),
            placements: vec![placement(9, (0.0, 0.0))],
            hits: HashMap::from([("AB1234-56".to_string(), sku_hit((0.0, 0.0)))]),
        };
        let source = FakeSource {
            pages: vec![page],
            formats: HashMap::from([(9, None)]),
            ..Default::default()
        };

        let outcome = PageMatcher::default().match_page(&source, 0, |_| false).unwrap();
        let PageOutcome::Matched { matches, .. } = outcome else {
            panic!("照合されるはず");
        };
        assert_eq!(matches[0].ext, "png");
    }

    #[test]
    fn test_nearest_tie_keeps_first() {
        let candidates = vec![
            ImageCandidate {
                xref: (1, 0),
                rect: Rect::centered(Point::new(10.0, 0.0), 2.0, 2.0),
            },
            ImageCandidate {
                xref: (2, 0),
                rect: Rect::centered(Point::new(-10.0, 0.0), 2.0, 2.0),
            },
        ];
        let (best, d) = nearest(Point::new(0.0, 0.0), &candidates).unwrap();
        assert_eq!(best.xref, (1, 0));
        assert_eq!(d, 10.0);
        assert!(nearest(Point::new(0.0, 0.0), &[]).is_none());
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let centers = [(12.0, 400.0), (250.0, 30.0), (90.0, 95.0), (600.0, 610.0), (88.0, 130.0)];
        let candidates: Vec<ImageCandidate> = centers
            .iter()
            .enumerate()
            .map(|(i, c)| ImageCandidate {
                xref: (i as u32 + 1, 0),
                rect: Rect::centered(Point::new(c.0, c.1), 30.0, 20.0),
            })
            .collect();

        for probe in [(0.0, 0.0), (100.0, 100.0), (300.0, 300.0), (700.0, 700.0), (90.0, 120.0)] {
            let p = Point::new(probe.0, probe.1);
            let (best, d) = nearest(p, &candidates).unwrap();
            let min = candidates
                .iter()
                .map(|c| p.distance(&c.rect.center()))
                .fold(f64::INFINITY, f64::min);
            assert_eq!(d, min);
            assert_eq!(p.distance(&best.rect.center()), min);
        }
    }

    #[test]
    fn test_flatten_groups_by_first_use() {
        let placements = vec![
            placement(4, (0.0, 0.0)),
            placement(2, (1.0, 1.0)),
            placement(4, (2.0, 2.0)),
        ];
        let flat = flatten_candidates(&placements);
        let xrefs: Vec<u32> = flat.iter().map(|c| c.xref.0).collect();
        assert_eq!(xrefs, vec![4, 4, 2]);
        assert_eq!(flat[1].rect.center(), Point::new(2.0, 2.0));
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(Some("jpeg"), "png"), "jpg");
        assert_eq!(normalize_extension(Some("JPEG"), "png"), "jpg");
        assert_eq!(normalize_extension(Some("jpx"), "png"), "jpx");
        assert_eq!(normalize_extension(Some(""), "png"), "png");
        assert_eq!(normalize_extension(None, "png"), "png");
    }
}
