use crate::pdf::Rect;
use lopdf::ObjectId;

/// 照合候補: 画像xrefと1つの配置矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageCandidate {
    pub xref: ObjectId,
    pub rect: Rect,
}

/// SKUと最寄り画像の対応（1件）
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedImage {
    pub sku: String,
    /// 1始まりのページ番号
    pub page: usize,
    pub xref: ObjectId,
    /// 正規化済みの拡張子（jpg / png ...）
    pub ext: String,
    pub bytes: Vec<u8>,
    /// SKU中心と画像中心の距離（診断用、閾値なし）
    pub distance: f64,
}

/// 1ページの照合結果
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// SKUが1つも無い（画像は見ていない）
    NoSku,
    /// SKUはあるが画像配置が無い
    NoImage { skus: Vec<String> },
    /// 照合を実施した（matches は空のこともある）
    Matched {
        skus: Vec<String>,
        matches: Vec<MatchedImage>,
    },
}

impl PageOutcome {
    /// ページで検出したSKU（初出順）
    pub fn skus(&self) -> &[String] {
        match self {
            PageOutcome::NoSku => &[],
            PageOutcome::NoImage { skus } | PageOutcome::Matched { skus, .. } => skus,
        }
    }
}
