//! テスト用のカタログPDFを lopdf で組み立てる
//!
//! ページは 600x800pt。フォントはWidths無しの Helvetica なので
//! 1文字 = 0.5em（10ptなら5pt）、上端 +0.8em / 下端 -0.2em になる。

#![allow(dead_code)]

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;

pub const PAGE_WIDTH: i64 = 600;
pub const PAGE_HEIGHT: i64 = 800;

pub const FAKE_JPEG: &[u8] = b"\xFF\xD8\xFF\xE0fake-jpeg-body\xFF\xD9";
pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Clone, Copy)]
pub enum ImageKind {
    /// DCTDecode（中身はそのまま出力される）
    Jpeg,
    /// 2x2 の生RGB（PNGに包まれる）
    RawRgb,
    /// 2x1 の4ビットIndexed（パレット展開してPNG）
    Indexed4,
}

/// ページ内の画像配置（PDF座標、左下原点）
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub image: usize,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PageSpec {
    /// (x, y, 文字列) 10pt
    pub texts: Vec<(f64, f64, String)>,
    pub placements: Vec<Placement>,
}

impl PageSpec {
    pub fn text(mut self, x: f64, y: f64, s: &str) -> Self {
        self.texts.push((x, y, s.to_string()));
        self
    }

    pub fn image(mut self, image: usize, x: f64, y: f64, w: f64, h: f64) -> Self {
        self.placements.push(Placement { image, x, y, w, h });
        self
    }
}

pub struct CatalogBuilder {
    doc: Document,
    images: Vec<ObjectId>,
    pages: Vec<PageSpec>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            doc: Document::with_version("1.5"),
            images: Vec::new(),
            pages: Vec::new(),
        }
    }

    /// 画像XObjectを追加し、番号を返す
    pub fn add_image(&mut self, kind: ImageKind) -> usize {
        let stream = match kind {
            ImageKind::Jpeg => Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(2),
                    "Height" => Object::Integer(2),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => "DCTDecode",
                },
                FAKE_JPEG.to_vec(),
            ),
            ImageKind::RawRgb => Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(2),
                    "Height" => Object::Integer(2),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => Object::Integer(8),
                },
                vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255],
            ),
            ImageKind::Indexed4 => Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(2),
                    "Height" => Object::Integer(1),
                    "ColorSpace" => vec![
                        Object::Name(b"Indexed".to_vec()),
                        Object::Name(b"DeviceRGB".to_vec()),
                        Object::Integer(1),
                        Object::string_literal(vec![0u8, 0, 0, 255, 255, 255]),
                    ],
                    "BitsPerComponent" => Object::Integer(4),
                },
                vec![0x01],
            ),
        };
        let id = self.doc.add_object(stream);
        self.images.push(id);
        self.images.len() - 1
    }

    pub fn page(mut self, page: PageSpec) -> Self {
        self.pages.push(page);
        self
    }

    pub fn build(mut self) -> Document {
        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let pages_id = self.doc.new_object_id();

        let mut kids = Vec::new();
        for page in &self.pages {
            let mut content = String::new();
            for (x, y, s) in &page.texts {
                content.push_str(&format!("BT /F1 10 Tf {} {} Td ({}) Tj ET\n", x, y, s));
            }
            let mut xobjects = Dictionary::new();
            for p in &page.placements {
                let name = format!("Im{}", p.image);
                content.push_str(&format!(
                    "q {} 0 0 {} {} {} cm /{} Do Q\n",
                    p.w, p.h, p.x, p.y, name
                ));
                xobjects.set(name, Object::Reference(self.images[p.image]));
            }

            let content_id = self
                .doc
                .add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => Object::Reference(font_id) },
                    "XObject" => xobjects,
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(PAGE_WIDTH),
                    Object::Integer(PAGE_HEIGHT),
                ],
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
        self.doc
    }

    pub fn save(self, path: &Path) {
        let mut doc = self.build();
        doc.save(path).expect("テストPDFの保存に失敗");
    }
}

/// 4ページのサンプルカタログ
///
/// 1: FS1003-24 → JPEG, PB0011-180 → 生RGB
/// 2: FS1003-24（出力済み）と AB1234-56 → JPEG
/// 3: SKUなし
/// 4: ZZ9999-99 のみで画像なし
pub fn sample_catalog(path: &Path) {
    let mut builder = CatalogBuilder::new();
    let jpeg = builder.add_image(ImageKind::Jpeg);
    let raw = builder.add_image(ImageKind::RawRgb);
    let second_jpeg = builder.add_image(ImageKind::Jpeg);

    builder
        .page(
            PageSpec::default()
                .text(50.0, 700.0, "Coconut oil FS1003-24")
                .text(350.0, 700.0, "PB0011-180")
                .image(jpeg, 40.0, 560.0, 100.0, 100.0)
                .image(raw, 340.0, 560.0, 100.0, 100.0),
        )
        .page(
            PageSpec::default()
                .text(50.0, 700.0, "FS1003-24 again")
                .text(50.0, 300.0, "AB1234-56")
                .image(second_jpeg, 40.0, 150.0, 100.0, 100.0),
        )
        .page(PageSpec::default().text(50.0, 700.0, "Index and contact information"))
        .page(PageSpec::default().text(50.0, 700.0, "ZZ9999-99 coming soon"))
        .save(path);
}
