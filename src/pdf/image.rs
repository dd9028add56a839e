//! 画像XObjectのバイト列取得
//!
//! JPEG/JPEG2000/JBIG2 はストリームの中身をそのまま返す。
//! 生ピクセルの画像はPNGに包んで返す。

use super::{number, resolve, stream_data};
use crate::error::{CatalogError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream};
use std::io::Cursor;

/// 抽出した画像
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub bytes: Vec<u8>,
    /// 画像形式タグ（jpeg / jpx / jb2 / png）。判別できなければ None
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// L*a*b*（L* だけを濃淡に使う）
    Lab,
    /// Separation / DeviceN。色材量の平均を反転して濃淡にする
    Colorant(usize),
    Indexed { base: Box<ColorSpace>, palette: Vec<u8> },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb | ColorSpace::Lab => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Colorant(n) => *n,
        }
    }
}

pub fn extract_image(doc: &Document, xref: ObjectId) -> Result<ExtractedImage> {
    let stream = doc
        .get_object(xref)
        .and_then(Object::as_stream)
        .map_err(|_| CatalogError::ImageNotFound(xref.0))?;

    let subtype = stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
    if subtype != Some(b"Image".as_slice()) {
        return Err(CatalogError::ImageNotFound(xref.0));
    }

    let width = dimension(doc, stream, b"Width");
    let height = dimension(doc, stream, b"Height");
    let filters = filters(doc, stream);

    let passthrough = match filters.last().map(String::as_str) {
        Some("DCTDecode") => Some("jpeg"),
        Some("JPXDecode") => Some("jpx"),
        Some("JBIG2Decode") => Some("jb2"),
        Some("CCITTFaxDecode") => {
            return Err(unsupported(xref, "CCITTFaxDecode"));
        }
        _ => None,
    };

    if let Some(tag) = passthrough {
        // 単一フィルタならストリームがそのまま画像ファイル
        let bytes = if filters.len() == 1 {
            stream.content.clone()
        } else {
            strip_leading_filters(doc, stream, &filters)?
        };
        return Ok(ExtractedImage {
            bytes,
            format: Some(tag.to_string()),
            width,
            height,
        });
    }

    let pixels = stream_data(stream)?;
    match pixel_image(doc, stream, xref, &pixels, width, height)? {
        Some(image) => {
            let mut bytes = Vec::new();
            image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
            Ok(ExtractedImage {
                bytes,
                format: Some("png".to_string()),
                width,
                height,
            })
        }
        None => {
            log::warn!(
                "xref {}: 画素形式を変換できないため展開済みデータをそのまま出力します",
                xref.0
            );
            Ok(ExtractedImage {
                bytes: pixels,
                format: Some("raw".to_string()),
                width,
                height,
            })
        }
    }
}

fn unsupported(xref: ObjectId, reason: impl Into<String>) -> CatalogError {
    CatalogError::UnsupportedImage {
        xref: xref.0,
        reason: reason.into(),
    }
}

fn dimension(doc: &Document, stream: &Stream, key: &[u8]) -> u32 {
    stream
        .dict
        .get(key)
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(number)
        .map(|n| n.max(0.0) as u32)
        .unwrap_or(0)
}

fn filters(doc: &Document, stream: &Stream) -> Vec<String> {
    let Ok(filter) = stream.dict.get(b"Filter").map(|o| resolve(doc, o)) else {
        return Vec::new();
    };
    let names: Vec<&Object> = match filter {
        Object::Array(arr) => arr.iter().map(|o| resolve(doc, o)).collect(),
        other => vec![other],
    };
    names
        .into_iter()
        .filter_map(|o| o.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).into_owned())
        .collect()
}

/// 最後の画像フィルタだけを残し、前段のフィルタ（Flate等）を展開する
fn strip_leading_filters(doc: &Document, stream: &Stream, filters: &[String]) -> Result<Vec<u8>> {
    let leading: Vec<Object> = filters[..filters.len() - 1]
        .iter()
        .map(|f| Object::Name(f.as_bytes().to_vec()))
        .collect();

    let mut head = stream.clone();
    head.dict.set("Filter", Object::Array(leading));
    // lopdf は単一辞書の DecodeParms しか見ないので先頭の分だけ渡す
    if let Ok(Object::Array(parms)) = stream.dict.get(b"DecodeParms").map(|o| resolve(doc, o)) {
        match parms.first().map(|o| resolve(doc, o)) {
            Some(Object::Dictionary(first)) => {
                head.dict.set("DecodeParms", first.clone());
            }
            _ => {
                head.dict.remove(b"DecodeParms");
            }
        }
    }
    Ok(head.decompressed_content()?)
}

fn color_space(doc: &Document, obj: &Object) -> Option<ColorSpace> {
    match resolve(doc, obj) {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(ColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Some(ColorSpace::Cmyk),
            _ => None,
        },
        Object::Array(arr) => {
            let family = arr.first().and_then(|o| o.as_name().ok())?;
            match family {
                b"ICCBased" => {
                    let profile = arr
                        .get(1)
                        .map(|o| resolve(doc, o))
                        .and_then(|o| o.as_stream().ok())?;
                    match profile.dict.get(b"N").ok().and_then(number).map(|n| n as u32) {
                        Some(1) => Some(ColorSpace::Gray),
                        Some(3) => Some(ColorSpace::Rgb),
                        Some(4) => Some(ColorSpace::Cmyk),
                        _ => profile
                            .dict
                            .get(b"Alternate")
                            .ok()
                            .and_then(|o| color_space(doc, o)),
                    }
                }
                b"CalGray" => Some(ColorSpace::Gray),
                b"CalRGB" => Some(ColorSpace::Rgb),
                b"Lab" => Some(ColorSpace::Lab),
                b"Separation" => Some(ColorSpace::Colorant(1)),
                b"DeviceN" => {
                    let names = arr
                        .get(1)
                        .map(|o| resolve(doc, o))
                        .and_then(|o| o.as_array().ok())?;
                    Some(ColorSpace::Colorant(names.len().max(1)))
                }
                b"Indexed" | b"I" => {
                    let base = color_space(doc, arr.get(1)?)?;
                    if matches!(base, ColorSpace::Indexed { .. }) {
                        return None;
                    }
                    let palette = match arr.get(3).map(|o| resolve(doc, o))? {
                        Object::String(bytes, _) => bytes.clone(),
                        Object::Stream(s) => stream_data(s).ok()?,
                        _ => return None,
                    };
                    Some(ColorSpace::Indexed {
                        base: Box::new(base),
                        palette,
                    })
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// 生ピクセルを画像に組み立てる
///
/// 色空間やビット深度が解釈できなければ `None`。データ不足はエラー。
fn pixel_image(
    doc: &Document,
    stream: &Stream,
    xref: ObjectId,
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<Option<DynamicImage>> {
    if width == 0 || height == 0 {
        return Err(unsupported(xref, "Width/Height がありません"));
    }

    let is_mask = stream
        .dict
        .get(b"ImageMask")
        .ok()
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);
    let bpc = if is_mask {
        1
    } else {
        stream
            .dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(number)
            .map(|n| n as u32)
            .unwrap_or(8)
    };
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return Ok(None);
    }

    let space = if is_mask {
        Some(ColorSpace::Gray)
    } else {
        stream
            .dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| color_space(doc, o))
    };
    let Some(space) = space.or_else(|| guess_color_space(pixels.len(), width, height, bpc)) else {
        return Ok(None);
    };

    let n = space.components();
    need(pixels, row_stride(width, n, bpc) * height as usize, xref)?;
    let raw = unpack_samples(pixels, width, height, n, bpc);

    let image = match &space {
        ColorSpace::Indexed { base, palette } => {
            let m = base.components();
            let mut expanded = Vec::with_capacity(raw.len() * m);
            for &index in &raw {
                let start = index as usize * m;
                match palette.get(start..start + m) {
                    Some(entry) => expanded.extend_from_slice(entry),
                    None => expanded.extend(std::iter::repeat(0).take(m)),
                }
            }
            to_image(base, expanded, width, height, xref)?
        }
        _ => {
            let inverted = decode_inversions(doc, stream, n);
            let samples = raw
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let s = scale_sample(v, bpc);
                    if inverted[i % n] {
                        255 - s
                    } else {
                        s
                    }
                })
                .collect();
            to_image(&space, samples, width, height, xref)?
        }
    };
    Ok(Some(image))
}

/// 1行のバイト数（行末はバイト境界まで詰め物）
fn row_stride(width: u32, components: usize, bpc: u32) -> usize {
    (width as usize * components * bpc as usize).div_ceil(8)
}

/// ColorSpace が無い・解釈できないときはデータ長から成分数を推定する
fn guess_color_space(len: usize, width: u32, height: u32, bpc: u32) -> Option<ColorSpace> {
    [
        (1, ColorSpace::Gray),
        (3, ColorSpace::Rgb),
        (4, ColorSpace::Cmyk),
    ]
    .into_iter()
    .find(|(n, _)| row_stride(width, *n, bpc) * height as usize == len)
    .map(|(_, space)| space)
}

/// サンプルを1要素ずつに展開する（Indexed ならパレット番号そのもの）
fn unpack_samples(pixels: &[u8], width: u32, height: u32, components: usize, bpc: u32) -> Vec<u16> {
    let per_row = width as usize * components;
    let stride = row_stride(width, components, bpc);
    let mut samples = Vec::with_capacity(per_row * height as usize);

    for row in pixels.chunks(stride).take(height as usize) {
        match bpc {
            8 => samples.extend(row[..per_row].iter().map(|&b| b as u16)),
            16 => samples.extend(
                row[..per_row * 2]
                    .chunks_exact(2)
                    .map(|p| u16::from_be_bytes([p[0], p[1]])),
            ),
            _ => {
                let bits = bpc as usize;
                let mask = (1u16 << bpc) - 1;
                for i in 0..per_row {
                    let bit = i * bits;
                    let shift = 8 - bits - bit % 8;
                    samples.push(((row[bit / 8] as u16) >> shift) & mask);
                }
            }
        }
    }
    samples
}

/// 8ビットに揃える
fn scale_sample(value: u16, bpc: u32) -> u8 {
    match bpc {
        16 => (value >> 8) as u8,
        8 => value as u8,
        _ => (value as u32 * 255 / ((1u32 << bpc) - 1)) as u8,
    }
}

/// `/Decode` が `[1 0]` 向きの成分
fn decode_inversions(doc: &Document, stream: &Stream, components: usize) -> Vec<bool> {
    let decode: Vec<f64> = stream
        .dict
        .get(b"Decode")
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|arr| arr.iter().filter_map(number).collect())
        .unwrap_or_default();

    (0..components)
        .map(|c| match (decode.get(2 * c), decode.get(2 * c + 1)) {
            (Some(lo), Some(hi)) => lo > hi,
            _ => false,
        })
        .collect()
}

fn to_image(
    space: &ColorSpace,
    samples: Vec<u8>,
    width: u32,
    height: u32,
    xref: ObjectId,
) -> Result<DynamicImage> {
    match space {
        ColorSpace::Gray => gray_image(samples, width, height, xref),
        ColorSpace::Rgb => rgb_image(samples, width, height, xref),
        ColorSpace::Cmyk => rgb_image(cmyk_to_rgb(&samples), width, height, xref),
        ColorSpace::Lab => {
            let lightness = samples.iter().step_by(3).copied().collect();
            gray_image(lightness, width, height, xref)
        }
        ColorSpace::Colorant(n) => {
            let gray = samples
                .chunks_exact(*n)
                .map(|px| {
                    let ink = px.iter().map(|&v| v as u32).sum::<u32>() / *n as u32;
                    (255 - ink) as u8
                })
                .collect();
            gray_image(gray, width, height, xref)
        }
        ColorSpace::Indexed { .. } => Err(unsupported(xref, "入れ子のIndexed色空間")),
    }
}

fn need(pixels: &[u8], len: usize, xref: ObjectId) -> Result<()> {
    if pixels.len() < len {
        return Err(unsupported(
            xref,
            format!("ピクセルデータ不足: {} < {}", pixels.len(), len),
        ));
    }
    Ok(())
}

fn gray_image(data: Vec<u8>, width: u32, height: u32, xref: ObjectId) -> Result<DynamicImage> {
    GrayImage::from_raw(width, height, data)
        .map(DynamicImage::ImageLuma8)
        .ok_or_else(|| unsupported(xref, "グレー画像の構築に失敗"))
}

fn rgb_image(data: Vec<u8>, width: u32, height: u32, xref: ObjectId) -> Result<DynamicImage> {
    RgbImage::from_raw(width, height, data)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| unsupported(xref, "RGB画像の構築に失敗"))
}

/// 単純なCMYK→RGB変換（カラープロファイルは考慮しない）
fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    cmyk.chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - px[3] as u32;
            [
                ((255 - px[0] as u32) * k / 255) as u8,
                ((255 - px[1] as u32) * k / 255) as u8,
                ((255 - px[2] as u32) * k / 255) as u8,
            ]
        })
        .collect()
}
