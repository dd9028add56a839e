//! グリフ列からのプレーンテキスト構築と文字列検索

use super::content::Glyph;
use super::geometry::Rect;

/// ページのプレーンテキストと、各文字→グリフの対応表
#[derive(Debug, Clone, Default)]
pub struct PageText {
    text: String,
    /// `text` の各バイト位置の文字が由来するグリフ（区切り文字は None）
    sources: Vec<(usize, Option<usize>)>,
}

impl PageText {
    pub fn from_glyphs(glyphs: &[Glyph]) -> Self {
        let mut page = PageText::default();
        let mut prev: Option<&Glyph> = None;

        for (index, glyph) in glyphs.iter().enumerate() {
            if let Some(prev) = prev {
                if let Some(sep) = separator(prev, glyph) {
                    page.push(sep, None);
                }
            }
            for c in glyph.text.chars() {
                page.push(c, Some(index));
            }
            prev = Some(glyph);
        }

        page
    }

    fn push(&mut self, c: char, glyph: Option<usize>) {
        self.sources.push((self.text.len(), glyph));
        self.text.push(c);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `needle` の全出現位置（前から順）について、対応するグリフ矩形の和を返す
    ///
    /// 大文字小文字は区別する。グリフを持たない・面積ゼロの出現は除外。
    pub fn search(&self, glyphs: &[Glyph], needle: &str) -> Vec<Rect> {
        if needle.is_empty() {
            return Vec::new();
        }

        self.text
            .match_indices(needle)
            .filter_map(|(start, matched)| {
                let end = start + matched.len();
                self.sources
                    .iter()
                    .filter(|(pos, _)| *pos >= start && *pos < end)
                    .filter_map(|(_, glyph)| *glyph)
                    .filter_map(|i| glyphs.get(i))
                    .map(|g| g.bbox)
                    .reduce(|a, b| a.union(&b))
            })
            .filter(|rect| !rect.is_empty())
            .collect()
    }
}

/// 直前のグリフとの位置関係から区切り文字を決める
fn separator(prev: &Glyph, glyph: &Glyph) -> Option<char> {
    let height = glyph.bbox.height().max(prev.bbox.height());
    if height <= 0.0 {
        return None;
    }

    let baseline_shift = (glyph.origin.y - prev.origin.y).abs();
    if baseline_shift > height / 2.0 {
        return Some('\n');
    }
    // 同じ行で左へ戻った
    if glyph.bbox.x0 < prev.bbox.x0 - height {
        return Some('\n');
    }
    if prev.text.ends_with(char::is_whitespace) || glyph.text.starts_with(char::is_whitespace) {
        return None;
    }
    if glyph.bbox.x0 - prev.bbox.x1 > height / 4.0 {
        return Some(' ');
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::geometry::Point;

    /// 幅5・高さ10のグリフを (x, baseline) に置く
    fn glyph(text: &str, x: f64, baseline: f64) -> Glyph {
        Glyph {
            text: text.to_string(),
            bbox: Rect::new(x, baseline - 8.0, x + 5.0, baseline + 2.0),
            origin: Point::new(x, baseline),
        }
    }

    fn word(s: &str, x: f64, baseline: f64) -> Vec<Glyph> {
        s.chars()
            .enumerate()
            .map(|(i, c)| glyph(&c.to_string(), x + i as f64 * 5.0, baseline))
            .collect()
    }

    #[test]
    fn test_adjacent_glyphs_join() {
        let glyphs = word("FS1003-24", 10.0, 100.0);
        let text = PageText::from_glyphs(&glyphs);
        assert_eq!(text.as_str(), "FS1003-24");
    }

    #[test]
    fn test_gap_inserts_space_and_baseline_inserts_newline() {
        let mut glyphs = word("AB", 10.0, 100.0);
        glyphs.extend(word("CD", 40.0, 100.0));
        glyphs.extend(word("EF", 10.0, 130.0));

        let text = PageText::from_glyphs(&glyphs);
        assert_eq!(text.as_str(), "AB CD\nEF");
    }

    #[test]
    fn test_search_returns_union_of_glyphs() {
        let mut glyphs = word("SKU", 10.0, 100.0);
        glyphs.extend(word("AB1234-56", 60.0, 100.0));

        let text = PageText::from_glyphs(&glyphs);
        let hits = text.search(&glyphs, "AB1234-56");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0], Rect::new(60.0, 92.0, 105.0, 102.0));
    }

    #[test]
    fn test_search_in_order_and_case_sensitive() {
        let mut glyphs = word("AB1234-56", 10.0, 300.0);
        glyphs.extend(word("ab1234-56", 10.0, 200.0));
        glyphs.extend(word("AB1234-56", 10.0, 100.0));

        let text = PageText::from_glyphs(&glyphs);
        let hits = text.search(&glyphs, "AB1234-56");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].center().y, 297.0);
        assert_eq!(hits[1].center().y, 97.0);
    }

    #[test]
    fn test_search_drops_zero_area_hits() {
        let glyphs: Vec<Glyph> = "XY1234-56"
            .chars()
            .map(|c| Glyph {
                text: c.to_string(),
                bbox: Rect::new(10.0, 10.0, 10.0, 10.0),
                origin: Point::new(10.0, 10.0),
            })
            .collect();

        let text = PageText::from_glyphs(&glyphs);
        assert_eq!(text.as_str(), "XY1234-56");
        assert!(text.search(&glyphs, "XY1234-56").is_empty());
    }

    #[test]
    fn test_multichar_glyph() {
        let glyphs = vec![glyph("fi", 0.0, 50.0), glyph("x", 5.0, 50.0)];
        let text = PageText::from_glyphs(&glyphs);
        assert_eq!(text.as_str(), "fix");
        assert_eq!(text.search(&glyphs, "ix"), vec![Rect::new(0.0, 42.0, 10.0, 52.0)]);
    }
}
