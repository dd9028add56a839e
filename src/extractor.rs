//! カタログ全体の抽出処理
//!
//! ページを先頭から順に照合し、画像ファイルとマニフェストを書き出す。
//! 先に出力したSKUは後のページで再出現しても無視する（先勝ち）。

use crate::config::Config;
use crate::error::Result;
use crate::export::{self, Manifest, MatchRecord};
use crate::matcher::{CatalogSource, PageMatcher, PageOutcome, SkuScanner};
use crate::pdf::PdfDocument;
use indexmap::{IndexMap, IndexSet};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub pdf: PathBuf,
    pub out_dir: PathBuf,
    /// 0 = 全ページ
    pub max_pages: usize,
    pub manifest_file_name: String,
    /// プログレスバーを表示する
    pub progress: bool,
}

impl ExtractOptions {
    pub fn new(pdf: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            pdf: pdf.into(),
            out_dir: out_dir.into(),
            max_pages: 0,
            manifest_file_name: Config::default().manifest_file_name,
            progress: false,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.out_dir.join(&self.manifest_file_name)
    }

    /// 処理対象のページ数
    pub fn page_limit(&self, total: usize) -> usize {
        if self.max_pages > 0 {
            self.max_pages.min(total)
        } else {
            total
        }
    }
}

/// 出力先とPDF、照合器を用意した抽出ジョブ
pub struct CatalogJob {
    document: PdfDocument,
    matcher: PageMatcher,
}

impl CatalogJob {
    /// 出力先を作成してからPDFを開く
    pub fn prepare(options: &ExtractOptions, config: &Config) -> Result<Self> {
        export::prepare_output_dir(&options.out_dir)?;
        let document = PdfDocument::open(&options.pdf)?;
        let matcher = PageMatcher::new(
            SkuScanner::new(&config.sku_pattern)?,
            config.fallback_extension.clone(),
        );
        Ok(Self { document, matcher })
    }

    pub fn page_count(&self) -> usize {
        self.document.page_count()
    }

    pub fn run(&self, options: &ExtractOptions) -> Result<Manifest> {
        run(&self.document, &self.matcher, options)
    }
}

/// 出力先を用意してPDFを開き、抽出を実行する
pub fn extract_catalog(options: &ExtractOptions, config: &Config) -> Result<Manifest> {
    CatalogJob::prepare(options, config)?.run(options)
}

/// 開いた文書に対して抽出を実行する
pub fn run<S: CatalogSource>(
    source: &S,
    matcher: &PageMatcher,
    options: &ExtractOptions,
) -> Result<Manifest> {
    let total = source.page_count();
    let limit = options.page_limit(total);

    let progress = if options.progress {
        let bar = ProgressBar::new(limit as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} ページ {msg}") {
            bar.set_style(style);
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut items: IndexMap<String, MatchRecord> = IndexMap::new();
    let mut seen: IndexSet<String> = IndexSet::new();
    let mut skipped_no_sku = 0;
    let mut skipped_no_image = 0;

    for index in 0..limit {
        let outcome = matcher.match_page(source, index, |sku| items.contains_key(sku))?;
        seen.extend(outcome.skus().iter().cloned());

        match outcome {
            PageOutcome::NoSku => {
                skipped_no_sku += 1;
                log::debug!("ページ{}: SKUなし", index + 1);
            }
            PageOutcome::NoImage { skus } => {
                skipped_no_image += 1;
                log::debug!("ページ{}: 画像なし (SKU {}件)", index + 1, skus.len());
            }
            PageOutcome::Matched { matches, .. } => {
                for m in matches {
                    let path = export::write_image(&options.out_dir, &m.sku, &m.ext, &m.bytes)?;
                    report(
                        &progress,
                        format!("✔ {} -> {} (ページ {})", m.sku, file_name(&path), m.page),
                    );
                    items.insert(
                        m.sku.clone(),
                        MatchRecord {
                            sku: m.sku,
                            page: m.page,
                            xref: m.xref.0,
                            ext: m.ext,
                            file: path.display().to_string(),
                            distance: m.distance,
                        },
                    );
                }
            }
        }

        progress.set_message(format!("出力 {}件", items.len()));
        progress.inc(1);
    }
    progress.finish_and_clear();

    let unmatched = seen
        .into_iter()
        .filter(|sku| !items.contains_key(sku))
        .collect();

    let manifest = Manifest {
        pdf: options.pdf.display().to_string(),
        pages: total,
        processed_pages: limit,
        exported: items.len(),
        skipped_pages_no_sku: skipped_no_sku,
        skipped_pages_no_image: skipped_no_image,
        items,
        unmatched,
        generated_at: chrono::Local::now().to_rfc3339(),
    };
    manifest.save(&options.manifest_path())?;

    Ok(manifest)
}

/// 出力行は常に標準出力（表示中のバーは一時的に退避）
fn report(progress: &ProgressBar, line: String) {
    progress.suspend(|| println!("{}", line));
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
