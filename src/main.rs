use anyhow::Context;
use catalog_sku_images::{cli, config, extractor};
use clap::Parser;
use cli::Cli;
use config::Config;
use extractor::{CatalogJob, ExtractOptions};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("設定ファイルの読み込みに失敗しました")?;

    println!("📄 catalog-sku - SKU画像抽出\n");

    let mut options = ExtractOptions::new(&cli.pdf, &cli.out);
    options.max_pages = cli.max_pages;
    options.manifest_file_name = config.manifest_file_name.clone();
    options.progress = !cli.verbose;

    let job = CatalogJob::prepare(&options, &config)
        .with_context(|| format!("抽出の準備に失敗しました: {}", cli.pdf.display()))?;

    let total = job.page_count();
    println!("- PDF: {}", cli.pdf.display());
    println!("- ページ数: {} (処理対象 {})", total, options.page_limit(total));
    println!("- 出力先: {}\n", cli.out.display());

    let manifest = job
        .run(&options)
        .with_context(|| format!("抽出に失敗しました: {}", cli.pdf.display()))?;

    println!();
    println!("✔ 処理ページ: {}/{}", manifest.processed_pages, manifest.pages);
    println!("✔ 出力: {}件", manifest.exported);
    println!("- SKUなしのページ: {}", manifest.skipped_pages_no_sku);
    println!("- 画像なしのページ: {}", manifest.skipped_pages_no_image);
    if !manifest.unmatched.is_empty() {
        println!("- 未出力のSKU: {}", manifest.unmatched.join(", "));
    }
    println!("✔ マッピング: {}", options.manifest_path().display());

    println!("\n✅ 抽出完了");
    Ok(())
}
