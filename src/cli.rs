use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "catalog-sku")]
#[command(about = "カタログPDFから商品画像をSKU単位で抽出", long_about = None)]
pub struct Cli {
    /// 入力カタログPDF
    #[arg(long, required = true)]
    pub pdf: PathBuf,

    /// 画像とmapping.jsonの出力先ディレクトリ（無ければ作成）
    #[arg(long, required = true)]
    pub out: PathBuf,

    /// 先頭から処理するページ数の上限（0 = 全ページ、デバッグ用）
    #[arg(long, default_value = "0")]
    pub max_pages: usize,

    /// 設定ファイル（省略時: ~/.config/catalog-sku/config.json）
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 詳細ログを出力
    #[arg(short, long)]
    pub verbose: bool,
}
