use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "club-export")]
#[command(about = "Export club members with their membership expiration dates")]
pub struct CliConfig {
    /// TOML 設定檔；省略時使用內建預設值與環境變數
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// 啟動上傳與進度推送的 HTTP 服務
    Serve {
        #[arg(long)]
        bind: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
    /// 對本機檔案執行一次匯出
    Run {
        #[arg(long, short)]
        input: PathBuf,

        #[arg(long, short = 'o', default_value = ".")]
        output_dir: PathBuf,
    },
}
