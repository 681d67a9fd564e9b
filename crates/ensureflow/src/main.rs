mod commands;
mod console;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use ensureflow_core::ResourceKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ensure")]
#[command(about = "在るべき姿を宣言する。差分だけが適用される。", long_about = None)]
struct Cli {
    #[command(flatten)]
    aws: AwsOptions,

    #[command(subcommand)]
    command: Commands,
}

/// AWS 接続の上書き設定
#[derive(Args, Debug, Clone, Default)]
pub struct AwsOptions {
    /// AWS リージョン (ENSURE_REGION 環境変数)
    #[arg(long, global = true, env = "ENSURE_REGION")]
    pub region: Option<String>,
    /// 共有認証情報のプロファイル (ENSURE_PROFILE 環境変数)
    #[arg(long, global = true, env = "ENSURE_PROFILE")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// DynamoDB テーブルを在るべき状態にする
    Table {
        /// テーブル名
        name: String,
        /// 属性トークン (例: id:s:hash read=5 stream=new_image)
        tokens: Vec<String>,
        /// 適用せずに計画だけを表示
        #[arg(short, long)]
        preview: bool,
    },
    /// S3 バケットを在るべき状態にする
    Bucket {
        /// バケット名
        name: String,
        /// 属性トークン (例: acl=public versioning=true)
        tokens: Vec<String>,
        /// 適用せずに計画だけを表示
        #[arg(short, long)]
        preview: bool,
    },
    /// SQS キューを在るべき状態にする
    Queue {
        /// キュー名
        name: String,
        /// 属性トークン (例: timeout=60 delay=5)
        tokens: Vec<String>,
        /// 適用せずに計画だけを表示
        #[arg(short, long)]
        preview: bool,
    },
    /// EC2 セキュリティグループを在るべき状態にする
    Sg {
        /// グループ名
        name: String,
        /// 属性トークン (例: vpc=main tcp:443:0.0.0.0/0 ::sg-0123)
        tokens: Vec<String>,
        /// 適用せずに計画だけを表示
        #[arg(short, long)]
        preview: bool,
    },
    /// Route53 レコードを在るべき状態にする
    Record {
        /// レコード名 (例: api.example.com)
        name: String,
        /// 属性トークン (例: type=A ttl=60 10.0.0.1)
        tokens: Vec<String>,
        /// 適用せずに計画だけを表示
        #[arg(short, long)]
        preview: bool,
    },
    /// トークンをコンパイルして望ましい状態を JSON で表示 (AWS には接続しない)
    Compile {
        /// リソース種別 (table, bucket, queue, sg, record)
        kind: ResourceKind,
        /// リソース名
        name: String,
        /// 属性トークン
        tokens: Vec<String>,
    },
    /// マニフェストに書かれた全リソースを一括で在るべき状態にする
    Apply {
        /// マニフェストのパス (省略時は ensure.yaml を探索)
        manifest: Option<PathBuf>,
        /// 適用せずに計画だけを表示
        #[arg(short, long)]
        preview: bool,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ログは stderr へ。既定は warn、RUST_LOG で上書きできる
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(err) = run(cli).await {
        commands::report_error(&err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Table {
            name,
            tokens,
            preview,
        } => commands::ensure::handle(ResourceKind::Table, &name, &tokens, preview, &cli.aws).await,
        Commands::Bucket {
            name,
            tokens,
            preview,
        } => {
            commands::ensure::handle(ResourceKind::Bucket, &name, &tokens, preview, &cli.aws).await
        }
        Commands::Queue {
            name,
            tokens,
            preview,
        } => commands::ensure::handle(ResourceKind::Queue, &name, &tokens, preview, &cli.aws).await,
        Commands::Sg {
            name,
            tokens,
            preview,
        } => {
            commands::ensure::handle(ResourceKind::SecurityGroup, &name, &tokens, preview, &cli.aws)
                .await
        }
        Commands::Record {
            name,
            tokens,
            preview,
        } => {
            commands::ensure::handle(ResourceKind::Record, &name, &tokens, preview, &cli.aws).await
        }
        Commands::Compile { kind, name, tokens } => commands::compile::handle(kind, &name, &tokens),
        Commands::Apply { manifest, preview } => {
            commands::apply::handle(manifest, preview, &cli.aws).await
        }
        Commands::Version => {
            println!("ensureflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_preview_and_global_region() {
        let cli = Cli::try_parse_from([
            "ensure",
            "table",
            "orders",
            "id:s:hash",
            "read=5",
            "--preview",
            "--region",
            "eu-west-1",
        ])
        .unwrap();

        assert_eq!(cli.aws.region.as_deref(), Some("eu-west-1"));
        match cli.command {
            Commands::Table {
                name,
                tokens,
                preview,
            } => {
                assert_eq!(name, "orders");
                assert_eq!(tokens, vec!["id:s:hash", "read=5"]);
                assert!(preview);
            }
            _ => panic!("expected table command"),
        }
    }

    #[test]
    fn test_parse_sg_rules() {
        let cli = Cli::try_parse_from(["ensure", "sg", "web", "tcp:443:0.0.0.0/0", "::sg-0123", "-p"])
            .unwrap();
        match cli.command {
            Commands::Sg { name, tokens, preview } => {
                assert_eq!(name, "web");
                assert_eq!(tokens, vec!["tcp:443:0.0.0.0/0", "::sg-0123"]);
                assert!(preview);
            }
            _ => panic!("expected sg command"),
        }
    }

    #[test]
    fn test_parse_compile_kind_alias() {
        let cli = Cli::try_parse_from(["ensure", "compile", "sqs", "jobs"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Compile {
                kind: ResourceKind::Queue,
                ..
            }
        ));
    }
}
