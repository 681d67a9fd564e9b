use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use ensureflow_cloud::{
    EnsureEngine, ResourceRequest, ResourceResult, check_results, compile_all, ensure_compiled,
};
use ensureflow_config::{Manifest, find_manifest_file};

use crate::AwsOptions;
use crate::console::ConsoleSink;

pub async fn handle(
    manifest: Option<PathBuf>,
    preview: bool,
    options: &AwsOptions,
) -> anyhow::Result<()> {
    let path = match manifest {
        Some(path) => path,
        None => find_manifest_file()?,
    };
    let manifest = Manifest::load(&path)?;
    if manifest.is_empty() {
        println!(
            "{} {}",
            "マニフェストにリソースがありません:".yellow(),
            path.display()
        );
        return Ok(());
    }

    let default_tags = manifest.default_tags();
    let requests: Vec<ResourceRequest> = manifest
        .entries()
        .into_iter()
        .map(|entry| {
            ResourceRequest::new(entry.kind, entry.name, entry.tokens)
                .with_default_tags(default_tags.clone())
        })
        .collect();

    // 全エントリのコンパイルが通るまで AWS には触れない
    let desired = compile_all(&requests)?;

    let aws = super::connect(options).await?;
    let engine = EnsureEngine::new(Arc::new(ConsoleSink));
    let results = ensure_compiled(&engine, aws.as_providers(), &desired, preview).await;

    report_results(&results, preview)
}

/// 各リソースの結果を表示し、失敗があればまとめて1つのエラーにする
fn report_results(results: &[ResourceResult], preview: bool) -> anyhow::Result<()> {
    for result in results {
        match &result.outcome {
            Ok(outcome) if !preview && outcome.has_changes() => {
                println!(
                    "{} {} '{}': {}",
                    "✓".green().bold(),
                    result.kind,
                    result.name,
                    outcome.summary()
                );
            }
            Ok(_) => {}
            Err(err) => super::print_ensure_error(err),
        }
    }
    check_results(results)?;
    Ok(())
}
