use std::sync::Arc;

use colored::Colorize;
use ensureflow_cloud::{Bucket, EnsureEngine, Queue, Record, SecurityGroup, Table};
use ensureflow_core::{ResourceKind, compile};

use crate::AwsOptions;
use crate::console::ConsoleSink;

pub async fn handle(
    kind: ResourceKind,
    name: &str,
    tokens: &[String],
    preview: bool,
    options: &AwsOptions,
) -> anyhow::Result<()> {
    // トークンの誤りは AWS の設定を読む前に報告する
    let desired = compile(kind, name, tokens)?;

    let aws = super::connect(options).await?;
    let engine = EnsureEngine::new(Arc::new(ConsoleSink));

    let outcome = match kind {
        ResourceKind::Table => {
            engine
                .ensure::<Table, _>(&aws.table, &desired, preview)
                .await?
        }
        ResourceKind::Bucket => {
            engine
                .ensure::<Bucket, _>(&aws.bucket, &desired, preview)
                .await?
        }
        ResourceKind::Queue => {
            engine
                .ensure::<Queue, _>(&aws.queue, &desired, preview)
                .await?
        }
        ResourceKind::SecurityGroup => {
            engine
                .ensure::<SecurityGroup, _>(&aws.sg, &desired, preview)
                .await?
        }
        ResourceKind::Record => {
            engine
                .ensure::<Record, _>(&aws.record, &desired, preview)
                .await?
        }
    };

    if !preview && outcome.has_changes() {
        println!(
            "{} {} '{}': {}",
            "✓".green().bold(),
            kind,
            name,
            outcome.summary()
        );
    }
    Ok(())
}
