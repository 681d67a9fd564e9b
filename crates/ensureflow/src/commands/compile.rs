use ensureflow_core::{ResourceKind, compile};

/// コンパイル結果をそのまま JSON で出力する
pub fn handle(kind: ResourceKind, name: &str, tokens: &[String]) -> anyhow::Result<()> {
    let desired = compile(kind, name, tokens)?;
    println!("{}", serde_json::to_string_pretty(&desired.to_json())?);
    Ok(())
}
