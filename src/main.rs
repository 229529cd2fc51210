//! Casework Triage 命令行入口
//!
//! 用法：`casework-triage <context.json> [config.toml]`
//! 读取 TriageContext，执行分诊流水线，把 DiagnosticRecord 以 JSON 打印到 stdout。

use std::path::PathBuf;

use anyhow::Context;
use casework_triage::{config::load_config, observability, TriageContext, TriageEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut args = std::env::args().skip(1);
    let context_path = args
        .next()
        .map(PathBuf::from)
        .context("usage: casework-triage <context.json> [config.toml]")?;
    let config_path = args.next().map(PathBuf::from);

    let cfg = load_config(config_path).context("Failed to load config")?;

    let raw = std::fs::read_to_string(&context_path)
        .with_context(|| format!("Failed to read {}", context_path.display()))?;
    let ctx: TriageContext = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid triage context in {}", context_path.display()))?;

    let engine = TriageEngine::from_config(&cfg).context("Failed to create LLM client")?;
    let outcome = engine.triage(&ctx).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome.diagnostics).context("Failed to encode result")?
    );
    Ok(())
}
