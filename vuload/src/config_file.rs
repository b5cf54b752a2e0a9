use std::path::Path;

use anyhow::Context as _;
use vuload_core::LoadConfig;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocFormat {
    Json,
    Yaml,
}

fn doc_format(path: &Path) -> anyhow::Result<DocFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "json" => Ok(DocFormat::Json),
        "yaml" | "yml" => Ok(DocFormat::Yaml),
        _ => anyhow::bail!(
            "unsupported config extension `{ext}` (expected .json, .yaml or .yml): {}",
            path.display()
        ),
    }
}

pub(crate) async fn load_config(path: &Path) -> anyhow::Result<LoadConfig> {
    let format = doc_format(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;

    parse_config(format, &bytes).with_context(|| format!("invalid config: {}", path.display()))
}

fn parse_config(format: DocFormat, bytes: &[u8]) -> anyhow::Result<LoadConfig> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let config = match format {
        DocFormat::Json => serde_json::from_slice(bytes)?,
        DocFormat::Yaml => serde_yaml::from_slice(bytes)?,
    };
    Ok(config)
}
