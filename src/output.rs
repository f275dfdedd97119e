use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::io::AsyncWriteExt;

/// Publish step outputs.
///
/// Each pair is printed to stdout as `key=value` and, inside GitHub Actions,
/// appended to the file named by `GITHUB_OUTPUT`.
pub async fn publish(outputs: &[(&str, &str)]) -> Result<()> {
    let target = std::env::var_os("GITHUB_OUTPUT")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    publish_to(target.as_deref(), outputs).await
}

pub async fn publish_to(target: Option<&Path>, outputs: &[(&str, &str)]) -> Result<()> {
    let mut lines = String::new();
    for (key, value) in outputs {
        if value.contains(['\n', '\r']) {
            bail!("output {} must be a single line", key);
        }
        lines.push_str(&format!("{}={}\n", key, value));
    }
    print!("{}", lines);

    if let Some(path) = target {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(lines.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        file.flush().await?;
    }
    Ok(())
}

/// Surface a fatal error as a workflow annotation when running under GitHub Actions.
pub fn annotate_failure(err: &anyhow::Error) {
    if std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true") {
        eprintln!("::error title=railship::{}", escape_annotation(&format!("{:#}", err)));
    }
}

fn escape_annotation(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
