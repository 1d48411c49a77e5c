// src/fetch/mod.rs
use anyhow::{Context, Result};
use futures::future::try_join_all;
use glob::glob;
use reqwest::Client;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Supplier of raw table text by name. The core never reads files or sockets
/// itself; everything upstream of the parser goes through this trait.
pub trait TableSource {
    fn fetch_table(&self, name: &str) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Reads `<dir>/<name>.csv` from a local data directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSource { dir: dir.into() }
    }

    /// Table names available on disk, from the `.csv` files in the directory.
    pub fn available_tables(&self) -> Result<Vec<String>> {
        let pattern = format!("{}/*.csv", self.dir.display());
        let mut names = Vec::new();
        for entry in glob(&pattern).context("listing data directory")? {
            let path = entry?;
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl TableSource for FileSource {
    async fn fetch_table(&self, name: &str) -> Result<String> {
        let path = self.dir.join(format!("{name}.csv"));
        debug!(path = %path.display(), "reading table");
        fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading table file {}", path.display()))
    }
}

/// Fetches `<base>/<name>.csv` over HTTP, retrying transient failures a few
/// times before giving up.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    pub fn new(client: Client, base: Url) -> Self {
        HttpSource { client, base }
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        Ok(self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("non-success status from {}", url))?
            .text()
            .await
            .with_context(|| format!("reading body from {}", url))?)
    }
}

impl TableSource for HttpSource {
    async fn fetch_table(&self, name: &str) -> Result<String> {
        let url = self
            .base
            .join(&format!("{name}.csv"))
            .with_context(|| format!("building URL for table {name}"))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_text(&url).await {
                Ok(text) => return Ok(text),
                Err(err) if attempt < MAX_RETRIES => {
                    warn!(%url, attempt, "fetch failed, retrying: {err:#}");
                    sleep(RETRY_DELAY).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Fetch all named tables concurrently. Any single failure fails the whole
/// load; the caller surfaces one aggregate error at the boundary.
pub async fn load_tables<S: TableSource>(
    source: &S,
    names: &[&str],
) -> Result<BTreeMap<String, String>> {
    let texts = try_join_all(names.iter().map(|&name| source.fetch_table(name))).await?;
    Ok(names
        .iter()
        .map(|n| n.to_string())
        .zip(texts)
        .collect())
}
