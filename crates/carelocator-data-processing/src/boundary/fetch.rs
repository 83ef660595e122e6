//! Boundary source refresh.
//!
//! Downloads the GeoJSON feature collections named in a [`PriorityCatalog`]
//! into the boundary data directory. Only catalog entries that declare a
//! source URL are fetched; the rest are expected to be placed there by hand.
//! Load-time behavior is unchanged either way: a file that never arrives is
//! treated as an empty dataset.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use super::PriorityCatalog;
use crate::Result;

/// Download every catalog dataset that declares a URL into `data_dir`.
///
/// Returns the paths of the files written.
#[instrument(name = "Download boundary data", skip_all, level = "info")]
pub fn download_boundary_data(
    catalog: &PriorityCatalog,
    data_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let rt = tokio::runtime::Runtime::new()?;
    let data_dir = data_dir.as_ref();
    std::fs::create_dir_all(data_dir)?;

    rt.block_on(async {
        let client = Client::new();
        let mut written = Vec::new();

        for spec in &catalog.datasets {
            let Some(url) = &spec.url else { continue };
            let destination = data_dir.join(&spec.file);
            download_to_file(&client, url, &destination).await?;
            info!(dataset = %spec.name, path = ?destination, "Boundary dataset refreshed");
            written.push(destination);
        }

        Ok(written)
    })
}

async fn download_to_file(client: &Client, url: &str, destination: &Path) -> Result<()> {
    info!(url, "Starting download");
    let response = client.get(url).send().await?.error_for_status()?;

    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})").expect("Progress bar template")
        .progress_chars("█░"));
    pb.set_message(format!(
        "Downloading {}",
        destination
            .file_name()
            .map_or_else(|| url.to_string(), |name| name.to_string_lossy().into_owned())
    ));

    let mut dest_file = tokio::fs::File::create(destination).await?;

    let mut stream = response.bytes_stream();
    while let Some(item) = stream.next().await {
        let chunk = item?;
        dest_file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }
    dest_file.flush().await?;
    pb.finish_and_clear();

    Ok(())
}
