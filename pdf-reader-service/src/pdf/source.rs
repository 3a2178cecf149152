//! Resolve a tool's `file_path` / `url` arguments to a local PDF.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::error::{DownloadError, ServiceError, ServiceResult};

/// Where to read a PDF from. Exactly one field must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PdfSource {
    /// Path to a local PDF file
    pub file_path: Option<String>,
    /// URL to download the PDF from
    pub url: Option<String>,
}

/// A PDF ready to open. Downloaded files are deleted on drop.
#[derive(Debug)]
pub enum ResolvedPdf {
    Local(PathBuf),
    Downloaded { url: String, file: NamedTempFile },
}

impl ResolvedPdf {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedPdf::Local(path) => path,
            ResolvedPdf::Downloaded { file, .. } => file.path(),
        }
    }

    /// Reported `file_path`: only local files have a meaningful one
    pub fn file_path(&self) -> Option<String> {
        match self {
            ResolvedPdf::Local(path) => Some(path.display().to_string()),
            ResolvedPdf::Downloaded { .. } => None,
        }
    }

    pub fn url(&self) -> Option<String> {
        match self {
            ResolvedPdf::Local(_) => None,
            ResolvedPdf::Downloaded { url, .. } => Some(url.clone()),
        }
    }

    /// Delete a downloaded file now, logging rather than failing on error.
    pub fn cleanup(self) {
        if let ResolvedPdf::Downloaded { file, .. } = self {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                warn!(path = %path.display(), error = %e, "Failed to remove downloaded PDF");
            }
        }
    }
}

impl PdfSource {
    pub async fn resolve(
        &self,
        client: &reqwest::Client,
        config: &DownloadConfig,
    ) -> ServiceResult<ResolvedPdf> {
        match (self.file_path.as_deref(), self.url.as_deref()) {
            (Some(_), Some(_)) => Err(ServiceError::InvalidRequest {
                message: "Cannot specify both file_path and url. Use one or the other."
                    .to_string(),
            }),
            (None, None) => Err(ServiceError::InvalidRequest {
                message: "Either file_path or url must be provided".to_string(),
            }),
            (Some(path), None) => validate_local(path).map(ResolvedPdf::Local),
            (None, Some(url)) => {
                let file = download(client, url, config).await?;
                Ok(ResolvedPdf::Downloaded {
                    url: url.to_string(),
                    file,
                })
            }
        }
    }
}

/// The file must exist and carry a `.pdf` extension (any case).
pub fn validate_local(file_path: &str) -> ServiceResult<PathBuf> {
    let path = PathBuf::from(file_path);
    if !path.exists() {
        return Err(ServiceError::FileNotFound {
            path: file_path.to_string(),
        });
    }
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(ServiceError::NotAPdf {
            path: file_path.to_string(),
        });
    }
    Ok(path)
}

/// Build the HTTP client used for PDF downloads.
pub fn download_client(config: &DownloadConfig) -> ServiceResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .user_agent(concat!("pdf-reader-service/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build HTTP client: {}", e),
        })
}

async fn download(
    client: &reqwest::Client,
    url: &str,
    config: &DownloadConfig,
) -> ServiceResult<NamedTempFile> {
    info!(url, "Downloading PDF");

    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DownloadError::Request { source: e })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DownloadError::Status {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !looks_like_pdf(&content_type, url) {
        warn!(url, content_type = %content_type, "URL may not be a PDF");
    }

    let limit = (config.max_size_bytes > 0).then_some(config.max_size_bytes);
    if let (Some(max), Some(length)) = (limit, response.content_length())
        && length > max
    {
        return Err(DownloadError::TooLarge { max }.into());
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| DownloadError::Request { source: e })?
    {
        bytes.extend_from_slice(&chunk);
        if let Some(max) = limit
            && bytes.len() as u64 > max
        {
            return Err(DownloadError::TooLarge { max }.into());
        }
    }

    let file = tempfile::Builder::new()
        .prefix("pdf_download_")
        .suffix(".pdf")
        .tempfile()?;
    tokio::fs::write(file.path(), &bytes).await?;
    debug!(path = %file.path().display(), bytes = bytes.len(), "PDF downloaded");

    Ok(file)
}

/// Content-Type mentions pdf, or the URL ends in `.pdf`
pub fn looks_like_pdf(content_type: &str, url: &str) -> bool {
    content_type.to_ascii_lowercase().contains("pdf") || url.to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source(file_path: Option<&str>, url: Option<&str>) -> PdfSource {
        PdfSource {
            file_path: file_path.map(str::to_string),
            url: url.map(str::to_string),
        }
    }

    async fn resolve(source: &PdfSource) -> ServiceResult<ResolvedPdf> {
        let config = DownloadConfig::default();
        let client = download_client(&config).unwrap();
        source.resolve(&client, &config).await
    }

    #[tokio::test]
    async fn test_both_sources_rejected() {
        let err = resolve(&source(Some("a.pdf"), Some("https://example.com/a.pdf")))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
        assert!(err.to_string().contains("Cannot specify both"));
    }

    #[tokio::test]
    async fn test_no_source_rejected() {
        let err = resolve(&source(None, None)).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[tokio::test]
    async fn test_local_pdf_resolves_in_place() {
        let mut file = tempfile::Builder::new().suffix(".PDF").tempfile().unwrap();
        file.write_all(b"%PDF-1.4\n").unwrap();
        let path = file.path().display().to_string();

        let resolved = resolve(&source(Some(&path), None)).await.unwrap();
        assert_eq!(resolved.path(), file.path());
        assert_eq!(resolved.file_path(), Some(path));
        assert_eq!(resolved.url(), None);
    }

    #[test]
    fn test_missing_file() {
        let err = validate_local("/no/such/dir/report.pdf").unwrap_err();
        assert_eq!(err.error_code(), "file_not_found");
    }

    #[test]
    fn test_wrong_extension() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let err = validate_local(&file.path().display().to_string()).unwrap_err();
        assert_eq!(err.error_code(), "not_a_pdf");
    }

    #[test]
    fn test_looks_like_pdf() {
        assert!(looks_like_pdf("application/pdf", "https://example.com/download"));
        assert!(looks_like_pdf("Application/PDF; charset=binary", "x"));
        assert!(looks_like_pdf("application/octet-stream", "https://example.com/A.PDF"));
        assert!(!looks_like_pdf("text/html", "https://example.com/page"));
    }

    #[test]
    fn test_cleanup_removes_download() {
        let file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        let path = file.path().to_path_buf();
        let resolved = ResolvedPdf::Downloaded {
            url: "https://example.com/a.pdf".to_string(),
            file,
        };
        assert_eq!(resolved.file_path(), None);
        resolved.cleanup();
        assert!(!path.exists());
    }
}
