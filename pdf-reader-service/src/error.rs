use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("File is not a PDF: {path}")]
    NotAPdf { path: String },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Ollama(#[from] OllamaError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// PDF download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error downloading PDF: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Request error downloading PDF")]
    Request {
        #[source]
        source: reqwest::Error,
    },

    #[error("PDF download exceeds {max} bytes")]
    TooLarge { max: u64 },
}

/// PDFium errors
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to load PDFium library: {message}")]
    Library { message: String },

    #[error("Failed to open PDF: {message}")]
    Open { message: String },

    #[error("PDF is password-protected")]
    PasswordProtected,

    #[error("Failed to read page {page}: {message}")]
    Page { page: u32, message: String },
}

/// Ollama client errors
#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("Connection failed to Ollama at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Generation failed (status {status}): {message}")]
    Generation { status: u16, message: String },

    #[error("Invalid response from Ollama: {message}")]
    InvalidResponse { message: String },
}

/// Image analysis failures.
///
/// None of these reach the caller as an `Err`; they are folded into the
/// matching section of an `AnalysisResult` as an error string and kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Cannot read image: {message}")]
    ImageUnreadable { message: String },

    #[error("Image too small for analysis ({width}x{height})")]
    ImageTooSmall { width: u32, height: u32 },

    #[error("Tesseract not available: {message}")]
    OcrUnavailable { message: String },

    #[error("OCR failed: {message}")]
    OcrFailed { message: String },

    #[error("Image too small for OCR")]
    OcrSkipped,

    #[error("Vision model not available: {message}")]
    CaptionUnavailable { message: String },

    #[error("Vision model failed: {message}")]
    CaptionFailed { message: String },

    #[error("Could not compute {statistic}: {message}")]
    StatComputationPartial {
        statistic: &'static str,
        message: String,
    },
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::ImageUnreadable { .. } => "image_unreadable",
            AnalysisError::ImageTooSmall { .. } => "image_too_small",
            AnalysisError::OcrUnavailable { .. } => "ocr_unavailable",
            AnalysisError::OcrFailed { .. } => "ocr_failed",
            AnalysisError::OcrSkipped => "ocr_skipped",
            AnalysisError::CaptionUnavailable { .. } => "caption_unavailable",
            AnalysisError::CaptionFailed { .. } => "caption_failed",
            AnalysisError::StatComputationPartial { .. } => "stat_computation_partial",
        }
    }
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::FileNotFound { .. } => "file_not_found",
            ServiceError::NotAPdf { .. } => "not_a_pdf",
            ServiceError::Download(DownloadError::Status { .. }) => "download_http_status",
            ServiceError::Download(DownloadError::Request { .. }) => "download_request",
            ServiceError::Download(DownloadError::TooLarge { .. }) => "download_too_large",
            ServiceError::Pdf(PdfError::Library { .. }) => "pdfium_unavailable",
            ServiceError::Pdf(PdfError::Open { .. }) => "pdf_open_error",
            ServiceError::Pdf(PdfError::PasswordProtected) => "pdf_password_protected",
            ServiceError::Pdf(PdfError::Page { .. }) => "pdf_page_error",
            ServiceError::Ollama(OllamaError::Connection { .. }) => "ollama_connection",
            ServiceError::Ollama(OllamaError::ModelNotFound { .. }) => "ollama_model_not_found",
            ServiceError::Ollama(OllamaError::Generation { .. }) => "ollama_generation",
            ServiceError::Ollama(OllamaError::InvalidResponse { .. }) => "ollama_invalid_response",
            ServiceError::Io(_) => "io_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Walk an error's source chain into a single line, outermost first.
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
