//! Error types for the workshop pilot
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Retry classification for advisory calls
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pilot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,
    SerializationFailed = 210,

    // Advisory transport errors (3xx)
    AdvisoryUnavailable = 300,
    AdvisoryTimeout = 301,

    // Advisory response errors (4xx)
    AdvisoryMalformed = 400,
    AdvisoryRejected = 401,

    // Simulation errors (5xx)
    PersonaFailed = 500,
    PersonaPanicked = 501,

    // Aggregation errors (6xx)
    AggregationInput = 600,
    NoArtifacts = 601,

    // Catalog errors (7xx)
    CatalogInvalid = 700,
    PersonaNotFound = 701,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Advisory transport errors
            400..=499 => 40, // Advisory response errors
            500..=599 => 50, // Simulation errors
            600..=699 => 60, // Aggregation errors
            700..=799 => 70, // Catalog errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the pilot
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Advisory Errors
    // ─────────────────────────────────────────────────────────────

    /// Timeout, connection failure, rate limit or 5xx from the advisory service
    #[error("Advisory service unavailable: {message}")]
    TransientService { message: String },

    /// An advisory call exceeded its deadline
    #[error("Advisory call timed out after {timeout_ms}ms")]
    AdvisoryTimeout { timeout_ms: u64 },

    /// Reply could not be parsed or failed validation
    #[error("Malformed advisory reply: {reason}")]
    MalformedResponse { reason: String },

    /// The service refused the request outright (4xx other than 429)
    #[error("Advisory request rejected ({status}): {message}")]
    AdvisoryRejected { status: u16, message: String },

    // ─────────────────────────────────────────────────────────────
    // Simulation Errors
    // ─────────────────────────────────────────────────────────────

    /// Unexpected failure while simulating one persona
    #[error("Simulation of {persona_id} failed at stage {stage}: {message}")]
    PersonaSimulation {
        persona_id: String,
        stage: u32,
        message: String,
    },

    /// A persona task panicked or was aborted
    #[error("Persona task for {persona_id} aborted: {message}")]
    PersonaTask { persona_id: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Aggregation Errors
    // ─────────────────────────────────────────────────────────────

    /// Artifact missing, unreadable, unparseable or inconsistent
    #[error("Skipping artifact {path}: {reason}")]
    AggregationInput { path: PathBuf, reason: String },

    /// Nothing to aggregate
    #[error("No result artifacts found under {path}")]
    NoArtifacts { path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Catalog Errors
    // ─────────────────────────────────────────────────────────────

    /// Persona or stage catalog is invalid
    #[error("Invalid {catalog} catalog: {message}")]
    Catalog { catalog: &'static str, message: String },

    /// Persona id not present in the registry
    #[error("Persona not found: {0}")]
    PersonaNotFound(String),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Json(_) => ErrorCode::SerializationFailed,
            Error::Toml(_) => ErrorCode::SerializationFailed,

            Error::TransientService { .. } => ErrorCode::AdvisoryUnavailable,
            Error::AdvisoryTimeout { .. } => ErrorCode::AdvisoryTimeout,
            Error::MalformedResponse { .. } => ErrorCode::AdvisoryMalformed,
            Error::AdvisoryRejected { .. } => ErrorCode::AdvisoryRejected,

            Error::PersonaSimulation { .. } => ErrorCode::PersonaFailed,
            Error::PersonaTask { .. } => ErrorCode::PersonaPanicked,

            Error::AggregationInput { .. } => ErrorCode::AggregationInput,
            Error::NoArtifacts { .. } => ErrorCode::NoArtifacts,

            Error::Catalog { .. } => ErrorCode::CatalogInvalid,
            Error::PersonaNotFound(_) => ErrorCode::PersonaNotFound,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if an advisory call that failed with this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransientService { .. }
                | Error::AdvisoryTimeout { .. }
                | Error::MalformedResponse { .. }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'workshop-pilot config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'workshop-pilot config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),

            Error::IoWrite { .. } => Some(
                "Check that the output directory exists and is writable, or pass --output."
            ),

            Error::TransientService { .. } | Error::AdvisoryTimeout { .. } => Some(
                "The advisory service may be overloaded. Raise 'advisory.timeout_secs' or 'orchestrator.min_call_spacing_ms'."
            ),
            Error::AdvisoryRejected { .. } => Some(
                "Verify 'advisory.api_key' and 'advisory.model', or set PILOT_API_KEY."
            ),

            Error::NoArtifacts { .. } => Some(
                "Run 'workshop-pilot run' first, or point --output at an existing results directory."
            ),

            Error::Catalog { .. } => Some(
                "Stage numbers must start at 1 and increase without gaps. Persona ids must be unique."
            ),
            Error::PersonaNotFound(_) => Some(
                "Run 'workshop-pilot personas' to list the available persona ids."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Error::ConfigValidation { field: Some(field), .. } = self {
            output.push_str(&format!("  Field: {}\n", field));
        }

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Error::TransientService {
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub fn catalog(catalog: &'static str, message: impl Into<String>) -> Self {
        Error::Catalog {
            catalog,
            message: message.into(),
        }
    }

    pub fn aggregation_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::AggregationInput {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
