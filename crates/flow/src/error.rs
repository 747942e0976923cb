use thiserror::Error;

/// Failures at the engine boundary: configuration and input files.
///
/// The reconciliation and layout passes themselves never fail.
#[derive(Debug, Error)]
pub enum FlowError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad override, out-of-range layout value, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    #[error("unknown stage: \"{0}\" (expected one of S1, S1.5, S2, S2.5, S3, S3.5, S4, S4.5, S5)")]
    UnknownStage(String),
    #[error("unknown category code: \"{0}\"")]
    UnknownCategory(String),
    /// Missing required column in an input table.
    #[error("{table}: missing column '{column}'")]
    MissingColumn { table: String, column: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
