use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FileOperation {
    #[error("reading a file")]
    Read,
    #[error("writing a file")]
    Write,
    #[error("creating a directory")]
    Mkdir,
    #[error("removing a directory")]
    Remove,
    #[error("renaming a directory")]
    Rename,
    #[error("walking a directory")]
    Walk,
}
#[derive(Debug, Error, Diagnostic)]
#[error("I/O error: {operation} on path '{path}'")]
#[diagnostic(
    code(sprig::io),
    help("Check file permissions, disk space, or that the path is correct.")
)]
pub struct IoError {
    pub operation: FileOperation,
    pub path: std::path::PathBuf,
    #[source]
    pub source: std::io::Error,
}
impl IoError {
    pub fn new(operation: FileOperation, path: std::path::PathBuf, error: std::io::Error) -> Self {
        Self {
            operation,
            path,
            source: error,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum FileFormat {
    #[error("toml")]
    Toml,
    #[error("json")]
    Json,
}
#[derive(Debug, Error, Diagnostic)]
#[error("Parsing error: {file_format} on '{path}': {message}")]
#[diagnostic(code(sprig::parse), help("Review file"))]
pub struct ParseError {
    pub file_format: FileFormat,
    pub path: std::path::PathBuf,
    pub message: String,
}
impl ParseError {
    pub fn toml(path: std::path::PathBuf, error: toml::de::Error) -> Self {
        Self {
            file_format: FileFormat::Toml,
            path,
            message: error.message().to_string(),
        }
    }

    pub fn json(path: std::path::PathBuf, error: serde_json::Error) -> Self {
        Self {
            file_format: FileFormat::Json,
            path,
            message: error.to_string(),
        }
    }
}
