use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfOpError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("no valid pages")]
    NoValidPages,

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}
