use thiserror::Error;

/// Errors raised while converting a document to HTML.
///
/// The HTTP layer answers any of these with an empty `content` string. A
/// conversion that outlives its deadline is answered with a 500 before its
/// result is seen. Callers that need to tell "empty document" apart from
/// "parse failed" keep the `Result`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("not an OOXML package: {0}")]
    InvalidArchive(String),

    #[error("missing package part {0}")]
    MissingPart(String),

    #[error("malformed {part}: {reason}")]
    Malformed { part: String, reason: String },

    #[error("conversion cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn malformed(part: &str, reason: impl Into<String>) -> Self {
        Error::Malformed {
            part: part.to_string(),
            reason: reason.into(),
        }
    }
}
