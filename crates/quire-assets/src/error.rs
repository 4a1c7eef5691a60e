//! Asset pipeline error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Error class of an [`AssetError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing source, uncreatable directory, unwritable destination.
    Io,
    /// External tool could not be launched or exited with failure.
    Tool,
    /// Unsupported or undecodable image format.
    Format,
    /// A pipeline stage produced no usable intermediate.
    Content,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Io => "I/O error",
            Self::Tool => "tool failure",
            Self::Format => "format error",
            Self::Content => "content error",
        })
    }
}

/// Error produced by a single asset operation.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Filesystem operation failed.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// External tool could not be started.
    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// External tool ran but reported failure.
    #[error("{tool} failed ({status}){}", stderr_suffix(.stderr))]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// Source extension is not handled by any transcoder.
    #[error("unsupported image format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Image could not be decoded.
    #[error("cannot decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Image could not be encoded.
    #[error("cannot encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A pipeline stage finished without producing its output file.
    #[error("{stage} produced no usable output at {}", .path.display())]
    MissingOutput { stage: &'static str, path: PathBuf },

    /// Another source of the session already produced this artifact.
    #[error("{} is already produced from {}", .dest.display(), .owner.display())]
    NameCollision { dest: PathBuf, owner: PathBuf },
}

impl AssetError {
    /// Create an I/O error for `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Error class used when reporting.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::Encode { .. } => ErrorKind::Io,
            Self::ToolLaunch { .. } | Self::ToolFailed { .. } => ErrorKind::Tool,
            Self::UnsupportedFormat(_) | Self::Decode { .. } => ErrorKind::Format,
            Self::MissingOutput { .. } | Self::NameCollision { .. } => ErrorKind::Content,
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let io = AssetError::io("a.png", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(
            AssetError::UnsupportedFormat(PathBuf::from("a.bmp")).kind(),
            ErrorKind::Format
        );
        let missing = AssetError::MissingOutput {
            stage: "pdf2svg",
            path: PathBuf::from("formula.svg"),
        };
        assert_eq!(missing.kind(), ErrorKind::Content);
    }

    #[test]
    fn test_tool_failed_message_includes_stderr() {
        let err = AssetError::ToolFailed {
            tool: "pdflatex".to_owned(),
            status: "exit status: 1".to_owned(),
            stderr: "  ! Undefined control sequence.\n".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "pdflatex failed (exit status: 1): ! Undefined control sequence."
        );
    }

    #[test]
    fn test_tool_failed_message_without_stderr() {
        let err = AssetError::ToolFailed {
            tool: "optipng".to_owned(),
            status: "exit status: 2".to_owned(),
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "optipng failed (exit status: 2)");
    }
}
