use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors surfaced by the script core. Every variant carries enough context
/// for the driver to print a single-line diagnostic; there is no local
/// recovery below the driver.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    #[error("in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("unknown opcode '{mnemonic}' on line {line}")]
    UnknownOpcode { mnemonic: String, line: usize },

    #[error("Label #{id} not found")]
    UnresolvedLabel { id: u16 },

    #[error("EndIf without a matching If on line {line}")]
    UnmatchedEndIf { line: usize },

    #[error("If on line {line} is never closed by an EndIf")]
    UnterminatedIf { line: usize },

    #[error("cannot resolve value '{token}' on line {line}")]
    ValueResolution { token: String, line: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// Attaches a file name to an error that was produced while working on
    /// the contents of `file`, for errors that do not already carry one.
    pub fn in_file(self, file: &str) -> Self {
        match self {
            ScriptError::Parse { message, .. } => ScriptError::Parse {
                file: file.to_string(),
                message,
            },
            other => ScriptError::Parse {
                file: file.to_string(),
                message: other.to_string(),
            },
        }
    }
}
