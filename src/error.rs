use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The instrumentation path itself never surfaces these errors to the loader hook: a class whose
/// method bodies fail validation is handed back unchanged and a warning is logged. Errors are
/// returned from the edges of the crate, i.e. option parsing, snapshot encoding and decoding,
/// and body validation when called directly.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - Inconsistent instruction stream or snapshot bytes
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::NotSupported`] - Unknown snapshot version or feature
///
/// ## Configuration Errors
/// - [`Error::Config`] - Unparsable instrumentation options, reported before any class is processed
///
/// ## Resource Errors
/// - [`Error::ResourceExhausted`] - Memory could not be reserved while encoding a snapshot
/// - [`Error::LockError`] - A per-class trace lock was poisoned
///
/// # Examples
///
/// ```rust
/// use covscope::{Error, instrument::InstrumentationOptions};
///
/// match "strategy=bogus".parse::<InstrumentationOptions>() {
///     Ok(_) => unreachable!(),
///     Err(Error::Config(message)) => eprintln!("bad options: {message}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be processed.
    ///
    /// Raised for method bodies whose labels, switch tables or try/catch ranges are inconsistent,
    /// and for snapshot bytes that do not follow the encoding. The error includes the source
    /// location where the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading a buffer.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This input version or feature is not supported.
    #[error("This input is not supported - {0}")]
    NotSupported(String),

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// The instrumentation options could not be parsed.
    ///
    /// Option strings are checked before the first class is instrumented; continuing with a
    /// half-understood configuration would silently collect nothing.
    #[error("Invalid configuration - {0}")]
    Config(String),

    /// Memory for an output buffer could not be reserved.
    ///
    /// Returned by the snapshot encoder; whatever had been encoded so far is discarded.
    #[error("Resource exhausted - {0}")]
    ResourceExhausted(String),

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,

    /// I/O error reported by a caller-provided sink.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
