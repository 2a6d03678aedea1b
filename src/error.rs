use thiserror::Error;

macro_rules! malformed_error {
    // Single string version, inline format captures included
    ($msg:expr) => {
        crate::Error::Malformed {
            message: format!($msg),
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
/// This enum covers all possible error conditions that can occur while opening disc images and
/// walking their filesystems. Each variant provides specific context about the failure mode to
/// enable appropriate error handling.
///
/// # Error Categories
///
/// ## Image Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid filesystem structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the image boundaries
/// - [`Error::NotSupported`] - No recognizable filesystem on the image
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Host filesystem I/O errors
///
/// ## Structural Limits
/// - [`Error::RecursionLimit`] - Maximum chain or nesting depth exceeded
///
/// # Examples
///
/// ```rust,no_run
/// use discscope::{DiscImage, Error};
/// use std::path::Path;
///
/// match DiscImage::open(Path::new("image.iso")) {
///     Ok(image) => {
///         println!("Opened disc image");
///     }
///     Err(Error::NotSupported) => {
///         eprintln!("No ISO 9660 or UDF filesystem found");
///     }
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed image: {} ({}:{})", message, file, line);
///     }
///     Err(Error::FileError(io_err)) => {
///         eprintln!("I/O error: {}", io_err);
///     }
///     Err(e) => {
///         eprintln!("Other error: {}", e);
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The image is damaged and could not be parsed.
    ///
    /// This error indicates that a filesystem structure on the image is corrupted or does not
    /// conform to ECMA-119 / ECMA-167. The error includes the source location where the
    /// malformation was detected for debugging purposes.
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

    /// An out of bound access was attempted while parsing the image.
    ///
    /// This error occurs when trying to read data beyond the end of the image or of a
    /// descriptor. It's a safety check to prevent buffer overruns during parsing.
    #[error("Out of bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// No supported filesystem was found on the image.
    ///
    /// Indicates that the input carries neither a valid ISO 9660 volume descriptor nor a UDF
    /// anchor, or uses features that are not implemented in this library.
    #[error("This image type is not supported")]
    NotSupported,

    /// Provided input was empty.
    ///
    /// This error occurs when an empty file or buffer is provided where actual disc image
    /// data was expected.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur during host file operations such as reading
    /// from disk, permission issues, or filesystem errors.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories or for wrapping external
    /// failures with additional context.
    #[error("{0}")]
    Error(String),

    /// Recursion or chain limit reached.
    ///
    /// Rock Ridge continuation areas and directory nesting are bounded to protect against
    /// crafted images with cyclic references. This error indicates that limit was exceeded.
    ///
    /// The associated value shows the limit that was reached.
    #[error("Reached the maximum chain length allowed - {0}")]
    RecursionLimit(usize),
}
