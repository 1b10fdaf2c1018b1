use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

pub type Result<T, E = PlanError> = std::result::Result<T, E>;

/// Broad classification of an error.
///
/// Callers match on the kind, the message is for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Structural violation in an encoded buffer: offsets out of range,
    /// truncated input, misaligned fields, invalid utf8.
    CorruptBuffer,
    /// A plan version was present but rejected by the caller's policy.
    UnsupportedVersion,
    /// The builder was driven in an invalid order.
    BuilderMisuse,
    /// Bad argument passed to an api (not buffer content).
    InvalidArgument,
    /// Underlying io failure.
    Io,
    Other,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CorruptBuffer => "corrupt buffer",
            ErrorKind::UnsupportedVersion => "unsupported version",
            ErrorKind::BuilderMisuse => "builder misuse",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Io => "io",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct PlanError {
    inner: Box<PlanErrorInner>,
}

#[derive(Debug)]
struct PlanErrorInner {
    kind: ErrorKind,
    msg: String,
    source: Option<Box<dyn Error + Send + Sync>>,
    fields: Vec<ErrorField>,
    backtrace: Backtrace,
}

#[derive(Debug)]
struct ErrorField {
    key: &'static str,
    value: String,
}

impl PlanError {
    /// Create a new error with the `Other` kind.
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Other, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        PlanError {
            inner: Box::new(PlanErrorInner {
                kind,
                msg: msg.into(),
                source: None,
                fields: Vec::new(),
                backtrace: Backtrace::capture(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::CorruptBuffer, msg)
    }

    pub fn unsupported_version(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::UnsupportedVersion, msg)
    }

    pub fn builder_misuse(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::BuilderMisuse, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::InvalidArgument, msg)
    }

    /// Attach a key/value pair to the error, printed after the message.
    pub fn with_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.inner.fields.push(ErrorField {
            key,
            value: value.to_string(),
        });
        self
    }

    /// Override the kind of this error.
    pub fn kind_of(mut self, kind: ErrorKind) -> Self {
        self.inner.kind = kind;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn is_corrupt(&self) -> bool {
        self.inner.kind == ErrorKind::CorruptBuffer
    }

    pub fn get_msg(&self) -> &str {
        &self.inner.msg
    }

    /// Get the value of a field attached with `with_field`.
    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;

        for field in &self.inner.fields {
            write!(f, ", {}: {}", field.key, field.value)?;
        }

        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }

        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\nBacktrace: {}", self.inner.backtrace)?;
        }

        Ok(())
    }
}

impl Error for PlanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|e| &**e as &(dyn Error + 'static))
    }
}

impl From<std::io::Error> for PlanError {
    fn from(value: std::io::Error) -> Self {
        PlanError::with_source("IO error", Box::new(value)).kind_of(ErrorKind::Io)
    }
}

impl From<std::fmt::Error> for PlanError {
    fn from(value: std::fmt::Error) -> Self {
        PlanError::with_source("Format error", Box::new(value))
    }
}

impl From<std::str::Utf8Error> for PlanError {
    fn from(value: std::str::Utf8Error) -> Self {
        PlanError::with_source("Invalid utf8", Box::new(value)).kind_of(ErrorKind::CorruptBuffer)
    }
}

pub trait ResultExt<T, E> {
    /// Wrap an error with a static context string.
    fn context(self, msg: &'static str) -> Result<T, PlanError>;

    /// Wrap an error with a context string generated from a function.
    fn context_fn<F>(self, f: F) -> Result<T, PlanError>
    where
        F: Fn() -> String;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn context(self, msg: &'static str) -> Result<T, PlanError> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(PlanError::with_source(msg, Box::new(e))),
        }
    }

    fn context_fn<F>(self, f: F) -> Result<T, PlanError>
    where
        F: Fn() -> String,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(PlanError::with_source(f(), Box::new(e))),
        }
    }
}

pub trait OptionExt<T> {
    /// Return an error if the option is None.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(PlanError::new(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_fields() {
        let err = PlanError::corrupt("offset out of bounds")
            .with_field("pos", 12)
            .with_field("len", 8);
        let s = err.to_string();
        assert!(s.starts_with("offset out of bounds, pos: 12, len: 8"), "{s}");
        assert_eq!(ErrorKind::CorruptBuffer, err.kind());
        assert_eq!(Some("12"), err.get_field("pos"));
        assert_eq!(None, err.get_field("missing"));
    }

    #[test]
    fn context_keeps_source() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("disk on fire"));
        let err = res.context("failed to read plan").unwrap_err();
        assert_eq!("failed to read plan", err.get_msg());
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn io_conversion_sets_kind() {
        let err: PlanError = std::io::Error::other("nope").into();
        assert_eq!(ErrorKind::Io, err.kind());
    }

    #[test]
    fn utf8_conversion_is_corruption() {
        let bytes = [0xff, 0xfe];
        let err: PlanError = std::str::from_utf8(&bytes).unwrap_err().into();
        assert!(err.is_corrupt());
    }

    #[test]
    fn required_on_none() {
        let err = None::<u8>.required("missing thing").unwrap_err();
        assert_eq!("missing thing", err.get_msg());
        assert_eq!(ErrorKind::Other, err.kind());
    }
}
