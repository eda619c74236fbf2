use std::fmt::{Display, Formatter, self};
use std::str::Utf8Error;

/// The closed set of conditions under which a parse fails. Writes into the
/// in-memory buffer chain cannot fail; a content closure that aborts in the
/// middle of a length-delimited write leaves the chain inconsistent and the
/// encoder must be discarded.
#[derive(Debug, PartialEq)]
pub enum ReadError {
    /// The input ended in the middle of a field.
    Truncated,
    /// An embedded message or byte sequence misreported its own size.
    MisreportedSize,
    /// An embedded message or byte sequence claimed to have negative size.
    NegativeSize,
    /// A varint's continuation bits never terminated within the maximum
    /// group count.
    MalformedVarint,
    /// A decoded tag carried field number zero outside the end-of-input case.
    InvalidTag,
    /// An end-group tag did not match the expected tag.
    InvalidEndTag,
    /// A tag carried an unrecognized wire-type code.
    InvalidWireType(u32),
    /// The message nested deeper than the configured recursion limit.
    RecursionLimitExceeded,
    /// A length-delimited value exceeded the configured size limit.
    SizeLimitExceeded,
    /// A string field did not hold valid UTF-8.
    Utf8(Utf8Error),
}

impl From<Utf8Error> for ReadError {
    fn from(e: Utf8Error) -> ReadError {
        ReadError::Utf8(e)
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Utf8(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for ReadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ReadError::Truncated => f.write_str(
                "the input ended unexpectedly in the middle of a field; either the input \
                 has been truncated or an embedded message misreported its own length"),
            ReadError::MisreportedSize => f.write_str(
                "an embedded message or byte sequence misreported its size"),
            ReadError::NegativeSize => f.write_str(
                "an embedded message or byte sequence claimed to have negative size"),
            ReadError::MalformedVarint => f.write_str("encountered a malformed varint"),
            ReadError::InvalidTag => f.write_str("message contained an invalid tag (zero field number)"),
            ReadError::InvalidEndTag => f.write_str("message end-group tag did not match the expected tag"),
            ReadError::InvalidWireType(t) => write!(f, "message tag had invalid wire type {}", t),
            ReadError::RecursionLimitExceeded => f.write_str(
                "message had too many levels of nesting; raise the recursion limit if the input is trusted"),
            ReadError::SizeLimitExceeded => f.write_str(
                "message was too large; raise the size limit if the input is trusted"),
            ReadError::Utf8(e) => write!(f, "string field was not valid UTF-8: {}", e),
        }
    }
}
