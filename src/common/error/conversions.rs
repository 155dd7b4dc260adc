//! Error conversion implementations.
//!
//! Entry streams implement [`std::io::Read`], so errors found while walking a
//! chain lazily have to travel back out as [`std::io::Error`].

use super::types::Error;
use std::io;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
