//! Errors from creating and storing a peer identity.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertgenError {
    /// rcgen refused the parameters, e.g. a hostname that is not a valid DNS name.
    #[error("could not generate peer certificate: {0}")]
    Generation(String),

    #[error("could not write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CertgenError {
    pub(crate) fn write(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Write { path, source }
    }
}
