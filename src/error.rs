use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Newick parse error at byte {offset}: {message}")]
    Newick { offset: usize, message: String },

    #[error("{path:?}: {source}")]
    TreeFile {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("{path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("no tree files matching {stem}_<N>.tree in {dir:?}")]
    NoTrees { dir: PathBuf, stem: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv {
            path: path.into(),
            source,
        }
    }
}
