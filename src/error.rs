//! Everything that can abort a sync run.
use reqwest::StatusCode;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// A fatal sync failure. Page-scoped variants carry the offset of the page
/// being processed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("could not load environment")]
    Config {
        #[source]
        source: dotenv::Error,
    },

    #[error("could not connect to db, tried {target}")]
    Connect {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("fetching page at offset {offset} failed")]
    Transport {
        offset: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code {status} for page at offset {offset}")]
    Status { offset: u64, status: StatusCode },

    #[error("decoding page at offset {offset} failed")]
    Decode {
        offset: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {index} of page at offset {offset} is invalid")]
    Invalid {
        offset: u64,
        index: usize,
        source: ValidationErrors,
    },

    #[error("starting transaction for batch at offset {offset} failed")]
    Begin {
        offset: u64,
        #[source]
        source: sqlx::Error,
    },

    #[error("building insert for batch at offset {offset} failed: {reason}")]
    Build { offset: u64, reason: String },

    #[error("executing insert for batch at offset {offset} failed")]
    Execute {
        offset: u64,
        #[source]
        source: sqlx::Error,
    },

    #[error("committing batch at offset {offset} failed")]
    Commit {
        offset: u64,
        #[source]
        source: sqlx::Error,
    },
}

impl SyncError {
    /// Offset of the page the error belongs to, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            SyncError::Config { .. } | SyncError::Connect { .. } => None,
            SyncError::Transport { offset, .. }
            | SyncError::Status { offset, .. }
            | SyncError::Decode { offset, .. }
            | SyncError::Invalid { offset, .. }
            | SyncError::Begin { offset, .. }
            | SyncError::Build { offset, .. }
            | SyncError::Execute { offset, .. }
            | SyncError::Commit { offset, .. } => Some(*offset),
        }
    }

    /// The one line logged when a run aborts: the whole cause chain, plus
    /// where the cursor stood.
    pub fn report(self) -> String {
        let offset = self.offset();
        let err = anyhow::Error::new(self).context("comment sync failed");
        match offset {
            Some(offset) => format!(
                "{:#} (aborted at offset {}, earlier batches stay committed)",
                err, offset
            ),
            None => format!("{:#}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::SyncError;

    #[test]
    fn report_names_the_offset_once() {
        let err = SyncError::Status {
            offset: 100,
            status: StatusCode::BAD_GATEWAY,
        };

        assert_eq!(
            err.report(),
            "comment sync failed: unexpected status code 502 Bad Gateway for page at offset 100 \
             (aborted at offset 100, earlier batches stay committed)"
        );
    }

    #[test]
    fn report_includes_the_cause() {
        let source = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let cause = source.to_string();
        let err = SyncError::Decode { offset: 0, source };

        let report = err.report();
        assert!(report.starts_with("comment sync failed: decoding page at offset 0 failed: "));
        assert!(report.contains(&cause));
        assert_eq!(report.matches("aborted at offset").count(), 1);
    }
}
