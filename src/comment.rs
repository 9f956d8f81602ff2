use serde::Deserialize;
use validator::Validate;

use crate::error::{Result, SyncError};

/// Columns of the `comments` table, in insert order.
pub const COLUMNS: [&str; 5] = ["post_id", "id", "name", "email", "body"];

/// A comment as served by the upstream api, about to be inserted in the
/// database.
#[derive(Debug, Clone, PartialEq, Eq, Validate, Deserialize)]
pub struct Comment {
    /// The post this comment belongs to.
    #[serde(rename = "postId")]
    pub post_id: i32,
    /// Upstream id, reused as our primary key.
    pub id: i32,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub body: String,
}

/// Decode one page of comments and check every record.
///
/// `offset` is only used to give errors some context.
pub fn decode_page(offset: u64, raw: &[u8]) -> Result<Vec<Comment>> {
    let comments: Vec<Comment> =
        serde_json::from_slice(raw).map_err(|source| SyncError::Decode { offset, source })?;

    for (index, comment) in comments.iter().enumerate() {
        comment
            .validate()
            .map_err(|source| SyncError::Invalid {
                offset,
                index,
                source,
            })?;
    }

    Ok(comments)
}
