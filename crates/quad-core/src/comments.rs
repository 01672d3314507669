use std::sync::Arc;

use uuid::Uuid;

use quad_db::Database;
use quad_db::models::CommentRow;
use quad_types::models::Comment;

use crate::error::CoreError;
use crate::{parse_created_at, parse_id};

/// Append and list comments on a post. Comments are immutable once
/// stored; appends are conflict-free (no contended field).
#[derive(Clone)]
pub struct CommentService {
    db: Arc<Database>,
}

impl CommentService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Full snapshot, newest first. Ordered by timestamp, not insertion
    /// order, so a skewed clock still lands in the right place.
    pub fn list(&self, post_id: Uuid) -> Result<Vec<Comment>, CoreError> {
        let rows = self.db.list_comments(&post_id.to_string())?;
        Ok(rows.into_iter().map(comment_from_row).collect())
    }

    /// Append a comment. The id and timestamp are assigned by the store,
    /// and the author's display name is captured at posting time.
    pub fn add(
        &self,
        post_id: Uuid,
        user_id: Option<Uuid>,
        content: &str,
    ) -> Result<Comment, CoreError> {
        let user_id = user_id.ok_or(CoreError::Unauthorized)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::Validation("comment cannot be empty".into()));
        }

        // Commenting requires a completed profile.
        let profile = self
            .db
            .get_profile(&user_id.to_string())?
            .ok_or(CoreError::Unauthorized)?;

        if !self.db.post_exists(&post_id.to_string())? {
            return Err(CoreError::NotFound);
        }

        let id = Uuid::new_v4();
        let row = self.db.insert_comment(
            &id.to_string(),
            &post_id.to_string(),
            &user_id.to_string(),
            &profile.username,
            content,
        )?;

        Ok(comment_from_row(row))
    }
}

fn comment_from_row(row: CommentRow) -> Comment {
    Comment {
        id: parse_id(&row.id, "comment"),
        post_id: parse_id(&row.post_id, "comment post"),
        user_id: parse_id(&row.user_id, "comment author"),
        author_display: row.author_display,
        content: row.content,
        created_at: parse_created_at(&row.created_at, "comment"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_identity, seed_member, seed_post, test_db};

    #[test]
    fn add_stores_trimmed_content_with_author_display() {
        let db = test_db();
        let user = seed_member(&db, "alice");
        let post = seed_post(&db, user, "post");
        let comments = CommentService::new(db);

        let comment = comments
            .add(post, Some(user), "  great question!  ")
            .unwrap();
        assert_eq!(comment.content, "great question!");
        assert_eq!(comment.author_display, "alice");
        assert_eq!(comment.post_id, post);
    }

    #[test]
    fn whitespace_only_comment_is_rejected_without_a_row() {
        let db = test_db();
        let user = seed_member(&db, "alice");
        let post = seed_post(&db, user, "post");
        let comments = CommentService::new(db);

        let err = comments.add(post, Some(user), "   ").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(comments.list(post).unwrap().is_empty());
    }

    #[test]
    fn anonymous_and_profileless_commenters_are_rejected() {
        let db = test_db();
        let member = seed_member(&db, "alice");
        let identity = seed_identity(&db, "new@quad.test");
        let post = seed_post(&db, member, "post");
        let comments = CommentService::new(db);

        let err = comments.add(post, None, "hello").unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));

        let err = comments.add(post, Some(identity), "hello").unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
    }

    #[test]
    fn comment_on_missing_post_is_not_found() {
        let db = test_db();
        let user = seed_member(&db, "alice");
        let comments = CommentService::new(db);

        let err = comments.add(Uuid::new_v4(), Some(user), "hello").unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
    }

    #[test]
    fn list_sorts_by_timestamp_not_insertion_order() {
        let db = test_db();
        let user = seed_member(&db, "alice");
        let post = seed_post(&db, user, "post");
        let comments = CommentService::new(db.clone());

        let first = comments.add(post, Some(user), "first").unwrap();
        let second = comments.add(post, Some(user), "second").unwrap();
        let third = comments.add(post, Some(user), "third").unwrap();

        // Rewrite the stored timestamps: the second comment claims a time
        // before the first (a skewed clock), the third stays newest.
        for (id, ts) in [
            (first.id, "2026-03-01 10:00:00"),
            (second.id, "2026-03-01 09:00:00"),
            (third.id, "2026-03-01 11:00:00"),
        ] {
            db.with_conn(|conn| {
                conn.execute(
                    "UPDATE comments SET created_at = ?1 WHERE id = ?2",
                    (ts, id.to_string()),
                )?;
                Ok(())
            })
            .unwrap();
        }

        let listed = comments.list(post).unwrap();
        let contents: Vec<&str> = listed.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["third", "first", "second"]);
    }
}
