use crate::Database;
use crate::models::{CommentRow, PostRow, ProfileRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                (id, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Profiles --

    pub fn create_profile(&self, id: &str, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, username) VALUES (?1, ?2)",
                (id, username),
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, username, created_at FROM profiles WHERE id = ?1")?;

            let row = stmt
                .query_row([id], |row| {
                    Ok(ProfileRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    // -- Posts --

    /// Insert a post and its tag links in one transaction. Tag names are
    /// created on first use; link order preserves the argument order.
    pub fn insert_post(
        &self,
        id: &str,
        title: &str,
        content: &str,
        author_id: &str,
        tags: &[String],
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO posts (id, title, content, author_id) VALUES (?1, ?2, ?3, ?4)",
                (id, title, content, author_id),
            )?;

            for (position, name) in tags.iter().enumerate() {
                tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [name])?;
                let tag_id: i64 =
                    tx.query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| {
                        row.get(0)
                    })?;
                tx.execute(
                    "INSERT INTO posts_tags (post_id, tag_id, position) VALUES (?1, ?2, ?3)",
                    rusqlite::params![id, tag_id, position as i64],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.title, p.content, p.votes, p.author_id, pr.username, p.created_at
                 FROM posts p
                 JOIN profiles pr ON p.author_id = pr.id
                 WHERE p.id = ?1",
            )?;

            let row = stmt.query_row([id], map_post_row).optional()?;
            Ok(row)
        })
    }

    /// Tag names for one post, in the order they were attached.
    pub fn get_post_tags(&self, post_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.name FROM posts_tags pt
                 JOIN tags t ON pt.tag_id = t.id
                 WHERE pt.post_id = ?1
                 ORDER BY pt.position",
            )?;

            let rows = stmt
                .query_map([post_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(rows)
        })
    }

    pub fn list_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.title, p.content, p.votes, p.author_id, pr.username, p.created_at
                 FROM posts p
                 JOIN profiles pr ON p.author_id = pr.id
                 ORDER BY p.created_at DESC, p.id DESC",
            )?;

            let rows = stmt
                .query_map([], map_post_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Batch-fetch tag names for a set of post IDs, ordered per post.
    pub fn get_tags_for_posts(&self, post_ids: &[String]) -> Result<Vec<(String, String)>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT pt.post_id, t.name FROM posts_tags pt
                 JOIN tags t ON pt.tag_id = t.id
                 WHERE pt.post_id IN ({})
                 ORDER BY pt.post_id, pt.position",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = post_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Votes --

    /// Toggle a vote: removes the row and decrements the post counter if it
    /// exists, inserts and increments otherwise, all in one transaction.
    /// Returns `None` when the post does not exist, otherwise
    /// `(voted, votes)` with the counter re-read after the mutation.
    ///
    /// An insert racing a second process sharing this database file loses
    /// to the (post_id, user_id) primary key; that constraint hit is
    /// absorbed as "already voted" rather than surfaced.
    pub fn toggle_vote(&self, post_id: &str, user_id: &str) -> Result<Option<(bool, i64)>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            let post_exists: Option<i64> = tx
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if post_exists.is_none() {
                return Ok(None);
            }

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM user_votes WHERE post_id = ?1 AND user_id = ?2",
                    [post_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            let voted = if existing.is_some() {
                tx.execute(
                    "DELETE FROM user_votes WHERE post_id = ?1 AND user_id = ?2",
                    [post_id, user_id],
                )?;
                // The counter stays non-negative even from a drifted state.
                tx.execute(
                    "UPDATE posts SET votes = MAX(votes - 1, 0) WHERE id = ?1",
                    [post_id],
                )?;
                false
            } else {
                match tx.execute(
                    "INSERT INTO user_votes (post_id, user_id) VALUES (?1, ?2)",
                    [post_id, user_id],
                ) {
                    Ok(_) => {
                        tx.execute(
                            "UPDATE posts SET votes = votes + 1 WHERE id = ?1",
                            [post_id],
                        )?;
                    }
                    // Concurrent double-submission: the row is already
                    // there, so the end state is simply "voted".
                    Err(e) if is_unique_violation(&e) => {}
                    Err(e) => return Err(e.into()),
                }
                true
            };

            let votes: i64 =
                tx.query_row("SELECT votes FROM posts WHERE id = ?1", [post_id], |row| {
                    row.get(0)
                })?;

            tx.commit()?;
            Ok(Some((voted, votes)))
        })
    }

    pub fn has_vote(&self, post_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM user_votes WHERE post_id = ?1 AND user_id = ?2",
                    [post_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(existing.is_some())
        })
    }

    pub fn count_votes(&self, post_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM user_votes WHERE post_id = ?1",
                [post_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Comments --

    /// Insert a comment and return the stored row, so the caller sees the
    /// server-assigned timestamp rather than one computed client-side.
    pub fn insert_comment(
        &self,
        id: &str,
        post_id: &str,
        user_id: &str,
        author_display: &str,
        content: &str,
    ) -> Result<CommentRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, user_id, author_display, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, post_id, user_id, author_display, content),
            )?;

            let row = conn.query_row(
                "SELECT id, post_id, user_id, author_display, content, created_at
                 FROM comments WHERE id = ?1",
                [id],
                map_comment_row,
            )?;

            Ok(row)
        })
    }

    /// Full snapshot of a post's comments, newest first. Ordering is by
    /// timestamp (id as tiebreaker), never by insertion order.
    pub fn list_comments(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, user_id, author_display, content, created_at
                 FROM comments
                 WHERE post_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;

            let rows = stmt
                .query_map([post_id], map_comment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn post_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;

            Ok(existing.is_some())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, password, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_post_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        votes: row.get(3)?,
        author_id: row.get(4)?,
        author_username: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_comment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        author_display: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// True when the error is a UNIQUE or PRIMARY KEY constraint hit.
/// Foreign key violations are deliberately not matched; those are real
/// errors, not duplicate rows.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Same check through an `anyhow` chain, for callers above the db layer.
pub fn is_constraint_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<rusqlite::Error>()
        .is_some_and(is_unique_violation)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
