use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use quad_db::Database;
use quad_db::models::PostRow;
use quad_types::models::Post;

use crate::error::CoreError;
use crate::{parse_created_at, parse_id};

/// Read and authoring access to posts. Results are never cached between
/// calls; every fetch reflects the latest stored state.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<Database>,
}

impl PostRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Single post joined with author username and ordered tag names.
    pub fn fetch_by_id(&self, post_id: Uuid) -> Result<Post, CoreError> {
        let id = post_id.to_string();
        let row = self.db.get_post(&id)?.ok_or(CoreError::NotFound)?;
        let tags = self.db.get_post_tags(&id)?;
        Ok(post_from_row(row, tags))
    }

    /// Feed snapshot: all posts newest first, with authors and tags.
    pub fn list(&self) -> Result<Vec<Post>, CoreError> {
        let rows = self.db.list_posts()?;

        let post_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut tag_map: HashMap<String, Vec<String>> = HashMap::new();
        for (post_id, name) in self.db.get_tags_for_posts(&post_ids)? {
            tag_map.entry(post_id).or_default().push(name);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let tags = tag_map.remove(&row.id).unwrap_or_default();
                post_from_row(row, tags)
            })
            .collect())
    }

    /// Create a post with its tags. Tag order follows the argument order;
    /// unknown tag names are created on the fly.
    pub fn create(
        &self,
        author_id: Uuid,
        title: &str,
        content: &str,
        tags: &[String],
    ) -> Result<Post, CoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("title cannot be empty".into()));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::Validation("content cannot be empty".into()));
        }

        let post_id = Uuid::new_v4();
        self.db.insert_post(
            &post_id.to_string(),
            title,
            content,
            &author_id.to_string(),
            tags,
        )?;

        self.fetch_by_id(post_id)
    }
}

fn post_from_row(row: PostRow, tags: Vec<String>) -> Post {
    Post {
        id: parse_id(&row.id, "post"),
        title: row.title,
        content: row.content,
        votes: row.votes,
        author_id: parse_id(&row.author_id, "post author"),
        author_username: row.author_username,
        created_at: parse_created_at(&row.created_at, "post"),
        tags,
    }
}
