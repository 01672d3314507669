/// Database row types: these map directly to SQLite rows.
/// Distinct from quad-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub votes: i64,
    pub author_id: String,
    pub author_username: String,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub author_display: String,
    pub content: String,
    pub created_at: String,
}
