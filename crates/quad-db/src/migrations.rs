use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per identity that finished sign-up by picking a username.
        CREATE TABLE IF NOT EXISTS profiles (
            id          TEXT PRIMARY KEY REFERENCES users(id),
            username    TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            votes       INTEGER NOT NULL DEFAULT 0,
            author_id   TEXT NOT NULL REFERENCES profiles(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);

        CREATE TABLE IF NOT EXISTS tags (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS posts_tags (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            tag_id      INTEGER NOT NULL REFERENCES tags(id),
            position    INTEGER NOT NULL,
            PRIMARY KEY (post_id, tag_id)
        );

        -- Row existence means 'this user has up-voted this post'. The
        -- primary key is the uniqueness guarantee the vote toggle relies on.
        CREATE TABLE IF NOT EXISTS user_votes (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (post_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_user_votes_post
            ON user_votes(post_id);

        CREATE TABLE IF NOT EXISTS comments (
            id              TEXT PRIMARY KEY,
            post_id         TEXT NOT NULL REFERENCES posts(id),
            user_id         TEXT NOT NULL REFERENCES users(id),
            author_display  TEXT NOT NULL,
            content         TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
