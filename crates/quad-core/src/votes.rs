use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use quad_db::Database;

use crate::error::CoreError;

/// New state after a toggle. `votes` is re-read from the post row after
/// the mutation, so concurrent voters are reflected rather than a count
/// computed caller-side.
#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub voted: bool,
    pub votes: i64,
}

/// Flips one user's vote on one post. The vote relation and the post's
/// denormalized counter move together in a single transaction; the
/// (post_id, user_id) uniqueness constraint is the only cross-process
/// guard, and a constraint hit on insert reads as "already voted".
#[derive(Clone)]
pub struct VoteService {
    db: Arc<Database>,
}

impl VoteService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Toggle the vote for `user_id` on `post_id`. Anonymous callers get
    /// `Unauthorized` and nothing is written.
    pub fn toggle(&self, post_id: Uuid, user_id: Option<Uuid>) -> Result<VoteOutcome, CoreError> {
        let user_id = user_id.ok_or(CoreError::Unauthorized)?;

        let (voted, votes) = self
            .db
            .toggle_vote(&post_id.to_string(), &user_id.to_string())?
            .ok_or(CoreError::NotFound)?;

        debug!(
            "Vote toggled on {} by {}: voted={} votes={}",
            post_id, user_id, voted, votes
        );
        Ok(VoteOutcome { voted, votes })
    }

    /// Existence check used by the detail view at mount.
    pub fn has_voted(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, CoreError> {
        Ok(self
            .db
            .has_vote(&post_id.to_string(), &user_id.to_string())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_member, seed_post, test_db};

    #[test]
    fn toggle_flips_state_and_counter_together() {
        let db = test_db();
        let user = seed_member(&db, "alice");
        let post = seed_post(&db, user, "post");
        let votes = VoteService::new(db.clone());

        let on = votes.toggle(post, Some(user)).unwrap();
        assert!(on.voted);
        assert_eq!(on.votes, 1);
        assert_eq!(db.count_votes(&post.to_string()).unwrap(), 1);
        assert!(votes.has_voted(post, user).unwrap());

        let off = votes.toggle(post, Some(user)).unwrap();
        assert!(!off.voted);
        assert_eq!(off.votes, 0);
        assert_eq!(db.count_votes(&post.to_string()).unwrap(), 0);
        assert!(!votes.has_voted(post, user).unwrap());
    }

    #[test]
    fn at_most_one_vote_row_per_user_and_post() {
        let db = test_db();
        let user = seed_member(&db, "alice");
        let post = seed_post(&db, user, "post");
        let votes = VoteService::new(db.clone());

        for _ in 0..5 {
            votes.toggle(post, Some(user)).unwrap();
            assert!(db.count_votes(&post.to_string()).unwrap() <= 1);
        }

        // The relation itself rejects a duplicate row outright.
        let bob = seed_member(&db, "bob");
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_votes (post_id, user_id) VALUES (?1, ?2)",
                (post.to_string(), bob.to_string()),
            )?;
            Ok(())
        })
        .unwrap();
        let err = db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO user_votes (post_id, user_id) VALUES (?1, ?2)",
                    (post.to_string(), bob.to_string()),
                )?;
                Ok(())
            })
            .unwrap_err();
        assert!(quad_db::queries::is_constraint_error(&err));
    }

    #[test]
    fn toggle_pair_returns_to_original_count() {
        let db = test_db();
        let author = seed_member(&db, "author");
        let post = seed_post(&db, author, "post");
        let votes = VoteService::new(db.clone());

        // Five other members push the count to 5 first.
        for i in 0..5 {
            let other = seed_member(&db, &format!("member{}", i));
            votes.toggle(post, Some(other)).unwrap();
        }

        let user = seed_member(&db, "alice");
        let on = votes.toggle(post, Some(user)).unwrap();
        assert!(on.voted);
        assert_eq!(on.votes, 6);

        let off = votes.toggle(post, Some(user)).unwrap();
        assert!(!off.voted);
        assert_eq!(off.votes, 5);
    }

    #[test]
    fn anonymous_toggle_is_rejected_without_mutation() {
        let db = test_db();
        let author = seed_member(&db, "author");
        let post = seed_post(&db, author, "post");
        let votes = VoteService::new(db.clone());
        votes.toggle(post, Some(author)).unwrap();

        let err = votes.toggle(post, None).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
        assert_eq!(db.count_votes(&post.to_string()).unwrap(), 1);
        assert_eq!(
            db.get_post(&post.to_string()).unwrap().unwrap().votes,
            1
        );
    }

    #[test]
    fn toggle_on_missing_post_is_not_found() {
        let db = test_db();
        let user = seed_member(&db, "alice");
        let votes = VoteService::new(db);

        let err = votes.toggle(Uuid::new_v4(), Some(user)).unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
    }

    #[test]
    fn counter_never_goes_negative() {
        let db = test_db();
        let user = seed_member(&db, "alice");
        let post = seed_post(&db, user, "post");
        let votes = VoteService::new(db.clone());

        // A vote row written without its counter increment (the drifted
        // state an interrupted two-step writer would leave behind).
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_votes (post_id, user_id) VALUES (?1, ?2)",
                (post.to_string(), user.to_string()),
            )?;
            Ok(())
        })
        .unwrap();

        let off = votes.toggle(post, Some(user)).unwrap();
        assert!(!off.voted);
        assert_eq!(off.votes, 0);
    }

    #[test]
    fn votes_from_different_users_are_independent() {
        let db = test_db();
        let alice = seed_member(&db, "alice");
        let bob = seed_member(&db, "bob");
        let post = seed_post(&db, alice, "post");
        let votes = VoteService::new(db.clone());

        votes.toggle(post, Some(alice)).unwrap();
        let outcome = votes.toggle(post, Some(bob)).unwrap();
        assert_eq!(outcome.votes, 2);

        // Alice un-voting leaves Bob's vote intact.
        let outcome = votes.toggle(post, Some(alice)).unwrap();
        assert!(!outcome.voted);
        assert_eq!(outcome.votes, 1);
        assert!(votes.has_voted(post, bob).unwrap());
    }
}
