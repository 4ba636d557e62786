use crate::document::{Document, Value};
use crate::error::{log_error, Result};
use crate::model::{Friend, FriendEdge, User};
use crate::store::{DocumentStore, Predicate, FRIENDS, USERS};
use crate::users::UserDb;
use log::{debug, info};

/// Upper bound appended to a prefix for "starts with" range queries.
pub const PREFIX_SENTINEL: char = '\u{f8ff}';

pub trait CommunityDb {
    fn list_friends(&self, user_id: &str) -> Result<Vec<Friend>>;
    /// Returns the id of the edge from `user_id` to `friend_id`, inserting it
    /// only if no such edge exists yet.
    ///
    /// The existence check and the insert are separate store calls, so two
    /// concurrent calls for the same pair can both insert.
    fn add_friend(&self, user_id: &str, friend_id: &str) -> Result<String>;
    fn remove_friend(&self, edge_id: &str) -> Result<()>;
    /// Case sensitive "display name starts with" search. An empty prefix
    /// matches nobody.
    fn search_users(&self, prefix: &str) -> Result<Vec<User>>;
}

fn edges_from<S: DocumentStore>(
    store: &S,
    user_id: &str,
    friend_id: Option<&str>,
) -> Result<Vec<FriendEdge>> {
    let mut predicates = vec![Predicate::eq("userId", user_id)];
    if let Some(friend_id) = friend_id {
        predicates.push(Predicate::eq("friendId", friend_id));
    }
    Ok(store
        .query(FRIENDS, &predicates)?
        .into_iter()
        .map(|(id, doc)| FriendEdge::from_document(id, &doc))
        .collect())
}

impl<S: DocumentStore> CommunityDb for S {
    fn list_friends(&self, user_id: &str) -> Result<Vec<Friend>> {
        let edges =
            edges_from(self, user_id, None).map_err(|err| log_error(err, "Failed to fetch friends"))?;
        let mut friends = Vec::with_capacity(edges.len());
        for edge in edges {
            match self.read_document(USERS, &edge.friend_id) {
                Ok(Some(doc)) => friends.push(Friend {
                    user: User::from_document(edge.friend_id, &doc),
                    edge_id: edge.id,
                }),
                Ok(None) => debug!("dropping edge {} to missing user {}", edge.id, edge.friend_id),
                Err(err) => return Err(log_error(err, "Failed to fetch friends")),
            }
        }
        Ok(friends)
    }

    fn add_friend(&self, user_id: &str, friend_id: &str) -> Result<String> {
        let existing = edges_from(self, user_id, Some(friend_id))
            .map_err(|err| log_error(err, "Failed to add friend"))?;
        if let Some(edge) = existing.into_iter().next() {
            debug!("{} already knows {}", user_id, friend_id);
            return Ok(edge.id);
        }
        let mut doc = Document::new();
        doc.insert("userId".to_owned(), Value::from(user_id));
        doc.insert("friendId".to_owned(), Value::from(friend_id));
        let id = self
            .create(FRIENDS, doc)
            .map_err(|err| log_error(err, "Failed to add friend"))?;
        info!("{} added friend {}", user_id, friend_id);
        Ok(id)
    }

    fn remove_friend(&self, edge_id: &str) -> Result<()> {
        self.delete(FRIENDS, edge_id)
            .map_err(|err| log_error(err, "Failed to remove friend"))?;
        info!("removed friendship {}", edge_id);
        Ok(())
    }

    fn search_users(&self, prefix: &str) -> Result<Vec<User>> {
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let mut upper = prefix.to_owned();
        upper.push(PREFIX_SENTINEL);
        let mut users: Vec<User> = self
            .query(USERS, &[Predicate::range("displayName", prefix, upper)])
            .map_err(|err| log_error(err, "Failed to search users"))?
            .into_iter()
            .map(|(id, doc)| User::from_document(id, &doc))
            .collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

/// Resolves a friend id to its user before linking, so that edges are never
/// created towards unknown users.
pub fn befriend<S: DocumentStore>(store: &S, user_id: &str, friend_id: &str) -> Result<String> {
    store.get_user(friend_id)?;
    store.add_friend(user_id, friend_id)
}
