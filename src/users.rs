use crate::error::{log_error, Error, Result};
use crate::model::{Identity, User};
use crate::store::{DocumentStore, USERS};

pub trait UserDb {
    /// Records the identity handed back by the provider. The first sign-in
    /// creates the user, later ones merge the current profile fields into it.
    fn sign_in(&self, identity: &Identity) -> Result<User>;
    fn get_user(&self, id: &str) -> Result<User>;
}

impl<S: DocumentStore> UserDb for S {
    fn sign_in(&self, identity: &Identity) -> Result<User> {
        self.upsert_merge(USERS, &identity.id, identity.to_document())
            .map_err(|err| log_error(err, "Failed to store signed in user"))?;
        log::info!("user {} signed in", identity.id);
        self.get_user(&identity.id)
    }

    fn get_user(&self, id: &str) -> Result<User> {
        self.read_document(USERS, id)
            .and_then(|doc| doc.ok_or_else(|| Error::not_found("user", id)))
            .map(|doc| User::from_document(id.to_owned(), &doc))
            .map_err(|err| log_error(err, "Failed to fetch user"))
    }
}
