use crate::document::{Document, Value};
use crate::error::{log_error, Error, Result};
use crate::model::{Movie, MovieList};
use crate::stats::{build_profile, compute_stats, Profile, Stats};
use crate::store::{DocumentStore, Predicate, MOVIE_LISTS};
use crate::users::UserDb;
use log::info;

/// Sub-collection holding the movies of one list.
pub fn movies_path(list_id: &str) -> String {
    format!("{}/{}/movies", MOVIE_LISTS, list_id)
}

pub trait MovieListDb {
    fn create_list(&self, title: &str, description: &str, owner_id: &str) -> Result<String>;
    fn get_list(&self, list_id: &str) -> Result<MovieList>;
    fn lists_owned_by(&self, owner_id: &str) -> Result<Vec<MovieList>>;
    fn movies(&self, list_id: &str) -> Result<Vec<Movie>>;
    fn add_movie(&self, list_id: &str, movie: Document) -> Result<String>;
    fn update_movie(&self, list_id: &str, movie_id: &str, patch: Document) -> Result<()>;
    fn remove_movie(&self, list_id: &str, movie_id: &str) -> Result<()>;
    /// Deletes every movie of the list, then the list itself. A failure part
    /// way through leaves the list with only some of its movies.
    fn delete_list(&self, list_id: &str) -> Result<()>;
    fn follow_list(&self, user_id: &str, list_id: &str) -> Result<()>;
    fn unfollow_list(&self, user_id: &str, list_id: &str) -> Result<()>;

    fn owner_stats(&self, owner_id: &str) -> Result<Stats>;
    fn profile(&self, user_id: &str) -> Result<Profile>;
}

impl<S: DocumentStore> MovieListDb for S {
    fn create_list(&self, title: &str, description: &str, owner_id: &str) -> Result<String> {
        let mut doc = Document::new();
        doc.insert("title".to_owned(), Value::from(title));
        doc.insert("description".to_owned(), Value::from(description));
        doc.insert("ownerId".to_owned(), Value::from(owner_id));
        doc.insert("followers".to_owned(), Value::Array(Vec::new()));
        let id = self
            .create(MOVIE_LISTS, doc)
            .map_err(|err| log_error(err, "Failed to create list"))?;
        info!("{} created list {}", owner_id, id);
        Ok(id)
    }

    fn get_list(&self, list_id: &str) -> Result<MovieList> {
        self.read_document(MOVIE_LISTS, list_id)
            .and_then(|doc| doc.ok_or_else(|| Error::not_found("movie list", list_id)))
            .map(|doc| MovieList::from_document(list_id.to_owned(), &doc))
            .map_err(|err| log_error(err, "Failed to fetch list"))
    }

    fn lists_owned_by(&self, owner_id: &str) -> Result<Vec<MovieList>> {
        Ok(self
            .query(MOVIE_LISTS, &[Predicate::eq("ownerId", owner_id)])
            .map_err(|err| log_error(err, "Failed to fetch lists"))?
            .into_iter()
            .map(|(id, doc)| MovieList::from_document(id, &doc))
            .collect())
    }

    fn movies(&self, list_id: &str) -> Result<Vec<Movie>> {
        Ok(self
            .read_collection(&movies_path(list_id))
            .map_err(|err| log_error(err, "Failed to fetch movies"))?
            .into_iter()
            .map(|(id, doc)| Movie::from_document(id, &doc))
            .collect())
    }

    fn add_movie(&self, list_id: &str, movie: Document) -> Result<String> {
        self.create(&movies_path(list_id), movie)
            .map_err(|err| log_error(err, "Failed to add movie"))
    }

    fn update_movie(&self, list_id: &str, movie_id: &str, patch: Document) -> Result<()> {
        self.update(&movies_path(list_id), movie_id, patch)
            .map_err(|err| log_error(err, "Failed to update movie"))
    }

    fn remove_movie(&self, list_id: &str, movie_id: &str) -> Result<()> {
        self.delete(&movies_path(list_id), movie_id)
            .map_err(|err| log_error(err, "Failed to remove movie"))
    }

    fn delete_list(&self, list_id: &str) -> Result<()> {
        let path = movies_path(list_id);
        let movies = self
            .read_collection(&path)
            .map_err(|err| log_error(err, "Failed to delete list"))?;
        for (movie_id, _) in &movies {
            self.delete(&path, movie_id)
                .map_err(|err| log_error(err, "Failed to delete list"))?;
        }
        self.delete(MOVIE_LISTS, list_id)
            .map_err(|err| log_error(err, "Failed to delete list"))?;
        self.delete_collection(&path)
            .map_err(|err| log_error(err, "Failed to delete list"))?;
        info!("deleted list {} and {} movies", list_id, movies.len());
        Ok(())
    }

    fn follow_list(&self, user_id: &str, list_id: &str) -> Result<()> {
        self.array_union(MOVIE_LISTS, list_id, "followers", Value::from(user_id))
            .map_err(|err| log_error(err, "Failed to follow list"))
    }

    fn unfollow_list(&self, user_id: &str, list_id: &str) -> Result<()> {
        self.array_remove(MOVIE_LISTS, list_id, "followers", Value::from(user_id))
            .map_err(|err| log_error(err, "Failed to unfollow list"))
    }

    fn owner_stats(&self, owner_id: &str) -> Result<Stats> {
        let lists = self.lists_owned_by(owner_id)?;
        compute_stats(&lists, |list_id| self.movies(list_id))
    }

    fn profile(&self, user_id: &str) -> Result<Profile> {
        let lists = self.lists_owned_by(user_id)?;
        let user = self.get_user(user_id)?;
        build_profile(user, &lists, |list_id| self.movies(list_id))
    }
}
