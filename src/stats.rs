use crate::error::Result;
use crate::model::{Movie, MovieList, User};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Aggregate viewing statistics over a user's lists.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_movies: u64,
    pub total_minutes: i64,
    /// Mean of the positive ratings, one decimal.
    #[serde(serialize_with = "or_not_available")]
    pub average_rating: Option<f64>,
    #[serde(serialize_with = "or_not_available")]
    pub favorite_genre: Option<String>,
}

fn or_not_available<T, S>(value: &Option<T>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(value) => value.serialize(serializer),
        None => serializer.serialize_str("N/A"),
    }
}

#[derive(Default)]
struct Accumulator {
    total_movies: u64,
    total_minutes: i64,
    rating_sum: f64,
    rating_count: u64,
    genres: BTreeMap<String, u64>,
}

impl Accumulator {
    fn add(&mut self, movie: &Movie) {
        self.total_movies += 1;
        self.total_minutes = self.total_minutes.saturating_add(movie.duration);
        if movie.rating > 0.0 {
            self.rating_sum += movie.rating;
            self.rating_count += 1;
        }
        if let Some(genre) = movie.genre.as_ref().filter(|g| !g.is_empty()) {
            *self.genres.entry(genre.clone()).or_insert(0) += 1;
        }
    }

    fn finish(self) -> Stats {
        let average_rating = if self.rating_count == 0 {
            None
        } else {
            Some(round_one_decimal(self.rating_sum / self.rating_count as f64))
        };
        // BTreeMap iterates in name order and only a strictly greater count
        // replaces the current pick, so ties go to the smallest name.
        let mut favorite: Option<(&String, u64)> = None;
        for (genre, &count) in &self.genres {
            if favorite.map_or(true, |(_, best)| count > best) {
                favorite = Some((genre, count));
            }
        }
        Stats {
            total_movies: self.total_movies,
            total_minutes: self.total_minutes,
            average_rating,
            favorite_genre: favorite.map(|(genre, _)| genre.clone()),
        }
    }
}

fn round_one_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Fetches the movies of every list, one list at a time, and folds them into
/// [`Stats`]. The first fetch error aborts the computation.
pub fn compute_stats<F>(lists: &[MovieList], mut fetch_movies: F) -> Result<Stats>
where
    F: FnMut(&str) -> Result<Vec<Movie>>,
{
    let mut acc = Accumulator::default();
    for list in lists {
        for movie in fetch_movies(&list.id)? {
            acc.add(&movie);
        }
    }
    Ok(acc.finish())
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub movie_count: usize,
    pub follower_count: usize,
}

/// Everything the profile page shows for one user.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub user: User,
    pub lists: Vec<ListSummary>,
    pub stats: Stats,
}

/// Like [`compute_stats`] but also keeps a per-list summary, fetching each
/// list's movies only once.
pub fn build_profile<F>(user: User, lists: &[MovieList], mut fetch_movies: F) -> Result<Profile>
where
    F: FnMut(&str) -> Result<Vec<Movie>>,
{
    let mut acc = Accumulator::default();
    let mut summaries = Vec::with_capacity(lists.len());
    for list in lists {
        let movies = fetch_movies(&list.id)?;
        movies.iter().for_each(|movie| acc.add(movie));
        summaries.push(ListSummary {
            id: list.id.clone(),
            title: list.title.clone(),
            description: list.description.clone(),
            movie_count: movies.len(),
            follower_count: list.followers.len(),
        });
    }
    Ok(Profile {
        user,
        lists: summaries,
        stats: acc.finish(),
    })
}
