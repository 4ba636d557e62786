//! Request payloads and the checks applied to them before anything reaches
//! the store: required fields, rating, year and duration clamping.

use crate::document::{Document, Value};
use crate::error::{Error, Result};
use crate::model::Genre;
use serde::Deserialize;
use unic_ucd_category::GeneralCategory;

pub const MAX_RATING: f64 = 10.0;
/// Minutes. Keeps the per-user total far away from `i64::MAX`.
pub const MAX_DURATION: f64 = 100_000.0;

pub fn is_text_character(c: char) -> bool {
    let category = GeneralCategory::of(c);
    category.is_number() || category.is_letter() || category == GeneralCategory::PrivateUse
}

/// True if `s` has no letter or number in it.
pub fn is_blank(s: &str) -> bool {
    !s.chars().any(is_text_character)
}

pub fn clamp_rating(rating: f64) -> f64 {
    rating.max(0.0).min(MAX_RATING)
}

pub fn clamp_year(year: f64, current_year: i32) -> i64 {
    year.max(0.0).min(f64::from(current_year)) as i64
}

pub fn clamp_duration(duration: f64) -> f64 {
    duration.max(0.0).min(MAX_DURATION).trunc()
}

pub fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}

fn required(field: &'static str, value: &str) -> Result<()> {
    if is_blank(value) {
        Err(Error::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

fn optional_text(doc: &mut Document, field: &str, value: &Option<String>) {
    if let Some(value) = value {
        doc.insert(field.to_owned(), Value::from(value.as_str()));
    }
}

#[derive(Deserialize, Debug)]
pub struct ListForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl ListForm {
    pub fn validate(&self) -> Result<()> {
        required("title", &self.title)
    }
}

/// A movie as typed into the add form. Numeric inputs are accepted as
/// numbers or numeric strings.
#[derive(Deserialize, Debug)]
pub struct MovieForm {
    pub title: String,
    pub genre: Option<Genre>,
    #[serde(default)]
    pub rating: serde_json::Value,
    #[serde(default)]
    pub year: serde_json::Value,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub duration: serde_json::Value,
    #[serde(default)]
    pub comment: Option<String>,
}

impl MovieForm {
    /// Validates the form and turns it into the document stored under the list.
    pub fn into_document(self, current_year: i32) -> Result<Document> {
        required("title", &self.title)?;
        let genre = self
            .genre
            .ok_or_else(|| Error::Validation("genre is required".to_owned()))?;
        let year = clamp_year(Value::from(self.year).as_number(), current_year);
        if year == 0 {
            return Err(Error::Validation("year is required".to_owned()));
        }

        let mut doc = Document::new();
        doc.insert("title".to_owned(), Value::from(self.title));
        doc.insert(
            "rating".to_owned(),
            Value::Number(clamp_rating(Value::from(self.rating).as_number())),
        );
        doc.insert("genre".to_owned(), Value::from(genre.as_str()));
        doc.insert("year".to_owned(), Value::from(year));
        doc.insert(
            "duration".to_owned(),
            Value::Number(clamp_duration(Value::from(self.duration).as_number())),
        );
        optional_text(&mut doc, "country", &self.country);
        optional_text(&mut doc, "comment", &self.comment);
        Ok(doc)
    }
}

/// Partial movie update. Absent fields are left untouched.
#[derive(Deserialize, Debug, Default)]
pub struct MoviePatch {
    pub title: Option<String>,
    pub genre: Option<Genre>,
    pub rating: Option<serde_json::Value>,
    pub year: Option<serde_json::Value>,
    pub country: Option<String>,
    pub duration: Option<serde_json::Value>,
    pub comment: Option<String>,
}

impl MoviePatch {
    pub fn into_document(self, current_year: i32) -> Result<Document> {
        let mut doc = Document::new();
        if let Some(title) = self.title {
            required("title", &title)?;
            doc.insert("title".to_owned(), Value::from(title));
        }
        if let Some(genre) = self.genre {
            doc.insert("genre".to_owned(), Value::from(genre.as_str()));
        }
        if let Some(rating) = self.rating {
            let rating = clamp_rating(Value::from(rating).as_number());
            doc.insert("rating".to_owned(), Value::Number(rating));
        }
        if let Some(year) = self.year {
            let year = clamp_year(Value::from(year).as_number(), current_year);
            doc.insert("year".to_owned(), Value::from(year));
        }
        if let Some(duration) = self.duration {
            doc.insert(
                "duration".to_owned(),
                Value::Number(clamp_duration(Value::from(duration).as_number())),
            );
        }
        optional_text(&mut doc, "country", &self.country);
        optional_text(&mut doc, "comment", &self.comment);
        Ok(doc)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FriendForm {
    pub friend_id: String,
}

#[derive(Deserialize, Debug)]
pub struct SearchParams {
    #[serde(default)]
    pub prefix: String,
}
