use crate::document::{number_field, text_field, Document, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the identity provider hands back after a successful sign-in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl Identity {
    /// Only the fields the provider actually supplied, so merging never
    /// blanks out a stored value.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("displayName".to_owned(), Value::from(self.display_name.as_str()));
        if let Some(email) = &self.email {
            doc.insert("email".to_owned(), Value::from(email.as_str()));
        }
        if let Some(photo_url) = &self.photo_url {
            doc.insert("photoURL".to_owned(), Value::from(photo_url.as_str()));
        }
        doc
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl User {
    pub fn from_document(id: String, doc: &Document) -> Self {
        User {
            id,
            display_name: text_field(doc, "displayName").unwrap_or_default(),
            email: text_field(doc, "email"),
            photo_url: text_field(doc, "photoURL"),
        }
    }
}

/// Directed "user knows friend" edge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FriendEdge {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
}

impl FriendEdge {
    pub fn from_document(id: String, doc: &Document) -> Self {
        FriendEdge {
            id,
            user_id: text_field(doc, "userId").unwrap_or_default(),
            friend_id: text_field(doc, "friendId").unwrap_or_default(),
        }
    }
}

/// A resolved friend together with the edge that links to it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub edge_id: String,
    pub user: User,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieList {
    pub id: String,
    pub title: String,
    pub description: String,
    pub owner_id: String,
    pub followers: BTreeSet<String>,
}

impl MovieList {
    pub fn from_document(id: String, doc: &Document) -> Self {
        let followers = doc
            .get("followers")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_text)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        MovieList {
            id,
            title: text_field(doc, "title").unwrap_or_default(),
            description: text_field(doc, "description").unwrap_or_default(),
            owner_id: text_field(doc, "ownerId").unwrap_or_default(),
            followers,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genre {
    Action,
    Comedy,
    Drama,
    #[serde(rename = "Science Fiction")]
    ScienceFiction,
    Horror,
    Romance,
}

impl Genre {
    pub fn as_str(self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Comedy => "Comedy",
            Genre::Drama => "Drama",
            Genre::ScienceFiction => "Science Fiction",
            Genre::Horror => "Horror",
            Genre::Romance => "Romance",
        }
    }
}

/// A movie as stored under a list. Numeric fields are read leniently since
/// the store does not enforce a schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub rating: f64,
    pub genre: Option<String>,
    pub year: i64,
    pub country: Option<String>,
    /// Minutes.
    pub duration: i64,
    pub comment: Option<String>,
}

impl Movie {
    pub fn from_document(id: String, doc: &Document) -> Self {
        Movie {
            id,
            title: text_field(doc, "title").unwrap_or_default(),
            rating: number_field(doc, "rating"),
            genre: text_field(doc, "genre"),
            year: number_field(doc, "year") as i64,
            country: text_field(doc, "country"),
            duration: number_field(doc, "duration") as i64,
            comment: text_field(doc, "comment"),
        }
    }
}
