use crate::community::{befriend, CommunityDb};
use crate::error::{Error, Result};
use crate::form::{current_year, FriendForm, ListForm, MovieForm, MoviePatch, SearchParams};
use crate::lists::MovieListDb;
use crate::model::Identity;
use crate::users::UserDb;
use actix_identity::Identity as Session;
use actix_web::{web, HttpResponse};
use serde::Serialize;

type Db = web::Data<sled::Db>;

#[derive(Serialize)]
struct Created {
    id: String,
}

fn session_user(session: &Session) -> Result<String> {
    session.identity().ok_or(Error::Unauthorized)
}

fn require_owner(db: &sled::Db, list_id: &str, user_id: &str) -> Result<()> {
    if db.get_list(list_id)?.owner_id == user_id {
        Ok(())
    } else {
        Err(Error::Forbidden("movie list"))
    }
}

async fn sign_in(identity: web::Json<Identity>, session: Session, db: Db) -> Result<HttpResponse> {
    let user = db.sign_in(&identity)?;
    session.remember(user.id.clone());
    Ok(HttpResponse::Ok().json(user))
}

async fn sign_out(session: Session) -> HttpResponse {
    session.forget();
    HttpResponse::NoContent().finish()
}

async fn search_users(params: web::Query<SearchParams>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(db.search_users(&params.prefix)?))
}

async fn get_user(path: web::Path<(String,)>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(db.get_user(&path.0)?))
}

async fn user_lists(path: web::Path<(String,)>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(db.lists_owned_by(&path.0)?))
}

async fn user_stats(path: web::Path<(String,)>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(db.owner_stats(&path.0)?))
}

async fn user_profile(path: web::Path<(String,)>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(db.profile(&path.0)?))
}

async fn friends(session: Session, db: Db) -> Result<HttpResponse> {
    let user_id = session_user(&session)?;
    Ok(HttpResponse::Ok().json(db.list_friends(&user_id)?))
}

async fn add_friend(form: web::Json<FriendForm>, session: Session, db: Db) -> Result<HttpResponse> {
    let user_id = session_user(&session)?;
    let id = befriend(db.get_ref(), &user_id, &form.friend_id)?;
    Ok(HttpResponse::Ok().json(Created { id }))
}

async fn remove_friend(path: web::Path<(String,)>, session: Session, db: Db) -> Result<HttpResponse> {
    session_user(&session)?;
    db.remove_friend(&path.0)?;
    Ok(HttpResponse::NoContent().finish())
}

async fn create_list(form: web::Json<ListForm>, session: Session, db: Db) -> Result<HttpResponse> {
    let user_id = session_user(&session)?;
    form.validate()?;
    let id = db.create_list(&form.title, &form.description, &user_id)?;
    Ok(HttpResponse::Created().json(Created { id }))
}

async fn get_list(path: web::Path<(String,)>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(db.get_list(&path.0)?))
}

async fn delete_list(path: web::Path<(String,)>, session: Session, db: Db) -> Result<HttpResponse> {
    let user_id = session_user(&session)?;
    require_owner(&db, &path.0, &user_id)?;
    db.delete_list(&path.0)?;
    Ok(HttpResponse::NoContent().finish())
}

async fn movies(path: web::Path<(String,)>, db: Db) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(db.movies(&path.0)?))
}

async fn add_movie(
    path: web::Path<(String,)>,
    form: web::Json<MovieForm>,
    session: Session,
    db: Db,
) -> Result<HttpResponse> {
    let user_id = session_user(&session)?;
    require_owner(&db, &path.0, &user_id)?;
    let movie = form.into_inner().into_document(current_year())?;
    let id = db.add_movie(&path.0, movie)?;
    Ok(HttpResponse::Created().json(Created { id }))
}

async fn update_movie(
    path: web::Path<(String, String)>,
    patch: web::Json<MoviePatch>,
    session: Session,
    db: Db,
) -> Result<HttpResponse> {
    let user_id = session_user(&session)?;
    let (list_id, movie_id) = path.into_inner();
    require_owner(&db, &list_id, &user_id)?;
    let patch = patch.into_inner().into_document(current_year())?;
    db.update_movie(&list_id, &movie_id, patch)?;
    Ok(HttpResponse::NoContent().finish())
}

async fn remove_movie(
    path: web::Path<(String, String)>,
    session: Session,
    db: Db,
) -> Result<HttpResponse> {
    let user_id = session_user(&session)?;
    let (list_id, movie_id) = path.into_inner();
    require_owner(&db, &list_id, &user_id)?;
    db.remove_movie(&list_id, &movie_id)?;
    Ok(HttpResponse::NoContent().finish())
}

async fn follow(path: web::Path<(String,)>, session: Session, db: Db) -> Result<HttpResponse> {
    let user_id = session_user(&session)?;
    db.follow_list(&user_id, &path.0)?;
    Ok(HttpResponse::NoContent().finish())
}

async fn unfollow(path: web::Path<(String,)>, session: Session, db: Db) -> Result<HttpResponse> {
    let user_id = session_user(&session)?;
    db.unfollow_list(&user_id, &path.0)?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/session", web::post().to(sign_in))
        .route("/session", web::delete().to(sign_out))
        .route("/users", web::get().to(search_users))
        .route("/users/{id}", web::get().to(get_user))
        .route("/users/{id}/lists", web::get().to(user_lists))
        .route("/users/{id}/stats", web::get().to(user_stats))
        .route("/users/{id}/profile", web::get().to(user_profile))
        .route("/friends", web::get().to(friends))
        .route("/friends", web::post().to(add_friend))
        .route("/friends/{id}", web::delete().to(remove_friend))
        .route("/lists", web::post().to(create_list))
        .route("/lists/{id}", web::get().to(get_list))
        .route("/lists/{id}", web::delete().to(delete_list))
        .route("/lists/{id}/movies", web::get().to(movies))
        .route("/lists/{id}/movies", web::post().to(add_movie))
        .route("/lists/{id}/movies/{movie_id}", web::patch().to(update_movie))
        .route("/lists/{id}/movies/{movie_id}", web::delete().to(remove_movie))
        .route("/lists/{id}/followers", web::post().to(follow))
        .route("/lists/{id}/followers", web::delete().to(unfollow));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_identity::{CookieIdentityPolicy, IdentityService};
    use actix_web::http::{Cookie, StatusCode};
    use actix_web::{test, App};

    macro_rules! test_app {
        ($db:expr) => {
            test::init_service(
                App::new()
                    .wrap(IdentityService::new(
                        CookieIdentityPolicy::new(&[0u8; 32])
                            .name("auth-cookie")
                            .secure(false),
                    ))
                    .data($db)
                    .configure(configure),
            )
            .await
        };
    }

    fn db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn identity(id: &str, name: &str) -> serde_json::Value {
        serde_json::json!({ "id": id, "displayName": name })
    }

    macro_rules! sign_in {
        ($app:expr, $identity:expr) => {{
            let req = test::TestRequest::post()
                .uri("/session")
                .set_json(&$identity)
                .to_request();
            let resp = test::call_service(&mut $app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let cookie: Cookie<'static> = resp
                .response()
                .cookies()
                .find(|c| c.name() == "auth-cookie")
                .map(|c| c.into_owned())
                .unwrap();
            cookie
        }};
    }

    async fn json_body<B>(resp: actix_web::dev::ServiceResponse<B>) -> serde_json::Value
    where
        B: actix_web::dev::MessageBody,
    {
        let body = test::read_body(resp).await;
        serde_json::from_slice(&body).unwrap()
    }

    #[actix_rt::test]
    async fn mutations_need_a_session() {
        let mut app = test_app!(db());
        let req = test::TestRequest::post()
            .uri("/lists")
            .set_json(&serde_json::json!({ "title": "Noir" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get().uri("/friends").to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn unknown_user_is_404() {
        let mut app = test_app!(db());
        let req = test::TestRequest::get().uri("/users/ghost").to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn empty_search_is_empty() {
        let mut app = test_app!(db());
        sign_in!(app, identity("u1", "Ann"));
        let req = test::TestRequest::get().uri("/users?prefix=").to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await, serde_json::json!([]));

        let req = test::TestRequest::get().uri("/users?prefix=An").to_request();
        let resp = test::call_service(&mut app, req).await;
        let body = json_body(resp).await;
        assert_eq!(body[0]["displayName"], "Ann");
    }

    #[actix_rt::test]
    async fn list_lifecycle_and_stats() {
        let mut app = test_app!(db());
        let cookie = sign_in!(app, identity("u1", "Ann"));

        let req = test::TestRequest::post()
            .uri("/lists")
            .cookie(cookie.clone())
            .set_json(&serde_json::json!({ "title": "Favourites", "description": "" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let list_id = json_body(resp).await["id"].as_str().unwrap().to_owned();

        let movies = vec![
            serde_json::json!({ "title": "A", "genre": "Drama", "year": 1999, "rating": 8, "duration": 120 }),
            serde_json::json!({ "title": "B", "genre": "Drama", "year": 2001, "rating": 0, "duration": "90" }),
            serde_json::json!({ "title": "C", "genre": "Action", "year": 2010, "rating": 6, "duration": 100 }),
        ];
        for movie in &movies {
            let req = test::TestRequest::post()
                .uri(&format!("/lists/{}/movies", list_id))
                .cookie(cookie.clone())
                .set_json(movie)
                .to_request();
            let resp = test::call_service(&mut app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get().uri("/users/u1/stats").to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({
                "totalMovies": 3,
                "totalMinutes": 310,
                "averageRating": 7.0,
                "favoriteGenre": "Drama",
            })
        );

        let intruder = sign_in!(app, identity("u2", "Bob"));
        let req = test::TestRequest::delete()
            .uri(&format!("/lists/{}", list_id))
            .cookie(intruder)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::delete()
            .uri(&format!("/lists/{}", list_id))
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get()
            .uri(&format!("/lists/{}", list_id))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn invalid_movie_is_rejected() {
        let mut app = test_app!(db());
        let cookie = sign_in!(app, identity("u1", "Ann"));
        let req = test::TestRequest::post()
            .uri("/lists")
            .cookie(cookie.clone())
            .set_json(&serde_json::json!({ "title": "L" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        let list_id = json_body(resp).await["id"].as_str().unwrap().to_owned();

        let req = test::TestRequest::post()
            .uri(&format!("/lists/{}/movies", list_id))
            .cookie(cookie)
            .set_json(&serde_json::json!({ "title": "No year", "genre": "Drama" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn movie_edits_are_owner_only_and_following_is_open() {
        let mut app = test_app!(db());
        let owner = sign_in!(app, identity("u1", "Ann"));
        let req = test::TestRequest::post()
            .uri("/lists")
            .cookie(owner.clone())
            .set_json(&serde_json::json!({ "title": "Noir" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        let list_id = json_body(resp).await["id"].as_str().unwrap().to_owned();
        let req = test::TestRequest::post()
            .uri(&format!("/lists/{}/movies", list_id))
            .cookie(owner.clone())
            .set_json(&serde_json::json!({ "title": "Heat", "genre": "Drama", "year": 1995 }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        let movie_uri = format!(
            "/lists/{}/movies/{}",
            list_id,
            json_body(resp).await["id"].as_str().unwrap()
        );

        let intruder = sign_in!(app, identity("u2", "Bob"));
        let req = test::TestRequest::patch()
            .uri(&movie_uri)
            .cookie(intruder.clone())
            .set_json(&serde_json::json!({ "rating": 1 }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let req = test::TestRequest::delete()
            .uri(&movie_uri)
            .cookie(intruder.clone())
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::patch()
            .uri(&movie_uri)
            .cookie(owner.clone())
            .set_json(&serde_json::json!({ "rating": 12, "comment": "again" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let req = test::TestRequest::get()
            .uri(&format!("/lists/{}/movies", list_id))
            .to_request();
        let body = json_body(test::call_service(&mut app, req).await).await;
        assert_eq!(body[0]["rating"], 10.0);
        assert_eq!(body[0]["comment"], "again");

        let req = test::TestRequest::delete()
            .uri(&movie_uri)
            .cookie(owner)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let req = test::TestRequest::get()
            .uri(&format!("/lists/{}/movies", list_id))
            .to_request();
        let body = json_body(test::call_service(&mut app, req).await).await;
        assert_eq!(body, serde_json::json!([]));

        let followers_uri = format!("/lists/{}/followers", list_id);
        let req = test::TestRequest::post()
            .uri(&followers_uri)
            .cookie(intruder.clone())
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let req = test::TestRequest::get()
            .uri(&format!("/lists/{}", list_id))
            .to_request();
        let body = json_body(test::call_service(&mut app, req).await).await;
        assert_eq!(body["followers"], serde_json::json!(["u2"]));

        let req = test::TestRequest::delete()
            .uri(&followers_uri)
            .cookie(intruder)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let req = test::TestRequest::get()
            .uri(&format!("/lists/{}", list_id))
            .to_request();
        let body = json_body(test::call_service(&mut app, req).await).await;
        assert_eq!(body["followers"], serde_json::json!([]));

        let stranger = sign_in!(app, identity("u3", "Cy"));
        let req = test::TestRequest::post()
            .uri("/lists/missing/followers")
            .cookie(stranger)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn friends_roundtrip() {
        let mut app = test_app!(db());
        sign_in!(app, identity("u2", "Bob"));
        let cookie = sign_in!(app, identity("u1", "Ann"));

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/friends")
                .cookie(cookie.clone())
                .set_json(&serde_json::json!({ "friendId": "u2" }))
                .to_request();
            let resp = test::call_service(&mut app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get()
            .uri("/friends")
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        let body = json_body(resp).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["user"]["displayName"], "Bob");
        let edge_id = body[0]["edgeId"].as_str().unwrap().to_owned();

        let req = test::TestRequest::delete()
            .uri(&format!("/friends/{}", edge_id))
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::post()
            .uri("/friends")
            .cookie(cookie)
            .set_json(&serde_json::json!({ "friendId": "ghost" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
