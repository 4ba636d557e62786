mod community;
mod config;
mod document;
mod error;
mod form;
mod lists;
mod model;
mod routes;
mod stats;
mod store;
mod users;

use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{middleware::Logger, App, HttpServer};
use config::Config;
use std::io;

fn io_error<E: std::fmt::Display>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "movieshelf=debug,actix_web=info");
    }
    env_logger::init();

    let config = Config::load().map_err(io_error)?;
    let db = config.open_db().map_err(io_error)?;
    let cookie_key = config.cookie_key.clone();
    let secure_cookie = config.secure_cookie;

    log::info!("listening on {}", config.bind);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(&cookie_key)
                    .name("auth-cookie")
                    .secure(secure_cookie),
            ))
            .data(db.clone())
            .configure(routes::configure)
    })
    .bind(&config.bind)?
    .run()
    .await
}
