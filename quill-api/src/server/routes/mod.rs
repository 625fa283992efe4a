use crate::server::ServerRouter;
use axum::Router;

mod authors;
mod posts;

pub fn routes() -> ServerRouter {
    Router::new().merge(posts::routes()).merge(authors::routes())
}
