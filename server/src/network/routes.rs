// polypong/server/src/network/routes.rs
use super::connection::handle_connection;
use crate::server::instance::PolyPongServer;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

pub const INSTANCE_HEADER: &str = "x-fly-instance";
pub const REPLAY_HEADER: &str = "fly-replay";

fn with_server(
    server: Arc<PolyPongServer>,
) -> impl Filter<Extract = (Arc<PolyPongServer>,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

/// `GET /api/instance` and the `/ws` upgrade.
pub fn routes(
    server: Arc<PolyPongServer>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let instance_route = warp::path!("api" / "instance")
        .and(warp::get())
        .and(with_server(server.clone()))
        .map(|server: Arc<PolyPongServer>| warp::reply::json(&server.instance_info()).into_response());

    let ws_route = warp::path("ws")
        .and(warp::path::end())
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::header::optional::<String>(INSTANCE_HEADER))
        .and(warp::ws())
        .and(with_server(server))
        .map(
            |query: HashMap<String, String>,
             header_instance: Option<String>,
             ws: warp::ws::Ws,
             server: Arc<PolyPongServer>| {
                let requested = query.get("instance").cloned().or(header_instance);
                if let Some(target) = replay_target(&server, requested) {
                    info!("Replaying upgrade to instance {}.", target);
                    return replay_response(&target);
                }
                ws.on_upgrade(move |socket| handle_connection(socket, server))
                    .into_response()
            },
        );

    instance_route.or(ws_route).unify()
}

/// Instance a distributed deployment should hand this upgrade to, if not us.
fn replay_target(server: &PolyPongServer, requested: Option<String>) -> Option<String> {
    if !server.is_distributed() {
        return None;
    }
    requested.filter(|id| !id.is_empty() && id != server.instance_id())
}

fn replay_response(target: &str) -> Response {
    let reply = warp::reply::with_header(warp::reply(), REPLAY_HEADER, format!("instance={}", target));
    warp::reply::with_status(reply, StatusCode::TEMPORARY_REDIRECT).into_response()
}
