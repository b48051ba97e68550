mod auth;
mod catalog;
mod context;
mod docs;
mod errors;
mod rooms;
mod schemas;
mod serialized;
mod sse;
mod wallet;

use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use hala_live::Hala;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use context::ServerContext;
use sse::{run_event_forwarding, ServerSentEvents};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Starts the hala server
pub async fn run_server(hala: Arc<Hala>) {
    let port = env::var("HALA_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sse = ServerSentEvents::new();
    run_event_forwarding(hala.clone(), sse.clone());

    let context = ServerContext { hala, sse };

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/rooms", rooms::router())
        .nest("/wallet", wallet::router())
        .nest("/gifts", catalog::gifts_router())
        .nest("/store", catalog::store_router())
        .nest("/events", sse::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {}", port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}
