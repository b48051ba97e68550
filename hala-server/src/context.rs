use std::sync::Arc;

use axum::extract::FromRef;
use hala_live::Hala;

use crate::sse::ServerSentEvents;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub hala: Arc<Hala>,
    pub sse: Arc<ServerSentEvents>,
}
