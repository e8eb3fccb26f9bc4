use crate::ws::Hub;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// The one notification hub for this process
    pub hub: Hub,
    /// JWT signing secret (256-bit random key unless configured)
    pub jwt_secret: Vec<u8>,
}

impl AppState {
    pub fn new(hub: Hub, jwt_secret: Vec<u8>) -> Self {
        Self { hub, jwt_secret }
    }
}
