// src/models/mod.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod attempt;
pub mod question;
pub mod quiz;
pub mod user;

/// Body of plain acknowledgements and of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
