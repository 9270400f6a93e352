//! Service layer: socket lifecycle, history access, health, API docs.

pub mod documentation;
pub mod health_service;
pub mod history_service;
pub mod websocket_service;
