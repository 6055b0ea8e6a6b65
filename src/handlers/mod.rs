pub mod album_handlers;
pub mod extract;
pub mod health_handlers;
pub mod photo_handlers;
