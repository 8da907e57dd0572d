pub mod classifier;
pub mod formatter;
pub mod photo_service;
