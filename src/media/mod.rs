pub mod repo;
pub mod services;

pub use repo::PgMediaRepository;
pub use services::{MediaLibrary, UploadItem};
