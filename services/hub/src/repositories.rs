//! Repositories for database operations

pub mod rating;
pub mod resource;
pub mod user;

pub use rating::RatingRepository;
pub use resource::{ListQuery, ResourceRepository, ValidatedResource};
pub use user::UserRepository;
