//! Domain models and request/response payloads

pub mod rating;
pub mod resource;
pub mod user;

// Re-export for convenience
pub use rating::{RateRequest, RatingEntry, RatingSummary};
pub use resource::{BlobRef, NewResource, Resource, ResourceFilter, Semester};
pub use user::{LoginRequest, NewUser, RegisterRequest, TokenResponse, User};
