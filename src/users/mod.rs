pub mod dto;
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use dto::{NewUser, UserStats};
pub use memory::MemoryUserStore;
pub use repo::{MongoUserStore, UserStore};
pub use repo_types::{Consultation, Profile, UserDocument, USERS_COLLECTION};
pub use services::{Users, DEFAULT_CONSULTATION_LIMIT};
