pub mod identity;
pub mod records;

pub use identity::{IdentityService, PasswordHasher};
pub use records::RecordService;
