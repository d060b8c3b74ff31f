pub mod password;
pub mod utils;

pub use password::{hash_password, verify_password};
pub use utils::{ensure_attempt_owner, ensure_exam_owner};
