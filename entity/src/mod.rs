pub mod role;
pub mod users;
