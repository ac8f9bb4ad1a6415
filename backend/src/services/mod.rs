pub mod users;

pub use users::{UserService, UsersService};
