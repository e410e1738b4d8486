//! Domain entities - Core business objects with no storage dependencies

pub mod user;
pub mod user_list;
pub mod group;
pub mod message;

pub use user::{Sex, User, UserFilter};
pub use user_list::UserList;
pub use group::Group;
pub use message::{GroupMessage, MessageKind, MessageRange};
