//! Repository layer for the stash service.
//!
//! Handlers and middleware call these; all queries are parameterized.

pub mod links;
pub mod users;

pub use links::LinksRepository;
pub use users::UsersRepository;
