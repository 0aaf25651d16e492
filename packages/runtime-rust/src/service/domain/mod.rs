//! Domain operations built on the operation pipeline.
//!
//! Records are stored as JSON values in named collections of the
//! [`TransactionalStore`](crate::storage::TransactionalStore).

pub mod micropost;

pub use micropost::{
    list_microposts, seed_user, CreateMicropost, CreateMicropostInput, Created, Micropost,
    RemoveMicropost, RemoveMicropostInput, User,
};

/// Collection holding [`User`] records keyed by id.
pub const USERS: &str = "users";

/// Collection holding [`Micropost`] records keyed by id.
pub const MICROPOSTS: &str = "microposts";
