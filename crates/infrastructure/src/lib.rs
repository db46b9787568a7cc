pub mod attachment_store;
pub mod dynamodb;
pub mod memory;
pub mod models;
pub mod todo_repository;

pub use attachment_store::*;
pub use dynamodb::*;
pub use memory::*;
pub use models::*;
pub use todo_repository::*;
