mod db;

pub use db::{Database, DatabaseError};
