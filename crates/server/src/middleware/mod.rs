pub mod db_session;

pub use db_session::with_db_session;
