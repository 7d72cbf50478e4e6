pub mod user;
pub mod repository;
pub mod contribution;
pub mod activity;

pub use user::*;
pub use repository::*;
pub use contribution::*;
pub use activity::*;
