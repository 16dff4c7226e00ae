pub mod user;
pub mod book;
pub mod issue;
pub mod fine;
pub mod payment;

pub use user::*;
pub use book::*;
pub use issue::*;
pub use fine::*;
pub use payment::*;
