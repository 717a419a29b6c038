pub mod models;
pub mod pii;

pub use models::events::{EventKind, NewUserEvent, ParamFragment, UserEvent};
pub use models::user::ChatUser;
pub use pii::Masked;
