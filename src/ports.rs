pub mod mail;
pub mod source;
pub mod store;
pub mod time;

pub use mail::{MailChannel, MailError, MailMessage};
pub use source::{ExpirySource, SourceError, UserDirectory};
pub use store::{AlertStore, StoreError};
pub use self::time::TimeProvider;
