mod caller;

pub use caller::{TENANT_ID_HEADER, USER_ID_HEADER};
