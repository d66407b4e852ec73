mod api_key;
mod organization;
mod organization_user;
mod project;
mod project_user;
mod user;

pub use api_key::*;
pub use organization::*;
pub use organization_user::*;
pub use project::*;
pub use project_user::*;
pub use user::*;
