mod deploy;

/// Environment variable holding the management API token.
pub(crate) const ACCESS_TOKEN_ENV: &str = "SUPABASE_ACCESS_TOKEN";

pub use deploy::{DeployArgs, deploy};
