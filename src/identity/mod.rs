//! Accounts, the session cache, the identity-provider boundary and token acquisition.
//! Keep the public surface thin and split implementation across sub-modules.

mod account;
mod session;
mod provider;
mod acquirer;
mod surface;
mod b2c;

pub use account::Account;
pub use session::{CacheRecord, SessionCache, MemorySessionCache, first_or_none};
pub use provider::{IdentityProvider, InteractiveRequest, AuthorizeParams, RefreshParams, ProviderTokens, Prompt, WindowHandle};
pub use acquirer::{TokenAcquirer, TokenResult};
pub use surface::{AuthorizationSurface, LoopbackSurface};
pub use b2c::{B2cProvider, code_challenge, code_from_redirect, random_token, OIDC_SCOPES};
