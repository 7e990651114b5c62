//! Authentication for Keyward
//!
//! Providers verify a credential against one source each; the
//! [`AuthenticationManagerChain`] tries them in order and owns the
//! directory-specific merge with internally recorded scopes.

pub mod chain;
pub mod internal;
pub mod ldap;
pub mod provider;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::AuthenticationManagerChain;
pub use internal::InternalAuthenticationProvider;
pub use ldap::{
    AuthenticationStrategy, DirectoryAuthenticationProvider, DirectoryClient, DirectoryError,
    GroupResolver, LdapClient,
};
pub use provider::AuthenticationProvider;
