//! Authenticator metadata: models, the signed TOC, providers and resolution.

mod models;
mod provider;
mod service;
mod statement;
mod toc;

pub use models::{AuthenticatorStatus, Metadata, MetadataStatement, StatusReport};
pub use provider::{MetadataProvider, MetadataResolver};
pub use service::{MetadataServiceProvider, STATEMENT_CACHE_SCOPE, TOC_CACHE_SCOPE};
pub use statement::StatementMetadataProvider;
pub use toc::{MetadataToc, TocEntry};
