//! Trust decisions over verified registrations.

mod manager;
mod voter;
mod voters;

pub use manager::TrustDecisionManager;
pub use voter::{TrustVote, TrustVoter};
pub use voters::{
    SupportedAttestationTypeVoter, TrustAttestationTypeVoter, TrustChainVoter,
    UndesiredStatusReportVoter,
};
