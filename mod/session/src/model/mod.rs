mod payload;
mod revocation;

pub use payload::{claim, ClaimSet, SessionPayload, ValidatedPrincipal};
pub use revocation::{RevocationEvent, RevocationMetadata, RevocationReason};
