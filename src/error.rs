use ethers::types::Address;

/// Errors returned by guarded registry operations.
///
/// Reads never fail: unknown keys yield zero-value records instead of an
/// error. Every failed mutation is an atomic no-op, record and authorization
/// state are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Caller lacks the writer role required by the active access policy.
    #[error("caller {caller:?} is not an authorized writer")]
    Unauthorized { caller: Address },
    /// Caller attempted an owner-gated operation without being the owner.
    #[error("caller {caller:?} is not the registry owner")]
    OwnerOnly { caller: Address },
}
