//! Backend client construction contract

use std::sync::Arc;

use crate::backend_types::BackendKind;
use crate::error::{CirrusError, CirrusResult};
use crate::profile::Profile;

/// Builds a backend client bound to one resolved [`Profile`].
///
/// Construction is pure: no network call is made and nothing is cached. A factory only
/// fails when the profile is structurally unusable or the kind is not one it serves.
pub trait ClientFactory<C: ?Sized>: Send + Sync {
    /// Backend family this factory produces clients for
    fn kind(&self) -> BackendKind;

    fn build(&self, profile: &Profile, kind: BackendKind) -> CirrusResult<Arc<C>>;
}

/// Shared pre-build checks: the requested kind is served and the profile has a region.
pub fn check_build(profile: &Profile, served: BackendKind, requested: BackendKind) -> CirrusResult<()> {
    if served != requested {
        return Err(CirrusError::UnsupportedOperation(format!(
            "building a {} client from a {} factory",
            requested, served
        )));
    }
    profile.validate(requested)
}
