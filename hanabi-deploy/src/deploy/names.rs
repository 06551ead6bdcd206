//! Collision-resistant resource name generation.
//!
//! Script and database names are derived once per deployment from the
//! user-supplied base name plus short random suffixes, then lowercased.
//! Uniqueness against existing remote resources is not checked; the collision
//! probability over a 5-character alphanumeric suffix is accepted.

use rand::Rng;
use rand::distr::{Alphanumeric, SampleString};

/// Length of the random suffix appended to generated names.
pub const SUFFIX_LENGTH: usize = 5;

/// Names derived once per deployment and reused across every remote call that
/// references the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedNames {
    pub script_name: String,
    pub database_name: String,
}

impl GeneratedNames {
    /// Derive the script and database names for one deployment.
    ///
    /// The base name is pre-validated (alphanumeric + hyphen) and the suffix
    /// alphabet is alphanumeric, so the results always satisfy Cloudflare's
    /// naming constraints.
    pub fn generate<R: Rng + ?Sized>(base_name: &str, rng: &mut R) -> Self {
        let database_name = format!("{base_name}-d1-{}", suffix(rng)).to_lowercase();
        let script_name = format!("{base_name}-{}", suffix(rng)).to_lowercase();
        Self {
            script_name,
            database_name,
        }
    }
}

fn suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    Alphanumeric.sample_string(rng, SUFFIX_LENGTH)
}
