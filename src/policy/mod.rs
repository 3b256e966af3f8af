//! Policy Engine
//!
//! A [`ConsciousnessPathPolicy`] states what the routers on a path must
//! attest to: a coherence floor, the frequencies (tiers) they may carry,
//! bond verification, and at the path level a mandatory waypoint and the
//! packet's consent and audit state.
//!
//! Hops are judged from a [`HopAttestation`] when one is available (from a
//! trust extension, a beacon, or out of band). Otherwise the interface's
//! advertised [`PolicyIndex`] must contain the policy's hop requirements.
//! A hop with neither passes unless the policy is built non-permissive.
//!
//! Presets come from a [`TierTable`], an immutable value built from
//! defaults or from [`Config`](crate::Config).

mod attestation;
mod index;
mod path_policy;
mod tiers;


pub use attestation::HopAttestation;
pub use index::{PolicyIndex, COHERENCE_HIGH_FLOOR, COHERENCE_LOW_FLOOR, COHERENCE_MEDIUM_FLOOR};
pub use path_policy::ConsciousnessPathPolicy;
pub use tiers::{TierTable, TierThresholds, DEFAULT_PRIVATE_WAYPOINT};
