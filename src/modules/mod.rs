//! Core polling subsystems.
//!
//! Leaves first: identity derivation, header assembly, the transport pool,
//! the payload mapping, and the fetch controller that ties them together.

pub mod fetch;
pub mod headers;
pub mod identity;
pub mod profile;
pub mod transport;

pub use fetch::{FetchError, FetchOutcome, ProfileApi, ProfileFetcher, PROFILE_ENDPOINT};
pub use headers::{HeaderSetError, RequestHeaderSet, APP_ID};
pub use identity::{DeviceIdentity, IdentityRegistry};
pub use profile::{EdgeCount, ProfileData, ProfileEnvelope, UserRecord};
pub use transport::{ImpersonationProfile, TransportError, TransportPool};
