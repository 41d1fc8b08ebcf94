//! Schema catalogs shipped with the engine.
//!
//! - [`BuiltinCatalog`]: the four sample types, installed by default
//! - [`ExtendedCatalog`]: further providers, opt-in through configuration

mod builtin;
mod extended;

use crate::descriptor::SchemaDescriptor;
use crate::registry::SchemaProvider;

pub use builtin::{amazon_prime, steam, uber, zomato, DELIVERY_STATUSES};
pub use extended::{linkedin, netflix, reddit, spotify, twitch, twitter};

/// Contribution type tags known to the shipped catalogs.
pub mod tags {
    pub const UBER: &str = "UBER";
    pub const STEAM: &str = "STEAM";
    pub const AMAZON_PRIME: &str = "AMAZON_PRIME";
    pub const ZOMATO: &str = "ZOMATO";

    pub const LINKEDIN: &str = "LINKEDIN";
    pub const SPOTIFY: &str = "SPOTIFY";
    pub const NETFLIX: &str = "NETFLIX";
    pub const TWITCH: &str = "TWITCH";
    pub const TWITTER: &str = "TWITTER";
    pub const REDDIT: &str = "REDDIT";
}

/// The sample contribution types, each with a distinct payload shape.
pub struct BuiltinCatalog;

impl SchemaProvider for BuiltinCatalog {
    fn name(&self) -> &str {
        "builtin"
    }

    fn schemas(&self) -> Vec<SchemaDescriptor> {
        vec![uber(), steam(), amazon_prime(), zomato()]
    }
}

/// Additional social and media providers.
pub struct ExtendedCatalog;

impl SchemaProvider for ExtendedCatalog {
    fn name(&self) -> &str {
        "extended"
    }

    fn schemas(&self) -> Vec<SchemaDescriptor> {
        vec![
            linkedin(),
            spotify(),
            netflix(),
            twitch(),
            twitter(),
            reddit(),
        ]
    }
}
