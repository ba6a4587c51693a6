//! Owner profiles for transaction snapshots and notifications
//!
//! User, merchant and driver owners carry different profile data. Each
//! profile exposes the same two capabilities, a display name and an optional
//! contact channel, so the orchestrator never branches on owner kind.

use crate::core::traits::OwnerDirectory;
use crate::types::{OwnerKind, OwnerRef};
use dashmap::DashMap;

/// Where an owner can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactChannel {
    Push { device_token: String },
    Sms { phone: String },
    Email { address: String },
}

/// Capabilities every owner profile provides
pub trait OwnerCapabilities {
    fn display_name(&self) -> String;
    fn contact_channel(&self) -> Option<ContactChannel>;
}

/// Profile of a wallet owner, tagged by owner kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerProfile {
    User {
        first_name: String,
        last_name: String,
        device_token: Option<String>,
    },
    Merchant {
        business_name: String,
        contact_email: Option<String>,
    },
    Driver {
        full_name: String,
        phone: Option<String>,
    },
}

impl OwnerProfile {
    pub fn kind(&self) -> OwnerKind {
        match self {
            OwnerProfile::User { .. } => OwnerKind::User,
            OwnerProfile::Merchant { .. } => OwnerKind::Merchant,
            OwnerProfile::Driver { .. } => OwnerKind::Driver,
        }
    }

    /// Minimal profile carrying only a name
    pub fn named(kind: OwnerKind, name: &str) -> Self {
        match kind {
            OwnerKind::User => {
                let mut parts = name.trim().splitn(2, ' ');
                OwnerProfile::User {
                    first_name: parts.next().unwrap_or_default().to_string(),
                    last_name: parts.next().unwrap_or_default().trim().to_string(),
                    device_token: None,
                }
            }
            OwnerKind::Merchant => OwnerProfile::Merchant {
                business_name: name.trim().to_string(),
                contact_email: None,
            },
            OwnerKind::Driver => OwnerProfile::Driver {
                full_name: name.trim().to_string(),
                phone: None,
            },
        }
    }
}

impl OwnerCapabilities for OwnerProfile {
    fn display_name(&self) -> String {
        match self {
            OwnerProfile::User {
                first_name,
                last_name,
                ..
            } => format!("{} {}", first_name, last_name).trim().to_string(),
            OwnerProfile::Merchant { business_name, .. } => business_name.clone(),
            OwnerProfile::Driver { full_name, .. } => full_name.clone(),
        }
    }

    fn contact_channel(&self) -> Option<ContactChannel> {
        match self {
            OwnerProfile::User { device_token, .. } => device_token
                .as_ref()
                .map(|token| ContactChannel::Push {
                    device_token: token.clone(),
                }),
            OwnerProfile::Merchant { contact_email, .. } => contact_email
                .as_ref()
                .map(|address| ContactChannel::Email {
                    address: address.clone(),
                }),
            OwnerProfile::Driver { phone, .. } => phone.as_ref().map(|phone| ContactChannel::Sms {
                phone: phone.clone(),
            }),
        }
    }
}

/// A party resolved once per transfer: owner reference plus capabilities
#[derive(Debug, Clone)]
pub struct ResolvedParty {
    pub owner: OwnerRef,
    pub display_name: String,
    pub contact: Option<ContactChannel>,
}

impl ResolvedParty {
    /// Resolve an owner through the directory
    ///
    /// Unknown owners still transfer; they get a generic name and no contact
    /// channel.
    pub fn resolve(directory: &dyn OwnerDirectory, owner: &OwnerRef) -> Self {
        match directory.profile(owner) {
            Some(profile) => ResolvedParty {
                owner: owner.clone(),
                display_name: profile.display_name(),
                contact: profile.contact_channel(),
            },
            None => ResolvedParty {
                owner: owner.clone(),
                display_name: format!("Unknown {}", owner.kind),
                contact: None,
            },
        }
    }

    /// Whether this party should hear about the transfer
    pub fn is_notifiable(&self) -> bool {
        self.owner.kind.is_notifiable() && self.contact.is_some()
    }
}

/// Directory backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    profiles: DashMap<OwnerRef, OwnerProfile>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the profile for an owner
    pub fn insert(&self, owner: OwnerRef, profile: OwnerProfile) {
        self.profiles.insert(owner, profile);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl OwnerDirectory for InMemoryDirectory {
    fn profile(&self, owner: &OwnerRef) -> Option<OwnerProfile> {
        self.profiles.get(owner).map(|entry| entry.value().clone())
    }
}
