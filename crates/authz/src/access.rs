//! User-clinic access map.

use clinic_types::{ClinicId, UserId};
use std::collections::{BTreeMap, BTreeSet};

/// User -> clinics that user may operate within, independent of their role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClinicAccessMap {
    grants: BTreeMap<UserId, BTreeSet<ClinicId>>,
}

impl ClinicAccessMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clinics_for(&self, user: &UserId) -> Option<&BTreeSet<ClinicId>> {
        self.grants.get(user)
    }

    /// Raw membership test; the privileged bypass is applied by the resolver, not here.
    pub fn has_access(&self, user: &UserId, clinic: &ClinicId) -> bool {
        self.grants
            .get(user)
            .is_some_and(|clinics| clinics.contains(clinic))
    }

    /// Replace a user's whole clinic set.
    pub fn replace(&mut self, user: UserId, clinics: BTreeSet<ClinicId>) {
        self.grants.insert(user, clinics);
    }

    /// Returns `true` if the grant was newly added.
    pub fn grant(&mut self, user: UserId, clinic: ClinicId) -> bool {
        self.grants.entry(user).or_default().insert(clinic)
    }

    /// Returns `true` if a grant was removed.
    pub fn revoke(&mut self, user: &UserId, clinic: &ClinicId) -> bool {
        self.grants
            .get_mut(user)
            .is_some_and(|clinics| clinics.remove(clinic))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &BTreeSet<ClinicId>)> {
        self.grants.iter()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl FromIterator<(UserId, BTreeSet<ClinicId>)> for ClinicAccessMap {
    fn from_iter<I: IntoIterator<Item = (UserId, BTreeSet<ClinicId>)>>(iter: I) -> Self {
        Self {
            grants: iter.into_iter().collect(),
        }
    }
}
