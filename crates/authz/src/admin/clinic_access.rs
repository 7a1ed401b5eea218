//! Clinic-access administration.
//!
//! Per-user clinic sets are memoised after the first read. A toggle updates the cached entry
//! immediately, sends the grant or revoke, and then always reconciles the whole cache against a
//! fresh full read from the backend, whether the mutation succeeded or not.
//!
//! Every read and optimistic write is stamped with a sequence number when it is issued. An entry
//! is only overwritten by data stamped later than the data it holds, so a slow read that was
//! issued first can never clobber a newer one that finished earlier.

use crate::access::ClinicAccessMap;
use crate::backend::SharedBackend;
use crate::error::{AdminError, AdminResult, MutationAction, Resource};
use clinic_types::{ClinicId, UserId};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Clone, Debug)]
struct CacheEntry {
    clinics: Arc<BTreeSet<ClinicId>>,
    seq: u64,
}

/// In-flight operations, counted per key so overlapping calls for the same key each hold it.
#[derive(Debug, Default)]
struct Pending {
    loading: HashMap<UserId, usize>,
    toggling: HashMap<(UserId, ClinicId), usize>,
}

fn enter<K: std::hash::Hash + Eq>(counts: &mut HashMap<K, usize>, key: K) {
    *counts.entry(key).or_insert(0) += 1;
}

fn leave<K: std::hash::Hash + Eq>(counts: &mut HashMap<K, usize>, key: &K) {
    if let Some(count) = counts.get_mut(key) {
        *count -= 1;
        if *count == 0 {
            counts.remove(key);
        }
    }
}

/// Outcome of a successful [`ClinicAccessAdmin::toggle_clinic_access`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClinicToggle {
    /// `true` if the toggle requested a grant, `false` for a revoke.
    pub granted: bool,
    /// The user's clinics after reconciliation with the backend.
    pub clinics: Arc<BTreeSet<ClinicId>>,
}

/// Cached, reconciling view of per-user clinic access.
///
/// All state lives behind short-lived locks that are never held across an `await`, so one
/// user's fetch never blocks another's.
pub struct ClinicAccessAdmin {
    backend: SharedBackend,
    cache: RwLock<HashMap<UserId, CacheEntry>>,
    pending: Mutex<Pending>,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for ClinicAccessAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicAccessAdmin")
            .field("cached_users", &self.read_cache().len())
            .finish_non_exhaustive()
    }
}

/// Releases its hold on a pending key when dropped.
struct PendingGuard<'a> {
    pending: &'a Mutex<Pending>,
    key: PendingKey,
}

enum PendingKey {
    Load(UserId),
    Toggle(UserId, ClinicId),
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match &self.key {
            PendingKey::Load(user) => leave(&mut pending.loading, user),
            PendingKey::Toggle(user, clinic) => {
                leave(&mut pending.toggling, &(user.clone(), clinic.clone()));
            }
        }
    }
}

impl ClinicAccessAdmin {
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
            pending: Mutex::new(Pending::default()),
            next_seq: AtomicU64::new(1),
        }
    }

    fn issue_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<UserId, CacheEntry>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<UserId, CacheEntry>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, key: PendingKey) -> PendingGuard<'_> {
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match &key {
                PendingKey::Load(user) => enter(&mut pending.loading, user.clone()),
                PendingKey::Toggle(user, clinic) => {
                    enter(&mut pending.toggling, (user.clone(), clinic.clone()));
                }
            }
        }
        PendingGuard {
            pending: &self.pending,
            key,
        }
    }

    /// Store `clinics` for `user` unless the cache already holds data issued after `seq`.
    fn store(&self, user: &UserId, clinics: Arc<BTreeSet<ClinicId>>, seq: u64) -> bool {
        let mut cache = self.write_cache();
        match cache.get(user) {
            Some(existing) if existing.seq > seq => false,
            _ => {
                cache.insert(user.clone(), CacheEntry { clinics, seq });
                true
            }
        }
    }

    /// The cached clinics of `user`, if loaded.
    pub fn cached(&self, user: &UserId) -> Option<Arc<BTreeSet<ClinicId>>> {
        self.read_cache()
            .get(user)
            .map(|entry| Arc::clone(&entry.clinics))
    }

    /// Every cached entry, for building a resolver.
    pub fn snapshot(&self) -> ClinicAccessMap {
        self.read_cache()
            .iter()
            .map(|(user, entry)| (user.clone(), (*entry.clinics).clone()))
            .collect()
    }

    /// Whether a read for `user` is in flight.
    pub fn is_loading(&self, user: &UserId) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loading
            .contains_key(user)
    }

    /// Whether a toggle of `clinic` for `user` is in flight.
    pub fn is_toggling(&self, user: &UserId, clinic: &ClinicId) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .toggling
            .contains_key(&(user.clone(), clinic.clone()))
    }

    /// The clinics of `user`, fetched once and then served from the cache.
    ///
    /// # Errors
    ///
    /// [`AdminError::Fetch`] if the backend read fails. Nothing is cached in that case.
    pub async fn load_user_clinic_access(
        &self,
        user: &UserId,
    ) -> AdminResult<Arc<BTreeSet<ClinicId>>> {
        if let Some(clinics) = self.cached(user) {
            tracing::debug!(user = %user, "clinic access cache hit");
            return Ok(clinics);
        }
        self.refresh_user_clinic_access(user).await
    }

    /// Re-read the clinics of `user` from the backend, bypassing the cache.
    pub async fn refresh_user_clinic_access(
        &self,
        user: &UserId,
    ) -> AdminResult<Arc<BTreeSet<ClinicId>>> {
        let _loading = self.track(PendingKey::Load(user.clone()));
        let seq = self.issue_seq();

        let clinics = self
            .backend
            .user_clinic_access(user)
            .await
            .map_err(AdminError::fetch(Resource::ClinicAccess))?;
        let clinics = Arc::new(clinics);

        if !self.store(user, Arc::clone(&clinics), seq) {
            tracing::debug!(user = %user, seq, "discarding stale clinic access read");
            // A newer read already landed; report what the cache holds.
            return Ok(self.cached(user).unwrap_or(clinics));
        }
        Ok(clinics)
    }

    /// Replace every cache entry with a fresh full read, where the read is newer.
    ///
    /// On failure every entry older than the read is dropped so the next access re-fetches
    /// rather than trusting optimistic data.
    pub async fn refresh_all(&self) -> AdminResult<()> {
        let seq = self.issue_seq();
        match self.backend.all_clinic_access().await {
            Ok(access) => {
                let mut cache = self.write_cache();
                cache.retain(|user, entry| entry.seq > seq || access.clinics_for(user).is_some());
                for (user, clinics) in access.iter() {
                    let stale = cache.get(user).is_some_and(|entry| entry.seq > seq);
                    if !stale {
                        cache.insert(
                            user.clone(),
                            CacheEntry {
                                clinics: Arc::new(clinics.clone()),
                                seq,
                            },
                        );
                    }
                }
                Ok(())
            }
            Err(source) => {
                tracing::warn!(error = %source, "clinic access reconciliation failed");
                self.write_cache().retain(|_, entry| entry.seq > seq);
                Err(AdminError::Fetch {
                    resource: Resource::ClinicAccess,
                    source,
                })
            }
        }
    }

    /// Grant `clinic` to `user` if they lack it, otherwise revoke it.
    ///
    /// The cached entry is updated before the backend call and then reconciled with a full
    /// refresh regardless of the outcome.
    ///
    /// # Errors
    ///
    /// - [`AdminError::Mutation`] if the grant or revoke failed. The cache has still been
    ///   reconciled, or invalidated if reconciliation failed too.
    /// - [`AdminError::Fetch`] if the mutation succeeded but reconciliation did not, or the
    ///   user's current access could not be loaded.
    pub async fn toggle_clinic_access(
        &self,
        user: &UserId,
        clinic: &ClinicId,
    ) -> AdminResult<ClinicToggle> {
        let _toggling = self.track(PendingKey::Toggle(user.clone(), clinic.clone()));

        let current = self.load_user_clinic_access(user).await?;
        let grant = !current.contains(clinic);

        let mut optimistic = (*current).clone();
        if grant {
            optimistic.insert(clinic.clone());
        } else {
            optimistic.remove(clinic);
        }
        self.store(user, Arc::new(optimistic), self.issue_seq());

        let (action, outcome) = if grant {
            (
                MutationAction::GrantClinicAccess,
                self.backend.grant_clinic_access(user, clinic).await,
            )
        } else {
            (
                MutationAction::RevokeClinicAccess,
                self.backend.revoke_clinic_access(user, clinic).await,
            )
        };
        if let Err(e) = &outcome {
            tracing::warn!(user = %user, clinic = %clinic, error = %e, "failed to {action}");
        }

        let reconciled = self.refresh_all().await;
        outcome.map_err(AdminError::mutation(action))?;
        reconciled?;

        Ok(ClinicToggle {
            granted: grant,
            clinics: self.cached(user).unwrap_or_default(),
        })
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.write_cache().clear();
    }
}
