use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use time::OffsetDateTime;
use tracing::{debug, error};

use super::{
    IdSource, InternalHandle, OsIds, PublicId, Referral, Registry, RegistryCounts, RegistryError,
    RegistryResult, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<PublicId, User>,
    referrals: Vec<Referral>,

    // new user -> index into referrals
    referred_by: HashMap<PublicId, usize>,
    // canonical referrer token -> indices into referrals
    by_referrer: HashMap<String, Vec<usize>>,
}

/// Process-lifetime registry. One write lock covers both the user and the
/// referral insert of a registration.
pub struct MemoryRegistry {
    ids: Box<dyn IdSource>,
    tables: RwLock<Tables>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        MemoryRegistry::new(Box::new(OsIds))
    }
}

impl MemoryRegistry {
    pub fn new(ids: Box<dyn IdSource>) -> MemoryRegistry {
        MemoryRegistry {
            ids,
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> RegistryResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| RegistryError::Poisoned)
    }

    fn write(&self) -> RegistryResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| RegistryError::Poisoned)
    }
}

impl Registry for MemoryRegistry {
    fn register(
        &self,
        internal_handle: Option<InternalHandle>,
        referrer: Option<&str>,
    ) -> RegistryResult<PublicId> {
        let public_id = PublicId::mint(self.ids.as_ref());
        let referrer = referrer.filter(|r| !r.is_empty()).map(PublicId::canonical);

        let mut tables = self.write()?;

        if tables.users.contains_key(&public_id) {
            error!(%public_id, "public id collision");
            return Err(RegistryError::Collision(public_id));
        }

        let now = OffsetDateTime::now_utc();
        tables.users.insert(
            public_id,
            User {
                internal_handle,
                public_id,
                created_at: now,
            },
        );

        if let Some(referrer) = referrer {
            let index = tables.referrals.len();
            tables.referrals.push(Referral {
                referrer_public_id: referrer.clone(),
                new_user_public_id: public_id,
                timestamp: now,
            });
            tables.referred_by.insert(public_id, index);
            tables.by_referrer.entry(referrer.clone()).or_default().push(index);
            debug!(%public_id, %referrer, "recorded referral");
        }

        Ok(public_id)
    }

    fn get_user(&self, public_id: &str) -> RegistryResult<Option<User>> {
        let Some(public_id) = PublicId::parse(public_id) else {
            return Ok(None);
        };
        Ok(self.read()?.users.get(&public_id).cloned())
    }

    fn referred_by(&self, public_id: &PublicId) -> RegistryResult<Option<Referral>> {
        let tables = self.read()?;
        Ok(tables
            .referred_by
            .get(public_id)
            .map(|&index| tables.referrals[index].clone()))
    }

    fn referrals_by(&self, referrer: &str) -> RegistryResult<Vec<Referral>> {
        let tables = self.read()?;
        let Some(indices) = tables.by_referrer.get(&PublicId::canonical(referrer)) else {
            return Ok(Vec::new());
        };
        Ok(indices.iter().map(|&i| tables.referrals[i].clone()).collect())
    }

    fn counts(&self) -> RegistryResult<RegistryCounts> {
        let tables = self.read()?;
        Ok(RegistryCounts {
            users: tables.users.len(),
            referrals: tables.referrals.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;
    use crate::registry::SeededIds;

    fn text(handle: &str) -> Option<InternalHandle> {
        Some(InternalHandle::Text(handle.to_owned()))
    }

    /// Hands out the same bytes every time.
    struct StuckIds;

    impl IdSource for StuckIds {
        fn random_bytes(&self) -> [u8; 16] {
            [0x42; 16]
        }
    }

    #[test]
    fn test_register_and_refer() {
        let registry = MemoryRegistry::default();

        let pid1 = registry.register(text("u1"), None).unwrap();
        let pid2 = registry.register(text("u2"), Some(&pid1.to_string())).unwrap();
        assert_ne!(pid1, pid2);

        let user = registry.get_user(&pid2.to_string()).unwrap().unwrap();
        assert_eq!(user.internal_handle, text("u2"));
        assert_eq!(user.public_id, pid2);

        let referral = registry.referred_by(&pid2).unwrap().unwrap();
        assert_eq!(referral.referrer_public_id, pid1.to_string());
        assert_eq!(referral.new_user_public_id, pid2);
        assert!(registry.referred_by(&pid1).unwrap().is_none());

        assert!(registry.get_user("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_get_user_returns_written_record() {
        let registry = MemoryRegistry::default();
        let pid = registry.register(Some(InternalHandle::Number(8530795944)), None).unwrap();

        let user = registry.get_user(&pid.to_string()).unwrap().unwrap();
        assert_eq!(user.internal_handle, Some(InternalHandle::Number(8530795944)));
        assert_eq!(registry.get_user(&pid.to_string()).unwrap().unwrap(), user);
    }

    #[test]
    fn test_fabricated_id_not_found() {
        let registry = MemoryRegistry::default();
        registry.register(text("u1"), None).unwrap();

        let fabricated = PublicId::mint(&SeededIds::new(1)).to_string();
        assert!(registry.get_user(&fabricated).unwrap().is_none());
        assert!(registry.get_user("").unwrap().is_none());
    }

    #[test]
    fn test_referral_edges_counted() {
        let registry = MemoryRegistry::default();
        let pid1 = registry.register(text("u1"), None).unwrap();
        assert_eq!(registry.counts().unwrap().referrals, 0);

        registry.register(text("u2"), Some(&pid1.to_string())).unwrap();
        registry.register(text("u3"), Some("")).unwrap();
        registry.register(None, None).unwrap();

        assert_eq!(
            registry.counts().unwrap(),
            RegistryCounts { users: 4, referrals: 1 }
        );
    }

    #[test]
    fn test_whitespace_referrer_is_recorded() {
        let registry = MemoryRegistry::default();
        let pid = registry.register(None, Some("   ")).unwrap();

        let referral = registry.referred_by(&pid).unwrap().unwrap();
        assert_eq!(referral.referrer_public_id, "   ");
        assert_eq!(
            registry.counts().unwrap(),
            RegistryCounts { users: 1, referrals: 1 }
        );
    }

    #[test]
    fn test_unknown_referrer_is_recorded() {
        let registry = MemoryRegistry::default();
        let pid = registry.register(text("u1"), Some("someone-we-never-met")).unwrap();

        let referral = registry.referred_by(&pid).unwrap().unwrap();
        assert_eq!(referral.referrer_public_id, "someone-we-never-met");
        assert_eq!(registry.referrals_by("someone-we-never-met").unwrap().len(), 1);
    }

    #[test]
    fn test_referrals_by_uses_canonical_form() {
        let registry = MemoryRegistry::default();
        let pid1 = registry.register(text("u1"), None).unwrap();
        let upper = pid1.to_string().to_uppercase();

        let pid2 = registry.register(text("u2"), Some(&upper)).unwrap();
        let pid3 = registry.register(text("u3"), Some(&pid1.to_string())).unwrap();

        let referred: Vec<_> = registry
            .referrals_by(&pid1.to_string())
            .unwrap()
            .into_iter()
            .map(|r| r.new_user_public_id)
            .collect();
        assert_eq!(referred, vec![pid2, pid3]);
        assert!(registry.referrals_by(&pid2.to_string()).unwrap().is_empty());
    }

    #[test]
    fn test_collision_is_fatal_and_writes_nothing() {
        let registry = MemoryRegistry::new(Box::new(StuckIds));
        let pid = registry.register(text("u1"), None).unwrap();

        let err = registry.register(text("u2"), Some(&pid.to_string())).unwrap_err();
        assert!(matches!(err, RegistryError::Collision(id) if id == pid));

        assert_eq!(
            registry.counts().unwrap(),
            RegistryCounts { users: 1, referrals: 0 }
        );
        let user = registry.get_user(&pid.to_string()).unwrap().unwrap();
        assert_eq!(user.internal_handle, text("u1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_registrations() {
        let registry = Arc::new(MemoryRegistry::default());

        let mut tasks = Vec::new();
        for i in 0..1000 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.register(text(&format!("u{i}")), None).unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap());
        }

        assert_eq!(ids.len(), 1000);
        assert_eq!(
            registry.counts().unwrap(),
            RegistryCounts { users: 1000, referrals: 0 }
        );
        for id in &ids {
            let user = registry.get_user(&id.to_string()).unwrap().unwrap();
            assert_eq!(user.public_id, *id);
        }
    }

    #[test]
    fn test_concurrent_referrals_one_edge_each() {
        let registry = Arc::new(MemoryRegistry::default());
        let root = registry.register(text("root"), None).unwrap().to_string();

        let ids: Vec<PublicId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|t| {
                    let registry = &registry;
                    let root = &root;
                    s.spawn(move || {
                        (0..50)
                            .map(|i| registry.register(text(&format!("u{t}-{i}")), Some(root)).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(registry.referrals_by(&root).unwrap().len(), 800);
        for id in ids {
            let referral = registry.referred_by(&id).unwrap().unwrap();
            assert_eq!(referral.referrer_public_id, root);
        }
    }
}
