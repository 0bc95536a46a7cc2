//! Index partition resolution.
//!
//! Maps an authenticated caller and a request's declared scope to the set of
//! storage partitions a request may touch. Resolution is pure and
//! side-effect-free so the identity-to-storage mapping is auditable in one
//! place and testable without any backend: tenant isolation is a provable
//! function here, not a naming convention scattered across call sites.

use crate::config::IndexConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{CallerId, Partition, Scope};

/// Resolve the partitions a read (query) may target.
///
/// `Shared` → the shared corpus; `Private` → the caller's own partition;
/// `Both` → shared plus the caller's own. No input resolves to another
/// caller's private partition.
pub fn resolve_read(caller: &CallerId, scope: Scope) -> GatewayResult<Vec<Partition>> {
    match scope {
        Scope::Shared => Ok(vec![Partition::Shared]),
        Scope::Private => Ok(vec![private_partition(caller)?]),
        Scope::Both => Ok(vec![Partition::Shared, private_partition(caller)?]),
    }
}

/// Resolve the single partition a write (ingest/delete) targets.
///
/// Writes never fan out: `Both` is a validation error.
pub fn resolve_write(caller: &CallerId, scope: Scope) -> GatewayResult<Partition> {
    match scope {
        Scope::Shared => Ok(Partition::Shared),
        Scope::Private => private_partition(caller),
        Scope::Both => Err(GatewayError::Validation(
            "writes must target exactly one partition; scope 'both' is query-only".to_string(),
        )),
    }
}

/// An empty caller id with a private scope means auth never ran — a contract
/// violation upstream of this module, fatal to the request.
fn private_partition(caller: &CallerId) -> GatewayResult<Partition> {
    if caller.is_empty() {
        return Err(GatewayError::Resolution(
            "private partition requested with an unset caller id".to_string(),
        ));
    }
    Ok(Partition::Private(caller.clone()))
}

/// Derives physical index names from logical partitions.
#[derive(Debug, Clone)]
pub struct IndexNaming {
    shared: String,
    private_prefix: String,
}

impl IndexNaming {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            shared: config.shared.clone(),
            private_prefix: config.private_prefix.clone(),
        }
    }

    pub fn index_name(&self, partition: &Partition) -> String {
        match partition {
            Partition::Shared => self.shared.clone(),
            Partition::Private(owner) => {
                format!("{}{}", self.private_prefix, sanitize(owner.as_str()))
            }
        }
    }
}

/// Caller ids are often email-shaped; index names must not contain `@` or `.`.
fn sanitize(owner: &str) -> String {
    owner.replace('@', "__").replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    fn caller(id: &str) -> CallerId {
        CallerId::new(id)
    }

    #[test]
    fn test_resolve_shared() {
        let set = resolve_read(&caller("u1"), Scope::Shared).unwrap();
        assert_eq!(set, vec![Partition::Shared]);
    }

    #[test]
    fn test_resolve_private() {
        let set = resolve_read(&caller("u1"), Scope::Private).unwrap();
        assert_eq!(set, vec![Partition::Private(caller("u1"))]);
    }

    #[test]
    fn test_resolve_both() {
        let set = resolve_read(&caller("u1"), Scope::Both).unwrap();
        assert_eq!(
            set,
            vec![Partition::Shared, Partition::Private(caller("u1"))]
        );
    }

    #[test]
    fn test_empty_caller_is_resolution_error() {
        let err = resolve_read(&caller(""), Scope::Private).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resolution);
        let err = resolve_read(&caller("   "), Scope::Both).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resolution);
    }

    #[test]
    fn test_empty_caller_shared_still_resolves() {
        // A shared-only read never needs the caller as a partition key.
        let set = resolve_read(&caller(""), Scope::Shared).unwrap();
        assert_eq!(set, vec![Partition::Shared]);
    }

    #[test]
    fn test_write_rejects_both() {
        let err = resolve_write(&caller("u1"), Scope::Both).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn test_write_resolves_single_partition() {
        assert_eq!(
            resolve_write(&caller("u1"), Scope::Shared).unwrap(),
            Partition::Shared
        );
        assert_eq!(
            resolve_write(&caller("u1"), Scope::Private).unwrap(),
            Partition::Private(caller("u1"))
        );
    }

    /// Tenant isolation as a property: across random caller pairs, one
    /// caller's resolved set never contains the other's private partition.
    #[test]
    fn test_isolation_over_random_caller_pairs() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let a: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from)
                .collect();
            let b: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from)
                .collect();
            if a == b {
                continue;
            }
            for scope in [Scope::Shared, Scope::Private, Scope::Both] {
                let set = resolve_read(&caller(&a), scope).unwrap();
                assert!(
                    !set.contains(&Partition::Private(caller(&b))),
                    "caller {a} resolved into {b}'s private partition"
                );
            }
        }
    }

    #[test]
    fn test_index_naming() {
        let naming = IndexNaming::new(&IndexConfig {
            shared: "corpus".to_string(),
            private_prefix: "tenant-".to_string(),
        });
        assert_eq!(naming.index_name(&Partition::Shared), "corpus");
        assert_eq!(
            naming.index_name(&Partition::Private(caller("alice@example.com"))),
            "tenant-alice__example_com"
        );
    }
}
