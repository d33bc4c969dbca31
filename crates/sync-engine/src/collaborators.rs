// crates/sync-engine/src/collaborators.rs
//! Host-side collaborators consulted by the coordinator

/// Decides whether the local user may sync at all
///
/// Checked before every network call.
pub trait SyncGate: Send + Sync {
    fn is_allowed(&self) -> bool;
}

impl<F> SyncGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_allowed(&self) -> bool {
        self()
    }
}

/// Gate that always allows
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl SyncGate for AllowAll {
    fn is_allowed(&self) -> bool {
        true
    }
}

/// Supplies the `createdBy` attribution for new records
pub trait DisplayNameProvider: Send + Sync {
    fn display_name(&self) -> String;
}

impl<F> DisplayNameProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn display_name(&self) -> String {
        self()
    }
}

/// Fixed display name
#[derive(Debug, Clone)]
pub struct StaticName(pub String);

impl DisplayNameProvider for StaticName {
    fn display_name(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_gate() {
        let open = Arc::new(AtomicBool::new(false));
        let flag = open.clone();
        let gate = move || flag.load(Ordering::SeqCst);

        assert!(!gate.is_allowed());
        open.store(true, Ordering::SeqCst);
        assert!(gate.is_allowed());
        assert!(AllowAll.is_allowed());
    }

    #[test]
    fn test_display_names() {
        let fixed = StaticName("alice".to_string());
        assert_eq!(fixed.display_name(), "alice");

        let dynamic = || "bob".to_string();
        assert_eq!(dynamic.display_name(), "bob");
    }
}
