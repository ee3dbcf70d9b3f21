//! # Estatísticas do Pageout

use core::sync::atomic::{AtomicU64, Ordering};

/// Contadores do daemon, compartilhados por todos os domínios.
#[derive(Debug, Default)]
pub struct PageoutStats {
    /// Scan worker acordado por pedido explícito
    pub wakeups: AtomicU64,
    /// Passadas que terminaram sem atingir o alvo
    pub shortfalls: AtomicU64,
    pub scanned: AtomicU64,
    /// Inativa/laundry -> ativa
    pub reactivated: AtomicU64,
    /// Ativa -> inativa/laundry
    pub deactivated: AtomicU64,
    pub freed: AtomicU64,
    /// Páginas aceitas pelo pager
    pub laundered: AtomicU64,
    /// Enviadas para stasis por falta de swap
    pub stasis: AtomicU64,
    /// Vnode pulado por timeout de lock
    pub lock_misses: AtomicU64,
    pub identity_changes: AtomicU64,
    pub busy_skips: AtomicU64,
    pub write_errors: AtomicU64,
    pub oom_votes: AtomicU64,
    pub oom_kills: AtomicU64,
}

/// Cópia instantânea dos contadores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageoutSnapshot {
    pub wakeups: u64,
    pub shortfalls: u64,
    pub scanned: u64,
    pub reactivated: u64,
    pub deactivated: u64,
    pub freed: u64,
    pub laundered: u64,
    pub stasis: u64,
    pub lock_misses: u64,
    pub identity_changes: u64,
    pub busy_skips: u64,
    pub write_errors: u64,
    pub oom_votes: u64,
    pub oom_kills: u64,
}

impl PageoutStats {
    #[inline]
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PageoutSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PageoutSnapshot {
            wakeups: load(&self.wakeups),
            shortfalls: load(&self.shortfalls),
            scanned: load(&self.scanned),
            reactivated: load(&self.reactivated),
            deactivated: load(&self.deactivated),
            freed: load(&self.freed),
            laundered: load(&self.laundered),
            stasis: load(&self.stasis),
            lock_misses: load(&self.lock_misses),
            identity_changes: load(&self.identity_changes),
            busy_skips: load(&self.busy_skips),
            write_errors: load(&self.write_errors),
            oom_votes: load(&self.oom_votes),
            oom_kills: load(&self.oom_kills),
        }
    }
}

impl PageoutSnapshot {
    /// Fração das páginas visitadas que foram liberadas (%)
    pub fn reclaim_percent(&self) -> u64 {
        if self.scanned == 0 {
            return 0;
        }
        self.freed * 100 / self.scanned
    }
}
