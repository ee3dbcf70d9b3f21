//! # Laundry
//!
//! Páginas sujas não podem ser liberadas: antes precisam ser escritas no
//! backing store. O laundry worker de cada domínio faz isso em ciclos
//! curtos (`launder_rate` por segundo), independente do scan worker.
//!
//! ## Quanto lavar
//!
//! | Modo        | Gatilho                                   | Páginas por ciclo                    |
//! |-------------|-------------------------------------------|--------------------------------------|
//! | Shortfall   | scan terminou com falta                   | (falta de inativas + livres) / ciclos |
//! | Background  | `sujas * isqrt(wakeups) >= limpas`        | `background_launder_rate`            |
//! | Idle        | nenhum dos dois, laundry não vazia        | piso `idle_launder_rate`             |
//!
//! Um shortfall é dividido em `launder_rate / inact_scan_rate` ciclos, o
//! intervalo entre duas passadas do scan worker. O background para sozinho
//! depois de `background_launder_max` sem nenhum wakeup novo do scan.
//!
//! ## Filas
//!
//! Stasis só é varrida com swap presente; depois vem a laundry. Uma página
//! referenciada volta à ativa (e conta como lavada fora de shortfall: sair
//! pela ativa também recicla a fila).

use core::sync::atomic::Ordering;
use std::sync::Arc;

use super::cursor::QueueScan;
use super::domain::VmDomain;
use super::queue::Slot;
use crate::mm::config::{Tunables, ACT_ADVANCE};
use crate::mm::error::ReclaimError;
use crate::mm::object::VmObject;
use crate::mm::page::{PageFlags, PageId, PageQueueKind};
use crate::mm::stats::PageoutStats;
use crate::mm::Vm;
use crate::sync::mutex;

/// Pedido do scan worker ao laundry worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LaundryRequest {
    Idle,
    Background,
    Shortfall,
}

/// Resultado da visita a uma página da laundry.
enum Visit {
    Freed,
    Activated,
    Kept,
    /// Precisa de escrita; locks já soltos
    Pageout { object: Arc<VmObject>, pindex: u64 },
}

// =============================================================================
// WORKER
// =============================================================================

/// Estado do laundry worker de um domínio entre ciclos.
#[derive(Debug, Clone)]
pub struct LaundryWorker {
    domain: usize,
    /// Falta pedida pelo scan, ainda não iniciada
    shortfall: usize,
    /// Páginas que ainda faltam lavar no modo atual
    target: usize,
    shortfall_cycle: u32,
    in_shortfall: bool,
    /// Wakeups do scan na última lavagem
    last_launder: u64,
    /// Alvo quando o último wakeup foi visto
    last_target: usize,
}

impl LaundryWorker {
    pub fn new(domain: usize) -> Self {
        Self {
            domain,
            shortfall: 0,
            target: 0,
            shortfall_cycle: 0,
            in_shortfall: false,
            last_launder: 0,
            last_target: 0,
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn in_shortfall(&self) -> bool {
        self.in_shortfall
    }

    /// Um ciclo: decide quanto lavar e lava. Retorna as páginas lavadas.
    pub fn run_once(&mut self, vm: &Vm) -> usize {
        let Some(dom) = vm.domain(self.domain) else {
            return 0;
        };
        let tunables = vm.tunables();
        let wakeups = dom.wakeups.load(Ordering::Relaxed);

        if self.shortfall > 0 {
            self.in_shortfall = true;
            self.shortfall_cycle = tunables.shortfall_cycles();
            self.target = core::mem::take(&mut self.shortfall);
        } else if self.in_shortfall
            && (self.shortfall_cycle == 0 || vm.pmm.paging_target() <= 0)
        {
            // Terminou o run, ou a falta sumiu por outro caminho.
            self.in_shortfall = false;
            self.target = 0;
        }

        let mut launder = if self.in_shortfall {
            self.last_launder = wakeups;
            let cycle = self.shortfall_cycle.max(1);
            self.shortfall_cycle = cycle - 1;
            self.target.div_ceil(cycle as usize)
        } else {
            self.background(vm, dom, &tunables, wakeups)
        };

        if launder == 0 && !self.in_shortfall && dom.count(PageQueueKind::Laundry) > 0 {
            launder = tunables.idle_pages_per_cycle();
        }
        if launder == 0 {
            return 0;
        }

        let done = vm.launder(self.domain, launder, self.in_shortfall);
        self.target -= done.min(self.target);
        crate::ktrace!(
            "(LAUNDRY) dom{} lavou {}/{} (alvo restante {}, shortfall={})",
            self.domain,
            done,
            launder,
            self.target,
            self.in_shortfall
        );
        done
    }

    /// Alvo de background. Zero quando não há motivo para lavar.
    fn background(&mut self, vm: &Vm, dom: &VmDomain, tunables: &Tunables, wakeups: u64) -> usize {
        let nclean = vm.pmm.free_count() + vm.queue_count(PageQueueKind::Inactive);
        let ndirty = vm.queue_count(PageQueueKind::Laundry);
        if self.target == 0
            && wakeups != self.last_launder
            && ndirty.saturating_mul(isqrt(wakeups - self.last_launder) as usize) >= nclean
        {
            self.target = vm.pmm.targets().background_launder_target;
            crate::kdebug!(
                "(LAUNDRY) dom{} background: {} sujas, {} limpas, alvo {}",
                dom.id,
                ndirty,
                nclean,
                self.target
            );
        }
        if self.target == 0 {
            return 0;
        }

        if wakeups != self.last_launder {
            self.last_launder = wakeups;
            self.last_target = self.target;
        } else if self.last_target.saturating_sub(self.target) >= tunables.background_max_pages() {
            // Lavou o máximo sem nenhum pedido do scan.
            self.target = 0;
            return 0;
        }
        tunables.background_pages_per_cycle().min(self.target)
    }

    /// Lê o pedido do scan worker depois de dormir.
    ///
    /// Um shortfall começa se não houver outro em andamento (e pode
    /// interromper uma lavagem em background). Sem alvo, o pedido volta a
    /// `Idle`.
    pub fn take_request(&mut self, vm: &Vm) {
        let Some(dom) = vm.domain(self.domain) else {
            return;
        };
        let mut ctl = mutex::lock(&dom.laundry);
        if ctl.request == LaundryRequest::Shortfall
            && (!self.in_shortfall || self.shortfall_cycle == 0)
        {
            // Falta de inativas mais a falta de livres.
            let targets = vm.pmm.targets();
            let wanted = targets.inactive_target as i64
                - vm.queue_count(PageQueueKind::Inactive) as i64
                + vm.pmm.paging_target()
                + vm.pmm.deficit() as i64;
            self.shortfall = wanted.max(0) as usize;
            self.target = 0;
        } else {
            self.shortfall = 0;
        }
        if self.target == 0 {
            ctl.request = LaundryRequest::Idle;
        }
    }
}

/// Raiz quadrada inteira (chão).
pub fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

// =============================================================================
// SCAN DA LAUNDRY
// =============================================================================

impl Vm {
    /// Lava até `count` páginas sujas do domínio.
    ///
    /// Retorna quantas foram lavadas (escritas, em stasis, ou reativadas fora
    /// de shortfall).
    pub fn launder(&self, domain: usize, count: usize, in_shortfall: bool) -> usize {
        let Some(dom) = self.domains.get(domain) else {
            return 0;
        };
        let tunables = self.tunables();
        let mut remaining = count as i64;
        let mut vnodes_skipped = 0usize;

        let kinds: &[PageQueueKind] = if self.swap.attached() > 0 {
            &[PageQueueKind::Stasis, PageQueueKind::Laundry]
        } else {
            &[PageQueueKind::Laundry]
        };

        for &kind in kinds {
            if remaining <= 0 {
                break;
            }
            let queue = dom.queue(kind);
            let mut scan = QueueScan::begin(queue, dom.new_marker(), queue.len());
            while remaining > 0 {
                let Some(slot) = scan.next() else {
                    break;
                };
                let Slot::Page(id) = slot else {
                    continue;
                };
                PageoutStats::inc(&self.stats.scanned);
                match self.visit_laundry(&scan, id, kind, &tunables) {
                    Visit::Freed => self.pmm.freed(1),
                    Visit::Activated => {
                        if !in_shortfall {
                            remaining -= 1;
                        }
                    }
                    Visit::Kept => {}
                    Visit::Pageout { object, pindex } => {
                        match self.pageout(&object, id, pindex) {
                            Ok(written) => {
                                remaining -= written as i64;
                                scan.charge(written.saturating_sub(1));
                            }
                            Err(ReclaimError::LockTimeout) => {
                                PageoutStats::inc(&self.stats.lock_misses);
                                vnodes_skipped += 1;
                                crate::kdebug!(
                                    "(LAUNDRY) {} pulada: vnode de {} ocupado",
                                    id,
                                    object.id
                                );
                            }
                            Err(ReclaimError::IdentityChanged) => {
                                PageoutStats::inc(&self.stats.identity_changes);
                            }
                            Err(ReclaimError::ResourceBusy) => {
                                PageoutStats::inc(&self.stats.busy_skips);
                            }
                            Err(err) => {
                                crate::kdebug!("(LAUNDRY) {}: {}", id, err);
                            }
                        }
                    }
                }
            }
        }

        if vnodes_skipped > 0 && remaining > 0 {
            if let Some(syncer) = &self.syncer {
                crate::kdebug!(
                    "(LAUNDRY) {} vnodes ocupados, acelerando o syncer",
                    vnodes_skipped
                );
                syncer.speedup();
            }
        }
        (count as i64 - remaining).max(0) as usize
    }

    fn visit_laundry(
        &self,
        scan: &QueueScan<'_>,
        id: PageId,
        kind: PageQueueKind,
        tunables: &Tunables,
    ) -> Visit {
        let Ok(page) = self.page(id) else {
            return Visit::Kept;
        };
        let Some(object) = self.owner_of(page) else {
            return Visit::Kept;
        };
        let mut obj = object.lock();
        let mut p = page.lock();
        if p.object != Some(object.id) || p.queue != kind || !scan.still_after(id) {
            PageoutStats::inc(&self.stats.identity_changes);
            return Visit::Kept;
        }
        if p.is_pinned() {
            PageoutStats::inc(&self.stats.busy_skips);
            return Visit::Kept;
        }
        if !p.is_valid() {
            self.free_locked(page, &mut p, &mut obj);
            return Visit::Freed;
        }

        let mapped = object.ref_count() != 0;
        let refs = if mapped { self.pmap.ts_referenced(id) } else { 0 };
        let act_delta = p.take_referenced() + refs;
        if act_delta != 0 {
            if mapped {
                self.activate_locked(page, &mut p);
                p.act_advance(u32::from(ACT_ADVANCE) + act_delta);
                PageoutStats::inc(&self.stats.reactivated);
                return Visit::Activated;
            }
            if !obj.is_dead() {
                self.domain_of(page).requeue(page, &mut p);
                return Visit::Kept;
            }
        }

        if mapped {
            if !p.is_dirty() && self.pmap.is_modified(id) {
                p.flags.insert(PageFlags::DIRTY);
            }
            if !p.is_dirty() && self.pmap.remove_all(id) {
                p.flags.insert(PageFlags::DIRTY);
            }
        }
        if !p.is_dirty() {
            self.free_locked(page, &mut p, &mut obj);
            return Visit::Freed;
        }
        // Objeto morrendo: a destruição libera a página.
        if obj.is_dead() {
            return Visit::Kept;
        }
        if object.pager.is_swap() && tunables.disable_swapspace_pageouts {
            self.domain_of(page).requeue(page, &mut p);
            return Visit::Kept;
        }

        let pindex = p.pindex;
        drop(p);
        drop(obj);
        Visit::Pageout { object, pindex }
    }

    /// Swap voltou: move tudo de stasis para a cauda da laundry.
    ///
    /// Cada página é travada individualmente; quem foi movida por outro
    /// caminho no meio do scan fica onde está.
    pub(crate) fn stasis_to_laundry(&self, dom: &VmDomain) -> usize {
        let queue = dom.queue(PageQueueKind::Stasis);
        let mut scan = QueueScan::begin(queue, dom.new_marker(), queue.len());
        let mut moved = 0;
        while let Some(slot) = scan.next() {
            let Slot::Page(id) = slot else {
                continue;
            };
            let Ok(page) = self.page(id) else {
                continue;
            };
            let mut p = page.lock();
            if p.queue != PageQueueKind::Stasis || !scan.still_after(id) {
                continue;
            }
            dom.transfer(page, &mut p, PageQueueKind::Laundry, false);
            moved += 1;
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isqrt_floors() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(3), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(99), 9);
        assert_eq!(isqrt(1 << 40), 1 << 20);
    }

    #[test]
    fn requests_are_ordered_by_urgency() {
        assert!(LaundryRequest::Shortfall > LaundryRequest::Background);
        assert!(LaundryRequest::Background > LaundryRequest::Idle);
    }

    #[test]
    fn new_worker_is_idle() {
        let worker = LaundryWorker::new(0);
        assert_eq!(worker.target(), 0);
        assert!(!worker.in_shortfall());
    }
}
