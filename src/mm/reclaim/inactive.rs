//! # Scan da Fila Inativa
//!
//! Anda da cabeça para a cauda da fila inativa até cobrir a falta de páginas
//! livres ou esgotar a fila. Para cada página:
//!
//! | Situação                                  | Destino                     |
//! |-------------------------------------------|-----------------------------|
//! | movida durante o unlock                   | ignorada                    |
//! | busy / held                               | fica, conta como "presa"    |
//! | nunca inicializada                        | liberada                    |
//! | referenciada, objeto mapeado              | ativa (contador reforçado)  |
//! | referenciada, objeto sem mapeamento       | cauda da inativa            |
//! | limpa                                     | liberada                    |
//! | suja, objeto vivo                         | laundry                     |
//! | suja, objeto morrendo                     | fica (a destruição libera)  |
//!
//! Nenhum erro de página interrompe o scan e nada é repetido na mesma passada.

use core::sync::atomic::Ordering;

use super::cursor::QueueScan;
use super::domain::VmDomain;
use super::laundry::LaundryRequest;
use super::queue::Slot;
use crate::mm::config::ACT_ADVANCE;
use crate::mm::object::ObjectInner;
use crate::mm::page::{Page, PageFlags, PageId, PageInner, PageQueueKind};
use crate::mm::stats::PageoutStats;
use crate::mm::Vm;
use crate::sync::mutex;

/// O que aconteceu com uma página visitada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Freed,
    /// Busy ou held: não conta como progresso
    Stuck,
    Kept,
}

impl Vm {
    /// Uma passada do scan worker no domínio `domain`.
    ///
    /// A passada 0 só faz contabilidade (envelhecimento da fila ativa). A
    /// partir da passada 1 o scan calcula a falta e age sobre ela.
    ///
    /// Retorna `true` se a falta foi coberta.
    pub fn scan(&self, domain: usize, pass: u32) -> bool {
        let Some(dom) = self.domains.get(domain) else {
            return true;
        };
        let tunables = self.tunables();

        // Falta inicial: pode ser negativa se alguém liberou páginas entre o
        // wakeup e aqui.
        let (deficit, starting) = if pass > 0 {
            let deficit = self.pmm.take_deficit() as i64;
            (deficit, self.pmm.paging_target() + deficit)
        } else {
            (0, 0)
        };

        let (page_shortage, addl_shortage) = self.scan_inactive(dom, starting);

        if starting > 0 {
            dom.wakeups.fetch_add(1, Ordering::Relaxed);
            self.post_laundry_request(dom, page_shortage);
            if page_shortage > 0 {
                PageoutStats::inc(&self.stats.shortfalls);
            }
        }

        self.mightbe_oom(dom, page_shortage, starting);

        // Quanto mover da fila ativa. Páginas limpas valem `weight` vezes uma
        // suja: só elas podem ser liberadas logo.
        let weight = i64::from(tunables.act_scan_laundry_weight.max(1));
        let targets = self.pmm.targets();
        let inactive = self.queue_count(PageQueueKind::Inactive) as i64;
        let laundry = self.queue_count(PageQueueKind::Laundry) as i64;
        let inactq_shortage = (targets.inactive_target as i64 - (inactive + laundry / weight)
            + self.pmm.paging_target()
            + deficit
            + addl_shortage)
            * weight;
        self.scan_active(dom, inactq_shortage);

        crate::kdebug!(
            "(PAGEOUT) dom{} pass={} falta {} -> {} (presas {}, inativa alvo {})",
            dom.id,
            pass,
            starting,
            page_shortage,
            addl_shortage,
            inactq_shortage
        );
        page_shortage <= 0
    }

    /// Scan da fila inativa. Retorna (falta restante, páginas presas).
    pub(crate) fn scan_inactive(&self, dom: &VmDomain, starting: i64) -> (i64, i64) {
        let mut page_shortage = starting;
        let mut addl_shortage = 0;
        if page_shortage <= 0 {
            return (page_shortage, addl_shortage);
        }

        let queue = dom.queue(PageQueueKind::Inactive);
        let mut scan = QueueScan::begin(queue, dom.new_marker(), queue.len());
        while page_shortage > 0 {
            let Some(slot) = scan.next() else {
                break;
            };
            let Slot::Page(id) = slot else {
                continue;
            };
            PageoutStats::inc(&self.stats.scanned);
            match self.visit_inactive(&scan, id) {
                Visit::Freed => {
                    page_shortage -= 1;
                    self.pmm.freed(1);
                }
                Visit::Stuck => addl_shortage += 1,
                Visit::Kept => {}
            }
        }
        (page_shortage, addl_shortage)
    }

    fn visit_inactive(&self, scan: &QueueScan<'_>, id: PageId) -> Visit {
        let Ok(page) = self.page(id) else {
            return Visit::Kept;
        };
        // Sem dono: está sendo liberada por outro caminho.
        let Some(object) = self.owner_of(page) else {
            return Visit::Kept;
        };
        let mut obj = object.lock();
        let mut p = page.lock();
        if p.object != Some(object.id)
            || p.queue != PageQueueKind::Inactive
            || !scan.still_after(id)
        {
            PageoutStats::inc(&self.stats.identity_changes);
            crate::ktrace!("(PAGEOUT) {} mudou durante o unlock", id);
            return Visit::Kept;
        }
        if p.is_pinned() {
            PageoutStats::inc(&self.stats.busy_skips);
            return Visit::Stuck;
        }

        if !p.is_valid() {
            self.free_locked(page, &mut p, &mut obj);
            return Visit::Freed;
        }

        let mapped = object.ref_count() != 0;
        let refs = if mapped { self.pmap.ts_referenced(id) } else { 0 };
        let act_delta = refs + p.take_referenced();
        if act_delta != 0 {
            if mapped {
                self.activate_locked(page, &mut p);
                p.act_advance(u32::from(ACT_ADVANCE) + act_delta);
                PageoutStats::inc(&self.stats.reactivated);
                crate::ktrace!("(PAGEOUT) {} reativada (act={})", id, p.act_count);
                return Visit::Kept;
            }
            if !obj.is_dead() {
                self.domain_of(page).requeue(page, &mut p);
                return Visit::Kept;
            }
        }

        // Revoga escrita antes do teste de sujeira: nada escreve na página
        // entre o teste e a decisão.
        if mapped && self.pmap.is_mapped(id) {
            if self.pmap.remove_write(id) {
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
        if !obj.is_dead() {
            self.domain_of(page)
                .transfer(page, &mut p, PageQueueKind::Laundry, false);
            crate::ktrace!("(PAGEOUT) {} suja -> laundry", id);
        }
        Visit::Kept
    }

    /// Libera uma página visitada pelo scan. O chamador chama `pmm.freed`.
    pub(crate) fn free_locked(&self, page: &Page, p: &mut PageInner, obj: &mut ObjectInner) {
        obj.pages.remove(&p.pindex);
        self.release_page(page, p);
        PageoutStats::inc(&self.stats.freed);
    }

    /// Acorda o laundry worker depois de um scan com falta.
    ///
    /// Falta restante vira pedido de shortfall; falta coberta vira pedido de
    /// background. Sem páginas na laundry e sem swap, não há o que lavar.
    fn post_laundry_request(&self, dom: &VmDomain, page_shortage: i64) {
        let has_work = dom.count(PageQueueKind::Laundry) > 0 || self.swap.attached() > 0;
        if !has_work {
            return;
        }
        let request = if page_shortage > 0 {
            LaundryRequest::Shortfall
        } else {
            LaundryRequest::Background
        };
        let mut ctl = mutex::lock(&dom.laundry);
        if request > ctl.request {
            ctl.request = request;
            dom.laundry_cv.notify_all();
        }
    }
}
