//! # Scan da Fila Ativa
//!
//! Envelhece as páginas ativas e alimenta a fila inativa.
//!
//! - Mesmo sem falta, um mínimo de páginas é visitado por passada, de modo
//!   que a fila inteira seja revisitada a cada `pageout_update_period`
//!   segundos.
//! - Com falta de páginas inativas, a fila inteira pode ser visitada.
//!
//! Referenciada: o contador sobe `ACT_ADVANCE + referências`. Não
//! referenciada: desce `ACT_DECLINE`. Ao chegar em zero a página é
//! desativada: limpa para a inativa, suja para a laundry. Enquanto não houver
//! falta, toda página desativada vai para a inativa.

use core::sync::atomic::Ordering;

use super::cursor::QueueScan;
use super::domain::VmDomain;
use super::queue::Slot;
use crate::core::time::HZ;
use crate::mm::config::{ACT_ADVANCE, ACT_DECLINE};
use crate::mm::page::{PageId, PageQueueKind};
use crate::mm::stats::PageoutStats;
use crate::mm::Vm;

impl Vm {
    /// Scan da fila ativa. `inactq_shortage` é a falta de páginas inativas,
    /// já multiplicada pelo peso de uma página limpa.
    pub(crate) fn scan_active(&self, dom: &VmDomain, mut inactq_shortage: i64) {
        let tunables = self.tunables();
        let weight = i64::from(tunables.act_scan_laundry_weight.max(1));
        let queue = dom.queue(PageQueueKind::Active);
        let count = queue.len();

        let now = self.clock.ticks();
        let last = dom.last_active_scan.load(Ordering::Relaxed);
        let min_scan = if tunables.pageout_update_period == 0 {
            0
        } else {
            let elapsed = now.saturating_sub(last);
            let period = HZ * u64::from(tunables.pageout_update_period);
            ((count as u64).saturating_mul(elapsed) / period).min(count as u64) as usize
        };
        if min_scan > 0 || (inactq_shortage > 0 && count > 0) {
            dom.last_active_scan.store(now, Ordering::Relaxed);
        }

        let max_scan = if inactq_shortage > 0 { count } else { min_scan };
        if max_scan == 0 {
            return;
        }

        let mut scan = QueueScan::begin(queue, dom.new_marker(), max_scan);
        let mut deactivated = 0usize;
        loop {
            if scan.scanned() >= min_scan && inactq_shortage <= 0 {
                break;
            }
            let Some(slot) = scan.next() else {
                break;
            };
            let Slot::Page(id) = slot else {
                continue;
            };
            PageoutStats::inc(&self.stats.scanned);
            if let Some(target) = self.visit_active(&scan, id, inactq_shortage) {
                deactivated += 1;
                inactq_shortage -= match target {
                    PageQueueKind::Inactive if inactq_shortage > 0 => weight,
                    PageQueueKind::Laundry => 1,
                    _ => 0,
                };
            }
        }

        if deactivated > 0 {
            crate::ktrace!(
                "(PAGEOUT) dom{} ativa: {} de {} visitadas desativadas",
                dom.id,
                deactivated,
                scan.scanned()
            );
        }
    }

    /// Envelhece uma página. Retorna a fila de destino se foi desativada.
    fn visit_active(
        &self,
        scan: &QueueScan<'_>,
        id: PageId,
        inactq_shortage: i64,
    ) -> Option<PageQueueKind> {
        let page = self.page(id).ok()?;
        let object = self.owner_of(page)?;
        let mut p = page.lock();
        if p.object != Some(object.id)
            || p.queue != PageQueueKind::Active
            || !scan.still_after(id)
        {
            PageoutStats::inc(&self.stats.identity_changes);
            return None;
        }

        // Leitura sem o lock do objeto: um valor velho só atrasa a decisão.
        let refs = if object.ref_count() != 0 {
            self.pmap.ts_referenced(id)
        } else {
            0
        };
        let act_delta = p.take_referenced() + refs;
        if act_delta != 0 {
            p.act_advance(u32::from(ACT_ADVANCE) + act_delta);
        } else {
            p.act_decline(ACT_DECLINE);
        }

        let domain = self.domain_of(page);
        if p.act_count != 0 {
            domain.requeue(page, &mut p);
            return None;
        }

        let target = if inactq_shortage <= 0 || !p.is_dirty() {
            PageQueueKind::Inactive
        } else {
            PageQueueKind::Laundry
        };
        domain.transfer(page, &mut p, target, false);
        PageoutStats::inc(&self.stats.deactivated);
        Some(target)
    }
}
