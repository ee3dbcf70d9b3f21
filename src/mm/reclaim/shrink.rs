//! # Shrink de Objeto
//!
//! Entrada do governador de recursos: um processo ocioso ou grande demais
//! deve encolher. O pageout envelhece as páginas mapeadas do objeto e
//! desmapeia as que esfriaram, até sobrarem `desired` páginas mapeadas.
//!
//! Nada é liberado aqui. As páginas desmapeadas só ficam mais baratas para o
//! próximo scan da fila inativa.

use crate::mm::config::{ACT_ADVANCE, ACT_DECLINE};
use crate::mm::error::ReclaimResult;
use crate::mm::object::ObjectId;
use crate::mm::page::{PageFlags, PageQueueKind};
use crate::mm::Vm;

impl Vm {
    /// Encolhe o conjunto mapeado de `id` até `desired` páginas.
    ///
    /// Retorna quantas páginas foram desativadas. Objetos com escrita em
    /// andamento são deixados em paz.
    pub fn shrink_object(&self, id: ObjectId, desired: usize) -> ReclaimResult<usize> {
        let object = self.object(id)?;
        let obj = object.lock();
        if obj.is_dead() || obj.pip > 0 {
            return Ok(0);
        }

        let mut mapped = obj
            .pages
            .values()
            .filter(|&&page| self.pmap.is_mapped(page))
            .count();
        let mut deactivated = 0;

        for &page_id in obj.pages.values() {
            if mapped <= desired {
                break;
            }
            let Some(page) = self.pages.get(page_id) else {
                continue;
            };
            let mut p = page.lock();
            if p.is_pinned() || !self.pmap.is_mapped(page_id) {
                continue;
            }

            let act_delta = self.pmap.ts_referenced(page_id) + p.take_referenced();
            let domain = self.domain_of(page);
            match p.queue {
                PageQueueKind::Active if act_delta == 0 => {
                    p.act_decline(ACT_DECLINE);
                    if p.act_count == 0 {
                        if self.pmap.remove_all(page_id) {
                            p.flags.insert(PageFlags::DIRTY);
                        }
                        domain.transfer(page, &mut p, PageQueueKind::Inactive, false);
                        mapped -= 1;
                        deactivated += 1;
                    } else {
                        domain.requeue(page, &mut p);
                    }
                }
                PageQueueKind::Active => {
                    p.act_advance(u32::from(ACT_ADVANCE));
                    domain.requeue(page, &mut p);
                }
                _ if act_delta != 0 => {
                    self.activate_locked(page, &mut p);
                    p.act_advance(act_delta);
                }
                PageQueueKind::Inactive => {
                    if self.pmap.remove_all(page_id) {
                        p.flags.insert(PageFlags::DIRTY);
                    }
                    mapped -= 1;
                }
                _ => {}
            }
        }

        crate::kdebug!(
            "(PAGEOUT) shrink {}: {} desativadas, {} mapeadas (alvo {})",
            id,
            deactivated,
            mapped,
            desired
        );
        Ok(deactivated)
    }
}
