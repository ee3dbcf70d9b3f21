//! # Clustering e Flush
//!
//! Uma página suja raramente está sozinha: vizinhas no mesmo objeto costumam
//! estar sujas também. O pageout junta o run contíguo em volta da página e
//! faz **um** pedido de escrita para o run inteiro.
//!
//! ```text
//!   offset:   ... 29  30  31 │ 32  33 [34] 35  36 ...
//!                            │  ◀── reverso ──┘  └─ frente ──▶
//!                       fronteira de alinhamento (múltiplo do limite)
//! ```
//!
//! O scan reverso vem primeiro e para na fronteira de alinhamento; depois
//! vem o scan para frente. Se sobrar espaço, o reverso continua além da
//! fronteira.
//!
//! ## Status por página
//!
//! | Status        | Efeito                                            |
//! |---------------|---------------------------------------------------|
//! | `Complete`    | limpa, cabeça da inativa                          |
//! | `Pending`     | continua busy até `pageout_done`                  |
//! | `OutOfBounds` | limpa (conteúdo descartado), cabeça da inativa    |
//! | `Error/Fail`  | stasis (swap esgotado) ou ativa                   |
//! | `Again`       | run aceito encurta até esta página                |

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::mm::error::{ReclaimError, ReclaimResult, StorageFault};
use crate::mm::object::{ObjectInner, VmObject};
use crate::mm::page::{PageFlags, PageId, PageQueueKind};
use crate::mm::pager::{PageIo, PagerStatus};
use crate::mm::stats::PageoutStats;
use crate::mm::Vm;
use crate::sync::MutexGuard;

/// Resultado de um flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Páginas escritas, pendentes ou seguradas em stasis
    pub paged_out: usize,
    /// Prefixo do run aceito pelo pager
    pub runlen: usize,
    /// Houve erro de I/O dentro do prefixo aceito
    pub eio: bool,
}

impl Vm {
    /// Escreve a página suja `id` (e seu cluster).
    ///
    /// Chamado sem locks. Para objetos de vnode o lock do arquivo vem
    /// primeiro, com espera limitada; depois objeto e página são travados de
    /// novo e revalidados.
    pub(crate) fn pageout(
        &self,
        object: &Arc<VmObject>,
        id: PageId,
        pindex: u64,
    ) -> ReclaimResult<usize> {
        let tunables = self.tunables();

        let _vnode_guard = match object.pager.vnode() {
            Some(vnode) => {
                let timeout = Duration::from_millis(tunables.vnode_lock_timeout_ms);
                Some(vnode.lock_timed(timeout).ok_or(ReclaimError::LockTimeout)?)
            }
            None => None,
        };

        let obj = object.lock();
        if obj.is_dead() {
            return Err(ReclaimError::IdentityChanged);
        }
        let page = self.page(id)?;
        let queue = {
            let mut p = page.lock();
            if p.object != Some(object.id)
                || p.pindex != pindex
                || !p.queue.is_laundry()
                || !p.is_dirty()
            {
                return Err(ReclaimError::IdentityChanged);
            }
            if p.is_pinned() {
                return Err(ReclaimError::ResourceBusy);
            }
            self.pmap.remove_write(id);
            p.busy += 1;
            p.queue
        };

        let start = PageIo { page: id, pindex };
        let run = self.cluster(&obj, start, tunables.cluster_pages());
        crate::ktrace!(
            "(LAUNDRY) {} {}: cluster de {} a partir de {} ({})",
            object.id,
            object.pager.name(),
            run.len(),
            pindex,
            queue.name()
        );

        let outcome = self.flush(object, obj, &run);
        if outcome.eio {
            crate::kdebug!(
                "(LAUNDRY) {}: erro de escrita em {} páginas",
                object.id,
                run.len() - outcome.paged_out
            );
        }
        Ok(outcome.paged_out)
    }

    /// Junta o run contíguo de páginas sujas em volta de `start`.
    ///
    /// `start` já está busy. Cada vizinha aceita fica busy e sem escrita.
    /// Lock do objeto já adquirido.
    pub(crate) fn cluster(&self, obj: &ObjectInner, start: PageIo, limit: usize) -> Vec<PageIo> {
        let limit = limit.max(1);
        let pindex = start.pindex;
        let mut run = VecDeque::with_capacity(limit);
        run.push_back(start);

        // Distância da próxima vizinha para trás (0 = parou) e para frente.
        let mut ib: u64 = 1;
        let mut is: u64 = 1;
        loop {
            while ib != 0 && run.len() < limit {
                if ib > pindex {
                    ib = 0;
                    break;
                }
                match self.cluster_candidate(obj, pindex - ib) {
                    Some(io) => run.push_front(io),
                    None => {
                        ib = 0;
                        break;
                    }
                }
                ib += 1;
                if (pindex - (ib - 1)) % limit as u64 == 0 {
                    break;
                }
            }

            while run.len() < limit && pindex + is < obj.size {
                match self.cluster_candidate(obj, pindex + is) {
                    Some(io) => run.push_back(io),
                    None => break,
                }
                is += 1;
            }

            if ib == 0 || run.len() >= limit {
                break;
            }
        }
        run.into()
    }

    /// Vizinha residente, suja, livre e ainda esperando escrita.
    fn cluster_candidate(&self, obj: &ObjectInner, pindex: u64) -> Option<PageIo> {
        let &id = obj.pages.get(&pindex)?;
        let page = self.pages.get(id)?;
        let mut p = page.lock();
        if p.busy != 0 {
            return None;
        }
        if !p.is_dirty() && self.pmap.is_modified(id) {
            p.flags.insert(PageFlags::DIRTY);
        }
        if !p.is_dirty() || p.hold != 0 || !p.queue.is_laundry() {
            return None;
        }
        self.pmap.remove_write(id);
        p.busy += 1;
        Some(PageIo { page: id, pindex })
    }

    /// Um pedido de escrita para o run inteiro e o tratamento de cada status.
    ///
    /// Todas as páginas do run chegam busy. O lock do objeto é solto durante
    /// a escrita; o contador `pip` segura o objeto vivo.
    pub(crate) fn flush<'a>(
        &self,
        object: &'a VmObject,
        mut obj: MutexGuard<'a, ObjectInner>,
        run: &[PageIo],
    ) -> FlushOutcome {
        object.pip_add(&mut obj, run.len() as u32);
        drop(obj);
        let status = object.pager.put_pages(object.id, run);
        let mut obj = object.lock();

        let swap_backed = object.pager.is_swap();
        let swap_devices = self.swap.attached();
        let mut outcome = FlushOutcome {
            paged_out: 0,
            runlen: run.len(),
            eio: false,
        };

        for (i, io) in run.iter().enumerate() {
            let status = status.get(i).copied().unwrap_or(PagerStatus::Error);
            let Some(page) = self.pages.get(io.page) else {
                continue;
            };
            let mut p = page.lock();
            match status {
                PagerStatus::Complete => {
                    p.flags.remove(PageFlags::DIRTY);
                    if p.queue.is_laundry() {
                        self.domain_of(page)
                            .transfer(page, &mut p, PageQueueKind::Inactive, true);
                    }
                    outcome.paged_out += 1;
                    PageoutStats::inc(&self.stats.laundered);
                }
                PagerStatus::Pending => outcome.paged_out += 1,
                PagerStatus::OutOfBounds => {
                    p.flags.remove(PageFlags::DIRTY);
                    if p.queue.is_laundry() {
                        self.domain_of(page)
                            .transfer(page, &mut p, PageQueueKind::Inactive, true);
                    }
                }
                PagerStatus::Error | PagerStatus::Fail => {
                    PageoutStats::inc(&self.stats.write_errors);
                    if status.fault(swap_backed, swap_devices)
                        == Some(ReclaimError::Storage(StorageFault::SwapExhausted))
                    {
                        self.domain_of(page)
                            .transfer(page, &mut p, PageQueueKind::Stasis, false);
                        outcome.paged_out += 1;
                        PageoutStats::inc(&self.stats.stasis);
                        crate::ktrace!("(LAUNDRY) {} sem swap -> stasis", io.page);
                    } else {
                        self.activate_locked(page, &mut p);
                    }
                    if i < outcome.runlen {
                        outcome.eio = true;
                    }
                }
                PagerStatus::Again => {
                    if i < outcome.runlen {
                        outcome.runlen = i;
                    }
                }
            }

            if status != PagerStatus::Pending {
                p.busy = p.busy.saturating_sub(1);
                drop(p);
                object.pip_wakeup(&mut obj);
            }
        }
        outcome
    }

    /// Fim de uma escrita que o pager deixou `Pending`.
    ///
    /// Sucesso: limpa e vai para a cabeça da inativa. Falha: suja de novo e
    /// volta à ativa.
    pub fn pageout_done(&self, id: PageId, ok: bool) -> ReclaimResult<()> {
        let page = self.page(id)?;
        let object = self.owner_of(page).ok_or(ReclaimError::NoSuchPage)?;
        let mut obj = object.lock();
        let mut p = page.lock();
        if p.object != Some(object.id) || p.busy == 0 {
            return Err(ReclaimError::IdentityChanged);
        }
        if ok {
            p.flags.remove(PageFlags::DIRTY);
            if p.queue.is_laundry() {
                self.domain_of(page)
                    .transfer(page, &mut p, PageQueueKind::Inactive, true);
            }
            PageoutStats::inc(&self.stats.laundered);
        } else {
            p.flags.insert(PageFlags::DIRTY);
            self.activate_locked(page, &mut p);
            PageoutStats::inc(&self.stats.write_errors);
        }
        p.busy -= 1;
        drop(p);
        object.pip_wakeup(&mut obj);
        Ok(())
    }
}
