//! # Contadores Físicos e Entradas do Alocador
//!
//! O contador global de páginas livres tem seu próprio lock e sua condição de
//! espera. As estatísticas de reclaim (déficit, alvos) ficam atrás de outro
//! lock, lidas por toda passada de todo domínio.
//!
//! O alocador em si é externo. Aqui ficam só os pontos de contato:
//!
//! | Entrada             | Quem chama        | Efeito                              |
//! |---------------------|-------------------|-------------------------------------|
//! | `page_alloc`        | VM                | tira do pool livre, acorda o daemon |
//! | `page_free`         | VM                | devolve ao pool, acorda quem espera |
//! | `pagedaemon_wakeup` | alocador          | pede uma passada                    |
//! | `add_deficit`       | alocador          | falta além do alvo                  |
//! | `vm_wait`           | alocador          | dorme até sair do mínimo            |

use std::time::{Duration, Instant};

use crate::mm::config::PagingTargets;
use crate::mm::error::{ReclaimError, ReclaimResult};
use crate::mm::object::ObjectId;
use crate::mm::page::{PageFlags, PageId, PageQueueKind, PageSnapshot};
use crate::mm::Vm;
use crate::sync::{mutex, CondVar, Mutex, Spinlock};

#[derive(Debug)]
struct FreeState {
    count: usize,
    /// Threads dormindo em `vm_wait`
    waiters: usize,
}

/// Alvos e déficit compartilhados.
#[derive(Debug, Clone, Copy, Default)]
struct ReclaimState {
    /// Falta registrada pelo alocador além do alvo
    deficit: usize,
    targets: PagingTargets,
}

/// Contadores de páginas físicas.
#[derive(Debug)]
pub struct PhysCounters {
    total: usize,
    free: Mutex<FreeState>,
    free_cv: CondVar,
    reclaim: Spinlock<ReclaimState>,
}

impl PhysCounters {
    pub fn new(total: usize, targets: PagingTargets) -> Self {
        Self {
            total,
            free: Mutex::new(FreeState {
                count: total,
                waiters: 0,
            }),
            free_cv: CondVar::new(),
            reclaim: Spinlock::new(ReclaimState {
                targets,
                ..ReclaimState::default()
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn free_count(&self) -> usize {
        mutex::lock(&self.free).count
    }

    /// Reserva uma página livre.
    fn take_one(&self) -> bool {
        let mut free = mutex::lock(&self.free);
        if free.count == 0 {
            return false;
        }
        free.count -= 1;
        true
    }

    /// `n` páginas voltaram ao pool.
    pub fn freed(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut free = mutex::lock(&self.free);
        free.count += n;
        if free.waiters > 0 {
            self.free_cv.notify_all();
        }
    }

    /// Acorda quem espera por memória (mesmo sem páginas novas).
    pub fn wake_waiters(&self) {
        let _free = mutex::lock(&self.free);
        self.free_cv.notify_all();
    }

    pub fn targets(&self) -> PagingTargets {
        self.reclaim.lock().targets
    }

    /// Páginas que faltam para o alvo (negativo = sobra)
    pub fn paging_target(&self) -> i64 {
        self.targets().free_target as i64 - self.free_count() as i64
    }

    /// O daemon precisa rodar?
    pub fn paging_needed(&self) -> bool {
        self.free_count() < self.targets().wakeup_thresh
    }

    /// Abaixo do mínimo: alocações comuns esperam
    pub fn count_min(&self) -> bool {
        self.free_count() < self.targets().free_min
    }

    pub fn add_deficit(&self, n: usize) {
        self.reclaim.lock().deficit += n;
    }

    /// Lê e zera o déficit.
    pub fn take_deficit(&self) -> usize {
        core::mem::take(&mut self.reclaim.lock().deficit)
    }

    pub fn deficit(&self) -> usize {
        self.reclaim.lock().deficit
    }

    /// Dorme até `ready` ou até `deadline`. Retorna `ready()` no fim.
    fn wait_until<F>(&self, deadline: Option<Instant>, mut ready: F) -> bool
    where
        F: FnMut(usize) -> bool,
    {
        let mut free = mutex::lock(&self.free);
        free.waiters += 1;
        loop {
            if ready(free.count) {
                break;
            }
            let slice = Duration::from_millis(100);
            let timeout = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    slice.min(deadline - now)
                }
                None => slice,
            };
            let (guard, _) = mutex::wait_timeout(&self.free_cv, free, timeout);
            free = guard;
        }
        free.waiters -= 1;
        ready(free.count)
    }
}

// =============================================================================
// ENTRADAS DO ALOCADOR
// =============================================================================

impl Vm {
    /// Aloca uma página para `object` em `pindex`.
    ///
    /// A página nasce válida, limpa e na fila ativa. Se o offset já tem
    /// página, devolve a existente.
    pub fn page_alloc(&self, object: ObjectId, pindex: u64) -> ReclaimResult<PageId> {
        let obj = self.object(object)?;
        let mut inner = obj.lock();
        if inner.is_dead() {
            return Err(ReclaimError::NoSuchObject);
        }
        if let Some(&existing) = inner.pages.get(&pindex) {
            return Ok(existing);
        }

        let preferred = object.0 as usize % self.domains.len();
        if !self.pmm.take_one() {
            drop(inner);
            self.add_deficit(1);
            crate::kwarn!("(PMM) Sem páginas livres para {}:{}", object, pindex);
            return Err(ReclaimError::OutOfMemory);
        }
        let popped = (0..self.domains.len())
            .map(|step| &self.domains[(preferred + step) % self.domains.len()])
            .find_map(|domain| domain.queue(PageQueueKind::Free).lock().pop_page());
        let Some(id) = popped else {
            drop(inner);
            self.pmm.freed(1);
            return Err(ReclaimError::OutOfMemory);
        };
        let page = self.page(id)?;
        let domain = self.domain_of(page);
        {
            let mut p = page.lock();
            p.object = Some(object);
            p.pindex = pindex;
            p.flags = PageFlags::VALID;
            p.busy = 0;
            p.hold = 0;
            p.act_count = 0;
            p.act_activate();
            domain.enqueue(page, &mut p, PageQueueKind::Active, false);
        }
        inner.pages.insert(pindex, id);
        drop(inner);

        if self.pmm.paging_needed() {
            domain.pagedaemon_wakeup();
        }
        Ok(id)
    }

    /// Devolve uma página de objeto ao pool livre.
    ///
    /// Falha com `ResourceBusy` se a página está em I/O ou presa.
    pub fn page_free(&self, id: PageId) -> ReclaimResult<()> {
        let page = self.page(id)?;
        let obj = self.owner_of(page).ok_or(ReclaimError::NoSuchPage)?;
        let mut inner = obj.lock();
        {
            let mut p = page.lock();
            if p.object != Some(obj.id) {
                return Err(ReclaimError::IdentityChanged);
            }
            if p.is_pinned() {
                return Err(ReclaimError::ResourceBusy);
            }
            inner.pages.remove(&p.pindex);
            self.pmap.remove_all(id);
            self.release_page(page, &mut p);
        }
        drop(inner);
        self.pmm.freed(1);
        Ok(())
    }

    /// Acorda o scan worker de um domínio.
    pub fn pagedaemon_wakeup(&self, domain: usize) {
        if let Some(domain) = self.domains.get(domain) {
            domain.pagedaemon_wakeup();
        }
    }

    /// Registra falta além do alvo e acorda os daemons.
    pub fn add_deficit(&self, n: usize) {
        self.pmm.add_deficit(n);
        for domain in &self.domains {
            domain.pagedaemon_wakeup();
        }
    }

    /// Dorme até o pool sair do mínimo (ou o sistema desligar).
    pub fn vm_wait(&self) {
        while !self.vm_wait_timeout(Duration::from_secs(1)) {
            if self.is_shutting_down() {
                return;
            }
        }
    }

    /// Como `vm_wait`, com limite. Retorna se a memória voltou.
    pub fn vm_wait_timeout(&self, timeout: Duration) -> bool {
        let free_min = self.pmm.targets().free_min;
        if self.pmm.free_count() >= free_min {
            return true;
        }
        for domain in &self.domains {
            domain.pagedaemon_wakeup();
        }
        let deadline = Instant::now() + timeout;
        self.pmm
            .wait_until(Some(deadline), |free| free >= free_min || self.is_shutting_down())
            && self.pmm.free_count() >= free_min
    }

    // =========================================================================
    // OPERAÇÕES DE PÁGINA (camada VM)
    // =========================================================================

    /// Leva a página para a fila ativa.
    pub fn page_activate(&self, id: PageId) -> ReclaimResult<()> {
        self.with_owned_page(id, |vm, page, p| {
            p.act_activate();
            if p.queue != PageQueueKind::Active {
                vm.domain_of(page).transfer(page, p, PageQueueKind::Active, false);
            }
        })
    }

    /// Leva a página para a cauda da fila inativa.
    pub fn page_deactivate(&self, id: PageId) -> ReclaimResult<()> {
        self.with_owned_page(id, |vm, page, p| {
            p.act_count = 0;
            vm.domain_of(page).transfer(page, p, PageQueueKind::Inactive, false);
        })
    }

    /// Manda uma página suja para a laundry (limpa vai para a inativa).
    pub fn page_launder(&self, id: PageId) -> ReclaimResult<()> {
        self.with_owned_page(id, |vm, page, p| {
            let to = if p.is_dirty() {
                PageQueueKind::Laundry
            } else {
                PageQueueKind::Inactive
            };
            vm.domain_of(page).transfer(page, p, to, false);
        })
    }

    /// Marca a página como modificada.
    pub fn page_dirty(&self, id: PageId) -> ReclaimResult<()> {
        self.with_owned_page(id, |_, _, p| p.flags.insert(PageFlags::DIRTY))
    }

    /// Referência vista por software (ex: `read()` de um arquivo).
    pub fn page_reference(&self, id: PageId) -> ReclaimResult<()> {
        self.with_owned_page(id, |_, _, p| p.flags.insert(PageFlags::REFERENCED))
    }

    /// Conteúdo descartado; a página será liberada na próxima visita.
    pub fn page_invalidate(&self, id: PageId) -> ReclaimResult<()> {
        self.with_owned_page(id, |vm, page, p| {
            p.flags.remove(PageFlags::VALID | PageFlags::DIRTY);
            if p.queue.is_laundry() {
                // Laundry só guarda páginas sujas.
                vm.domain_of(page).transfer(page, p, PageQueueKind::Inactive, false);
            }
        })
    }

    /// Prende a página (wired).
    pub fn page_hold(&self, id: PageId) -> ReclaimResult<()> {
        self.with_owned_page(id, |_, _, p| p.hold += 1)
    }

    pub fn page_unhold(&self, id: PageId) -> ReclaimResult<()> {
        self.with_owned_page(id, |_, _, p| p.hold = p.hold.saturating_sub(1))
    }

    pub fn page_snapshot(&self, id: PageId) -> Option<PageSnapshot> {
        self.pages.snapshot(id)
    }

    /// Executa `f` com o lock da página, se ela pertence a um objeto.
    fn with_owned_page<F>(&self, id: PageId, f: F) -> ReclaimResult<()>
    where
        F: FnOnce(&Vm, &crate::mm::page::Page, &mut crate::mm::page::PageInner),
    {
        let page = self.page(id)?;
        let mut p = page.lock();
        if p.object.is_none() {
            return Err(ReclaimError::NoSuchPage);
        }
        f(self, page, &mut p);
        Ok(())
    }

    /// Páginas livres agora
    pub fn free_count(&self) -> usize {
        self.pmm.free_count()
    }

    /// Falta atual para o alvo de livres (negativo = sobra)
    pub fn paging_target(&self) -> i64 {
        self.pmm.paging_target()
    }
}
