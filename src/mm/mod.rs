//! # Memory Management: Pageout
//!
//! O módulo `mm` decide, sob pressão de memória, quais páginas físicas ficam,
//! quais saem, quais páginas sujas precisam ser escritas antes de reusadas e,
//! em último caso, qual processo morre para liberar memória.
//!
//! ## 🏗️ Arquitetura dos Módulos
//!
//! | Módulo           | Responsabilidade                                          |
//! |------------------|-----------------------------------------------------------|
//! | `page`           | Arena de descritores de página (IDs estáveis)             |
//! | `object`         | Objetos de memória: páginas por offset, refs, I/O em curso |
//! | `pager`          | Backing stores (swap, vnode, phys)                        |
//! | `pmap`           | Consulta de referência/modificação (colaborador)          |
//! | `pmm`            | Contador de livres, alvos, entradas do alocador           |
//! | `swap`           | Devices de swap presentes                                 |
//! | `reclaim`        | Filas, scans, laundry, clustering, OOM, workers           |
//!
//! ## Contexto compartilhado
//!
//! Todo estado global (filas, estatísticas de reclaim, votos de OOM) vive num
//! único [`Vm`], criado no boot e passado a cada worker como `Arc<Vm>`. Não
//! existe teardown implícito: [`Vm::shutdown`] só para os workers.
//!
//! ## 🔒 Ordem de Lock
//!
//! ```text
//! Vnode (espera limitada) → Objeto (Mutex) → Página (spin) → Fila (spin)
//! ```
//!
//! Contadores (livres, reclaim, OOM) são folhas: nada é travado depois deles.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub mod config;
pub mod error;
pub mod object;
pub mod page;
pub mod pager;
pub mod pmap;
pub mod pmm;
pub mod reclaim;
pub mod stats;
pub mod swap;

#[cfg(feature = "self_test")]
pub mod test;

use crate::core::time::Clock;
use crate::sched::ProcessTable;
use config::{PagingTargets, Tunables};
use error::{ReclaimError, ReclaimResult};
use object::{ObjectTable, VmObject};
use page::{Page, PageArena, PageId, PageInner, PageQueueKind};
use pager::Syncer;
use pmap::Pmap;
use pmm::PhysCounters;
use reclaim::domain::VmDomain;
use reclaim::oom::OomQuorum;
use reclaim::queue::Slot;
use stats::{PageoutSnapshot, PageoutStats};
use swap::SwapDevices;
use crate::sync::{mutex, Mutex, Spinlock};

pub use object::ObjectId;
pub use page::PageFlags;
pub use pager::{PageIo, PageStore, Pager, PagerStatus, Vnode};

/// Parâmetros de construção do [`Vm`].
#[derive(Debug, Clone)]
pub struct VmConfig {
    pub domains: usize,
    pub pages_per_domain: usize,
    pub tunables: Tunables,
    /// `None`: deriva do total de páginas
    pub targets: Option<PagingTargets>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            domains: 1,
            pages_per_domain: 1024,
            tunables: Tunables::default(),
            targets: None,
        }
    }
}

/// Subsistemas externos que o pageout consulta.
#[derive(Clone)]
pub struct Collaborators {
    pub pmap: Arc<dyn Pmap>,
    pub procs: Arc<dyn ProcessTable>,
    pub syncer: Option<Arc<dyn Syncer>>,
}

/// Contexto do subsistema de pageout.
pub struct Vm {
    pub(crate) pages: PageArena,
    pub(crate) objects: ObjectTable,
    pub(crate) domains: Vec<VmDomain>,
    pub(crate) pmm: PhysCounters,
    pub(crate) swap: SwapDevices,
    pub(crate) oom: OomQuorum,
    pub(crate) stats: PageoutStats,
    tunables: Spinlock<Tunables>,
    pub(crate) clock: Clock,
    pub(crate) pmap: Arc<dyn Pmap>,
    pub(crate) procs: Arc<dyn ProcessTable>,
    pub(crate) syncer: Option<Arc<dyn Syncer>>,
    pub(crate) shutdown: AtomicBool,
    pub(crate) workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Vm {
    /// Cria o contexto com todas as páginas no pool livre.
    pub fn new(config: VmConfig, collaborators: Collaborators) -> Arc<Self> {
        let ndomains = config.domains.max(1);
        let pages = PageArena::new(ndomains, config.pages_per_domain);
        let targets = config
            .targets
            .unwrap_or_else(|| PagingTargets::from_page_count(pages.len(), &config.tunables));
        let clock = Clock::new();
        let now = clock.ticks();

        let domains: Vec<VmDomain> = (0..ndomains).map(|id| VmDomain::new(id, now)).collect();
        for page in pages.iter() {
            let mut q = domains[page.domain].queue(PageQueueKind::Free).lock();
            q.push_tail(Slot::Page(page.id));
        }

        crate::kinfo!(
            "(VM) {} domínio(s), {} páginas, alvo livre={} inativo={}",
            ndomains,
            pages.len(),
            targets.free_target,
            targets.inactive_target
        );

        Arc::new(Self {
            pmm: PhysCounters::new(pages.len(), targets),
            pages,
            objects: ObjectTable::new(),
            oom: OomQuorum::new(ndomains),
            domains,
            swap: SwapDevices::new(),
            stats: PageoutStats::default(),
            tunables: Spinlock::new(config.tunables),
            clock,
            pmap: collaborators.pmap,
            procs: collaborators.procs,
            syncer: collaborators.syncer,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        })
    }

    // =========================================================================
    // ACESSO
    // =========================================================================

    pub fn tunables(&self) -> Tunables {
        *self.tunables.lock()
    }

    /// Altera um tunable em runtime (`vm.*`).
    pub fn set_tunable(&self, name: &str, value: &str) -> ReclaimResult<()> {
        let mut tunables = self.tunables.lock();
        let mut updated = *tunables;
        updated.set(name, value)?;
        *tunables = updated;
        Ok(())
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn domains(&self) -> &[VmDomain] {
        &self.domains
    }

    pub fn domain(&self, idx: usize) -> Option<&VmDomain> {
        self.domains.get(idx)
    }

    pub fn pmm(&self) -> &PhysCounters {
        &self.pmm
    }

    pub fn stats(&self) -> PageoutSnapshot {
        self.stats.snapshot()
    }

    pub fn swap_devices(&self) -> usize {
        self.swap.attached()
    }

    /// Páginas de uma fila, em ordem
    pub fn queue_pages(&self, domain: usize, kind: PageQueueKind) -> Vec<PageId> {
        self.domains
            .get(domain)
            .map(|d| d.queue(kind).page_ids())
            .unwrap_or_default()
    }

    /// Soma da fila em todos os domínios
    pub fn queue_count(&self, kind: PageQueueKind) -> usize {
        self.domains.iter().map(|d| d.count(kind)).sum()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    // =========================================================================
    // HELPERS INTERNOS
    // =========================================================================

    pub(crate) fn page(&self, id: PageId) -> ReclaimResult<&Page> {
        self.pages.get(id).ok_or(ReclaimError::NoSuchPage)
    }

    #[inline]
    pub(crate) fn domain_of(&self, page: &Page) -> &VmDomain {
        &self.domains[page.domain]
    }

    /// Objeto dono, lido sem o lock do objeto (precisa revalidar depois).
    pub(crate) fn owner_of(&self, page: &Page) -> Option<Arc<VmObject>> {
        page.owner().and_then(|id| self.objects.get(id))
    }

    /// Desliga a página do objeto e devolve ao pool livre.
    ///
    /// Lock do objeto e da página já adquiridos; o chamador tira a página
    /// do mapa do objeto e chama `pmm.freed` depois de soltar os locks.
    pub(crate) fn release_page(&self, page: &Page, p: &mut PageInner) {
        let domain = self.domain_of(page);
        domain.dequeue(page, p);
        p.object = None;
        p.pindex = 0;
        p.flags = PageFlags::empty();
        p.busy = 0;
        p.hold = 0;
        p.act_count = 0;
        domain.enqueue(page, p, PageQueueKind::Free, false);
    }

    /// Reativa: contador pelo menos ACT_INIT, cauda da fila ativa.
    pub(crate) fn activate_locked(&self, page: &Page, p: &mut PageInner) {
        p.act_activate();
        if p.queue != PageQueueKind::Active {
            self.domain_of(page)
                .transfer(page, p, PageQueueKind::Active, false);
        }
    }

    // =========================================================================
    // AUDITORIA
    // =========================================================================

    /// Verifica os invariantes de fila e de página.
    ///
    /// Só é exato com os workers parados. Retorna uma linha por violação.
    pub fn audit(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut membership = vec![0u8; self.pages.len()];

        for domain in &self.domains {
            for kind in PageQueueKind::ALL {
                let queue = domain.queue(kind).lock();
                for slot in queue.iter() {
                    match slot {
                        Slot::Marker(m) => problems.push(format!(
                            "domínio {}: marcador {} esquecido em {}",
                            domain.id,
                            m,
                            kind.name()
                        )),
                        Slot::Page(id) => {
                            if let Some(n) = membership.get_mut(id.index()) {
                                *n += 1;
                            }
                        }
                    }
                }
            }
        }

        for page in self.pages.iter() {
            let p = page.lock();
            let count = membership[page.id.index()];
            if count != 1 {
                problems.push(format!("{} está em {} filas", page.id, count));
            }
            let listed = self
                .domain_of(page)
                .queue(p.queue)
                .lock()
                .contains(Slot::Page(page.id));
            if !listed {
                problems.push(format!("{} fora da fila {}", page.id, p.queue.name()));
            }
            if p.queue.is_laundry() && !p.is_dirty() {
                problems.push(format!("{} limpa em {}", page.id, p.queue.name()));
            }
            if p.act_count > config::ACT_MAX {
                problems.push(format!("{} act_count={}", page.id, p.act_count));
            }
            if (p.queue == PageQueueKind::Free) != p.object.is_none() {
                problems.push(format!("{} dono inconsistente", page.id));
            }
        }

        let free_listed = self.queue_count(PageQueueKind::Free);
        if free_listed != self.pmm.free_count() {
            problems.push(format!(
                "pool livre tem {} páginas, contador diz {}",
                free_listed,
                self.pmm.free_count()
            ));
        }
        problems
    }

    /// Junta os workers lançados por `start`.
    pub(crate) fn join_workers(&self) {
        let handles = core::mem::take(&mut *mutex::lock(&self.workers));
        for handle in handles {
            if handle.join().is_err() {
                crate::kerror!("(VM) Worker terminou com panic");
            }
        }
    }
}

impl core::fmt::Debug for Vm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vm")
            .field("domains", &self.domains.len())
            .field("pages", &self.pages.len())
            .field("free", &self.pmm.free_count())
            .field("objects", &self.objects.len())
            .finish()
    }
}
