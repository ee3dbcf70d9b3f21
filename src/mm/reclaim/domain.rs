//! # Domínio de Memória
//!
//! Cada domínio (nó NUMA) tem suas cinco filas, seu scan worker, seu laundry
//! worker e sua sequência de falhas para o OOM.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::daemon::DaemonState;
use super::laundry::LaundryRequest;
use super::queue::{Marker, PageQueue, Slot};
use crate::mm::page::{Page, PageInner, PageQueueKind};
use crate::sync::{mutex, CondVar, Mutex};

/// Controle do scan worker (sob `VmDomain::daemon`).
#[derive(Debug)]
pub(crate) struct DaemonCtl {
    /// Alguém pediu uma passada
    pub wanted: bool,
    pub state: DaemonState,
}

/// Controle do laundry worker (sob `VmDomain::laundry`).
#[derive(Debug)]
pub(crate) struct LaundryCtl {
    pub request: LaundryRequest,
}

/// Um domínio de memória.
#[derive(Debug)]
pub struct VmDomain {
    pub id: usize,
    queues: [PageQueue; PageQueueKind::COUNT],
    next_marker: AtomicU32,
    /// Passadas seguidas sem progresso
    pub(crate) oom_seq: AtomicU32,
    /// Scans da fila inativa com falta (limiar de lavagem em background)
    pub(crate) wakeups: AtomicU64,
    /// Tick do último scan da fila ativa
    pub(crate) last_active_scan: AtomicU64,
    pub(crate) daemon: Mutex<DaemonCtl>,
    pub(crate) daemon_cv: CondVar,
    pub(crate) laundry: Mutex<LaundryCtl>,
    pub(crate) laundry_cv: CondVar,
}

impl VmDomain {
    pub fn new(id: usize, now: u64) -> Self {
        Self {
            id,
            queues: PageQueueKind::ALL.map(PageQueue::new),
            next_marker: AtomicU32::new(0),
            oom_seq: AtomicU32::new(0),
            wakeups: AtomicU64::new(0),
            last_active_scan: AtomicU64::new(now),
            daemon: Mutex::new(DaemonCtl {
                wanted: false,
                state: DaemonState::Sleeping,
            }),
            daemon_cv: CondVar::new(),
            laundry: Mutex::new(LaundryCtl {
                request: LaundryRequest::Idle,
            }),
            laundry_cv: CondVar::new(),
        }
    }

    #[inline]
    pub fn queue(&self, kind: PageQueueKind) -> &PageQueue {
        &self.queues[kind.index()]
    }

    /// Páginas na fila (sem lock)
    #[inline]
    pub fn count(&self, kind: PageQueueKind) -> usize {
        self.queue(kind).len()
    }

    pub(crate) fn new_marker(&self) -> Marker {
        Marker::new(self.next_marker.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // MOVIMENTO ENTRE FILAS (lock da página já adquirido)
    // =========================================================================

    /// Coloca a página na fila `kind`. A página não pode estar em nenhuma.
    pub(crate) fn enqueue(&self, page: &Page, p: &mut PageInner, kind: PageQueueKind, head: bool) {
        p.queue = kind;
        let mut q = self.queue(kind).lock();
        if head {
            q.push_head(Slot::Page(page.id));
        } else {
            q.push_tail(Slot::Page(page.id));
        }
    }

    /// Tira a página da fila em que está.
    pub(crate) fn dequeue(&self, page: &Page, p: &PageInner) {
        self.queue(p.queue).lock().remove(Slot::Page(page.id));
    }

    /// Move para outra fila. Nunca segura os dois locks de fila juntos.
    pub(crate) fn transfer(&self, page: &Page, p: &mut PageInner, to: PageQueueKind, head: bool) {
        self.dequeue(page, p);
        self.enqueue(page, p, to, head);
    }

    /// Volta para a cauda da própria fila.
    pub(crate) fn requeue(&self, page: &Page, p: &mut PageInner) {
        let kind = p.queue;
        self.transfer(page, p, kind, false);
    }

    // =========================================================================
    // WORKERS
    // =========================================================================

    /// Pede uma passada ao scan worker.
    pub fn pagedaemon_wakeup(&self) {
        let mut ctl = mutex::lock(&self.daemon);
        if !ctl.wanted {
            ctl.wanted = true;
            self.daemon_cv.notify_all();
        }
    }

    pub fn daemon_state(&self) -> DaemonState {
        mutex::lock(&self.daemon).state
    }

    pub fn laundry_request(&self) -> LaundryRequest {
        mutex::lock(&self.laundry).request
    }

    /// Sequência atual de passadas sem progresso
    pub fn oom_seq(&self) -> u32 {
        self.oom_seq.load(Ordering::Relaxed)
    }
}
