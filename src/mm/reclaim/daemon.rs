//! # Workers do Pageout
//!
//! Cada domínio roda duas threads independentes:
//!
//! | Thread          | Acorda                                  | Faz                   |
//! |-----------------|-----------------------------------------|-----------------------|
//! | `pagedaemon{N}` | pedido do alocador, ou timer de 1s      | `Vm::scan(N, pass)`   |
//! | `laundry{N}`    | `launder_rate` vezes por segundo, pedido | `LaundryWorker`       |
//!
//! ## Estados do scan worker
//!
//! ```text
//!              timer                     pedido
//!   Sleeping ─────────▶ Pass0    Sleeping ───────▶ PassN (pass = 1)
//!                                    ▲                │ alvo não atingido
//!                                    │ alvo atingido  ▼
//!                                    └─────────── PassN (pass += 1, pausa)
//! ```
//!
//! A passada 0 só envelhece a fila ativa. Enquanto o pedido continuar de pé
//! depois de um scan, a passada sobe (com uma pausa de
//! `1 / inact_scan_rate` a partir da segunda).

use std::sync::Arc;
use std::time::Duration;

use super::laundry::{LaundryRequest, LaundryWorker};
use crate::core::time::{per_second, HZ};
use crate::mm::config::PAGEOUT_TIMER_TICKS;
use crate::mm::stats::PageoutStats;
use crate::mm::Vm;
use crate::sync::mutex;

/// Estado do scan worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Sleeping,
    /// Passada de contabilidade
    Pass0,
    /// Passada de reclaim (1 ou mais)
    PassN,
}

impl Vm {
    /// Lança os workers de todos os domínios.
    ///
    /// Chamadas repetidas não lançam nada.
    pub fn start(self: &Arc<Self>) {
        let mut workers = mutex::lock(&self.workers);
        if !workers.is_empty() {
            return;
        }
        for domain in 0..self.domains.len() {
            let vm = Arc::clone(self);
            let scan = std::thread::Builder::new()
                .name(format!("pagedaemon{}", domain))
                .spawn(move || vm.scan_worker(domain));
            let vm = Arc::clone(self);
            let laundry = std::thread::Builder::new()
                .name(format!("laundry{}", domain))
                .spawn(move || vm.laundry_worker(domain));

            for handle in [scan, laundry] {
                match handle {
                    Ok(handle) => workers.push(handle),
                    Err(err) => crate::kerror!("(PAGEOUT) Falha ao criar worker: {}", err),
                }
            }
        }
        crate::kinfo!(
            "(PAGEOUT) {} workers iniciados em {} domínio(s)",
            workers.len(),
            self.domains.len()
        );
    }

    /// Para e junta todos os workers.
    pub fn shutdown(&self) {
        self.shutdown
            .store(true, core::sync::atomic::Ordering::Release);
        for dom in &self.domains {
            {
                let _ctl = mutex::lock(&dom.daemon);
                dom.daemon_cv.notify_all();
            }
            let _ctl = mutex::lock(&dom.laundry);
            dom.laundry_cv.notify_all();
        }
        self.pmm.wake_waiters();
        self.join_workers();
        crate::kinfo!("(PAGEOUT) Workers parados");
    }

    // =========================================================================
    // SCAN WORKER
    // =========================================================================

    fn scan_worker(&self, domain: usize) {
        let Some(dom) = self.domains.get(domain) else {
            return;
        };
        crate::kdebug!("(PAGEOUT) dom{}: scan worker no ar", domain);
        let timer = Duration::from_millis(PAGEOUT_TIMER_TICKS * 1000 / HZ);
        let mut pass: u32 = 0;
        let mut target_met = true;

        while !self.is_shutting_down() {
            // Quem dormiu em vm_wait durante a passada pode sair agora.
            if !self.pmm.count_min() {
                self.pmm.wake_waiters();
            }

            let mut ctl = mutex::lock(&dom.daemon);
            // O pedido só cai quando o alvo é atingido; senão o worker seria
            // acordado de novo logo em seguida.
            if ctl.wanted && target_met {
                ctl.wanted = false;
            }

            if ctl.wanted {
                drop(ctl);
                if pass >= 1 {
                    let pause = per_second(self.tunables().inact_scan_rate);
                    let ctl = mutex::lock(&dom.daemon);
                    let _ = mutex::wait_timeout_while(&dom.daemon_cv, ctl, pause, |_| {
                        !self.is_shutting_down()
                    });
                }
                pass = pass.saturating_add(1);
            } else {
                ctl.state = DaemonState::Sleeping;
                let (guard, timed_out) =
                    mutex::wait_timeout_while(&dom.daemon_cv, ctl, timer, |c| {
                        !c.wanted && !self.is_shutting_down()
                    });
                drop(guard);
                if timed_out {
                    pass = 0;
                } else {
                    PageoutStats::inc(&self.stats.wakeups);
                    pass = 1;
                }
            }

            if self.is_shutting_down() {
                break;
            }
            mutex::lock(&dom.daemon).state = if pass == 0 {
                DaemonState::Pass0
            } else {
                DaemonState::PassN
            };
            target_met = self.scan(domain, pass);
        }

        mutex::lock(&dom.daemon).state = DaemonState::Sleeping;
        crate::kdebug!("(PAGEOUT) dom{}: scan worker saiu", domain);
    }

    // =========================================================================
    // LAUNDRY WORKER
    // =========================================================================

    fn laundry_worker(&self, domain: usize) {
        let Some(dom) = self.domains.get(domain) else {
            return;
        };
        crate::kdebug!("(LAUNDRY) dom{}: laundry worker no ar", domain);
        let mut worker = LaundryWorker::new(domain);

        while !self.is_shutting_down() {
            worker.run_once(self);

            let interval = per_second(self.tunables().launder_rate);
            let ctl = mutex::lock(&dom.laundry);
            let idle = worker.target() == 0;
            let _ = mutex::wait_timeout_while(&dom.laundry_cv, ctl, interval, |c| {
                !self.is_shutting_down() && (!idle || c.request == LaundryRequest::Idle)
            });
            if self.is_shutting_down() {
                break;
            }
            worker.take_request(self);
        }
        crate::kdebug!("(LAUNDRY) dom{}: laundry worker saiu", domain);
    }
}
