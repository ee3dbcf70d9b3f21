//! # Colaboradores Hosted
//!
//! Implementações em memória dos subsistemas que o pageout consulta. Servem
//! ao `pageoutd` (simulação) e aos testes.
//!
//! | Tipo          | Trait          | Observação                               |
//! |---------------|----------------|------------------------------------------|
//! | `SoftPmap`    | `Pmap`         | bits de referência/modificação por página |
//! | `MemStore`    | `PageStore`    | grava pedidos, status programáveis        |
//! | `ProcTable`   | `ProcessTable` | lista fixa, grava kills e renices         |
//! | `CountingSyncer` | `Syncer`    | conta pedidos de speedup                  |

pub mod pmap;
pub mod procs;
pub mod store;

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::mm::pager::Syncer;
use crate::mm::Collaborators;

pub use pmap::SoftPmap;
pub use procs::ProcTable;
pub use store::MemStore;

/// Conta os pedidos de speedup do syncer.
#[derive(Debug, Default)]
pub struct CountingSyncer {
    speedups: AtomicUsize,
}

impl CountingSyncer {
    pub fn speedups(&self) -> usize {
        self.speedups.load(Ordering::Relaxed)
    }
}

impl Syncer for CountingSyncer {
    fn speedup(&self) {
        self.speedups.fetch_add(1, Ordering::Relaxed);
    }
}

/// Conjunto de colaboradores em memória.
#[derive(Debug, Clone, Default)]
pub struct HostedEnv {
    pub pmap: Arc<SoftPmap>,
    pub procs: Arc<ProcTable>,
    pub syncer: Arc<CountingSyncer>,
}

impl HostedEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            pmap: self.pmap.clone(),
            procs: self.procs.clone(),
            syncer: Some(self.syncer.clone() as Arc<dyn Syncer>),
        }
    }
}
