//! # Swap Devices
//!
//! O gerente de swap é externo; ele só avisa quando um device entra ou sai.
//! O pageout guarda a contagem, que decide entre stasis e reativação quando
//! uma escrita anônima falha.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::mm::page::PageQueueKind;
use crate::mm::Vm;

/// Devices de swap presentes.
#[derive(Debug, Default)]
pub struct SwapDevices {
    attached: AtomicUsize,
}

impl SwapDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::Acquire)
    }

    fn attach(&self) -> usize {
        self.attached.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Nunca fica negativo.
    fn detach(&self) -> usize {
        let previous = self
            .attached
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }
}

impl Vm {
    /// Um device de swap entrou: toda página em stasis volta para a laundry.
    ///
    /// Retorna quantas páginas foram movidas.
    pub fn swap_attach(&self) -> usize {
        let devices = self.swap.attach();
        let moved: usize = self
            .domains
            .iter()
            .map(|domain| self.stasis_to_laundry(domain))
            .sum();
        crate::kinfo!(
            "(SWAP) Device conectado ({} no total), {} páginas saíram de stasis",
            devices,
            moved
        );
        moved
    }

    /// Um device de swap saiu.
    pub fn swap_detach(&self) {
        let devices = self.swap.detach();
        crate::kinfo!("(SWAP) Device removido ({} restantes)", devices);
        if devices == 0 && self.queue_count(PageQueueKind::Laundry) > 0 {
            crate::kdebug!("(SWAP) Sem swap: falhas anônimas vão para stasis");
        }
    }
}
