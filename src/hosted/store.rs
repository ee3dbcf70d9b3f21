//! Backing store em memória.
//!
//! Grava cada pedido de escrita e responde com status programados: um
//! status padrão, substituível por offset.

use std::collections::HashMap;

use crate::mm::object::ObjectId;
use crate::mm::pager::{PageIo, PageStore, PagerStatus};
use crate::sync::Spinlock;

/// Um pedido recebido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub object: ObjectId,
    pub run: Vec<PageIo>,
}

#[derive(Debug)]
struct StoreState {
    calls: Vec<StoreCall>,
    default: PagerStatus,
    by_pindex: HashMap<u64, PagerStatus>,
}

#[derive(Debug)]
pub struct MemStore {
    state: Spinlock<StoreState>,
}

impl MemStore {
    /// Store que completa toda escrita.
    pub fn new() -> Self {
        Self::with_status(PagerStatus::Complete)
    }

    pub fn with_status(status: PagerStatus) -> Self {
        Self {
            state: Spinlock::new(StoreState {
                calls: Vec::new(),
                default: status,
                by_pindex: HashMap::new(),
            }),
        }
    }

    pub fn set_status(&self, status: PagerStatus) {
        self.state.lock().default = status;
    }

    /// Status fixo para um offset.
    pub fn script(&self, pindex: u64, status: PagerStatus) {
        self.state.lock().by_pindex.insert(pindex, status);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Total de páginas pedidas em todas as chamadas.
    pub fn pages_written(&self) -> usize {
        self.state.lock().calls.iter().map(|c| c.run.len()).sum()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStore for MemStore {
    fn put_pages(&self, object: ObjectId, run: &[PageIo], status: &mut [PagerStatus]) {
        let mut state = self.state.lock();
        for (io, slot) in run.iter().zip(status.iter_mut()) {
            *slot = state
                .by_pindex
                .get(&io.pindex)
                .copied()
                .unwrap_or(state.default);
        }
        state.calls.push(StoreCall {
            object,
            run: run.to_vec(),
        });
    }
}
