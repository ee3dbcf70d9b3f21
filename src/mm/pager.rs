//! # Pagers
//!
//! O backing store de um objeto é escolhido na criação e nunca muda. O daemon
//! só pede escrita: uma chamada por cluster, um status por página.
//!
//! | Tipo    | Store                 | Observação                          |
//! |---------|-----------------------|-------------------------------------|
//! | `Swap`  | device de swap        | anônimo; falha sem swap vai a stasis |
//! | `Vnode` | arquivo               | escrita exige o lock do vnode        |
//! | `Phys`  | nenhum                | não pagina, toda escrita falha       |
//! | `Dead`  | nenhum                | backing store destruído              |

use std::sync::Arc;
use std::time::Duration;

use crate::mm::error::{ReclaimError, StorageFault};
use crate::mm::object::ObjectId;
use crate::mm::page::PageId;
use crate::sync::{SleepLock, SleepLockGuard};

/// Resultado da escrita de uma página.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerStatus {
    /// Escrita terminou
    Complete,
    /// Escrita em andamento; termina em `pageout_done`
    Pending,
    /// Offset além do fim do objeto
    OutOfBounds,
    /// Erro de I/O
    Error,
    /// Pager não conseguiu (ex: sem espaço em swap)
    Fail,
    /// Aceite parcial: tentar com menos páginas
    Again,
}

impl PagerStatus {
    /// Classifica uma falha de escrita.
    ///
    /// `swap_backed` e `swap_devices` decidem entre segurar em stasis e
    /// reativar. Status de sucesso não são falha.
    pub fn fault(self, swap_backed: bool, swap_devices: usize) -> Option<ReclaimError> {
        match self {
            Self::Complete | Self::Pending | Self::Again => None,
            Self::OutOfBounds => Some(ReclaimError::OutOfBounds),
            Self::Error | Self::Fail if swap_backed && swap_devices == 0 => {
                Some(ReclaimError::Storage(StorageFault::SwapExhausted))
            }
            Self::Error | Self::Fail => Some(ReclaimError::Storage(StorageFault::Transient)),
        }
    }
}

/// Uma página de um pedido de escrita.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIo {
    pub page: PageId,
    pub pindex: u64,
}

/// Backing store (colaborador externo).
pub trait PageStore: Send + Sync {
    /// Escreve um run contíguo de páginas de `object`.
    ///
    /// `status` tem o mesmo tamanho de `run` e chega preenchido com
    /// `Error`; o store escreve um status por página.
    fn put_pages(&self, object: ObjectId, run: &[PageIo], status: &mut [PagerStatus]);
}

/// Vnode com o lock que serializa escritas no arquivo.
#[derive(Debug, Default)]
pub struct Vnode {
    pub name: String,
    lock: SleepLock,
}

impl Vnode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lock: SleepLock::new(),
        }
    }

    /// Lock do vnode com espera limitada.
    pub fn lock_timed(&self, timeout: Duration) -> Option<SleepLockGuard<'_>> {
        self.lock.try_lock_for(timeout)
    }

    /// Lock sem limite (caminhos de escrita do próprio filesystem).
    pub fn lock(&self) -> SleepLockGuard<'_> {
        self.lock.lock()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

/// Daemon de sync do filesystem (colaborador opcional).
pub trait Syncer: Send + Sync {
    /// Pede ao syncer para escrever vnodes sujos mais cedo.
    fn speedup(&self);
}

/// Backing store de um objeto.
#[derive(Clone)]
pub enum Pager {
    Swap(Arc<dyn PageStore>),
    Vnode {
        store: Arc<dyn PageStore>,
        vnode: Arc<Vnode>,
    },
    Phys,
    Dead,
}

impl Pager {
    /// Swap-backed (anônimo)
    pub fn is_swap(&self) -> bool {
        matches!(self, Self::Swap(_))
    }

    pub fn vnode(&self) -> Option<&Arc<Vnode>> {
        match self {
            Self::Vnode { vnode, .. } => Some(vnode),
            _ => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Swap(_) => "swap",
            Self::Vnode { .. } => "vnode",
            Self::Phys => "phys",
            Self::Dead => "dead",
        }
    }

    /// Um pedido de escrita para o run inteiro.
    pub fn put_pages(&self, object: ObjectId, run: &[PageIo]) -> Vec<PagerStatus> {
        match self {
            Self::Swap(store) | Self::Vnode { store, .. } => {
                let mut status = vec![PagerStatus::Error; run.len()];
                store.put_pages(object, run, &mut status);
                status
            }
            Self::Phys | Self::Dead => vec![PagerStatus::Fail; run.len()],
        }
    }
}

impl core::fmt::Debug for Pager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Vnode { vnode, .. } => write!(f, "Pager::Vnode({})", vnode.name),
            other => write!(f, "Pager::{}", other.name()),
        }
    }
}
