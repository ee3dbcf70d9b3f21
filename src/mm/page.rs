//! # Páginas Físicas
//!
//! Cada página física tem um descritor fixo numa arena ([`PageArena`]),
//! endereçado por [`PageId`]. Ninguém guarda ponteiros para descritores:
//! filas guardam IDs, objetos guardam IDs e a página guarda só o ID do objeto
//! dono (referência fraca).
//!
//! ## 🔒 Locking
//!
//! O estado mutável fica em [`PageInner`], protegido por um spinlock. A ordem
//! é sempre Objeto → Página → Fila.
//!
//! ## Invariantes
//!
//! - Uma página está em exatamente uma fila ([`PageQueueKind`]).
//! - Laundry e Stasis só têm páginas sujas.
//! - `act_count` nunca sai de `[0, ACT_MAX]`.

use bitflags::bitflags;

use crate::mm::config::{ACT_INIT, ACT_MAX};
use crate::mm::object::ObjectId;
use crate::sync::{Spinlock, SpinlockGuard};

/// Índice estável de uma página na arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for PageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "pg#{}", self.0)
    }
}

/// Fila em que a página está.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageQueueKind {
    /// Pool livre (dono: alocador)
    Free = 0,
    /// Usada recentemente
    Active = 1,
    /// Candidata a despejo
    Inactive = 2,
    /// Suja, esperando escrita
    Laundry = 3,
    /// Suja, escrita falhou por falta de swap
    Stasis = 4,
}

impl PageQueueKind {
    pub const COUNT: usize = 5;

    pub const ALL: [PageQueueKind; Self::COUNT] = [
        Self::Free,
        Self::Active,
        Self::Inactive,
        Self::Laundry,
        Self::Stasis,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Laundry ou Stasis
    #[inline]
    pub const fn is_laundry(self) -> bool {
        matches!(self, Self::Laundry | Self::Stasis)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Laundry => "laundry",
            Self::Stasis => "stasis",
        }
    }
}

bitflags! {
    /// Estado da página.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PageFlags: u8 {
        /// Conteúdo inicializado
        const VALID      = 1 << 0;
        /// Modificada desde a última escrita
        const DIRTY      = 1 << 1;
        /// Referência vista por software (além do bit do hardware)
        const REFERENCED = 1 << 2;
    }
}

/// Estado mutável da página (sob o spinlock da página).
#[derive(Debug, Clone, Copy)]
pub struct PageInner {
    /// Objeto dono (não-owning)
    pub object: Option<ObjectId>,
    /// Offset dentro do objeto (em páginas)
    pub pindex: u64,
    pub queue: PageQueueKind,
    pub flags: PageFlags,
    /// I/O em andamento
    pub busy: u32,
    /// Presa (wired) por outro subsistema
    pub hold: u32,
    pub act_count: u8,
}

impl PageInner {
    const fn free() -> Self {
        Self {
            object: None,
            pindex: 0,
            queue: PageQueueKind::Free,
            flags: PageFlags::empty(),
            busy: 0,
            hold: 0,
            act_count: 0,
        }
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(PageFlags::DIRTY)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.flags.contains(PageFlags::VALID)
    }

    /// Ocupada ou presa: não pode ser despejada
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.busy != 0 || self.hold != 0
    }

    /// Consome o bit REFERENCED de software.
    #[inline]
    pub fn take_referenced(&mut self) -> u32 {
        if self.flags.contains(PageFlags::REFERENCED) {
            self.flags.remove(PageFlags::REFERENCED);
            1
        } else {
            0
        }
    }

    /// Soma ao contador de ativação, saturando em ACT_MAX.
    #[inline]
    pub fn act_advance(&mut self, delta: u32) {
        let sum = u32::from(self.act_count).saturating_add(delta);
        self.act_count = sum.min(u32::from(ACT_MAX)) as u8;
    }

    /// Decai o contador, saturando em zero.
    #[inline]
    pub fn act_decline(&mut self, delta: u8) {
        self.act_count = self.act_count.saturating_sub(delta);
    }

    /// Contador ao entrar na fila ativa.
    #[inline]
    pub fn act_activate(&mut self) {
        self.act_count = self.act_count.max(ACT_INIT).min(ACT_MAX);
    }
}

/// Descritor de página.
#[derive(Debug)]
pub struct Page {
    pub id: PageId,
    /// Domínio dono (fixo)
    pub domain: usize,
    inner: Spinlock<PageInner>,
}

impl Page {
    pub fn lock(&self) -> SpinlockGuard<'_, PageInner> {
        self.inner.lock()
    }

    /// Leitura rápida do dono, sem o lock do objeto (precisa revalidar)
    pub fn owner(&self) -> Option<ObjectId> {
        self.inner.lock().object
    }
}

/// Cópia do estado da página
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSnapshot {
    pub id: PageId,
    pub domain: usize,
    pub object: Option<ObjectId>,
    pub pindex: u64,
    pub queue: PageQueueKind,
    pub flags: PageFlags,
    pub busy: u32,
    pub hold: u32,
    pub act_count: u8,
}

/// Todas as páginas físicas, criadas no boot e nunca destruídas.
#[derive(Debug)]
pub struct PageArena {
    pages: Vec<Page>,
}

impl PageArena {
    /// `per_domain` páginas em cada um dos `domains` domínios, todas livres.
    pub fn new(domains: usize, per_domain: usize) -> Self {
        let pages = (0..domains * per_domain)
            .map(|idx| Page {
                id: PageId(idx as u32),
                domain: idx / per_domain.max(1),
                inner: Spinlock::new(PageInner::free()),
            })
            .collect();
        Self { pages }
    }

    #[inline]
    pub fn get(&self, id: PageId) -> Option<&Page> {
        self.pages.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn snapshot(&self, id: PageId) -> Option<PageSnapshot> {
        let page = self.get(id)?;
        let inner = page.lock();
        Some(PageSnapshot {
            id,
            domain: page.domain,
            object: inner.object,
            pindex: inner.pindex,
            queue: inner.queue,
            flags: inner.flags,
            busy: inner.busy,
            hold: inner.hold,
            act_count: inner.act_count,
        })
    }
}
