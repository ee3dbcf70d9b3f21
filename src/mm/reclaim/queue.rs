//! # Filas de Páginas
//!
//! Uma fila é uma lista duplamente ligada de IDs (nunca ponteiros), com um
//! contador e um spinlock. Além de páginas a lista aceita marcadores: nós sem
//! dados que um scan insere para guardar sua posição enquanto solta o lock.
//!
//! Chegadas novas vão para a cauda; scans andam da cabeça para a cauda.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::HashMap;

use crate::mm::page::{PageId, PageQueueKind};
use crate::sync::{Spinlock, SpinlockGuard};

/// Um nó da fila.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Page(PageId),
    Marker(u32),
}

impl Slot {
    #[inline]
    pub fn page(self) -> Option<PageId> {
        match self {
            Self::Page(id) => Some(id),
            Self::Marker(_) => None,
        }
    }
}

/// Marcador de scan.
///
/// Não é `Clone`: só o scan dono insere e remove o próprio marcador.
#[derive(Debug, PartialEq, Eq)]
pub struct Marker {
    id: u32,
}

impl Marker {
    pub(crate) fn new(id: u32) -> Self {
        Self { id }
    }

    #[inline]
    pub fn slot(&self) -> Slot {
        Slot::Marker(self.id)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<Slot>,
    next: Option<Slot>,
}

/// Lista ligada por índice.
#[derive(Debug, Default)]
pub struct QueueList {
    links: HashMap<Slot, Links>,
    head: Option<Slot>,
    tail: Option<Slot>,
    /// Só páginas (marcadores não contam)
    pages: usize,
}

impl QueueList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Número de páginas
    #[inline]
    pub fn len(&self) -> usize {
        self.pages
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages == 0
    }

    #[inline]
    pub fn contains(&self, slot: Slot) -> bool {
        self.links.contains_key(&slot)
    }

    pub fn first(&self) -> Option<Slot> {
        self.head
    }

    pub fn last(&self) -> Option<Slot> {
        self.tail
    }

    pub fn next(&self, slot: Slot) -> Option<Slot> {
        self.links.get(&slot).and_then(|l| l.next)
    }

    pub fn prev(&self, slot: Slot) -> Option<Slot> {
        self.links.get(&slot).and_then(|l| l.prev)
    }

    fn count(&mut self, slot: Slot, delta: isize) {
        if let Slot::Page(_) = slot {
            self.pages = self.pages.wrapping_add_signed(delta);
        }
    }

    /// Insere entre `prev` e `next` (que precisam ser vizinhos).
    fn link(&mut self, slot: Slot, prev: Option<Slot>, next: Option<Slot>) -> bool {
        if self.links.contains_key(&slot) {
            return false;
        }
        self.links.insert(slot, Links { prev, next });
        match prev {
            Some(p) => {
                if let Some(l) = self.links.get_mut(&p) {
                    l.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        match next {
            Some(n) => {
                if let Some(l) = self.links.get_mut(&n) {
                    l.prev = Some(slot);
                }
            }
            None => self.tail = Some(slot),
        }
        self.count(slot, 1);
        true
    }

    pub fn push_tail(&mut self, slot: Slot) -> bool {
        self.link(slot, self.tail, None)
    }

    pub fn push_head(&mut self, slot: Slot) -> bool {
        self.link(slot, None, self.head)
    }

    /// Insere logo depois de `anchor`. Falha se `anchor` não está na fila.
    pub fn insert_after(&mut self, anchor: Slot, slot: Slot) -> bool {
        let Some(links) = self.links.get(&anchor) else {
            return false;
        };
        let next = links.next;
        self.link(slot, Some(anchor), next)
    }

    pub fn remove(&mut self, slot: Slot) -> bool {
        let Some(Links { prev, next }) = self.links.remove(&slot) else {
            return false;
        };
        match prev {
            Some(p) => {
                if let Some(l) = self.links.get_mut(&p) {
                    l.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(l) = self.links.get_mut(&n) {
                    l.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        self.count(slot, -1);
        true
    }

    /// Tira a primeira página (pula marcadores).
    pub fn pop_page(&mut self) -> Option<PageId> {
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            if let Slot::Page(id) = slot {
                self.remove(slot);
                return Some(id);
            }
            cursor = self.next(slot);
        }
        None
    }

    /// Todos os nós, da cabeça para a cauda
    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        core::iter::successors(self.head, move |slot| self.next(*slot))
    }

    /// Só as páginas, em ordem
    pub fn page_ids(&self) -> Vec<PageId> {
        self.iter().filter_map(Slot::page).collect()
    }
}

/// Fila de páginas de um domínio.
#[derive(Debug)]
pub struct PageQueue {
    pub kind: PageQueueKind,
    list: Spinlock<QueueList>,
    /// Cópia de `list.len()` para leitura sem lock
    cnt: AtomicUsize,
}

/// Guard da fila; publica o contador ao soltar.
pub struct QueueGuard<'a> {
    guard: SpinlockGuard<'a, QueueList>,
    cnt: &'a AtomicUsize,
}

impl core::ops::Deref for QueueGuard<'_> {
    type Target = QueueList;

    fn deref(&self) -> &QueueList {
        &self.guard
    }
}

impl core::ops::DerefMut for QueueGuard<'_> {
    fn deref_mut(&mut self) -> &mut QueueList {
        &mut self.guard
    }
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.cnt.store(self.guard.len(), Ordering::Relaxed);
    }
}

impl PageQueue {
    pub fn new(kind: PageQueueKind) -> Self {
        Self {
            kind,
            list: Spinlock::new(QueueList::new()),
            cnt: AtomicUsize::new(0),
        }
    }

    pub fn lock(&self) -> QueueGuard<'_> {
        QueueGuard {
            guard: self.list.lock(),
            cnt: &self.cnt,
        }
    }

    /// Contagem sem lock (pode estar um pouco atrasada)
    #[inline]
    pub fn len(&self) -> usize {
        self.cnt.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.lock().page_ids()
    }
}
