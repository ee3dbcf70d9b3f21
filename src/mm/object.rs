//! # VM Objects
//!
//! Um objeto é dono de um conjunto de páginas (por offset), tem um pager fixo,
//! um contador de referências e um contador de I/O em andamento
//! (`pip`, paging in progress). Um objeto com `pip != 0` não pode ser
//! destruído: `object_terminate` espera o contador zerar.
//!
//! ## Ciclo de vida
//!
//! ```text
//! object_create ──▶ [vivo] ──ref=0 (anônimo)──▶ object_terminate ──▶ [DEAD] ──▶ removido
//!                     ▲  │
//!     object_reference┘  └object_deallocate
//! ```

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bitflags::bitflags;

use crate::mm::error::{ReclaimError, ReclaimResult};
use crate::mm::page::PageId;
use crate::mm::pager::Pager;
use crate::mm::Vm;
use crate::sync::{mutex, CondVar, Mutex, MutexGuard, Spinlock};

/// Identificador de objeto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl core::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ObjectFlags: u32 {
        /// Sendo destruído
        const DEAD = 1 << 0;
    }
}

/// Estado do objeto (sob o lock do objeto).
#[derive(Debug, Default)]
pub struct ObjectInner {
    /// Páginas residentes por offset
    pub pages: BTreeMap<u64, PageId>,
    /// Tamanho em páginas
    pub size: u64,
    pub flags: ObjectFlags,
    /// Escritas em andamento
    pub pip: u32,
}

impl ObjectInner {
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.flags.contains(ObjectFlags::DEAD)
    }
}

/// Objeto de memória.
#[derive(Debug)]
pub struct VmObject {
    pub id: ObjectId,
    pub pager: Pager,
    /// Alterado só sob o lock; lido sem lock pelo scan da fila ativa
    refs: AtomicU32,
    inner: Mutex<ObjectInner>,
    pip_cv: CondVar,
}

impl VmObject {
    fn new(id: ObjectId, pager: Pager, size: u64) -> Self {
        Self {
            id,
            pager,
            refs: AtomicU32::new(1),
            inner: Mutex::new(ObjectInner {
                size,
                ..ObjectInner::default()
            }),
            pip_cv: CondVar::new(),
        }
    }

    /// Lock do objeto (pode dormir)
    pub fn lock(&self) -> MutexGuard<'_, ObjectInner> {
        mutex::lock(&self.inner)
    }

    /// Leitura sem sincronização do contador de referências.
    ///
    /// Zero quer dizer que ninguém mapeia o objeto.
    #[inline]
    pub fn ref_count(&self) -> u32 {
        self.refs.load(Ordering::Relaxed)
    }

    pub fn pip_add(&self, inner: &mut ObjectInner, n: u32) {
        inner.pip += n;
    }

    /// Fim de uma escrita; acorda quem espera o objeto ficar quieto.
    pub fn pip_wakeup(&self, inner: &mut ObjectInner) {
        inner.pip = inner.pip.saturating_sub(1);
        if inner.pip == 0 {
            self.pip_cv.notify_all();
        }
    }

    /// Dorme até não haver escrita em andamento.
    pub fn pip_wait<'a>(&'a self, mut guard: MutexGuard<'a, ObjectInner>) -> MutexGuard<'a, ObjectInner> {
        while guard.pip != 0 {
            guard = mutex::wait(&self.pip_cv, guard);
        }
        guard
    }
}

/// Tabela global de objetos.
#[derive(Debug)]
pub struct ObjectTable {
    objects: Spinlock<HashMap<ObjectId, Arc<VmObject>>>,
    next_id: AtomicU64,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self {
            objects: Spinlock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert(&self, pager: Pager, size: u64) -> Arc<VmObject> {
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let object = Arc::new(VmObject::new(id, pager, size));
        self.objects.lock().insert(id, Arc::clone(&object));
        object
    }

    pub fn get(&self, id: ObjectId) -> Option<Arc<VmObject>> {
        self.objects.lock().get(&id).cloned()
    }

    fn remove(&self, id: ObjectId) {
        self.objects.lock().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CICLO DE VIDA
// =============================================================================

impl Vm {
    /// Cria um objeto com uma referência.
    pub fn object_create(&self, pager: Pager, size: u64) -> ObjectId {
        let object = self.objects.insert(pager, size);
        crate::ktrace!(
            "(OBJECT) {} criado ({:?}, {} páginas)",
            object.id,
            object.pager,
            size
        );
        object.id
    }

    pub fn object(&self, id: ObjectId) -> ReclaimResult<Arc<VmObject>> {
        self.objects.get(id).ok_or(ReclaimError::NoSuchObject)
    }

    pub fn object_reference(&self, id: ObjectId) -> ReclaimResult<()> {
        let object = self.object(id)?;
        let inner = object.lock();
        if inner.is_dead() {
            return Err(ReclaimError::NoSuchObject);
        }
        object.refs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Solta uma referência.
    ///
    /// Objetos anônimos morrem na última referência. Objetos de vnode ficam
    /// em cache (sem mapeamentos) até o filesystem chamar `object_terminate`.
    pub fn object_deallocate(&self, id: ObjectId) -> ReclaimResult<()> {
        let object = self.object(id)?;
        let last = {
            let inner = object.lock();
            if inner.is_dead() {
                return Err(ReclaimError::NoSuchObject);
            }
            let refs = object.ref_count().saturating_sub(1);
            object.refs.store(refs, Ordering::Relaxed);
            refs == 0
        };
        if last && object.pager.vnode().is_none() {
            self.object_terminate(id)?;
        }
        Ok(())
    }

    /// Destrói o objeto: marca DEAD, espera as escritas em andamento e
    /// devolve todas as páginas ao pool livre, sujas ou não.
    ///
    /// Retorna quantas páginas foram liberadas.
    pub fn object_terminate(&self, id: ObjectId) -> ReclaimResult<usize> {
        let object = self.object(id)?;
        let mut inner = object.lock();
        if inner.is_dead() {
            return Err(ReclaimError::NoSuchObject);
        }
        inner.flags.insert(ObjectFlags::DEAD);
        inner = object.pip_wait(inner);

        let pages = core::mem::take(&mut inner.pages);
        for &page_id in pages.values() {
            let Some(page) = self.pages.get(page_id) else {
                continue;
            };
            self.pmap.remove_all(page_id);
            let mut p = page.lock();
            self.release_page(page, &mut p);
        }
        object.refs.store(0, Ordering::Relaxed);
        drop(inner);

        self.objects.remove(id);
        self.pmm.freed(pages.len());
        crate::kdebug!("(OBJECT) {} destruído, {} páginas liberadas", id, pages.len());
        Ok(pages.len())
    }

    /// Páginas residentes do objeto
    pub fn object_resident(&self, id: ObjectId) -> ReclaimResult<usize> {
        Ok(self.object(id)?.lock().pages.len())
    }

    /// Página residente em `pindex`, se houver
    pub fn object_lookup(&self, id: ObjectId, pindex: u64) -> ReclaimResult<Option<PageId>> {
        Ok(self.object(id)?.lock().pages.get(&pindex).copied())
    }
}
