//! Pmap em software.
//!
//! Cada página tem os bits que o hardware manteria: mapeada, referenciada
//! (contador, como o `ts_referenced` de várias PTEs) e modificada.

use std::collections::HashMap;

use crate::mm::page::PageId;
use crate::mm::pmap::Pmap;
use crate::sync::Spinlock;

#[derive(Debug, Clone, Copy, Default)]
struct Mapping {
    mapped: bool,
    referenced: u32,
    modified: bool,
}

#[derive(Debug, Default)]
pub struct SoftPmap {
    pages: Spinlock<HashMap<PageId, Mapping>>,
}

impl SoftPmap {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F: FnOnce(&mut Mapping)>(&self, page: PageId, f: F) {
        f(self.pages.lock().entry(page).or_default());
    }

    /// Mapeia a página (sem acesso ainda).
    pub fn map(&self, page: PageId) {
        self.update(page, |m| m.mapped = true);
    }

    /// Leitura através de um mapeamento.
    pub fn touch(&self, page: PageId) {
        self.update(page, |m| {
            m.mapped = true;
            m.referenced += 1;
        });
    }

    /// Escrita através de um mapeamento.
    pub fn write(&self, page: PageId) {
        self.update(page, |m| {
            m.mapped = true;
            m.referenced += 1;
            m.modified = true;
        });
    }

    pub fn unmap(&self, page: PageId) {
        self.update(page, |m| *m = Mapping::default());
    }

    pub fn referenced(&self, page: PageId) -> u32 {
        self.pages.lock().get(&page).map_or(0, |m| m.referenced)
    }
}

impl Pmap for SoftPmap {
    fn ts_referenced(&self, page: PageId) -> u32 {
        self.pages
            .lock()
            .get_mut(&page)
            .map_or(0, |m| core::mem::take(&mut m.referenced))
    }

    fn is_mapped(&self, page: PageId) -> bool {
        self.pages.lock().get(&page).is_some_and(|m| m.mapped)
    }

    fn is_modified(&self, page: PageId) -> bool {
        self.pages.lock().get(&page).is_some_and(|m| m.modified)
    }

    fn remove_write(&self, page: PageId) -> bool {
        self.pages
            .lock()
            .get_mut(&page)
            .is_some_and(|m| core::mem::take(&mut m.modified))
    }

    fn remove_all(&self, page: PageId) -> bool {
        self.pages
            .lock()
            .remove(&page)
            .is_some_and(|m| m.modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_bits_are_consumed() {
        let pmap = SoftPmap::new();
        let page = PageId(3);
        pmap.touch(page);
        pmap.touch(page);
        assert_eq!(pmap.ts_referenced(page), 2);
        assert_eq!(pmap.ts_referenced(page), 0);
        assert!(pmap.is_mapped(page));
    }

    #[test]
    fn write_protect_reports_modification_once() {
        let pmap = SoftPmap::new();
        let page = PageId(1);
        pmap.write(page);
        assert!(pmap.is_modified(page));
        assert!(pmap.remove_write(page));
        assert!(!pmap.remove_write(page));
        assert!(!pmap.remove_all(page));
        assert!(!pmap.is_mapped(page));
    }
}
