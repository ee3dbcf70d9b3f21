//! # Cursor de Scan (protocolo de marcador)
//!
//! O scan não pode segurar o lock da fila enquanto pega o lock de um objeto
//! ou de uma página (a ordem é Objeto → Página → Fila). A solução é deixar um
//! marcador na fila logo depois da página visitada:
//!
//! ```text
//!   cabeça ─ A ─ B ─ [M] ─ C ─ D ─ cauda
//!                ▲      └── próximo passo começa em next(M) = C
//!                └───────── página em visita; revalidada com prev(M) == B
//! ```
//!
//! 1. Com a fila travada: acha o sucessor do marcador e move o marcador para
//!    depois dele.
//! 2. Solta a fila. Pega objeto e página (pode dormir).
//! 3. Revalida: `prev(M)` ainda é a página? Senão a página foi movida ou
//!    reclassificada e a visita é abandonada sem efeito.
//! 4. O próximo passo recomeça do sucessor do marcador, então nada é perdido
//!    nem visitado duas vezes por causa do lock solto.
//!
//! O marcador sai da fila quando o scan é dropado.

use super::queue::{Marker, PageQueue, Slot};
use crate::mm::page::PageId;

/// Um scan em andamento sobre uma fila.
#[derive(Debug)]
pub struct QueueScan<'q> {
    queue: &'q PageQueue,
    marker: Marker,
    max_scan: usize,
    scanned: usize,
}

impl<'q> QueueScan<'q> {
    /// Começa na cabeça da fila, visitando no máximo `max_scan` nós.
    pub fn begin(queue: &'q PageQueue, marker: Marker, max_scan: usize) -> Self {
        queue.lock().push_head(marker.slot());
        Self {
            queue,
            marker,
            max_scan,
            scanned: 0,
        }
    }

    /// Próximo nó depois do marcador.
    ///
    /// Devolve marcadores de outros scans também: quem chama pula esses.
    pub fn next(&mut self) -> Option<Slot> {
        if self.scanned >= self.max_scan {
            return None;
        }
        let me = self.marker.slot();
        let mut q = self.queue.lock();
        let next = q.next(me)?;
        q.remove(me);
        q.insert_after(next, me);
        self.scanned += 1;
        Some(next)
    }

    /// A página ainda está logo antes do marcador?
    ///
    /// Chamado depois de pegar os locks de objeto e página.
    pub fn still_after(&self, page: PageId) -> bool {
        self.queue.lock().prev(self.marker.slot()) == Some(Slot::Page(page))
    }

    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Desconta `n` visitas do orçamento (páginas tiradas da fila por um
    /// cluster).
    pub fn charge(&mut self, n: usize) {
        self.scanned = self.scanned.saturating_add(n);
    }

    pub fn queue(&self) -> &'q PageQueue {
        self.queue
    }
}

impl Drop for QueueScan<'_> {
    fn drop(&mut self) {
        self.queue.lock().remove(self.marker.slot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::page::PageQueueKind;

    fn filled(n: u32) -> PageQueue {
        let queue = PageQueue::new(PageQueueKind::Inactive);
        {
            let mut q = queue.lock();
            for i in 0..n {
                q.push_tail(Slot::Page(PageId(i)));
            }
        }
        queue
    }

    #[test]
    fn visits_each_page_once() {
        let queue = filled(4);
        let mut scan = QueueScan::begin(&queue, Marker::new(1), usize::MAX);
        let mut seen = Vec::new();
        while let Some(slot) = scan.next() {
            let id = slot.page().unwrap();
            assert!(scan.still_after(id));
            seen.push(id.0);
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        drop(scan);
        assert!(!queue.lock().contains(Slot::Marker(1)));
    }

    #[test]
    fn concurrent_move_is_detected_and_position_kept() {
        let queue = filled(4);
        let mut scan = QueueScan::begin(&queue, Marker::new(1), usize::MAX);
        let first = scan.next().and_then(Slot::page).unwrap();

        // Outro caminho move a página enquanto o lock da fila está solto.
        {
            let mut q = queue.lock();
            q.remove(Slot::Page(first));
            q.push_tail(Slot::Page(first));
        }
        assert!(!scan.still_after(first));

        // Remover o vizinho também não faz o scan perder a posição.
        queue.lock().remove(Slot::Page(PageId(1)));
        assert_eq!(scan.next(), Some(Slot::Page(PageId(2))));
        assert_eq!(scan.next(), Some(Slot::Page(PageId(3))));
        assert_eq!(scan.next(), Some(Slot::Page(PageId(0))));
        assert_eq!(scan.next(), None);
    }

    #[test]
    fn other_markers_are_returned_and_bounded() {
        let queue = filled(3);
        let mut other = QueueScan::begin(&queue, Marker::new(2), usize::MAX);
        other.next();
        let mut scan = QueueScan::begin(&queue, Marker::new(1), 2);
        assert_eq!(scan.next(), Some(Slot::Page(PageId(0))));
        assert_eq!(scan.next(), Some(Slot::Marker(2)));
        assert_eq!(scan.next(), None);
        assert_eq!(scan.scanned(), 2);
    }
}
