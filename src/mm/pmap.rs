//! # Pmap (visão do pageout)
//!
//! A camada de tabelas de página é externa. O pageout só consulta bits de
//! referência/modificação e revoga mapeamentos.

use crate::mm::page::PageId;

/// Operações de pmap que o pageout usa.
pub trait Pmap: Send + Sync {
    /// Conta e limpa os bits de referência de todos os mapeamentos.
    fn ts_referenced(&self, page: PageId) -> u32;

    /// A página tem algum mapeamento?
    fn is_mapped(&self, page: PageId) -> bool;

    /// Algum mapeamento escreveu na página?
    fn is_modified(&self, page: PageId) -> bool;

    /// Tira a permissão de escrita de todos os mapeamentos.
    ///
    /// Retorna se a página estava modificada.
    fn remove_write(&self, page: PageId) -> bool;

    /// Remove todos os mapeamentos.
    ///
    /// Retorna se a página estava modificada.
    fn remove_all(&self, page: PageId) -> bool;
}
