//! Tipos de Erro do Pageout
//!
//! Erros de página nunca saem dos loops de scan/laundry: eles viram contagem
//! em [`crate::mm::stats::PageoutStats`] e uma decisão local (pular, reativar,
//! segurar em stasis). Só configuração e as entradas do alocador devolvem
//! erro para quem chamou.

use thiserror::Error;

/// Por que a escrita de uma página falhou.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFault {
    /// Pager não completou; tentar de novo mais tarde
    Transient,
    /// Página swap-backed e nenhum device de swap presente
    SwapExhausted,
}

/// Erros do subsistema de reclaim
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReclaimError {
    /// Espera pelo lock do vnode expirou
    #[error("lock do vnode expirou")]
    LockTimeout,
    /// Página mudou de objeto/offset/estado enquanto os locks estavam soltos
    #[error("identidade da página mudou")]
    IdentityChanged,
    /// Página ocupada (busy) ou presa (held) por outro caminho
    #[error("página ocupada")]
    ResourceBusy,
    /// Pager não conseguiu escrever
    #[error("falha de escrita: {0:?}")]
    Storage(StorageFault),
    /// Objeto encolheu além da página
    #[error("página fora dos limites do objeto")]
    OutOfBounds,
    /// Quorum de OOM formado em todos os domínios
    #[error("memória esgotada em todos os domínios")]
    GlobalExhaustion,
    /// Nenhuma página livre para alocar
    #[error("OOM: sem páginas livres")]
    OutOfMemory,
    /// Objeto inexistente ou já destruído
    #[error("objeto inexistente")]
    NoSuchObject,
    /// Página inexistente ou fora de um objeto
    #[error("página inválida")]
    NoSuchPage,
    /// Nome ou valor de tunable inválido
    #[error("tunable inválido: {0}")]
    InvalidTunable(String),
}

/// Tipo Result específico do reclaim
pub type ReclaimResult<T> = Result<T, ReclaimError>;
