//! # Synchronization Primitives
//!
//! Primitivas de sincronização usadas pelo pageout.
//!
//! ## Hierarquia de Uso
//!
//! ```text
//! Spinlock   → Filas de páginas e metadados de página (seções curtas, nunca dormem)
//! Mutex      → Lock de objeto, contador de páginas livres (pode dormir / esperar I/O)
//! CondVar    → Espera por páginas livres, wakeup do daemon e do laundry
//! SleepLock  → Lock do arquivo de backing com espera limitada (timeout)
//! ```
//!
//! ## Regras
//!
//! - **Ordem de Lock**: Objeto → Página → Fila. Sempre.
//! - Nunca segurar dois locks de fila ao mesmo tempo.
//! - Nunca pegar lock de objeto ou de página segurando o lock da fila. O scan
//!   solta a fila pelo protocolo de marcador (`mm::reclaim::cursor`).

/// Spinlock (busy-wait, não dorme)
pub mod spinlock;

/// Mutex (pode bloquear thread) + helpers de CondVar
pub mod mutex;

/// Lock com espera limitada
pub mod sleeplock;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use mutex::{CondVar, Mutex, MutexGuard};
pub use sleeplock::{SleepLock, SleepLockGuard};
pub use spinlock::{Spinlock, SpinlockGuard};
