//! Spinlock - bloqueio com busy-wait
//!
//! Usa o `spin::Mutex` diretamente. No alvo hosted não há interrupções para
//! desabilitar, então o guard é o próprio guard do crate `spin`.
//!
//! # Quando usar
//!
//! - Seções críticas MUITO curtas (membership de fila, flags de página)
//! - Quando quem segura o lock não pode dormir
//!
//! # Quando NÃO usar
//!
//! - Para proteger I/O lento (use `Mutex`)

/// Spinlock - usa busy-wait, NÃO pode dormir
pub type Spinlock<T> = spin::Mutex<T>;

/// Guard de um `Spinlock`
pub type SpinlockGuard<'a, T> = spin::MutexGuard<'a, T>;
