// (FASE2) src/lib.rs
//! Pageout Library.
//!
//! Ponto central de exportação do daemon de recuperação de memória física.
//! Roda hosted: workers são threads do sistema hospedeiro e os subsistemas
//! vizinhos (pmap, pagers, tabela de processos) entram como traits.

// Destino dos macros k*! (não faz parte da API)
#[doc(hidden)]
pub use log as __log;

// --- Infraestrutura ---
pub mod core; // Logging, linha de comando, tempo
pub mod sync; // Spinlock, Mutex/CondVar, SleepLock

// --- Subsistemas ---
pub mod mm; // Filas, scans, laundry, OOM
pub mod sched; // Visão do scheduler para o OOM

// --- Colaboradores em memória (simulação e testes) ---
pub mod hosted;

pub use crate::mm::{Collaborators, Vm, VmConfig};
