//! # Page Reclaim
//!
//! Motor de reclaim do pageout: filas, scans, laundry, OOM e os workers que
//! amarram tudo.
//!
//! ## 🏗️ Fluxo
//!
//! ```text
//! alocador ──falta──▶ scan worker ──▶ inactive.rs ──suja──▶ laundry.rs ──▶ cluster.rs ──▶ pager
//!                         │               ▲                     │
//!                         │          active.rs                  └─ sem swap ──▶ stasis
//!                         └── sem progresso ──▶ oom.rs ──quórum──▶ ProcessTable::kill
//! ```
//!
//! | Módulo     | Responsabilidade                                      |
//! |------------|-------------------------------------------------------|
//! | `queue`    | Lista de páginas + marcadores, contador publicado     |
//! | `cursor`   | Protocolo de marcador (scan que solta o lock da fila) |
//! | `domain`   | Cinco filas e controle dos workers de um domínio       |
//! | `inactive` | Scan da inativa e a passada completa (`Vm::scan`)     |
//! | `active`   | Envelhecimento da fila ativa                          |
//! | `laundry`  | Laundry worker e scan da laundry/stasis               |
//! | `cluster`  | Run contíguo, flush e conclusão assíncrona            |
//! | `oom`      | Quórum de votos e escolha da vítima                   |
//! | `daemon`   | Threads por domínio, shutdown                         |
//! | `shrink`   | Pedido do governador de recursos                      |

pub mod active;
pub mod cluster;
pub mod cursor;
pub mod daemon;
pub mod domain;
pub mod inactive;
pub mod laundry;
pub mod oom;
pub mod queue;
pub mod shrink;

pub use cluster::FlushOutcome;
pub use cursor::QueueScan;
pub use daemon::DaemonState;
pub use domain::VmDomain;
pub use laundry::{LaundryRequest, LaundryWorker};
pub use oom::{select_victim, OomQuorum, OomReason};
pub use queue::{PageQueue, Slot};
