//! # Scheduler Interface (visão do pageout)
//!
//! O pageout não escalona nada. Ele só precisa de duas coisas do scheduler,
//! ambas para o OOM killer:
//!
//! - **Estado das threads** de cada processo, para descartar processos em que
//!   recuperar memória não ajuda (zumbis, mortos, ainda em criação).
//! - **Flags de proteção** (processo de sistema, protegido, saindo).
//!
//! E duas ações: baixar o `nice` da vítima e matá-la.
//!
//! ## 🏗️ Arquitetura
//!
//! ```text
//! OOM coordinator ──▶ ProcessTable::processes()   (snapshot)
//!        │
//!        └──────────▶ ProcessTable::renice() + kill()
//! ```

pub mod process;
pub mod task;

pub use process::{MapEntryUsage, MappingKind, Pid, ProcFlags, ProcessInfo, ProcessTable, VmSpaceUsage};
pub use task::TaskState;
