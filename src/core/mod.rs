//! # Core
//!
//! Infraestrutura comum do daemon: logging, linha de comando e tempo.

/// Macros de log zero-overhead (kerror!, kwarn!, kinfo!, kdebug!, ktrace!)
pub mod logging;

/// Parser chave=valor para tunables
pub mod cmdline;

/// Jiffies e relógio monotônico
pub mod time;
