// =============================================================================
// PAGEOUT LOGGING SYSTEM - ZERO OVERHEAD
// =============================================================================
//
// Sistema de logging do daemon de pageout com custo ZERO quando desligado.
//
// ARQUITETURA:
// - Usa features do Cargo para compile-time filtering
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - Os argumentos continuam sendo verificados pelo compilador (format_args!
//   dentro de `if false`), mas nenhum código é gerado
// - Quando ativos, os macros encaminham para a fachada `log`, com target
//   fixo "pageout". Quem instala o backend é o binário (env_logger).
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos (OOM, panic_on_oom)
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução (workers subindo, swap on/off)
// - DEBUG: Informações de debugging (resultado de cada passada)
// - TRACE: Detalhes extremos (cada página)
//
// FEATURES:
// - no_logs:   Remove 100% dos logs
// - log_error: Apenas ERROR, WARN
// - log_info:  ERROR, WARN, INFO
// - log_debug: ERROR, WARN, INFO, DEBUG
// - log_trace: Todos os níveis (padrão)
//
// COMO USAR:
//   kinfo!("(PAGEOUT) Domínio {} iniciado", idx);
//   ktrace!("(LAUNDRY) Página {} reativada", page);
//
// Convenção: sempre prefixar com a TAG do subsistema entre parênteses.
//
// =============================================================================

/// Target usado em todos os registros emitidos pelos macros.
pub const LOG_TARGET: &str = "pageout";

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)+) => {{
        $crate::__log::error!(target: $crate::core::logging::LOG_TARGET, $($arg)+);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)+) => {{
        if false {
            let _ = format_args!($($arg)+);
        }
    }};
}

// =============================================================================
// MACROS DE LOG - NÍVEL WARN
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)+) => {{
        $crate::__log::warn!(target: $crate::core::logging::LOG_TARGET, $($arg)+);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)+) => {{
        if false {
            let _ = format_args!($($arg)+);
        }
    }};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================
//
// kinfo! - Desligado com no_logs e com log_error.
//

#[cfg(not(any(feature = "no_logs", feature = "log_error")))]
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)+) => {{
        $crate::__log::info!(target: $crate::core::logging::LOG_TARGET, $($arg)+);
    }};
}

#[cfg(any(feature = "no_logs", feature = "log_error"))]
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)+) => {{
        if false {
            let _ = format_args!($($arg)+);
        }
    }};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================
//
// kdebug! - Ativo apenas com log_trace ou log_debug.
//

#[cfg(all(
    not(feature = "no_logs"),
    any(feature = "log_trace", feature = "log_debug")
))]
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)+) => {{
        $crate::__log::debug!(target: $crate::core::logging::LOG_TARGET, $($arg)+);
    }};
}

#[cfg(not(all(
    not(feature = "no_logs"),
    any(feature = "log_trace", feature = "log_debug")
)))]
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)+) => {{
        if false {
            let _ = format_args!($($arg)+);
        }
    }};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================
//
// ktrace! - Ativo apenas com log_trace.
// Usado para detalhes de cada página visitada.
//

#[cfg(all(not(feature = "no_logs"), feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)+) => {{
        $crate::__log::trace!(target: $crate::core::logging::LOG_TARGET, $($arg)+);
    }};
}

#[cfg(not(all(not(feature = "no_logs"), feature = "log_trace")))]
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)+) => {{
        if false {
            let _ = format_args!($($arg)+);
        }
    }};
}
