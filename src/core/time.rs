//! Arquivo: core/time.rs
//!
//! Propósito: Jiffies (contador de ticks) para o pageout.
//! O scan da fila ativa mede o tempo em ticks para garantir que toda página
//! seja revisitada dentro do período configurado.
//!
//! Detalhes de Implementação:
//! - No alvo hosted os ticks derivam de um `Instant` de referência.
//! - Um deslocamento atômico permite avançar o relógio nos testes sem dormir.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Frequência do Tick (Ticks por segundo)
pub const HZ: u64 = 1000;

/// Relógio monotônico em jiffies.
#[derive(Debug)]
pub struct Clock {
    boot: Instant,
    /// Ticks injetados manualmente (testes / simulação)
    skew: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
            skew: AtomicU64::new(0),
        }
    }

    /// Retorna o número atual de jiffies.
    #[inline]
    pub fn ticks(&self) -> u64 {
        let elapsed = self.boot.elapsed().as_millis() as u64;
        millis_to_jiffies(elapsed) + self.skew.load(Ordering::Relaxed)
    }

    /// Avança o relógio sem esperar.
    pub fn advance(&self, by: Duration) {
        self.skew
            .fetch_add(millis_to_jiffies(by.as_millis() as u64), Ordering::Relaxed);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Converte segundos para jiffies.
#[inline]
pub const fn seconds_to_jiffies(seconds: u64) -> u64 {
    seconds * HZ
}

/// Converte milisegundos para jiffies.
#[inline]
pub const fn millis_to_jiffies(millis: u64) -> u64 {
    (millis * HZ) / 1000
}

/// Duração de uma fração de segundo (`1 / rate`).
#[inline]
pub fn per_second(rate: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(rate.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_ticks_forward() {
        let clock = Clock::new();
        let before = clock.ticks();
        clock.advance(Duration::from_secs(2));
        assert!(clock.ticks() >= before + seconds_to_jiffies(2));
    }

    #[test]
    fn per_second_never_divides_by_zero() {
        assert_eq!(per_second(0), Duration::from_millis(1000));
        assert_eq!(per_second(10), Duration::from_millis(100));
    }
}
