//! # Configuração do Pageout
//!
//! Constantes de compilação, tunables de runtime e os alvos de paginação.
//!
//! ## Tunables
//!
//! Os nomes seguem o estilo sysctl (`vm.pageout_oom_seq`, ...). Eles podem ser
//! aplicados um a um ([`Tunables::set`]) ou a partir de uma linha de comando
//! no formato do kernel ([`Tunables::from_cmdline`]).
//!
//! ## Alvos
//!
//! [`PagingTargets`] define quantas páginas livres e inativas o daemon tenta
//! manter. Os valores derivam do total de páginas no boot, ou vêm prontos de
//! quem constrói o [`crate::mm::Vm`].

use crate::core::cmdline::CommandLine;
use crate::core::time::HZ;
use crate::mm::error::{ReclaimError, ReclaimResult};

// =============================================================================
// CONSTANTES DE PÁGINA
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Tamanho máximo de um cluster de escrita (128 KiB / PAGE_SIZE)
pub const PAGEOUT_PAGE_COUNT: usize = 32;

// =============================================================================
// CONTADOR DE ATIVAÇÃO
// =============================================================================

/// Valor inicial ao ativar uma página
pub const ACT_INIT: u8 = 5;

/// Incremento quando a página foi referenciada
pub const ACT_ADVANCE: u8 = 3;

/// Decremento quando a página não foi referenciada
pub const ACT_DECLINE: u8 = 1;

/// Teto do contador
pub const ACT_MAX: u8 = 64;

// =============================================================================
// FREQUÊNCIA DOS WORKERS
// =============================================================================

/// Varreduras da fila inativa por segundo
pub const INACT_SCAN_RATE: u32 = 2;

/// Ciclos do laundry worker por segundo
pub const LAUNDER_RATE: u32 = 10;

/// Timer do scan worker quando não há pedido (1 segundo)
pub const PAGEOUT_TIMER_TICKS: u64 = HZ;

/// Reserva para alocações de interrupção
const INTERRUPT_FREE_MIN: usize = 2;

/// 2 * MAXBSIZE / PAGE_SIZE + reserva de interrupção
const PAGEOUT_FREE_MIN: usize = 2 * 65536 / PAGE_SIZE + INTERRUPT_FREE_MIN;

// =============================================================================
// TUNABLES
// =============================================================================

/// Parâmetros de runtime do daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    /// Alvo da fila inativa em % do alvo de páginas livres
    pub inactive_target_pct: u32,
    /// Período (segundos) para revisitar toda a fila ativa (0 = desliga)
    pub pageout_update_period: u32,
    /// Passadas sem progresso antes de votar por OOM
    pub pageout_oom_seq: u32,
    /// Ciclos do laundry worker por segundo
    pub launder_rate: u32,
    /// Varreduras da fila inativa por segundo
    pub inact_scan_rate: u32,
    /// Lavagem em background (KiB/s)
    pub background_launder_rate: u32,
    /// Máximo lavado em background sem pedido do scan worker (KiB)
    pub background_launder_max: u32,
    /// Piso de lavagem quando não há falta de memória (KiB/s, 0 = desliga)
    pub idle_launder_rate: u32,
    /// Peso de uma página limpa contra uma suja no scan da fila ativa
    pub act_scan_laundry_weight: u32,
    /// Máximo de páginas por cluster
    pub pageout_page_count: usize,
    /// Panic em vez de matar um processo
    pub panic_on_oom: bool,
    /// Não escreve páginas anônimas em swap
    pub disable_swapspace_pageouts: bool,
    /// Espera máxima pelo lock do vnode (ms)
    pub vnode_lock_timeout_ms: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            inactive_target_pct: 150,
            pageout_update_period: 600,
            pageout_oom_seq: 12,
            launder_rate: LAUNDER_RATE,
            inact_scan_rate: INACT_SCAN_RATE,
            background_launder_rate: 4096,
            background_launder_max: 20 * 1024,
            idle_launder_rate: 64,
            act_scan_laundry_weight: 3,
            pageout_page_count: PAGEOUT_PAGE_COUNT,
            panic_on_oom: false,
            disable_swapspace_pageouts: false,
            vnode_lock_timeout_ms: 20,
        }
    }
}

impl Tunables {
    /// Aplica todos os `vm.*` de uma linha de comando sobre os defaults.
    ///
    /// Chaves fora do prefixo `vm.` são ignoradas (pertencem a outros
    /// subsistemas).
    pub fn from_cmdline(line: &str) -> ReclaimResult<Self> {
        let mut tunables = Self::default();
        let cmdline = CommandLine::parse(line);
        for (key, value) in cmdline.iter() {
            if key.starts_with("vm.") {
                tunables.set(key, value)?;
            }
        }
        Ok(tunables)
    }

    /// Altera um tunable pelo nome.
    pub fn set(&mut self, name: &str, value: &str) -> ReclaimResult<()> {
        match name {
            "vm.inactive_target_pct" => self.inactive_target_pct = parse(name, value)?,
            "vm.pageout_update_period" => self.pageout_update_period = parse(name, value)?,
            "vm.pageout_oom_seq" => self.pageout_oom_seq = parse_nonzero(name, value)?,
            "vm.launder_rate" => self.launder_rate = parse_nonzero(name, value)?,
            "vm.inact_scan_rate" => self.inact_scan_rate = parse_nonzero(name, value)?,
            "vm.background_launder_rate" => self.background_launder_rate = parse(name, value)?,
            "vm.background_launder_max" => self.background_launder_max = parse(name, value)?,
            "vm.idle_launder_rate" => self.idle_launder_rate = parse(name, value)?,
            "vm.act_scan_laundry_weight" => {
                self.act_scan_laundry_weight = parse_nonzero(name, value)?
            }
            "vm.pageout_page_count" => {
                let count: usize = parse_nonzero(name, value)?;
                if count > PAGEOUT_PAGE_COUNT {
                    return Err(ReclaimError::InvalidTunable(name.to_string()));
                }
                self.pageout_page_count = count;
            }
            "vm.panic_on_oom" => self.panic_on_oom = parse_bool(name, value)?,
            "vm.disable_swapspace_pageouts" => {
                self.disable_swapspace_pageouts = parse_bool(name, value)?
            }
            "vm.vnode_lock_timeout_ms" => self.vnode_lock_timeout_ms = parse(name, value)?,
            _ => return Err(ReclaimError::InvalidTunable(name.to_string())),
        }
        Ok(())
    }

    /// Ciclos de shortfall em que uma falta é dividida.
    pub fn shortfall_cycles(&self) -> u32 {
        (self.launder_rate / self.inact_scan_rate.max(1)).max(1)
    }

    /// Páginas por ciclo na lavagem em background.
    pub fn background_pages_per_cycle(&self) -> usize {
        kib_to_pages(self.background_launder_rate) / self.launder_rate.max(1) as usize
    }

    /// Páginas lavadas em background antes de desistir.
    pub fn background_max_pages(&self) -> usize {
        kib_to_pages(self.background_launder_max)
    }

    /// Piso de lavagem por ciclo quando não há falta.
    pub fn idle_pages_per_cycle(&self) -> usize {
        if self.idle_launder_rate == 0 {
            return 0;
        }
        (kib_to_pages(self.idle_launder_rate) / self.launder_rate.max(1) as usize).max(1)
    }

    /// Tamanho efetivo do cluster.
    pub fn cluster_pages(&self) -> usize {
        self.pageout_page_count.clamp(1, PAGEOUT_PAGE_COUNT)
    }
}

fn kib_to_pages(kib: u32) -> usize {
    kib as usize * 1024 / PAGE_SIZE
}

fn parse<T: core::str::FromStr>(name: &str, value: &str) -> ReclaimResult<T> {
    value
        .parse()
        .map_err(|_| ReclaimError::InvalidTunable(name.to_string()))
}

fn parse_nonzero<T>(name: &str, value: &str) -> ReclaimResult<T>
where
    T: core::str::FromStr + Default + PartialEq,
{
    let parsed: T = parse(name, value)?;
    if parsed == T::default() {
        return Err(ReclaimError::InvalidTunable(name.to_string()));
    }
    Ok(parsed)
}

/// Flags aceitam `1/0`, `true/false` ou nada (`vm.panic_on_oom`).
fn parse_bool(name: &str, value: &str) -> ReclaimResult<bool> {
    match value {
        "" | "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ReclaimError::InvalidTunable(name.to_string())),
    }
}

// =============================================================================
// ALVOS DE PAGINAÇÃO
// =============================================================================

/// Limites de páginas livres e inativas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PagingTargets {
    /// O daemon libera páginas até ter pelo menos isto livre
    pub free_target: usize,
    /// Abaixo disto, alocadores comuns esperam (`vm_wait`)
    pub free_min: usize,
    /// Reserva para o próprio pageout
    pub free_reserved: usize,
    /// Falta severa
    pub free_severe: usize,
    /// Tamanho desejado da fila inativa
    pub inactive_target: usize,
    /// O alocador acorda o daemon abaixo disto
    pub wakeup_thresh: usize,
    /// Páginas por rodada de lavagem em background
    pub background_launder_target: usize,
}

impl PagingTargets {
    /// Alvos clássicos derivados do total de páginas.
    ///
    /// Em sistemas minúsculos as reservas passariam do total, então todos os
    /// limites são cortados em `page_count`.
    pub fn from_page_count(page_count: usize, tunables: &Tunables) -> Self {
        let free_reserved =
            (tunables.cluster_pages() + PAGEOUT_FREE_MIN + page_count / 768).min(page_count);
        let base_min = page_count / 200;
        let free_target = (4 * base_min + free_reserved).min(page_count);
        let free_min = (base_min + free_reserved).min(page_count);
        let free_severe = (base_min / 2 + free_reserved).min(page_count);

        let mut inactive_target =
            free_target * tunables.inactive_target_pct as usize / 100;
        inactive_target = inactive_target.min(page_count / 3);

        Self {
            free_target,
            free_min,
            free_reserved,
            free_severe,
            inactive_target,
            wakeup_thresh: (free_target / 10) * 9,
            background_launder_target: free_target.saturating_sub(free_min) / 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let t = Tunables::default();
        assert_eq!(t.pageout_oom_seq, 12);
        assert_eq!(t.act_scan_laundry_weight, 3);
        assert_eq!(t.shortfall_cycles(), 5);
        assert_eq!(t.background_pages_per_cycle(), 102);
        assert_eq!(t.background_max_pages(), 5120);
        assert_eq!(t.cluster_pages(), PAGEOUT_PAGE_COUNT);
    }

    #[test]
    fn cmdline_overrides_and_ignores_other_subsystems() {
        let t = Tunables::from_cmdline(
            "root=/dev/sda vm.pageout_oom_seq=3 vm.panic_on_oom vm.pageout_page_count=8",
        )
        .unwrap();
        assert_eq!(t.pageout_oom_seq, 3);
        assert!(t.panic_on_oom);
        assert_eq!(t.cluster_pages(), 8);
    }

    #[test]
    fn bad_tunables_are_rejected() {
        let mut t = Tunables::default();
        assert!(matches!(
            t.set("vm.nope", "1"),
            Err(ReclaimError::InvalidTunable(_))
        ));
        assert!(t.set("vm.pageout_oom_seq", "abc").is_err());
        assert!(t.set("vm.pageout_oom_seq", "0").is_err());
        assert!(t.set("vm.pageout_page_count", "33").is_err());
        assert!(t.set("vm.panic_on_oom", "maybe").is_err());
        assert_eq!(t, Tunables::default());
    }

    #[test]
    fn idle_floor_is_at_least_one_page() {
        let mut t = Tunables::default();
        t.idle_launder_rate = 4;
        assert_eq!(t.idle_pages_per_cycle(), 1);
        t.idle_launder_rate = 0;
        assert_eq!(t.idle_pages_per_cycle(), 0);
    }

    #[test]
    fn targets_are_capped_on_tiny_systems() {
        let targets = PagingTargets::from_page_count(16, &Tunables::default());
        assert!(targets.free_target <= 16);
        assert!(targets.inactive_target <= 16 / 3);

        let big = PagingTargets::from_page_count(262_144, &Tunables::default());
        assert!(big.free_min < big.free_target);
        assert_eq!(big.inactive_target, big.free_target * 3 / 2);
        assert_eq!(big.wakeup_thresh, big.free_target / 10 * 9);
    }
}
