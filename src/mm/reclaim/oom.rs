//! # OOM Killer
//!
//! Último recurso: quando nenhum domínio consegue reduzir a falta por
//! `pageout_oom_seq` passadas seguidas, um processo morre.
//!
//! ## Quórum
//!
//! Cada domínio vota sozinho. A morte só acontece quando **todos** votaram:
//! um domínio sem memória não mata nada enquanto outro ainda tem como
//! liberar páginas. O último a votar escolhe a vítima, mata e zera todos os
//! votos. Um domínio que volta a progredir retira o próprio voto.
//!
//! ## Vítima
//!
//! O processo com mais páginas que morreriam com ele:
//!
//! ```text
//! tamanho = páginas em swap + residentes privadas (só em falta de memória)
//! ```
//!
//! Processos do sistema, protegidos, saindo ou em exec ficam de fora, assim
//! como o init e processos sem nenhuma thread num estado que o kill ajude.

use core::sync::atomic::Ordering;

use super::domain::VmDomain;
use crate::mm::error::ReclaimError;
use crate::mm::stats::PageoutStats;
use crate::mm::Vm;
use crate::sched::{Pid, ProcFlags, ProcessInfo};
use crate::sync::Spinlock;

/// PID do init (nunca é vítima)
const INIT_PID: Pid = 1;

/// Origem da pressão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OomReason {
    /// Scan sem progresso (quórum dos domínios)
    Memory,
    /// Falha de página sem memória: o handler de faltas chama
    /// `oom_kill(OomReason::PageFault)`
    PageFault,
    /// Swap esgotado: o gerente de swap chama `oom_kill(OomReason::Swap)`.
    /// Só páginas em swap contam no tamanho da vítima.
    Swap,
}

impl OomReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "sem memória",
            Self::PageFault => "sem memória na falha de página",
            Self::Swap => "sem espaço em swap",
        }
    }
}

#[derive(Debug)]
struct Votes {
    voted: Vec<bool>,
    count: usize,
}

/// Votos de OOM por domínio.
#[derive(Debug)]
pub struct OomQuorum {
    votes: Spinlock<Votes>,
}

impl OomQuorum {
    pub fn new(domains: usize) -> Self {
        Self {
            votes: Spinlock::new(Votes {
                voted: vec![false; domains],
                count: 0,
            }),
        }
    }

    /// Registra o voto do domínio. Retorna `true` se este voto fechou o
    /// quórum; um voto repetido nunca fecha.
    pub fn vote(&self, domain: usize) -> bool {
        let mut votes = self.votes.lock();
        match votes.voted.get_mut(domain) {
            Some(voted) if !*voted => *voted = true,
            _ => return false,
        }
        votes.count += 1;
        votes.count == votes.voted.len()
    }

    pub fn retract(&self, domain: usize) {
        let mut votes = self.votes.lock();
        if let Some(voted) = votes.voted.get_mut(domain) {
            if core::mem::take(voted) {
                votes.count -= 1;
            }
        }
    }

    pub fn clear_all(&self) {
        let mut votes = self.votes.lock();
        votes.voted.iter_mut().for_each(|v| *v = false);
        votes.count = 0;
    }

    pub fn voted(&self, domain: usize) -> bool {
        self.votes.lock().voted.get(domain).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.votes.lock().count
    }
}

/// O processo pode ser vítima?
fn is_candidate(proc: &ProcessInfo) -> bool {
    if proc.pid == INIT_PID || proc.flags.intersects(ProcFlags::OOM_IMMUNE) {
        return false;
    }
    proc.threads.iter().any(|t| t.is_reclaimable())
}

/// Páginas liberadas se o processo morrer.
pub fn oom_score(proc: &ProcessInfo, reason: OomReason) -> u64 {
    let mut size = proc.vmspace.swap_resident;
    if matches!(reason, OomReason::Memory | OomReason::PageFault) {
        size += proc
            .vmspace
            .entries
            .iter()
            .map(|e| e.reclaimable())
            .sum::<u64>();
    }
    size
}

/// Maior candidato. Empate fica com o primeiro da lista.
pub fn select_victim(procs: &[ProcessInfo], reason: OomReason) -> Option<(Pid, u64)> {
    let mut best: Option<(Pid, u64)> = None;
    for proc in procs.iter().filter(|p| is_candidate(p)) {
        let size = oom_score(proc, reason);
        if size > best.map_or(0, |(_, s)| s) {
            best = Some((proc.pid, size));
        }
    }
    best
}

impl Vm {
    /// Atualiza a sequência de falhas do domínio e vota se passou do limite.
    ///
    /// Uma passada sem progresso é uma em que havia falta e ela não mudou.
    pub(crate) fn mightbe_oom(&self, dom: &VmDomain, page_shortage: i64, starting: i64) {
        let seq = if starting <= 0 || starting != page_shortage {
            dom.oom_seq.store(0, Ordering::Relaxed);
            0
        } else {
            dom.oom_seq.fetch_add(1, Ordering::Relaxed) + 1
        };

        if seq < self.tunables().pageout_oom_seq {
            self.oom.retract(dom.id);
            return;
        }

        // Não acumula: a próxima contagem começa do zero.
        dom.oom_seq.store(0, Ordering::Relaxed);
        if self.oom.voted(dom.id) {
            return;
        }
        PageoutStats::inc(&self.stats.oom_votes);
        let last = self.oom.vote(dom.id);
        crate::kwarn!(
            "(OOM) dom{} votou ({}/{})",
            dom.id,
            self.oom.count(),
            self.domains.len()
        );
        if !last {
            return;
        }

        crate::kerror!("(OOM) {}", ReclaimError::GlobalExhaustion);
        self.oom_kill(OomReason::Memory);
        self.oom.clear_all();
    }

    /// Domínios que votaram e ainda esperam o quórum
    pub fn oom_votes(&self) -> usize {
        self.oom.count()
    }

    /// Escolhe e mata a vítima. Retorna o PID morto.
    ///
    /// Com `panic_on_oom` o sistema para em vez de matar.
    pub fn oom_kill(&self, reason: OomReason) -> Option<Pid> {
        let procs = self.procs.processes();
        let Some((pid, size)) = select_victim(&procs, reason) else {
            crate::kerror!("(OOM) {}: nenhuma vítima possível", reason.as_str());
            return None;
        };

        if self.tunables().panic_on_oom {
            panic!("(OOM) {}: panic_on_oom ativo", reason.as_str());
        }

        let name = procs
            .iter()
            .find(|p| p.pid == pid)
            .map(|p| p.name.as_str())
            .unwrap_or("?");
        crate::kerror!(
            "(OOM) {}: matando pid {} ({}), {} páginas",
            reason.as_str(),
            pid,
            name,
            size
        );
        // Prioridade máxima para a vítima sair rápido.
        self.procs.renice(pid, -20);
        self.procs.kill(pid, reason.as_str());
        PageoutStats::inc(&self.stats.oom_kills);
        self.pmm.wake_waiters();
        Some(pid)
    }
}
