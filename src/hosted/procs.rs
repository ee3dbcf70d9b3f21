//! Tabela de processos em memória.

use crate::sched::{Pid, ProcFlags, ProcessInfo, ProcessTable};
use crate::sync::Spinlock;

#[derive(Debug, Default)]
pub struct ProcTable {
    procs: Spinlock<Vec<ProcessInfo>>,
    kills: Spinlock<Vec<(Pid, String)>>,
    renices: Spinlock<Vec<(Pid, i8)>>,
}

impl ProcTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, proc: ProcessInfo) {
        let mut procs = self.procs.lock();
        procs.retain(|p| p.pid != proc.pid);
        procs.push(proc);
    }

    /// PIDs mortos, em ordem
    pub fn killed(&self) -> Vec<Pid> {
        self.kills.lock().iter().map(|(pid, _)| *pid).collect()
    }

    pub fn renices(&self) -> Vec<(Pid, i8)> {
        self.renices.lock().clone()
    }
}

impl ProcessTable for ProcTable {
    fn processes(&self) -> Vec<ProcessInfo> {
        self.procs.lock().clone()
    }

    fn renice(&self, pid: Pid, nice: i8) {
        self.renices.lock().push((pid, nice));
    }

    /// O processo fica marcado como morto e deixa de ser candidato.
    fn kill(&self, pid: Pid, reason: &str) {
        if let Some(proc) = self.procs.lock().iter_mut().find(|p| p.pid == pid) {
            proc.flags.insert(ProcFlags::KILLED);
        }
        self.kills.lock().push((pid, reason.to_string()));
    }
}
