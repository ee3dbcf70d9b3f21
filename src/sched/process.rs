//! Processos como vistos pelo OOM killer.
//!
//! A tabela de processos é externa. Ela entrega um snapshot com o que o OOM
//! precisa para pontuar cada candidato: estado das threads, flags de proteção
//! e a contabilidade de páginas residentes do address space.

use bitflags::bitflags;

use super::task::TaskState;

/// ID de processo
pub type Pid = u32;

bitflags! {
    /// Flags de processo relevantes para o OOM.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ProcFlags: u32 {
        /// Processo do sistema (kernel threads, init)
        const SYSTEM    = 1 << 0;
        /// Protegido explicitamente contra OOM
        const PROTECTED = 1 << 1;
        /// Já está saindo
        const EXITING   = 1 << 2;
        /// Já recebeu sinal de morte
        const KILLED    = 1 << 3;
        /// No meio de um exec()
        const IN_EXEC   = 1 << 4;

        /// Qualquer uma destas exclui o processo da seleção
        const OOM_IMMUNE = Self::SYSTEM.bits()
            | Self::PROTECTED.bits()
            | Self::EXITING.bits()
            | Self::KILLED.bits()
            | Self::IN_EXEC.bits();
    }
}

/// Tipo do objeto por trás de uma entrada do mapa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// Anônima / privada (swap-backed)
    Anonymous,
    /// Arquivo
    File,
    /// Memória física (phys)
    Phys,
    /// Dispositivo / scatter-gather: páginas não pertencem ao processo
    Device,
    /// Sub-mapa (contabilizado no mapa filho)
    SubMap,
}

/// Uma entrada do mapa de um address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntryUsage {
    pub kind: MappingKind,
    /// Páginas residentes do objeto mapeado
    pub resident: u64,
    /// Entrada ainda COW (precisa copiar na escrita)
    pub needs_copy: bool,
    /// Referências ao objeto mapeado
    pub object_refs: u32,
}

impl MapEntryUsage {
    /// Páginas que morrem junto com o processo.
    ///
    /// Entradas COW cujo objeto ainda é compartilhado não contam: matar o
    /// processo não libera essas páginas.
    pub fn reclaimable(&self) -> u64 {
        match self.kind {
            MappingKind::Device | MappingKind::SubMap => 0,
            _ if self.needs_copy && self.object_refs != 1 => 0,
            _ => self.resident,
        }
    }
}

/// Contabilidade de memória de um address space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmSpaceUsage {
    /// Páginas do processo que estão em swap
    pub swap_resident: u64,
    pub entries: Vec<MapEntryUsage>,
}

/// Snapshot de um processo.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub flags: ProcFlags,
    /// Estado de cada thread
    pub threads: Vec<TaskState>,
    pub vmspace: VmSpaceUsage,
}

impl ProcessInfo {
    pub fn new(pid: Pid, name: &str) -> Self {
        Self {
            pid,
            name: name.to_string(),
            flags: ProcFlags::empty(),
            threads: vec![TaskState::Running],
            vmspace: VmSpaceUsage::default(),
        }
    }
}

/// Tabela de processos (colaborador externo).
pub trait ProcessTable: Send + Sync {
    /// Snapshot de todos os processos do sistema.
    fn processes(&self) -> Vec<ProcessInfo>;

    /// Ajusta o nice de um processo.
    fn renice(&self, pid: Pid, nice: i8);

    /// Envia sinal de morte ao processo.
    fn kill(&self, pid: Pid, reason: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_cow_entries_are_not_reclaimable() {
        let private = MapEntryUsage {
            kind: MappingKind::Anonymous,
            resident: 10,
            needs_copy: true,
            object_refs: 1,
        };
        let shared = MapEntryUsage {
            object_refs: 2,
            ..private
        };
        let device = MapEntryUsage {
            kind: MappingKind::Device,
            needs_copy: false,
            ..private
        };
        assert_eq!(private.reclaimable(), 10);
        assert_eq!(shared.reclaimable(), 0);
        assert_eq!(device.reclaimable(), 0);
    }
}
