//! Estados de task

/// Estado de uma thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Recém criada, não executou ainda
    Created,
    /// Pronta para executar (na run queue)
    Ready,
    /// Executando em alguma CPU
    Running,
    /// Bloqueada esperando algo (dormindo)
    Blocked,
    /// Parada por sinal (SIGSTOP/Debugger)
    Stopped,
    /// Stack do kernel fora da memória
    Swapped,
    /// Terminada, esperando cleanup
    Zombie,
    /// Morta, pode ser liberada
    Dead,
}

impl TaskState {
    /// Verifica se pode ser escalonada
    pub const fn is_runnable(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    /// Matar um processo com uma thread neste estado libera memória?
    ///
    /// Runnable, running, sleeping, suspended ou swapped: sim.
    pub const fn is_reclaimable(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Running | Self::Blocked | Self::Stopped | Self::Swapped
        )
    }
}
